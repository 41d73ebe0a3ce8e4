use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Read a file to string, replacing invalid UTF-8 sequences with the replacement character.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_to_string_lossy(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// The file will either have the old contents or the new contents, never a
/// partial write. Temp names are unique per call, so concurrent writers to
/// the same target in one process do not clobber each other's temp file;
/// the last rename wins. The temp file is removed whenever the write fails.
///
/// # Errors
/// Returns an error if the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    atomic_write_with(path, |file| file.write_all(bytes))
}

fn atomic_write_with(
    path: &Path,
    fill: impl FnOnce(&mut File) -> io::Result<()>,
) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let result = write_temp(&temp_path, fill).and_then(|()| replace(&temp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn write_temp(temp_path: &Path, fill: impl FnOnce(&mut File) -> io::Result<()>) -> io::Result<()> {
    let mut file = File::create(temp_path)?;
    fill(&mut file)?;
    file.sync_all()
}

fn replace(temp_path: &Path, path: &Path) -> io::Result<()> {
    match fs::rename(temp_path, path) {
        // On Windows, rename can fail if target exists.
        Err(_) if cfg!(windows) => {
            fs::copy(temp_path, path)?;
            let _ = fs::remove_file(temp_path);
            Ok(())
        }
        other => other,
    }
}

/// Remove every regular file directly inside `dir`, returning how many were removed.
///
/// A missing directory counts as empty. Subdirectories are left alone.
///
/// # Errors
/// Returns an error if the directory exists but cannot be read, or a file cannot be removed.
pub fn remove_files_in(dir: &Path) -> io::Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_read_to_string_lossy_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x48, 0x65, 0x6c, 0x6c, 0x6f, 0x80, 0x81])
            .unwrap();
        file.flush().unwrap();

        let content = read_to_string_lossy(file.path()).unwrap();
        assert!(content.starts_with("Hello"));
        assert!(content.contains('\u{FFFD}'));
    }

    #[test]
    fn test_atomic_write_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry.json");

        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        // No temp files should remain
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_atomic_write_failed_fill_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entry.json");
        atomic_write(&path, b"old").unwrap();

        let err = atomic_write_with(&path, |file| {
            file.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::WriteZero, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);

        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_write_failed_rename_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        // A non-empty directory cannot be replaced by a file
        let target = dir.path().join("taken");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "x").unwrap();

        assert!(atomic_write(&target, b"data").is_err());
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_remove_files_in() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), "1").unwrap();
        fs::write(dir.path().join("b"), "2").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        assert_eq!(remove_files_in(dir.path()).unwrap(), 2);
        assert!(dir.path().join("nested").is_dir());
        assert_eq!(remove_files_in(dir.path()).unwrap(), 0);
    }

    #[test]
    fn test_remove_files_in_missing_dir() {
        let dir = tempdir().unwrap();
        assert_eq!(remove_files_in(&dir.path().join("nope")).unwrap(), 0);
    }
}
