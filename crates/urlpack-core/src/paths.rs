use crate::config::Channel;
use crate::version::SCHEMA_VERSION;
use std::path::{Component, Path, PathBuf};

/// Environment variable to override the cache root (for testing and CI).
pub const CACHE_DIR_ENV: &str = "URLPACK_CACHE_DIR";

/// Get the cache directory for urlpack.
///
/// Uses platform-appropriate locations with versioning:
/// - Linux: `$XDG_CACHE_HOME/urlpack/v{N}/{channel}` or `~/.cache/urlpack/v{N}/{channel}`
/// - macOS: `~/Library/Caches/urlpack/v{N}/{channel}`
/// - Windows: `%LOCALAPPDATA%\urlpack\v{N}\{channel}`
///
/// `URLPACK_CACHE_DIR` replaces the platform base when set.
#[must_use]
pub fn cache_dir(channel: Channel) -> PathBuf {
    let base = match std::env::var_os(CACHE_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs_next::cache_dir().map_or_else(
            || {
                dirs_next::home_dir().map_or_else(
                    || PathBuf::from(".urlpack-cache"),
                    |p| p.join(".cache").join("urlpack"),
                )
            },
            |p| p.join("urlpack"),
        ),
    };

    base.join(format!("v{SCHEMA_VERSION}"))
        .join(channel.as_str())
}

/// Directory holding cached remote module responses.
#[must_use]
pub fn imports_cache_dir(channel: Channel) -> PathBuf {
    cache_dir(channel).join("imports")
}

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. The filesystem is never consulted.
///
/// `..` at the root stays at the root.
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
