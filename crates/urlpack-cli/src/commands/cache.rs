//! `urlpack cache` commands: inspect and clear the remote module cache.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use urlpack_core::Channel;
use urlpack_core::paths::imports_cache_dir;
use urlpack_core::DiskCache;

#[derive(Serialize)]
struct CacheDirJson {
    ok: bool,
    dir: String,
    entries: usize,
}

#[derive(Serialize)]
struct CacheCleanJson {
    ok: bool,
    dir: String,
    removed: usize,
}

/// Print the cache directory for `channel`.
pub fn dir(channel: Channel, json: bool) -> Result<()> {
    let dir = imports_cache_dir(channel);

    if json {
        // Counting does not create the directory
        let entries = if dir.exists() {
            DiskCache::open(&dir).into_diagnostic()?.entry_count().into_diagnostic()?
        } else {
            0
        };
        let out = CacheDirJson {
            ok: true,
            dir: dir.display().to_string(),
            entries,
        };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        println!("{}", dir.display());
    }
    Ok(())
}

/// Remove every cached module for `channel`.
pub fn clean(channel: Channel, json: bool) -> Result<()> {
    let dir = imports_cache_dir(channel);
    let removed = if dir.exists() {
        DiskCache::open(&dir).into_diagnostic()?.clear().into_diagnostic()?
    } else {
        0
    };

    if json {
        let out = CacheCleanJson {
            ok: true,
            dir: dir.display().to_string(),
            removed,
        };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        println!("Removed {removed} cached modules from {}", dir.display());
    }
    Ok(())
}
