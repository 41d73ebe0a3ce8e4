//! `urlpack build` command implementation.
//!
//! Bundles an entry point, fetching import-map aliased and URL imports
//! through the persistent module cache.

use miette::{miette, IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use urlpack_core::Channel;
use urlpack_core::{
    compile, BuildReport, CacheStore, CompileOptions, DiskCache, Error, HttpFetcher, ImportMap,
    MemoryCache,
};

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    /// Entry point, relative to `cwd` or absolute.
    pub entry: String,
    /// Output directory.
    pub outdir: PathBuf,
    /// Import map JSON file.
    pub import_map: PathBuf,
    /// Working directory.
    pub cwd: PathBuf,
    /// Keep fetched modules in memory for this run only.
    pub no_cache: bool,
    /// Cache channel.
    pub channel: Channel,
}

/// JSON output for the build command.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outfile: Option<String>,
    modules: Vec<String>,
    fetches: usize,
    cache_hits: usize,
    size_bytes: usize,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<BuildErrorJson>,
}

#[derive(Serialize)]
struct BuildErrorJson {
    code: &'static str,
    message: String,
}

/// Run the build command.
pub fn run(action: BuildAction, json: bool) -> Result<()> {
    let start = Instant::now();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let result = runtime.block_on(build(&action));

    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            if json {
                let out = BuildResultJson {
                    ok: true,
                    entry: action.entry.clone(),
                    outfile: Some(report.outfile.display().to_string()),
                    modules: report.modules.iter().map(ToString::to_string).collect(),
                    fetches: report.fetches,
                    cache_hits: report.cache_hits,
                    size_bytes: report.bytes,
                    duration_ms,
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
            } else {
                let size_kb = report.bytes as f64 / 1024.0;
                println!(
                    "  {} -> {} ({} modules, {} fetched, {} cached, {:.1}KB, {}ms)",
                    action.entry,
                    report.outfile.display(),
                    report.modules.len(),
                    report.fetches,
                    report.cache_hits,
                    size_kb,
                    duration_ms
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let out = BuildResultJson {
                    ok: false,
                    entry: action.entry.clone(),
                    outfile: None,
                    modules: Vec::new(),
                    fetches: 0,
                    cache_hits: 0,
                    size_bytes: 0,
                    duration_ms,
                    error: Some(BuildErrorJson {
                        code: e.code(),
                        message: e.to_string(),
                    }),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                std::process::exit(1);
            }
            Err(miette!(code = e.code(), "{e}"))
        }
    }
}

async fn build(action: &BuildAction) -> Result<BuildReport, Error> {
    let import_map_path = absolutize(&action.cwd, &action.import_map);
    let import_map = ImportMap::from_path(&import_map_path)?;
    debug!(path = %import_map_path.display(), "import map loaded");

    let cache: Arc<dyn CacheStore> = if action.no_cache {
        Arc::new(MemoryCache::new())
    } else {
        let disk = DiskCache::for_channel(action.channel)?;
        debug!(root = %disk.root().display(), "using disk cache");
        Arc::new(disk)
    };
    let fetcher = Arc::new(HttpFetcher::new()?);

    let options = CompileOptions::new(
        action.entry.clone(),
        absolutize(&action.cwd, &action.outdir),
        import_map,
    )
    .with_cwd(&action.cwd);

    compile(options, cache, fetcher).await
}

fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
