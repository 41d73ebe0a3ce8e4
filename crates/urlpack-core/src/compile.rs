//! Build invocation.
//!
//! Wires an import map, a cache store and a fetcher into a bundler run.

use crate::bundler::{BundleOptions, Bundler};
use crate::cache::CacheStore;
use crate::error::Error;
use crate::fetch::Fetch;
use crate::import_map::ImportMap;
use crate::loader::{Loader, LoaderOptions};
use crate::resolve::ResolvedLocation;
use crate::url_imports::UrlImportsPlugin;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// What to build.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Entry point, relative to `cwd` or absolute.
    pub input_point: String,
    /// Output directory.
    pub output_point: PathBuf,
    /// Import map shared by every resolution of the build.
    pub import_map: Arc<ImportMap>,
    /// Directory the entry point is resolved against.
    pub cwd: PathBuf,
    pub loader: LoaderOptions,
}

impl CompileOptions {
    pub fn new(
        input_point: impl Into<String>,
        output_point: impl Into<PathBuf>,
        import_map: ImportMap,
    ) -> Self {
        Self {
            input_point: input_point.into(),
            output_point: output_point.into(),
            import_map: Arc::new(import_map),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            loader: LoaderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// File the bundle was written to.
    pub outfile: PathBuf,
    /// Bundled modules in output order.
    pub modules: Vec<ResolvedLocation>,
    /// Remote modules fetched over the network.
    pub fetches: usize,
    /// Remote modules served from the cache.
    pub cache_hits: usize,
    /// Size of the written bundle in bytes.
    pub bytes: usize,
}

/// Run one build.
///
/// The JSX import source is the import map's `react` entry. Any resolve, load
/// or bundling failure aborts the build.
pub async fn compile(
    options: CompileOptions,
    cache: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetch>,
) -> Result<BuildReport, Error> {
    let loader = Arc::new(Loader::with_options(cache, fetcher, options.loader));
    let plugin = UrlImportsPlugin::new(Arc::clone(&options.import_map), Arc::clone(&loader));

    let bundle_options = BundleOptions::new(&options.cwd, &options.output_point)
        .with_jsx_import_source(options.import_map.jsx_import_source());
    let bundler = Bundler::new(bundle_options).plugin(Arc::new(plugin));

    let output = bundler.bundle(&options.input_point).await?;
    let stats = loader.stats();

    info!(
        outfile = %output.outfile.display(),
        modules = output.modules.len(),
        fetches = stats.fetches,
        cache_hits = stats.cache_hits,
        "build finished"
    );

    Ok(BuildReport {
        bytes: output.code.len(),
        outfile: output.outfile,
        modules: output.modules,
        fetches: stats.fetches,
        cache_hits: stats.cache_hits,
    })
}
