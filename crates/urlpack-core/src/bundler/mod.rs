//! Minimal ESM bundler.
//!
//! Walks the module graph from an entry point, asking plugins to resolve every
//! import edge and to load every module, then concatenates the modules into a
//! single output file. It does no source transformation.
//!
//! ## Usage
//!
//! ```ignore
//! use urlpack_core::bundler::{Bundler, BundleOptions};
//!
//! let bundler = Bundler::new(BundleOptions::new(cwd, "dist")).plugin(plugin);
//! let output = bundler.bundle("src/index.jsx").await?;
//! println!("wrote {}", output.outfile.display());
//! ```
//!
//! ## Traversal
//!
//! Modules are discovered in waves. Every module of a wave is loaded
//! concurrently, then every edge of the wave is resolved concurrently;
//! targets not seen before form the next wave.

pub mod emit;
pub mod graph;
pub mod plugin;
pub mod scan;

pub use graph::{Module, ModuleGraph, ModuleId};
pub use plugin::{HookResult, Plugin, PluginContainer, PluginError, ResolveArgs};
pub use scan::{scan_imports, ScannedImport};

use crate::paths::normalize_path;
use crate::resolve::{ImportContext, Namespace, ReferenceKind, ResolvedLocation};
use futures::future::try_join_all;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

/// Bundler error codes.
pub mod codes {
    /// The entry point does not exist.
    pub const BUNDLE_ENTRY_NOT_FOUND: &str = "BUNDLE_ENTRY_NOT_FOUND";
    /// A module could not be read.
    pub const BUNDLE_READ_ERROR: &str = "BUNDLE_READ_ERROR";
    /// No plugin resolved an import of a remote module.
    pub const BUNDLE_UNRESOLVED: &str = "BUNDLE_UNRESOLVED";
    /// The output file could not be written.
    pub const BUNDLE_WRITE_ERROR: &str = "BUNDLE_WRITE_ERROR";
    /// A plugin hook failed without a more specific code.
    pub const PLUGIN_ERROR: &str = "PLUGIN_ERROR";
}

/// Bundle options.
#[derive(Debug, Clone)]
pub struct BundleOptions {
    /// Directory the entry point and local imports are resolved against.
    pub cwd: PathBuf,
    /// Directory the bundle is written to.
    pub outdir: PathBuf,
    /// Package providing `<source>/jsx-runtime` for `.jsx`/`.tsx` modules.
    pub jsx_import_source: Option<String>,
}

impl BundleOptions {
    pub fn new(cwd: impl Into<PathBuf>, outdir: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            outdir: outdir.into(),
            jsx_import_source: None,
        }
    }

    pub fn with_jsx_import_source(mut self, source: impl Into<String>) -> Self {
        self.jsx_import_source = Some(source.into());
        self
    }
}

/// Bundle result.
#[derive(Debug, Clone)]
pub struct BundleOutput {
    /// File the bundle was written to.
    pub outfile: PathBuf,
    /// Bundled code.
    pub code: String,
    /// Modules included, in output order.
    pub modules: Vec<ResolvedLocation>,
}

/// Bundler error.
#[derive(Debug, Clone)]
pub struct BundleError {
    pub code: &'static str,
    pub message: String,
    pub path: Option<String>,
}

impl BundleError {
    fn plugin(err: PluginError, path: Option<&str>) -> Self {
        Self {
            code: err.code,
            message: err.to_string(),
            path: path.filter(|p| !p.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} ({})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for BundleError {}

/// The bundler.
#[derive(Debug)]
pub struct Bundler {
    plugins: PluginContainer,
    options: BundleOptions,
}

impl Bundler {
    #[must_use]
    pub fn new(options: BundleOptions) -> Self {
        Self {
            plugins: PluginContainer::new(),
            options,
        }
    }

    /// Register a plugin after those already added.
    #[must_use]
    pub fn plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.plugins.add(plugin);
        self
    }

    /// Bundle from an entry point and write the output file.
    pub async fn bundle(&self, entry: &str) -> Result<BundleOutput, BundleError> {
        self.plugins
            .build_start()
            .map_err(|e| BundleError::plugin(e, None))?;

        let entry_args = ResolveArgs {
            specifier: entry.to_string(),
            kind: ReferenceKind::EntryPoint,
            importer: ImportContext::entry(&self.options.cwd),
        };
        let entry_location = self.resolve_edge(&entry_args).await?;

        if !entry_location.is_remote() && tokio::fs::metadata(&entry_location.path).await.is_err() {
            return Err(BundleError {
                code: codes::BUNDLE_ENTRY_NOT_FOUND,
                message: format!("Cannot find entry point '{entry}'"),
                path: Some(entry_location.path),
            });
        }

        let graph = self.build_graph(entry_location.clone()).await?;
        let order = graph.toposort();

        let code = emit::render_esm(&graph, &order);
        let outfile = emit::output_path(&self.options.outdir, &entry_location);
        emit::write_output(&outfile, &code).await?;

        self.plugins
            .build_end()
            .map_err(|e| BundleError::plugin(e, None))?;

        debug!(outfile = %outfile.display(), modules = graph.len(), "bundle written");

        Ok(BundleOutput {
            outfile,
            code,
            modules: order
                .iter()
                .filter_map(|&id| graph.get(id))
                .map(|m| m.location.clone())
                .collect(),
        })
    }

    async fn build_graph(&self, entry: ResolvedLocation) -> Result<ModuleGraph, BundleError> {
        let mut graph = ModuleGraph::new();
        let mut edges: Vec<(ModuleId, Vec<ResolvedLocation>)> = Vec::new();
        let mut scheduled: HashSet<ResolvedLocation> = HashSet::default();
        scheduled.insert(entry.clone());
        let mut wave = vec![entry];
        let mut depth = 0usize;

        while !wave.is_empty() {
            debug!(wave = depth, modules = wave.len(), "loading wave");

            let sources = try_join_all(wave.iter().map(|location| self.load_module(location))).await?;
            let ids: Vec<ModuleId> = wave
                .into_iter()
                .zip(sources)
                .map(|(location, source)| graph.add(Module::new(location, source)))
                .collect();

            let requests: Vec<(ModuleId, ResolveArgs)> = ids
                .iter()
                .filter_map(|&id| graph.get(id).map(|m| (id, self.edges_of(m))))
                .flat_map(|(id, args)| args.into_iter().map(move |a| (id, a)))
                .collect();
            let targets = try_join_all(requests.iter().map(|(_, args)| self.resolve_edge(args))).await?;

            let mut next = Vec::new();
            let mut per_module: HashMap<ModuleId, Vec<ResolvedLocation>> = HashMap::default();
            for ((id, _), target) in requests.iter().zip(targets) {
                if scheduled.insert(target.clone()) {
                    next.push(target.clone());
                }
                per_module.entry(*id).or_default().push(target);
            }

            edges.extend(per_module);
            wave = next;
            depth += 1;
        }

        for (id, targets) in edges {
            graph.set_dependencies(id, &targets);
        }

        Ok(graph)
    }

    /// Import edges of a module: scanned specifiers plus the implicit JSX runtime.
    fn edges_of(&self, module: &Module) -> Vec<ResolveArgs> {
        let importer = ImportContext::from_location(&module.location);
        let mut edges: Vec<ResolveArgs> = scan_imports(&module.source)
            .into_iter()
            .map(|found| ResolveArgs {
                specifier: found.specifier,
                kind: found.kind,
                importer: importer.clone(),
            })
            .collect();

        if let Some(source) = &self.options.jsx_import_source {
            if is_jsx(&module.location) {
                let runtime = format!("{source}/jsx-runtime");
                let present = edges
                    .iter()
                    .any(|e| e.specifier == runtime && e.kind == ReferenceKind::ImportStatement);
                if !present {
                    edges.push(ResolveArgs {
                        specifier: runtime,
                        kind: ReferenceKind::ImportStatement,
                        importer,
                    });
                }
            }
        }

        edges
    }

    async fn resolve_edge(&self, args: &ResolveArgs) -> Result<ResolvedLocation, BundleError> {
        let answer = self
            .plugins
            .resolve(args)
            .await
            .map_err(|e| BundleError::plugin(e, Some(args.importer.path.as_str())))?;

        if let Some(location) = answer {
            trace!(specifier = %args.specifier, %location, "resolved by plugin");
            return Ok(location);
        }

        match args.importer.namespace {
            Namespace::Local => {
                let path = normalize_path(&args.importer.resolve_dir.join(&args.specifier));
                Ok(ResolvedLocation::local(&path))
            }
            Namespace::Remote => Err(BundleError {
                code: codes::BUNDLE_UNRESOLVED,
                message: format!("Could not resolve '{}'", args.specifier),
                path: Some(args.importer.path.clone()),
            }),
        }
    }

    async fn load_module(&self, location: &ResolvedLocation) -> Result<String, BundleError> {
        let answer = self
            .plugins
            .load(location)
            .await
            .map_err(|e| BundleError::plugin(e, Some(location.path.as_str())))?;

        if let Some(source) = answer {
            return Ok(source);
        }

        match location.namespace {
            Namespace::Local => {
                let bytes = tokio::fs::read(&location.path).await.map_err(|e| BundleError {
                    code: codes::BUNDLE_READ_ERROR,
                    message: e.to_string(),
                    path: Some(location.path.clone()),
                })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            Namespace::Remote => Err(BundleError {
                code: codes::BUNDLE_READ_ERROR,
                message: "No plugin loaded this remote module".to_string(),
                path: Some(location.path.clone()),
            }),
        }
    }
}

fn is_jsx(location: &ResolvedLocation) -> bool {
    let path = match location.namespace {
        Namespace::Local => location.path.as_str(),
        Namespace::Remote => location.path.split(['?', '#']).next().unwrap_or_default(),
    };
    Path::new(path)
        .extension()
        .is_some_and(|ext| ext == "jsx" || ext == "tsx")
}

#[cfg(test)]
mod tests {
    use super::plugin::tests::StaticModules;
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, code: &str) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, code).unwrap();
    }

    #[tokio::test]
    async fn test_local_graph_without_plugins() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/index.js", "import { b } from './b.js';\nconsole.log(b);\n");
        write(root, "src/b.js", "import './c.js';\nexport const b = 1;\n");
        write(root, "src/c.js", "globalThis.c = true;\n");

        let bundler = Bundler::new(BundleOptions::new(root, root.join("dist")));
        let output = bundler.bundle("src/index.js").await.unwrap();

        assert_eq!(output.outfile, root.join("dist/index.js"));
        let names: Vec<_> = output
            .modules
            .iter()
            .map(|m| Path::new(&m.path).file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["c.js", "b.js", "index.js"]);
        assert_eq!(fs::read_to_string(&output.outfile).unwrap(), output.code);
    }

    #[tokio::test]
    async fn test_missing_entry() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = Bundler::new(BundleOptions::new(dir.path(), dir.path().join("dist")));
        let err = bundler.bundle("nope.js").await.unwrap_err();
        assert_eq!(err.code, codes::BUNDLE_ENTRY_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_import_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.js", "import './gone.js';");
        let bundler = Bundler::new(BundleOptions::new(dir.path(), dir.path().join("dist")));
        let err = bundler.bundle("index.js").await.unwrap_err();
        assert_eq!(err.code, codes::BUNDLE_READ_ERROR);
        assert!(err.path.unwrap().ends_with("gone.js"));
    }

    #[tokio::test]
    async fn test_cycle_loads_each_module_once() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.js", "import './b.js';\nexport const a = 1;");
        write(dir.path(), "b.js", "import './a.js';\nexport const b = 2;");
        let bundler = Bundler::new(BundleOptions::new(dir.path(), dir.path().join("out")));

        let output = bundler.bundle("a.js").await.unwrap();
        assert_eq!(output.modules.len(), 2);
        assert_eq!(output.code.matches("export const a = 1;").count(), 1);
    }

    #[tokio::test]
    async fn test_remote_importer_without_resolver_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "index.js", "import cfg from 'config';");
        let bundler = Bundler::new(BundleOptions::new(dir.path(), dir.path().join("out")))
            .plugin(Arc::new(StaticModules::default().module("config", "import 'inner';")));

        // `inner` is imported by a remote-namespace module nobody can resolve
        let err = bundler.bundle("index.js").await.unwrap_err();
        assert_eq!(err.code, codes::BUNDLE_UNRESOLVED);
        assert_eq!(err.path.as_deref(), Some("https://modules.test/config"));
    }

    #[tokio::test]
    async fn test_jsx_runtime_edge() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.jsx", "export default () => <div />;");
        let runtime = StaticModules::default().module("react/jsx-runtime", "export const jsx = () => {};");
        let bundler = Bundler::new(
            BundleOptions::new(dir.path(), dir.path().join("out")).with_jsx_import_source("react"),
        )
        .plugin(Arc::new(runtime));

        let output = bundler.bundle("app.jsx").await.unwrap();
        assert_eq!(output.modules[0].path, "https://modules.test/react/jsx-runtime");
        assert_eq!(output.outfile, dir.path().join("out/app.js"));
    }

    #[test]
    fn test_is_jsx() {
        assert!(is_jsx(&ResolvedLocation::local(Path::new("/a/App.tsx"))));
        assert!(is_jsx(&ResolvedLocation::remote("https://x.dev/App.jsx?v=1")));
        assert!(!is_jsx(&ResolvedLocation::local(Path::new("/a/index.js"))));
    }
}
