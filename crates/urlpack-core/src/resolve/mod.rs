//! Module specifier resolution.
//!
//! Decides where an import points: an absolute remote URL, a path relative to
//! an already-remote module, a bare name aliased through the import map, or a
//! local filesystem path.
//!
//! ## Rule order (first match wins)
//!
//! 1. `http://` / `https://` specifier → itself, `remote`
//! 2. importer is `remote` → URL join against the importer, `remote`
//! 3. import statement whose first segment is an import map key → `<base>/<rest>`, `remote`
//! 4. anything else → path joined onto the importer's resolution dir, `local`
//!
//! Bare names inside remote modules never reach rule 3; they are joined
//! against the remote importer's URL like any other relative reference.

mod rules;

use crate::import_map::ImportMap;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

use rules::{Rule, RuleInput};

/// Resolve error codes.
pub mod codes {
    /// The remote importer's own location is not a parseable URL.
    pub const RESOLVE_INVALID_IMPORTER_URL: &str = "RESOLVE_INVALID_IMPORTER_URL";
    /// The specifier cannot be joined onto the remote importer's URL.
    pub const RESOLVE_INVALID_RELATIVE: &str = "RESOLVE_INVALID_RELATIVE";
}

/// Namespace a resolved location lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    /// Fetched over the network, cached.
    Remote,
    /// Read from the filesystem.
    Local,
}

impl Namespace {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a specifier was referenced by its importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    /// The build's entry point.
    EntryPoint,
    /// Static `import ... from` or `export ... from`.
    ImportStatement,
    /// `import("...")`.
    DynamicImport,
    /// `require("...")`.
    RequireCall,
}

impl ReferenceKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryPoint => "entry-point",
            Self::ImportStatement => "import-statement",
            Self::DynamicImport => "dynamic-import",
            Self::RequireCall => "require-call",
        }
    }
}

/// Result of resolving a specifier: a path or URL tagged with its namespace.
///
/// `Remote` paths are absolute URLs; `Local` paths are absolute filesystem paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResolvedLocation {
    pub path: String,
    pub namespace: Namespace,
}

impl ResolvedLocation {
    /// A remote location.
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            path: url.into(),
            namespace: Namespace::Remote,
        }
    }

    /// A local filesystem location.
    #[must_use]
    pub fn local(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            namespace: Namespace::Local,
        }
    }

    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.namespace == Namespace::Remote
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// Identity of the module performing an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportContext {
    /// Resolved location of the importer (URL for remote importers).
    pub path: String,
    /// Namespace the importer was resolved into.
    pub namespace: Namespace,
    /// Directory local specifiers are resolved against.
    pub resolve_dir: PathBuf,
}

impl ImportContext {
    /// Context for the entry point, which has no importer.
    #[must_use]
    pub fn entry(cwd: &Path) -> Self {
        Self {
            path: String::new(),
            namespace: Namespace::Local,
            resolve_dir: cwd.to_path_buf(),
        }
    }

    /// Context for an import made by a resolved module.
    #[must_use]
    pub fn from_location(location: &ResolvedLocation) -> Self {
        let resolve_dir = match location.namespace {
            Namespace::Local => Path::new(&location.path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
            Namespace::Remote => PathBuf::new(),
        };
        Self {
            path: location.path.clone(),
            namespace: location.namespace,
            resolve_dir,
        }
    }
}

/// Resolution failure.
#[derive(Debug, Clone)]
pub struct ResolveError {
    pub code: &'static str,
    pub specifier: String,
    pub importer: String,
    pub message: String,
}

impl ResolveError {
    pub(crate) fn new(
        code: &'static str,
        specifier: &str,
        importer: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            specifier: specifier.to_string(),
            importer: importer.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Cannot resolve '{}' from '{}': {}",
            self.code, self.specifier, self.importer, self.message
        )
    }
}

impl std::error::Error for ResolveError {}

/// Specifier resolver backed by an import map.
///
/// Pure: no filesystem or network access. Cheap to clone and safe to share
/// between concurrent resolutions.
#[derive(Clone)]
pub struct Resolver {
    import_map: Arc<ImportMap>,
    rules: &'static [Rule],
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("import_map", &self.import_map)
            .field(
                "rules",
                &self.rules.iter().map(|r| r.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Resolver {
    /// Create a resolver for the given import map.
    #[must_use]
    pub fn new(import_map: Arc<ImportMap>) -> Self {
        Self {
            import_map,
            rules: rules::RULES,
        }
    }

    /// Resolve a specifier referenced from `importer`.
    ///
    /// Every specifier shape is classified; the only failures come from
    /// joining a specifier onto a malformed remote importer URL.
    pub fn resolve(
        &self,
        specifier: &str,
        kind: ReferenceKind,
        importer: &ImportContext,
    ) -> Result<ResolvedLocation, ResolveError> {
        let input = RuleInput {
            specifier,
            kind,
            importer,
            import_map: &self.import_map,
        };

        for rule in self.rules {
            if (rule.applies)(&input) {
                let location = (rule.resolve)(&input)?;
                trace!(
                    specifier,
                    kind = kind.as_str(),
                    rule = rule.name,
                    resolved = %location,
                    "resolved specifier"
                );
                return Ok(location);
            }
        }

        let location = rules::resolve_local(&input);
        trace!(
            specifier,
            kind = kind.as_str(),
            rule = "local",
            resolved = %location,
            "resolved specifier"
        );
        Ok(location)
    }
}
