//! Import maps.
//!
//! An import map translates bare package names to base URLs:
//!
//! ```json
//! { "imports": { "react": "https://esm.sh/react@18", "lodash": "https://esm.sh/lodash" } }
//! ```
//!
//! The `react` entry is mandatory because the bundler derives its automatic
//! JSX runtime import source from it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Import map error codes.
pub mod codes {
    pub const IMPORT_MAP_READ: &str = "IMPORT_MAP_READ";
    pub const IMPORT_MAP_PARSE: &str = "IMPORT_MAP_PARSE";
    pub const IMPORT_MAP_MISSING_REACT: &str = "IMPORT_MAP_MISSING_REACT";
    pub const IMPORT_MAP_INVALID_URL: &str = "IMPORT_MAP_INVALID_URL";
}

/// Package name whose mapping doubles as the JSX import source.
pub const JSX_PACKAGE: &str = "react";

/// Error building an import map.
#[derive(Error, Debug)]
pub enum ImportMapError {
    #[error("Failed to read import map at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse import map: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Import map must contain an \"imports.react\" entry (used as the JSX import source)")]
    MissingReact,

    #[error("Import map entry \"{name}\" is not an absolute URL: {value} ({reason})")]
    InvalidUrl {
        name: String,
        value: String,
        reason: url::ParseError,
    },
}

impl ImportMapError {
    /// Stable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Read { .. } => codes::IMPORT_MAP_READ,
            Self::Parse(_) => codes::IMPORT_MAP_PARSE,
            Self::MissingReact => codes::IMPORT_MAP_MISSING_REACT,
            Self::InvalidUrl { .. } => codes::IMPORT_MAP_INVALID_URL,
        }
    }
}

/// On-disk shape, validated into an [`ImportMap`].
#[derive(Deserialize)]
struct RawImportMap {
    imports: BTreeMap<String, String>,
}

/// A validated, immutable import map.
///
/// Every value parses as an absolute URL and `react` is always present.
/// Values are kept exactly as written; alias resolution concatenates them
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportMap {
    imports: BTreeMap<String, String>,
}

impl ImportMap {
    /// Build an import map from (package name, base URL) pairs.
    pub fn new<K, V, I>(imports: I) -> Result<Self, ImportMapError>
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let imports: BTreeMap<String, String> = imports
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        for (name, value) in &imports {
            if let Err(reason) = Url::parse(value) {
                return Err(ImportMapError::InvalidUrl {
                    name: name.clone(),
                    value: value.clone(),
                    reason,
                });
            }
        }

        if !imports.contains_key(JSX_PACKAGE) {
            return Err(ImportMapError::MissingReact);
        }

        Ok(Self { imports })
    }

    /// Parse an import map from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ImportMapError> {
        let raw: RawImportMap = serde_json::from_str(json)?;
        Self::new(raw.imports)
    }

    /// Read and parse an import map file.
    pub fn from_path(path: &Path) -> Result<Self, ImportMapError> {
        let json = urlpack_util::fs::read_to_string_lossy(path).map_err(|source| {
            ImportMapError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Self::from_json_str(&json)
    }

    /// Base URL mapped to a package name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.imports.get(name).map(String::as_str)
    }

    /// Whether a package name has a mapping.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.imports.contains_key(name)
    }

    /// The automatic JSX runtime import source (`imports.react`).
    #[must_use]
    pub fn jsx_import_source(&self) -> &str {
        // Presence is checked in `new`
        self.get(JSX_PACKAGE).unwrap_or_default()
    }
}
