use crate::bundler::BundleError;
use crate::cache::CacheError;
use crate::import_map::ImportMapError;
use crate::loader::LoadError;
use crate::resolve::ResolveError;
use thiserror::Error;

/// Core error type for urlpack operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    ImportMap(#[from] ImportMapError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl Error {
    /// Stable error code for machine-readable output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ImportMap(e) => e.code(),
            Self::Resolve(e) => e.code,
            Self::Load(e) => e.code,
            Self::Bundle(e) => e.code,
            Self::Cache(e) => e.code,
        }
    }
}
