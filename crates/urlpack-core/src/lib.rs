#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of urlpack.
//!
//! Resolves module specifiers during a bundling pass, redirecting bare package
//! names to remote URLs through an import map, and loads URL-addressed modules
//! through a persistent cache so repeated builds skip the network.

pub mod bundler;
pub mod cache;
pub mod compile;
pub mod config;
pub mod error;
pub mod fetch;
pub mod import_map;
pub mod loader;
pub mod paths;
pub mod resolve;
pub mod url_imports;
pub mod version;

pub use cache::{CacheStore, CachedResponse, DiskCache, MemoryCache, RequestIdentity};
pub use compile::{compile, BuildReport, CompileOptions};
pub use config::Channel;
pub use error::Error;
pub use fetch::{Fetch, HttpFetcher};
pub use import_map::ImportMap;
pub use loader::{LoadError, Loader, LoaderOptions};
pub use resolve::{ImportContext, Namespace, ReferenceKind, ResolvedLocation, Resolver};
pub use url_imports::UrlImportsPlugin;
pub use version::VERSION;
