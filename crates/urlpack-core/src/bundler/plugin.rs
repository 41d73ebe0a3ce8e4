//! Plugin system for the bundler.
//!
//! A plugin can answer two per-module hooks: `resolve` (specifier → location)
//! and `load` (location → source text). Both are async and may decline by
//! returning `None`; the container asks plugins in registration order and the
//! first answer wins.
//!
//! ## Example
//!
//! ```ignore
//! use urlpack_core::bundler::{HookResult, Plugin, ResolveArgs};
//!
//! struct Externals;
//!
//! impl Plugin for Externals {
//!     fn name(&self) -> &str { "externals" }
//!
//!     fn resolve<'a>(&'a self, args: &'a ResolveArgs) -> BoxFuture<'a, HookResult<Option<ResolvedLocation>>> {
//!         let answer = (args.specifier == "fs").then(|| ResolvedLocation::remote("https://esm.sh/fs-shim"));
//!         future::ready(Ok(answer)).boxed()
//!     }
//! }
//! ```

use super::codes;
use crate::resolve::{ImportContext, ReferenceKind, ResolvedLocation};
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, PluginError>;

/// Error from a plugin.
#[derive(Debug, Clone)]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Stable code of the underlying failure.
    pub code: &'static str,
    /// Error message.
    pub message: String,
}

impl PluginError {
    /// A plugin failure without a more specific code.
    pub fn new(plugin: impl Into<String>, hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            hook,
            code: codes::PLUGIN_ERROR,
            message: message.into(),
        }
    }

    /// Keep the code of the failure the plugin is reporting.
    #[must_use]
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = code;
        self
    }
}

impl fmt::Display for PluginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.plugin, self.hook, self.message)
    }
}

impl std::error::Error for PluginError {}

/// Arguments of the resolve hook.
#[derive(Debug, Clone)]
pub struct ResolveArgs {
    /// Specifier as written.
    pub specifier: String,
    /// How it was referenced.
    pub kind: ReferenceKind,
    /// The importing module.
    pub importer: ImportContext,
}

/// The plugin trait.
///
/// Every hook has a default that does nothing, so a plugin only implements
/// what it cares about.
pub trait Plugin: Send + Sync {
    /// Plugin name for logs and error messages.
    fn name(&self) -> &str;

    /// Called once before traversal starts.
    fn build_start(&self) -> HookResult<()> {
        Ok(())
    }

    /// Resolve a specifier, or `None` to let the next plugin try.
    fn resolve<'a>(
        &'a self,
        _args: &'a ResolveArgs,
    ) -> BoxFuture<'a, HookResult<Option<ResolvedLocation>>> {
        future::ready(Ok(None)).boxed()
    }

    /// Provide a module's source, or `None` to let the next plugin try.
    fn load<'a>(
        &'a self,
        _location: &'a ResolvedLocation,
    ) -> BoxFuture<'a, HookResult<Option<String>>> {
        future::ready(Ok(None)).boxed()
    }

    /// Called once after the output has been written.
    fn build_end(&self) -> HookResult<()> {
        Ok(())
    }
}

/// Ordered set of plugins.
#[derive(Default, Clone)]
pub struct PluginContainer {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.plugins.iter().map(|p| p.name().to_string()))
            .finish()
    }
}

impl PluginContainer {
    /// Create an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin after those already registered.
    pub fn add(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    pub fn build_start(&self) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin.build_start()?;
        }
        Ok(())
    }

    /// First plugin answer for a specifier, if any.
    pub async fn resolve(&self, args: &ResolveArgs) -> HookResult<Option<ResolvedLocation>> {
        for plugin in &self.plugins {
            if let Some(location) = plugin.resolve(args).await? {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }

    /// First plugin answer for a module's source, if any.
    pub async fn load(&self, location: &ResolvedLocation) -> HookResult<Option<String>> {
        for plugin in &self.plugins {
            if let Some(code) = plugin.load(location).await? {
                return Ok(Some(code));
            }
        }
        Ok(None)
    }

    pub fn build_end(&self) -> HookResult<()> {
        for plugin in &self.plugins {
            plugin.build_end()?;
        }
        Ok(())
    }
}
