//! The URL-imports bundler plugin.
//!
//! Runs the [`Resolver`] for every import edge and serves `remote` modules
//! through the cached [`Loader`]. Local modules are left to the bundler.

use crate::bundler::{HookResult, Plugin, PluginError, ResolveArgs};
use crate::import_map::ImportMap;
use crate::loader::Loader;
use crate::resolve::{ResolvedLocation, Resolver};
use futures::future::{self, BoxFuture, FutureExt};
use std::sync::Arc;

const NAME: &str = "url-imports";

/// Resolves through the import map and loads remote modules through the cache.
#[derive(Debug)]
pub struct UrlImportsPlugin {
    resolver: Resolver,
    loader: Arc<Loader>,
}

impl UrlImportsPlugin {
    #[must_use]
    pub fn new(import_map: Arc<ImportMap>, loader: Arc<Loader>) -> Self {
        Self {
            resolver: Resolver::new(import_map),
            loader,
        }
    }
}

impl Plugin for UrlImportsPlugin {
    fn name(&self) -> &str {
        NAME
    }

    fn resolve<'a>(
        &'a self,
        args: &'a ResolveArgs,
    ) -> BoxFuture<'a, HookResult<Option<ResolvedLocation>>> {
        let result = self
            .resolver
            .resolve(&args.specifier, args.kind, &args.importer)
            .map(Some)
            .map_err(|e| {
                let message = format!(
                    "Cannot resolve '{}' from '{}': {}",
                    e.specifier, e.importer, e.message
                );
                PluginError::new(NAME, "resolve", message).with_code(e.code)
            });
        future::ready(result).boxed()
    }

    fn load<'a>(
        &'a self,
        location: &'a ResolvedLocation,
    ) -> BoxFuture<'a, HookResult<Option<String>>> {
        async move {
            if !location.is_remote() {
                return Ok(None);
            }
            self.loader
                .load(location)
                .await
                .map(Some)
                .map_err(|e| PluginError::new(NAME, "load", e.message).with_code(e.code))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CachedResponse, MemoryCache, RequestIdentity};
    use crate::fetch::Fetch;
    use crate::loader::{codes, LoadError};
    use crate::resolve::{ImportContext, ReferenceKind};
    use std::path::Path;

    struct Unreachable;

    impl Fetch for Unreachable {
        fn fetch<'a>(
            &'a self,
            request: &'a RequestIdentity,
        ) -> BoxFuture<'a, Result<CachedResponse, LoadError>> {
            let err = LoadError::fetch_failed(request.url().as_str(), "offline");
            future::ready(Err(err)).boxed()
        }
    }

    fn plugin() -> UrlImportsPlugin {
        let map = ImportMap::new([("react", "https://esm.sh/react@18")]).unwrap();
        let loader = Loader::new(Arc::new(MemoryCache::new()), Arc::new(Unreachable));
        UrlImportsPlugin::new(Arc::new(map), Arc::new(loader))
    }

    #[tokio::test]
    async fn test_resolve_always_answers() {
        let plugin = plugin();
        let args = ResolveArgs {
            specifier: "react".to_string(),
            kind: ReferenceKind::ImportStatement,
            importer: ImportContext::entry(Path::new("/app")),
        };
        let location = plugin.resolve(&args).await.unwrap().unwrap();
        assert_eq!(location, ResolvedLocation::remote("https://esm.sh/react@18/"));

        let args = ResolveArgs {
            specifier: "./local.js".to_string(),
            ..args
        };
        let location = plugin.resolve(&args).await.unwrap().unwrap();
        assert_eq!(location, ResolvedLocation::local(Path::new("/app/local.js")));
    }

    #[tokio::test]
    async fn test_load_declines_local() {
        let plugin = plugin();
        let answer = plugin
            .load(&ResolvedLocation::local(Path::new("/app/index.js")))
            .await
            .unwrap();
        assert!(answer.is_none());
    }

    #[tokio::test]
    async fn test_load_failure_keeps_code() {
        let plugin = plugin();
        let err = plugin
            .load(&ResolvedLocation::remote("https://esm.sh/react@18/"))
            .await
            .unwrap_err();
        assert_eq!(err.plugin, NAME);
        assert_eq!(err.hook, "load");
        assert_eq!(err.code, codes::LOAD_FETCH_FAILED);
    }
}
