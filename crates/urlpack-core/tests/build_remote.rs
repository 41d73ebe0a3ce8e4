//! End-to-end builds against a mock CDN.

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use urlpack_core::{
    compile, CompileOptions, DiskCache, Error, HttpFetcher, ImportMap, MemoryCache, Namespace,
};

const REACT_SOURCE: &str = "export default { version: '18' };\n";

#[derive(Clone, Default)]
struct Cdn {
    hits: Arc<AtomicUsize>,
}

async fn serve(State(cdn): State<Cdn>, uri: Uri) -> impl IntoResponse {
    cdn.hits.fetch_add(1, Ordering::SeqCst);
    match uri.path() {
        "/react@18/" => (StatusCode::OK, REACT_SOURCE.to_string()),
        "/react@18/jsx-runtime" => (StatusCode::OK, "export const jsx = () => null;\n".to_string()),
        "/lib@1/index.js" => (StatusCode::OK, "export * from './util.js';\n".to_string()),
        "/lib@1/util.js" => (StatusCode::OK, "export const util = 1;\n".to_string()),
        _ => (StatusCode::NOT_FOUND, "not found".to_string()),
    }
}

async fn start_cdn() -> (String, Cdn) {
    let cdn = Cdn::default();
    let app = Router::new().fallback(serve).with_state(cdn.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), cdn)
}

fn import_map(base: &str) -> ImportMap {
    ImportMap::new([
        ("react", format!("{base}/react@18")),
        ("lib", format!("{base}/lib@1")),
    ])
    .unwrap()
}

fn write_entry(dir: &Path, name: &str, code: &str) {
    fs::write(dir.join(name), code).unwrap();
}

#[tokio::test]
async fn test_bare_import_fetched_once_and_embedded() {
    let (base, cdn) = start_cdn().await;
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "index.js", "import React from \"react\";\nconsole.log(React);\n");

    let cache = Arc::new(MemoryCache::new());
    let options = CompileOptions::new("index.js", dir.path().join("dist"), import_map(&base))
        .with_cwd(dir.path());
    let report = compile(options, cache.clone(), Arc::new(HttpFetcher::new().unwrap()))
        .await
        .unwrap();

    assert_eq!(report.fetches, 1);
    assert_eq!(report.cache_hits, 0);
    assert_eq!(cache.stats().puts, 1);
    assert_eq!(cdn.hits.load(Ordering::SeqCst), 1);

    let remote: Vec<_> = report
        .modules
        .iter()
        .filter(|m| m.namespace == Namespace::Remote)
        .collect();
    assert_eq!(remote.len(), 1);
    assert_eq!(remote[0].path, format!("{base}/react@18/"));

    let output = fs::read_to_string(&report.outfile).unwrap();
    assert_eq!(report.outfile, dir.path().join("dist/index.js"));
    assert!(output.contains(REACT_SOURCE));
    assert!(output.find(REACT_SOURCE).unwrap() < output.find("console.log(React);").unwrap());
}

#[tokio::test]
async fn test_second_build_served_from_disk_cache() {
    let (base, cdn) = start_cdn().await;
    let dir = tempfile::tempdir().unwrap();
    let cache_root = dir.path().join("cache");
    write_entry(dir.path(), "index.js", "import React from 'react';\n");

    for round in 0..2 {
        // A fresh store each round: only the files on disk carry over
        let cache = Arc::new(DiskCache::open(&cache_root).unwrap());
        let options = CompileOptions::new("index.js", dir.path().join("dist"), import_map(&base))
            .with_cwd(dir.path());
        let report = compile(options, cache, Arc::new(HttpFetcher::new().unwrap()))
            .await
            .unwrap();

        if round == 0 {
            assert_eq!((report.fetches, report.cache_hits), (1, 0));
        } else {
            assert_eq!((report.fetches, report.cache_hits), (0, 1));
        }
    }

    assert_eq!(cdn.hits.load(Ordering::SeqCst), 1);
    assert_eq!(DiskCache::open(&cache_root).unwrap().entry_count().unwrap(), 1);
}

#[tokio::test]
async fn test_relative_imports_inside_remote_modules() {
    let (base, _cdn) = start_cdn().await;
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "main.js", "import { util } from 'lib/index.js';\n");

    let options = CompileOptions::new("main.js", dir.path().join("out"), import_map(&base))
        .with_cwd(dir.path());
    let report = compile(options, Arc::new(MemoryCache::new()), Arc::new(HttpFetcher::new().unwrap()))
        .await
        .unwrap();

    let paths: Vec<_> = report.modules.iter().map(|m| m.path.clone()).collect();
    assert_eq!(paths[0], format!("{base}/lib@1/util.js"));
    assert_eq!(paths[1], format!("{base}/lib@1/index.js"));
    assert_eq!(report.fetches, 2);
}

#[tokio::test]
async fn test_jsx_entry_pulls_runtime() {
    let (base, _cdn) = start_cdn().await;
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "app.jsx", "export default () => <h1>hi</h1>;\n");

    let options = CompileOptions::new("app.jsx", dir.path().join("out"), import_map(&base))
        .with_cwd(dir.path());
    let report = compile(options, Arc::new(MemoryCache::new()), Arc::new(HttpFetcher::new().unwrap()))
        .await
        .unwrap();

    assert!(report
        .modules
        .iter()
        .any(|m| m.path == format!("{base}/react@18/jsx-runtime")));
    assert_eq!(report.outfile, dir.path().join("out/app.js"));
}

#[tokio::test]
async fn test_missing_remote_module_aborts_build() {
    let (base, _cdn) = start_cdn().await;
    let dir = tempfile::tempdir().unwrap();
    write_entry(dir.path(), "index.js", "import 'lib/missing.js';\n");

    let cache = Arc::new(MemoryCache::new());
    let options = CompileOptions::new("index.js", dir.path().join("out"), import_map(&base))
        .with_cwd(dir.path());
    let err = compile(options, cache.clone(), Arc::new(HttpFetcher::new().unwrap()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Bundle(_)));
    assert_eq!(err.code(), "LOAD_FETCH_STATUS");
    assert_eq!(cache.stats().entry_count, 0);
    assert!(!dir.path().join("out/index.js").exists());
}
