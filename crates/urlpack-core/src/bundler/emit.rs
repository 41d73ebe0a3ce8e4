//! Bundle output emission.
//!
//! Concatenates every module in dependency-first order, each behind a
//! `// <namespace>:<path>` marker, and writes the result as one ESM file.

use super::graph::{ModuleGraph, ModuleId};
use super::{codes, BundleError};
use crate::resolve::{Namespace, ResolvedLocation};
use crate::version::VERSION;
use std::path::{Path, PathBuf};

/// Render the bundle text.
#[must_use]
pub fn render_esm(graph: &ModuleGraph, order: &[ModuleId]) -> String {
    let body_len: usize = order
        .iter()
        .filter_map(|&id| graph.get(id))
        .map(|m| m.source.len() + m.location.path.len() + 16)
        .sum();
    let mut output = String::with_capacity(body_len + 64);

    output.push_str("// urlpack bundle\n");
    output.push_str(&format!("// Generated by urlpack v{VERSION}\n"));

    for module in order.iter().filter_map(|&id| graph.get(id)) {
        output.push('\n');
        output.push_str(&format!("// {}\n", module.location));
        output.push_str(&module.source);
        if !module.source.ends_with('\n') {
            output.push('\n');
        }
    }

    output
}

/// Where the bundle for `entry` is written: `<outdir>/<entry-stem>.js`.
#[must_use]
pub fn output_path(outdir: &Path, entry: &ResolvedLocation) -> PathBuf {
    let stem = match entry.namespace {
        Namespace::Local => Path::new(&entry.path)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned()),
        Namespace::Remote => entry
            .path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .and_then(|last| last.split(['?', '#']).next())
            .map(|last| last.split('.').next().unwrap_or(last).to_string()),
    };
    let stem = stem.filter(|s| !s.is_empty()).unwrap_or_else(|| "bundle".to_string());
    outdir.join(format!("{stem}.js"))
}

/// Write the bundle, creating the output directory as needed.
pub async fn write_output(outfile: &Path, code: &str) -> Result<(), BundleError> {
    let write_error = |e: std::io::Error| BundleError {
        code: codes::BUNDLE_WRITE_ERROR,
        message: format!("Failed to write bundle: {e}"),
        path: Some(outfile.display().to_string()),
    };

    if let Some(parent) = outfile.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    tokio::fs::write(outfile, code).await.map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::graph::Module;

    #[test]
    fn test_render_dependency_first() {
        let mut graph = ModuleGraph::new();
        let entry = graph.add(Module::new(
            ResolvedLocation::local(Path::new("/app/index.js")),
            "import React from \"react\";".to_string(),
        ));
        let react = graph.add(Module::new(
            ResolvedLocation::remote("https://esm.sh/react@18/"),
            "export default {};\n".to_string(),
        ));
        graph.set_dependencies(entry, &[ResolvedLocation::remote("https://esm.sh/react@18/")]);

        let code = render_esm(&graph, &graph.toposort());

        let react_at = code.find("// remote:https://esm.sh/react@18/").unwrap();
        let entry_at = code.find("// local:/app/index.js").unwrap();
        assert!(react_at < entry_at);
        assert!(code.contains("export default {};\n"));
        assert!(code.ends_with("import React from \"react\";\n"));
        assert_eq!(graph.toposort(), vec![react, entry]);
    }

    #[test]
    fn test_output_path() {
        let out = Path::new("/out");
        assert_eq!(
            output_path(out, &ResolvedLocation::local(Path::new("/app/src/index.tsx"))),
            PathBuf::from("/out/index.js")
        );
        assert_eq!(
            output_path(out, &ResolvedLocation::remote("https://esm.sh/preact@10/hooks.js?dev")),
            PathBuf::from("/out/hooks.js")
        );
        assert_eq!(
            output_path(out, &ResolvedLocation::remote("https://esm.sh/")),
            PathBuf::from("/out/esm.js")
        );
    }

    #[tokio::test]
    async fn test_write_output_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let outfile = dir.path().join("nested/out/index.js");
        write_output(&outfile, "// bundle\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&outfile).unwrap(), "// bundle\n");
    }
}
