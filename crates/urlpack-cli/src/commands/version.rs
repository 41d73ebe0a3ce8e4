use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use urlpack_core::version::{version_string, SCHEMA_VERSION};
use urlpack_core::VERSION;

#[derive(Serialize)]
struct VersionJson {
    ok: bool,
    version: &'static str,
    schema_version: u32,
}

pub fn run(json: bool) -> Result<()> {
    if json {
        let out = VersionJson {
            ok: true,
            version: VERSION,
            schema_version: SCHEMA_VERSION,
        };
        println!("{}", serde_json::to_string(&out).into_diagnostic()?);
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
