//! The ordered resolution rules.

use super::{codes, ImportContext, Namespace, ReferenceKind, ResolveError, ResolvedLocation};
use crate::import_map::ImportMap;
use crate::paths::normalize_path;
use std::path::Path;
use url::Url;

/// Everything a rule may look at.
pub(super) struct RuleInput<'a> {
    pub specifier: &'a str,
    pub kind: ReferenceKind,
    pub importer: &'a ImportContext,
    pub import_map: &'a ImportMap,
}

/// A (predicate, handler) pair. The first rule whose predicate holds answers.
pub(super) struct Rule {
    pub name: &'static str,
    pub applies: fn(&RuleInput<'_>) -> bool,
    pub resolve: fn(&RuleInput<'_>) -> Result<ResolvedLocation, ResolveError>,
}

/// Rules in precedence order. Unmatched specifiers fall through to [`resolve_local`].
pub(super) static RULES: &[Rule] = &[
    Rule {
        name: "absolute-url",
        applies: is_absolute_url,
        resolve: resolve_absolute_url,
    },
    Rule {
        name: "remote-importer",
        applies: has_remote_importer,
        resolve: resolve_against_importer,
    },
    Rule {
        name: "import-map",
        applies: matches_import_map,
        resolve: resolve_import_map,
    },
];

fn has_prefix_ignore_case(s: &str, prefix: &str) -> bool {
    s.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn is_absolute_url(input: &RuleInput<'_>) -> bool {
    has_prefix_ignore_case(input.specifier, "http://")
        || has_prefix_ignore_case(input.specifier, "https://")
}

fn resolve_absolute_url(input: &RuleInput<'_>) -> Result<ResolvedLocation, ResolveError> {
    Ok(ResolvedLocation::remote(input.specifier))
}

fn has_remote_importer(input: &RuleInput<'_>) -> bool {
    input.importer.namespace == Namespace::Remote
}

fn resolve_against_importer(input: &RuleInput<'_>) -> Result<ResolvedLocation, ResolveError> {
    let base = Url::parse(&input.importer.path).map_err(|e| {
        ResolveError::new(
            codes::RESOLVE_INVALID_IMPORTER_URL,
            input.specifier,
            &input.importer.path,
            format!("importer is not a valid URL: {e}"),
        )
    })?;

    let joined = base.join(input.specifier).map_err(|e| {
        ResolveError::new(
            codes::RESOLVE_INVALID_RELATIVE,
            input.specifier,
            &input.importer.path,
            format!("cannot join onto importer URL: {e}"),
        )
    })?;

    Ok(ResolvedLocation::remote(joined.to_string()))
}

/// Split a specifier at its first `/`: `react/jsx-runtime` → (`react`, `jsx-runtime`).
fn split_first_segment(specifier: &str) -> (&str, &str) {
    specifier.split_once('/').unwrap_or((specifier, ""))
}

fn matches_import_map(input: &RuleInput<'_>) -> bool {
    input.kind == ReferenceKind::ImportStatement
        && input
            .import_map
            .contains(split_first_segment(input.specifier).0)
}

fn resolve_import_map(input: &RuleInput<'_>) -> Result<ResolvedLocation, ResolveError> {
    let (package, rest) = split_first_segment(input.specifier);
    let base = input.import_map.get(package).unwrap_or_default();
    // The separator is always present, even when `rest` is empty
    Ok(ResolvedLocation::remote(format!("{base}/{rest}")))
}

/// Fallback: the specifier as a path under the importer's resolution directory.
pub(super) fn resolve_local(input: &RuleInput<'_>) -> ResolvedLocation {
    let joined = input.importer.resolve_dir.join(Path::new(input.specifier));
    ResolvedLocation::local(&normalize_path(&joined))
}
