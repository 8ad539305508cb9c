//! `{{param}}` placeholder resolution.
//!
//! Placeholders with no matching argument (or a `null` one) are kept as
//! literal text so a broken definition is visible in the page rather than
//! silently producing an empty selector.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use toolweave_core::Action;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_-]*)\s*\}\}").expect("valid placeholder regex")
});

/// Resolve every placeholder in `input` against `args`.
pub fn resolve_str(input: &str, args: &Map<String, Value>) -> String {
    if !input.contains("{{") {
        return input.to_string();
    }

    PLACEHOLDER
        .replace_all(input, |caps: &Captures<'_>| match args.get(&caps[1]) {
            None | Some(Value::Null) => caps[0].to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        })
        .into_owned()
}

/// Resolve placeholders in every string field of `action`.
pub fn resolve_action(action: &Action, args: &Map<String, Value>) -> Action {
    action.map_strings(&|s| resolve_str(s, args))
}

/// Names referenced by placeholders in `input`, in order of appearance.
pub fn placeholders(input: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(input)
        .map(|caps| caps[1].to_string())
        .collect()
}
