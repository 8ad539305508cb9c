//! Validation of automation definitions and invocation arguments.
//!
//! Definitions arrive as untrusted JSON. They are first parsed into the typed
//! model (which rejects unknown actions and malformed fields) and then checked
//! for semantic consistency. Every issue is collected so a caller sees the
//! whole list at once.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{Action, ActionStep, MAIN_LANE, ParameterDef, ToolDefinition};

/// One problem found during validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Location of the problem, e.g. `search/steps/2/selector`.
    pub path: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// A definition or argument set was rejected.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// The JSON could not be parsed into the definition model.
    #[error("Malformed tool definition: {0}")]
    Malformed(String),

    /// The definition parsed but is inconsistent.
    #[error("Invalid tool definition: {}", join_issues(.0))]
    Invalid(Vec<ValidationIssue>),

    /// Invocation arguments do not match the declared parameters.
    #[error("Invalid arguments: {}", join_issues(.0))]
    Arguments(Vec<ValidationIssue>),
}

impl ValidationError {
    /// All collected issues (empty for malformed input).
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Malformed(_) => &[],
            Self::Invalid(issues) | Self::Arguments(issues) => issues,
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

struct Issues {
    items: Vec<ValidationIssue>,
}

impl Issues {
    const fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.items.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    fn require_non_empty(&mut self, path: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(path, "must not be empty");
        }
    }
}

fn is_valid_tool_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse one definition object or an array of definitions from JSON text.
pub fn parse_definitions(json: &str) -> Result<Vec<ToolDefinition>, ValidationError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| ValidationError::Malformed(e.to_string()))?;
    definitions_from_value(value)
}

/// Parse one definition object or an array of definitions from a JSON value.
pub fn definitions_from_value(value: Value) -> Result<Vec<ToolDefinition>, ValidationError> {
    let result = match value {
        Value::Array(_) => serde_json::from_value::<Vec<ToolDefinition>>(value),
        other => serde_json::from_value::<ToolDefinition>(other).map(|def| vec![def]),
    };
    result.map_err(|e| ValidationError::Malformed(e.to_string()))
}

/// Validate a batch of definitions: each one individually, plus name
/// uniqueness across the batch.
pub fn validate_batch(defs: &[ToolDefinition]) -> Result<(), ValidationError> {
    let mut issues = Issues::new();
    let mut seen = HashSet::new();

    for def in defs {
        if !seen.insert(def.name.as_str()) {
            issues.push(&def.name, "duplicate tool name in batch");
        }
        check_definition(def, &mut issues);
    }

    if issues.items.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(issues.items))
    }
}

/// Validate one definition.
pub fn validate_definition(def: &ToolDefinition) -> Result<(), ValidationError> {
    let mut issues = Issues::new();
    check_definition(def, &mut issues);
    if issues.items.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::Invalid(issues.items))
    }
}

fn check_definition(def: &ToolDefinition, issues: &mut Issues) {
    let root = if def.name.is_empty() {
        "<unnamed>"
    } else {
        def.name.as_str()
    };

    if !is_valid_tool_name(&def.name) {
        issues.push(
            format!("{root}/name"),
            "must be non-empty and contain only letters, digits, '_' or '-'",
        );
    }
    issues.require_non_empty(&format!("{root}/description"), &def.description);
    issues.require_non_empty(&format!("{root}/version"), &def.version);

    let mut param_names = HashSet::new();
    for (i, param) in def.parameters.iter().enumerate() {
        let path = format!("{root}/parameters/{i}");
        if !param_names.insert(param.name.as_str()) {
            issues.push(&path, format!("duplicate parameter '{}'", param.name));
        }
        check_parameter(param, &path, issues);
    }

    if def.steps.is_empty() {
        issues.push(format!("{root}/steps"), "at least one step is required");
    }
    check_steps(&def.steps, &format!("{root}/steps"), issues);

    let mut lane_names = HashSet::new();
    for (i, lane) in def.lanes.iter().enumerate() {
        let path = format!("{root}/lanes/{i}");
        issues.require_non_empty(&format!("{path}/name"), &lane.name);
        if lane.name == MAIN_LANE {
            issues.push(&path, format!("lane name '{MAIN_LANE}' is reserved"));
        }
        if !lane_names.insert(lane.name.as_str()) {
            issues.push(&path, format!("duplicate lane '{}'", lane.name));
        }
        if lane.steps.is_empty() {
            issues.push(format!("{path}/steps"), "at least one step is required");
        }
        check_steps(&lane.steps, &format!("{path}/steps"), issues);
    }
}

fn check_parameter(param: &ParameterDef, path: &str, issues: &mut Issues) {
    if !is_valid_tool_name(&param.name) {
        issues.push(
            format!("{path}/name"),
            "must contain only letters, digits, '_' or '-'",
        );
    }
    if param.required && param.default.is_some() {
        issues.push(path, "required parameters cannot declare a default");
    }
    if let Some(default) = &param.default
        && !param.param_type.matches(default)
    {
        issues.push(
            format!("{path}/default"),
            format!("expected {}", param.param_type.schema_type()),
        );
    }
    if let Some(values) = &param.enum_values {
        if values.is_empty() {
            issues.push(format!("{path}/enum"), "must list at least one value");
        }
        for (i, value) in values.iter().enumerate() {
            if !param.param_type.matches(value) {
                issues.push(
                    format!("{path}/enum/{i}"),
                    format!("expected {}", param.param_type.schema_type()),
                );
            }
        }
        if let Some(default) = &param.default
            && !values.contains(default)
        {
            issues.push(format!("{path}/default"), "must be one of the enum values");
        }
    }
}

fn check_steps(steps: &[ActionStep], path: &str, issues: &mut Issues) {
    for (i, step) in steps.iter().enumerate() {
        let path = format!("{path}/{i}");
        match &step.action {
            Action::Navigate { url, .. } => issues.require_non_empty(&format!("{path}/url"), url),
            Action::Click { selector }
            | Action::Type { selector, .. }
            | Action::Select { selector, .. }
            | Action::WaitForSelector { selector, .. } => {
                issues.require_non_empty(&format!("{path}/selector"), selector);
            }
            Action::Scroll { selector, .. } => {
                if let Some(selector) = selector {
                    issues.require_non_empty(&format!("{path}/selector"), selector);
                }
            }
            Action::WaitForUrl { pattern, .. } => {
                issues.require_non_empty(&format!("{path}/pattern"), pattern);
            }
            Action::Wait { .. } | Action::WaitForLoad { .. } => {}
            Action::Extract {
                name,
                selector,
                fields,
                ..
            } => {
                issues.require_non_empty(&format!("{path}/name"), name);
                issues.require_non_empty(&format!("{path}/selector"), selector);
                if fields.is_empty() {
                    issues.push(format!("{path}/fields"), "at least one field is required");
                }
                let mut keys = HashSet::new();
                for (j, field) in fields.iter().enumerate() {
                    issues.require_non_empty(&format!("{path}/fields/{j}/key"), &field.key);
                    if !keys.insert(field.key.as_str()) {
                        issues.push(
                            format!("{path}/fields/{j}"),
                            format!("duplicate key '{}'", field.key),
                        );
                    }
                }
            }
        }
    }
}

/// Check invocation arguments against the declared parameters and fill in
/// defaults.
///
/// Undeclared arguments are passed through untouched so templates may still
/// reference them.
pub fn prepare_arguments(
    def: &ToolDefinition,
    arguments: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut prepared = arguments.clone();
    let mut issues = Issues::new();

    for param in &def.parameters {
        match prepared.get(&param.name) {
            None | Some(Value::Null) => {
                if let Some(default) = &param.default {
                    prepared.insert(param.name.clone(), default.clone());
                } else if param.required {
                    issues.push(&param.name, "is required");
                }
            }
            Some(value) => {
                if !param.param_type.matches(value) {
                    issues.push(
                        &param.name,
                        format!("expected {}, got {value}", param.param_type.schema_type()),
                    );
                } else if let Some(values) = &param.enum_values
                    && !values.contains(value)
                {
                    issues.push(&param.name, format!("{value} is not an allowed value"));
                }
            }
        }
    }

    if issues.items.is_empty() {
        Ok(prepared)
    } else {
        Err(ValidationError::Arguments(issues.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(value: Value) -> ToolDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn valid() -> Value {
        json!({
            "name": "search_products",
            "description": "Search the catalog",
            "version": "1.0.0",
            "parameters": [
                {"name": "query", "type": "string", "required": true},
                {"name": "sort", "type": "string", "enum": ["price", "rating"], "default": "price"}
            ],
            "steps": [
                {"action": "navigate", "url": "https://shop.example/search?q={{query}}"},
                {"action": "extract", "name": "results", "mode": "list", "selector": ".product",
                 "fields": [{"key": "title", "selector": "h2"}, {"key": "price", "selector": ".price", "type": "number"}]}
            ]
        })
    }

    #[test]
    fn test_valid_definition_passes() {
        assert!(validate_definition(&definition(valid())).is_ok());
    }

    #[test]
    fn test_issues_are_collected() {
        let mut value = valid();
        value["name"] = json!("bad name");
        value["steps"][1]["fields"] = json!([]);
        value["parameters"][1]["default"] = json!("newest");

        let err = validate_definition(&definition(value)).unwrap_err();
        let paths: Vec<_> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert!(paths.contains(&"bad name/name"));
        assert!(paths.contains(&"bad name/steps/1/fields"));
        assert!(paths.contains(&"bad name/parameters/1/default"));
    }

    #[test]
    fn test_reserved_and_duplicate_lanes() {
        let mut value = valid();
        value["lanes"] = json!([
            {"name": "main", "steps": [{"action": "wait", "ms": 1}]},
            {"name": "prices", "steps": []},
            {"name": "prices", "steps": [{"action": "wait", "ms": 1}]}
        ]);

        let err = validate_definition(&definition(value)).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("reserved"));
        assert!(text.contains("duplicate lane 'prices'"));
        assert!(text.contains("lanes/1/steps: at least one step is required"));
    }

    #[test]
    fn test_batch_rejects_duplicate_names() {
        let defs = vec![definition(valid()), definition(valid())];
        let err = validate_batch(&defs).unwrap_err();
        assert!(err.to_string().contains("duplicate tool name"));
    }

    #[test]
    fn test_parse_accepts_object_or_array() {
        let single = parse_definitions(&valid().to_string()).unwrap();
        assert_eq!(single.len(), 1);

        let many = parse_definitions(&json!([valid()]).to_string()).unwrap();
        assert_eq!(many.len(), 1);

        let err = parse_definitions(r#"{"name": "x"}"#).unwrap_err();
        assert!(matches!(err, ValidationError::Malformed(_)));
    }

    #[test]
    fn test_prepare_arguments_applies_defaults() {
        let def = definition(valid());
        let mut args = Map::new();
        args.insert("query".to_string(), json!("cats"));

        let prepared = prepare_arguments(&def, &args).unwrap();
        assert_eq!(prepared["query"], "cats");
        assert_eq!(prepared["sort"], "price");
    }

    #[test]
    fn test_prepare_arguments_rejects_bad_input() {
        let def = definition(valid());
        let mut args = Map::new();
        args.insert("sort".to_string(), json!("newest"));

        let err = prepare_arguments(&def, &args).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("query: is required"));
        assert!(text.contains("not an allowed value"));
    }
}
