//! Declarative browser-automation tool definitions.
//!
//! A [`ToolDefinition`] is the on-disk/on-wire contract for automation tools:
//!
//! ```json
//! {
//!   "name": "search_products",
//!   "description": "Search the catalog",
//!   "version": "1.0.0",
//!   "parameters": [{ "name": "query", "type": "string", "required": true }],
//!   "steps": [
//!     { "action": "navigate", "url": "https://shop.example/search?q={{query}}" },
//!     { "action": "extract", "name": "results", "mode": "list",
//!       "selector": ".product", "fields": [{ "key": "title", "selector": "h2" }] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name of the implicit lane that runs the top-level steps.
pub const MAIN_LANE: &str = "main";

#[allow(clippy::trivially_copy_pass_by_ref)] // serde's skip_serializing_if passes a reference
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Scalar type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// JSON string.
    String,
    /// Any JSON number.
    Number,
    /// JSON number without a fractional part.
    Integer,
    /// JSON boolean.
    Boolean,
}

impl ParamType {
    /// Whether `value` is an instance of this type.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
        }
    }

    /// JSON Schema type keyword.
    pub const fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
        }
    }
}

/// One declared parameter of an automation tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Parameter name, referenced from steps as `{{name}}`.
    pub name: String,

    /// Scalar type.
    #[serde(rename = "type")]
    pub param_type: ParamType,

    /// Description shown to the agent.
    #[serde(default)]
    pub description: String,

    /// Whether callers must supply the parameter.
    #[serde(default)]
    pub required: bool,

    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Value used when the caller omits the parameter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    /// Wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Whether an extraction reads one record or every matching container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// First matching container, produces an object.
    Single,
    /// Every matching container, produces an array of objects.
    #[default]
    List,
}

/// Coercion applied to an extracted field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
}

/// One field of an extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractField {
    /// Key in the produced object.
    pub key: String,

    /// Selector relative to the container; empty selects the container itself.
    #[serde(default)]
    pub selector: String,

    /// Optional value coercion.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueType>,

    /// Read this attribute instead of the text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// The closed set of browser actions.
///
/// Adding a variant here forces every exhaustive match (template mapping,
/// validation, the interpreter) to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    Navigate {
        url: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        query: BTreeMap<String, String>,
    },
    Click {
        selector: String,
    },
    Type {
        selector: String,
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        clear: bool,
    },
    Scroll {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        direction: ScrollDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<u32>,
    },
    Select {
        selector: String,
        value: String,
    },
    Wait {
        ms: u64,
    },
    WaitForSelector {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    WaitForUrl {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    WaitForLoad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Extract {
        name: String,
        #[serde(default)]
        mode: ExtractMode,
        selector: String,
        fields: Vec<ExtractField>,
    },
}

impl Action {
    /// Wire name of the action, used in run logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Click { .. } => "click",
            Self::Type { .. } => "type",
            Self::Scroll { .. } => "scroll",
            Self::Select { .. } => "select",
            Self::Wait { .. } => "wait",
            Self::WaitForSelector { .. } => "waitForSelector",
            Self::WaitForUrl { .. } => "waitForUrl",
            Self::WaitForLoad { .. } => "waitForLoad",
            Self::Extract { .. } => "extract",
        }
    }

    /// Rebuild the action with `f` applied to every user-facing string field
    /// (urls, query values, selectors, text, values, patterns).
    ///
    /// Names and keys are structural and left untouched.
    #[must_use]
    pub fn map_strings(&self, f: &impl Fn(&str) -> String) -> Self {
        match self {
            Self::Navigate { url, query } => Self::Navigate {
                url: f(url),
                query: query.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
            },
            Self::Click { selector } => Self::Click {
                selector: f(selector),
            },
            Self::Type {
                selector,
                text,
                clear,
            } => Self::Type {
                selector: f(selector),
                text: f(text),
                clear: *clear,
            },
            Self::Scroll {
                selector,
                direction,
                amount,
            } => Self::Scroll {
                selector: selector.as_deref().map(f),
                direction: *direction,
                amount: *amount,
            },
            Self::Select { selector, value } => Self::Select {
                selector: f(selector),
                value: f(value),
            },
            Self::Wait { ms } => Self::Wait { ms: *ms },
            Self::WaitForSelector { selector, timeout } => Self::WaitForSelector {
                selector: f(selector),
                timeout: *timeout,
            },
            Self::WaitForUrl { pattern, timeout } => Self::WaitForUrl {
                pattern: f(pattern),
                timeout: *timeout,
            },
            Self::WaitForLoad { timeout } => Self::WaitForLoad { timeout: *timeout },
            Self::Extract {
                name,
                mode,
                selector,
                fields,
            } => Self::Extract {
                name: name.clone(),
                mode: *mode,
                selector: f(selector),
                fields: fields
                    .iter()
                    .map(|field| ExtractField {
                        key: field.key.clone(),
                        selector: f(&field.selector),
                        value_type: field.value_type,
                        attribute: field.attribute.as_deref().map(f),
                    })
                    .collect(),
            },
        }
    }
}

/// One step of an automation: an action plus its failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStep {
    /// Optional label shown in run logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Keep going when this step fails.
    #[serde(default, skip_serializing_if = "is_false")]
    pub continue_on_error: bool,

    /// The action itself.
    #[serde(flatten)]
    pub action: Action,
}

impl ActionStep {
    /// A step that aborts the run on failure.
    pub const fn new(action: Action) -> Self {
        Self {
            label: None,
            continue_on_error: false,
            action,
        }
    }

    /// Set the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub const fn continue_on_error(mut self, keep_going: bool) -> Self {
        self.continue_on_error = keep_going;
        self
    }
}

/// A named sub-sequence that runs in its own browser tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    /// Lane name, also used as the bridge lane id.
    pub name: String,
    /// Steps of this lane.
    pub steps: Vec<ActionStep>,
}

/// A declarative automation tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name, unique within the dynamic registry.
    pub name: String,

    /// Description shown to the agent.
    pub description: String,

    /// Definition version string.
    pub version: String,

    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<ParameterDef>,

    /// Steps of the main lane.
    pub steps: Vec<ActionStep>,

    /// Additional lanes run after the main steps.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lanes: Vec<Lane>,
}

impl ToolDefinition {
    /// JSON Schema for the tool's arguments, derived from `parameters`.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = Map::new();
            schema.insert("type".to_string(), json!(param.param_type.schema_type()));
            if !param.description.is_empty() {
                schema.insert("description".to_string(), json!(param.description));
            }
            if let Some(values) = &param.enum_values {
                schema.insert("enum".to_string(), Value::Array(values.clone()));
            }
            if let Some(default) = &param.default {
                schema.insert("default".to_string(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(schema));

            if param.required {
                required.push(json!(param.name));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Find a declared parameter.
    pub fn parameter(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
