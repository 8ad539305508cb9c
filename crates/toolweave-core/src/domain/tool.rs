//! Tool discovery and invocation types.
//!
//! These are shared by network-backed servers and the automation server, so
//! consumers never need to know which backend executed a call.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Tool definition discovered from a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    /// Tool name (unique within its server, not globally).
    pub name: String,

    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema describing accepted arguments.
    pub input_schema: Value,

    /// Id of the server that owns this tool.
    pub server_id: String,
}

impl ToolInfo {
    /// Create a tool with an empty object schema.
    pub fn new(name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: json!({ "type": "object", "properties": {} }),
            server_id: server_id.into(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }
}

/// A request to invoke one tool on one server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Target server id.
    pub server_id: String,

    /// Tool name on that server.
    pub tool_name: String,

    /// Argument object.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call with no arguments.
    pub fn new(server_id: impl Into<String>, tool_name: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            tool_name: tool_name.into(),
            arguments: Map::new(),
        }
    }

    /// Add one argument.
    #[must_use]
    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// Replace the argument object.
    #[must_use]
    pub fn with_arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// Base64 image data.
    Image {
        /// Base64-encoded bytes.
        data: String,
        /// MIME type of the image.
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded resource, kept verbatim.
    Resource {
        /// Resource payload.
        resource: Value,
    },
}

impl ContentItem {
    /// Create a text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Text of this item, if it is a text item.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// Result of a tool call.
///
/// `error` set together with non-empty `content` is legal: partial output is
/// preserved rather than collapsed into the error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// Whether the call succeeded.
    pub success: bool,

    /// Ordered output items.
    #[serde(default)]
    pub content: Vec<ContentItem>,

    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// The call that produced this result, attached by the executor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<ToolCall>,
}

impl ToolResult {
    /// Create a success result.
    pub const fn success(content: Vec<ContentItem>) -> Self {
        Self {
            success: true,
            content,
            error: None,
            call: None,
        }
    }

    /// Create an error result with no content.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Vec::new(),
            error: Some(message.into()),
            call: None,
        }
    }

    /// Create an error result that keeps whatever content was produced.
    pub fn partial(content: Vec<ContentItem>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            content,
            error: Some(message.into()),
            call: None,
        }
    }

    /// Attach the originating call.
    #[must_use]
    pub fn with_call(mut self, call: ToolCall) -> Self {
        self.call = Some(call);
        self
    }

    /// Concatenated text content, newline separated.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_constructors() {
        let ok = ToolResult::success(vec![ContentItem::text("72F")]);
        assert!(ok.success);
        assert!(ok.error.is_none());
        assert_eq!(ok.text(), "72F");

        let failed = ToolResult::error("Connection failed");
        assert!(!failed.success);
        assert!(failed.content.is_empty());
        assert_eq!(failed.error.as_deref(), Some("Connection failed"));
    }

    #[test]
    fn test_partial_result_keeps_content() {
        let partial = ToolResult::partial(vec![ContentItem::text("half")], "timed out");
        assert!(!partial.success);
        assert_eq!(partial.content.len(), 1);
        assert_eq!(partial.error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_content_wire_format() {
        let image = ContentItem::Image {
            data: "aGk=".to_string(),
            mime_type: "image/png".to_string(),
        };
        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["mimeType"], "image/png");

        let item: ContentItem = serde_json::from_str(r#"{"type":"text","text":"hello"}"#).unwrap();
        assert_eq!(item.as_text(), Some("hello"));
    }

    #[test]
    fn test_tool_call_builder() {
        let call = ToolCall::new("search", "web_search").with_argument("query", "cats");
        assert_eq!(call.arguments["query"], "cats");
        let json = serde_json::to_string(&call).unwrap();
        assert!(json.contains("\"toolName\":\"web_search\""));
    }
}
