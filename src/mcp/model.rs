use crate::logging::LogEntry;
use serde_json::Value;

/// A named, schema-described capability advertised by a tool server.
///
/// Created during discovery and replaced wholesale on re-discovery; never
/// partially updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// Pretty-printed JSON Schema describing the accepted arguments.
    pub schema: String,
}

impl Tool {
    /// Presentation label used by the harness surface and the tool cache.
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.description)
    }
}

/// Outcome of one tool invocation.
///
/// Exactly one of `result`/`error` is populated, matching the `success`
/// flag; `log_entry` is always the logger's record for this exact call.
#[derive(Debug, Clone)]
pub struct ToolResponse {
    pub success: bool,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub log_entry: LogEntry,
}

impl ToolResponse {
    pub(crate) fn succeeded(result: Value, log_entry: LogEntry) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            log_entry,
        }
    }

    pub(crate) fn failed(error: String, log_entry: LogEntry) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error),
            log_entry,
        }
    }
}
