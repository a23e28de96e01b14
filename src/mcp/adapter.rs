use serde_json::{json, Value};

/// Probed shape of one entry in a `tools/list` response.
///
/// The underlying SDK does not guarantee any of the three required fields,
/// so each entry is probed exactly once here; the rest of the bridge only
/// ever sees the union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawToolEntry {
    Complete {
        name: String,
        description: String,
        schema: Value,
    },
    /// One or more required fields were absent; discovery skips the entry.
    Incomplete(Value),
}

pub fn probe_tool_entry(raw: &Value) -> RawToolEntry {
    let name = raw
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty());
    let description = raw.get("description").and_then(Value::as_str);
    let schema = raw.get("inputSchema");

    match (name, description, schema) {
        (Some(name), Some(description), Some(schema)) => RawToolEntry::Complete {
            name: name.to_string(),
            description: description.to_string(),
            schema: schema.clone(),
        },
        _ => RawToolEntry::Incomplete(raw.clone()),
    }
}

/// Probed shape of a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The result carried `isError: true`; the invocation failed with the
    /// tool-provided message.
    Failure(String),

    /// The result carried a JSON-object payload, kept as-is.
    Payload(Value),

    /// The result carried a bare (non-object) payload; callers receive it
    /// wrapped under a `data` key.
    Bare(Value),

    /// No recognizable payload at all; the raw value is preserved rather
    /// than failing the invocation.
    Unrecognized(Value),
}

impl CallOutcome {
    /// The JSON mapping recorded and returned for a non-failure outcome.
    pub fn into_payload(self) -> Value {
        match self {
            CallOutcome::Failure(message) => json!({ "error": message }),
            CallOutcome::Payload(value) => value,
            CallOutcome::Bare(value) | CallOutcome::Unrecognized(value) => {
                json!({ "data": value })
            }
        }
    }
}

pub fn probe_call_result(raw: &Value) -> CallOutcome {
    let is_error = raw
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if is_error {
        return CallOutcome::Failure(failure_message(raw));
    }

    match raw.get("content") {
        Some(content) if content.is_object() => CallOutcome::Payload(content.clone()),
        Some(content) => CallOutcome::Bare(content.clone()),
        None => CallOutcome::Unrecognized(raw.clone()),
    }
}

/// Pull a human-readable message out of an error-flagged result. Tool
/// servers conventionally report errors as text content blocks.
fn failure_message(raw: &Value) -> String {
    if let Some(blocks) = raw.get("content").and_then(Value::as_array) {
        let text: Vec<&str> = blocks
            .iter()
            .filter_map(|block| block.get("text").and_then(Value::as_str))
            .collect();
        if !text.is_empty() {
            return text.join("\n");
        }
    }
    if let Some(text) = raw.get("content").and_then(Value::as_str) {
        return text.to_string();
    }
    "Tool reported an error".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_entries_are_probed_once() {
        let raw = json!({
            "name": "sum",
            "description": "adds two numbers",
            "inputSchema": {"type": "object"}
        });
        assert_eq!(
            probe_tool_entry(&raw),
            RawToolEntry::Complete {
                name: "sum".to_string(),
                description: "adds two numbers".to_string(),
                schema: json!({"type": "object"}),
            }
        );
    }

    #[test]
    fn entries_missing_description_are_incomplete() {
        let raw = json!({"name": "sum", "inputSchema": {"type": "object"}});
        assert!(matches!(probe_tool_entry(&raw), RawToolEntry::Incomplete(_)));
    }

    #[test]
    fn entries_with_empty_name_are_incomplete() {
        let raw = json!({"name": "", "description": "x", "inputSchema": {}});
        assert!(matches!(probe_tool_entry(&raw), RawToolEntry::Incomplete(_)));
    }

    #[test]
    fn error_flagged_results_carry_the_tool_message() {
        let raw = json!({
            "isError": true,
            "content": [{"type": "text", "text": "division by zero"}]
        });
        assert_eq!(
            probe_call_result(&raw),
            CallOutcome::Failure("division by zero".to_string())
        );
    }

    #[test]
    fn object_content_is_kept_as_is() {
        let raw = json!({"content": {"answer": 42}});
        assert_eq!(
            probe_call_result(&raw).into_payload(),
            json!({"answer": 42})
        );
    }

    #[test]
    fn bare_content_is_wrapped_under_data() {
        let raw = json!({"content": [{"type": "text", "text": "hi"}]});
        assert_eq!(
            probe_call_result(&raw).into_payload(),
            json!({"data": [{"type": "text", "text": "hi"}]})
        );
    }

    #[test]
    fn missing_content_degrades_to_wrapped_raw_value() {
        let raw = json!({"something": "else"});
        let outcome = probe_call_result(&raw);
        assert!(matches!(outcome, CallOutcome::Unrecognized(_)));
        assert_eq!(
            outcome.into_payload(),
            json!({"data": {"something": "else"}})
        );
    }
}
