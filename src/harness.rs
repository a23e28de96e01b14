use crate::core::context::AppContext;
use crate::mcp::bridge;
use futures_util::{stream, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How many servers are discovered concurrently during a refresh.
const REFRESH_CONCURRENCY_LIMIT: usize = 3;

/// The callable surface consumed by the CLI (or any other frontend): server
/// and tool listings come from the cache, invocations go through the
/// resource-bounded invoker, and every result is rendered as short
/// human-readable text. Raw errors never escape this layer.
pub struct ToolHarness {
    context: Arc<AppContext>,
}

impl ToolHarness {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn list_servers(&self) -> Vec<String> {
        self.context.server_names()
    }

    /// Re-discover every configured server and replace the cache wholesale.
    /// Returns the total number of tools found.
    pub async fn refresh(&self) -> usize {
        self.context.cache.clear();

        let targets: Vec<_> = self
            .context
            .connections()
            .iter()
            .map(|(name, connection)| (name.clone(), connection.clone()))
            .collect();
        let discovered: Vec<(String, Vec<(String, String)>)> = stream::iter(targets)
            .map(|(name, connection)| async move {
                let tools = bridge::discover_tools(&name, &connection).await;
                let pairs = tools
                    .iter()
                    .map(|tool| (tool.label(), tool.schema.clone()))
                    .collect();
                (name, pairs)
            })
            .buffer_unordered(REFRESH_CONCURRENCY_LIMIT)
            .collect()
            .await;

        let mut total = 0;
        for (name, pairs) in discovered {
            info!(server = %name, tools = pairs.len(), "Loaded tools");
            total += pairs.len();
            self.context.cache.set(&name, pairs);
        }
        total
    }

    /// `(label, schema)` pairs for one server, served from the cache.
    pub fn list_tools(&self, server: &str) -> Vec<(String, String)> {
        self.context.cache.get(server)
    }

    /// Schema string for a tool label, `"{}"` when the label is unknown.
    pub fn get_schema(&self, server: &str, label: &str) -> String {
        self.context
            .cache
            .get(server)
            .into_iter()
            .find(|(candidate, _)| candidate.as_str() == label)
            .map(|(_, schema)| schema)
            .unwrap_or_else(|| "{}".to_string())
    }

    pub async fn call_tool(&self, server: &str, label: &str, args_json: &str) -> String {
        self.call_tool_with_timeout(server, label, args_json, self.context.call_timeout)
            .await
    }

    pub async fn call_tool_with_timeout(
        &self,
        server: &str,
        label: &str,
        args_json: &str,
        timeout: Duration,
    ) -> String {
        let Some(connection) = self.context.connection(server) else {
            return format!("❌ Error: Unknown server: {server}");
        };

        // The dropdown label is "name - description"; the name is the part
        // before the first separator.
        let tool_name = label.split(" - ").next().unwrap_or(label);

        let parsed: Value = match serde_json::from_str(args_json) {
            Ok(value) => value,
            Err(err) => return format!("❌ Error: Arguments are not valid JSON: {err}"),
        };
        let Value::Object(mut arguments) = parsed else {
            return "❌ Error: Arguments must be a JSON object.".to_string();
        };

        if let Some(defaults) = &connection.default_arguments {
            for (key, value) in defaults {
                arguments
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        if let Some(message) = self.validate_arguments(server, label, &arguments) {
            return format!("❌ Error: {message}");
        }

        let response = bridge::invoke_tool(
            &self.context.invoker,
            &self.context.logger,
            server,
            connection,
            tool_name,
            arguments,
            timeout,
        )
        .await;

        if response.success {
            let pretty = serde_json::to_string_pretty(&response.result.unwrap_or(Value::Null))
                .unwrap_or_else(|_| "null".to_string());
            format!("✅ Success:\n{pretty}")
        } else {
            let entry = serde_json::to_string_pretty(&response.log_entry)
                .unwrap_or_else(|_| "{}".to_string());
            format!(
                "❌ Error: {}\n{entry}",
                response.error.unwrap_or_else(|| "Unknown failure".to_string())
            )
        }
    }

    /// Check the argument object against the tool's cached JSON Schema.
    /// Unknown labels and unparsable schemas skip validation rather than
    /// blocking the call.
    fn validate_arguments(
        &self,
        server: &str,
        label: &str,
        arguments: &Map<String, Value>,
    ) -> Option<String> {
        let schema_text = self.get_schema(server, label);
        let schema: Value = serde_json::from_str(&schema_text).ok()?;
        if !schema.is_object() || schema == serde_json::json!({}) {
            return None;
        }
        let validator = jsonschema::validator_for(&schema).ok()?;
        let instance = Value::Object(arguments.clone());
        match validator.validate(&instance) {
            Ok(()) => None,
            Err(error) => Some(format!("Invalid arguments for {label}: {error}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{load_servers_file, translate};
    use crate::core::context::AppContext;
    use crate::logging::RequestLogger;
    use std::collections::HashMap;

    const INIT_REPLY: &str = r#"{"jsonrpc":"2.0","id":0,"result":{"protocolVersion":"2025-11-25","capabilities":{},"serverInfo":{"name":"stub","version":"0.0.1","icons":[]}}}"#;

    fn scripted_connection(reply: &str) -> crate::core::config::ServerConnection {
        let script = format!(
            "read a; printf '%s\\n' '{INIT_REPLY}'; read b; read c; printf '%s\\n' '{reply}'; cat >/dev/null"
        );
        crate::core::config::ServerConnection {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script],
            env: HashMap::new(),
            always_allow: None,
            default_arguments: None,
        }
    }

    fn harness_with(
        connections: HashMap<String, crate::core::config::ServerConnection>,
    ) -> (tempfile::TempDir, ToolHarness) {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let logger = RequestLogger::new(dir.path()).expect("logger should create");
        let harness = ToolHarness::new(Arc::new(AppContext::new(connections, logger)));
        (dir, harness)
    }

    #[test]
    fn configured_servers_are_listed_by_name() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let config_path = dir.path().join("servers.json");
        std::fs::write(
            &config_path,
            r#"{"mcpServers": {"echo": {"command": "echo", "args": ["hi"], "env": {}}}}"#,
        )
        .expect("config should write");

        let file = load_servers_file(&config_path).expect("config should load");
        let (_logs, harness) = harness_with(translate(&file));

        assert_eq!(harness.list_servers(), vec!["echo".to_string()]);
    }

    #[test]
    fn schema_lookup_matches_labels_exactly() {
        let (_logs, harness) = harness_with(HashMap::new());
        harness.context().cache.set(
            "echo",
            vec![(
                "sum - adds two numbers".to_string(),
                r#"{"type":"object"}"#.to_string(),
            )],
        );

        assert_eq!(
            harness.get_schema("echo", "sum - adds two numbers"),
            r#"{"type":"object"}"#
        );
        assert_eq!(harness.get_schema("echo", "unknown - tool"), "{}");
        assert_eq!(harness.get_schema("other", "sum - adds two numbers"), "{}");
    }

    #[tokio::test]
    async fn calling_on_an_unknown_server_renders_a_failure() {
        let (_logs, harness) = harness_with(HashMap::new());
        let rendered = harness.call_tool("ghost", "sum - adds", "{}").await;
        assert!(rendered.starts_with("❌ Error:"));
    }

    #[tokio::test]
    async fn malformed_argument_json_is_rejected_before_invoking() {
        let mut connections = HashMap::new();
        connections.insert("echo".to_string(), scripted_connection("{}"));
        let (_logs, harness) = harness_with(connections);

        let rendered = harness.call_tool("echo", "sum - adds", "{not json").await;
        assert!(rendered.starts_with("❌ Error:"));
        assert!(harness.context().logger.recent().is_empty());
    }

    #[tokio::test]
    async fn arguments_failing_schema_validation_never_reach_the_server() {
        let mut connections = HashMap::new();
        connections.insert("echo".to_string(), scripted_connection("{}"));
        let (_logs, harness) = harness_with(connections);
        harness.context().cache.set(
            "echo",
            vec![(
                "sum - adds two numbers".to_string(),
                r#"{"type":"object","properties":{"a":{"type":"number"}},"required":["a"]}"#
                    .to_string(),
            )],
        );

        let rendered = harness
            .call_tool("echo", "sum - adds two numbers", r#"{"a": "three"}"#)
            .await;

        assert!(rendered.starts_with("❌ Error: Invalid arguments"));
        assert!(harness.context().logger.recent().is_empty());
    }

    #[tokio::test]
    async fn successful_calls_render_the_result_payload() {
        let reply = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"8"}],"isError":false}}"#;
        let mut connections = HashMap::new();
        connections.insert("echo".to_string(), scripted_connection(reply));
        let (_logs, harness) = harness_with(connections);

        let rendered = harness
            .call_tool("echo", "sum - adds two numbers", r#"{"a": 3, "b": 5}"#)
            .await;

        assert!(rendered.starts_with("✅ Success:"), "got: {rendered}");
        assert!(rendered.contains("\"8\""));
    }

    #[tokio::test]
    async fn default_arguments_fill_in_missing_keys() {
        let reply = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"ok"}],"isError":false}}"#;
        let mut connection = scripted_connection(reply);
        let mut defaults = Map::new();
        defaults.insert("a".to_string(), serde_json::json!(1));
        connection.default_arguments = Some(defaults);
        let mut connections = HashMap::new();
        connections.insert("echo".to_string(), connection);
        let (_logs, harness) = harness_with(connections);
        harness.context().cache.set(
            "echo",
            vec![(
                "sum - adds two numbers".to_string(),
                r#"{"type":"object","properties":{"a":{"type":"number"}},"required":["a"]}"#
                    .to_string(),
            )],
        );

        let rendered = harness
            .call_tool("echo", "sum - adds two numbers", "{}")
            .await;

        assert!(rendered.starts_with("✅ Success:"), "got: {rendered}");
        let entry = &harness.context().logger.recent()[0];
        assert_eq!(entry.arguments, serde_json::json!({"a": 1}));
    }
}
