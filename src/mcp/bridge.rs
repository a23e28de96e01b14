use crate::core::config::ServerConnection;
use crate::logging::RequestLogger;
use crate::mcp::adapter::{probe_call_result, probe_tool_entry, CallOutcome, RawToolEntry};
use crate::mcp::error::BridgeError;
use crate::mcp::invoker::Invoker;
use crate::mcp::model::{Tool, ToolResponse};
use crate::mcp::session::StdioSession;
use rust_mcp_schema::schema_utils::RequestFromClient;
use rust_mcp_schema::CallToolRequestParams;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{error, warn};

async fn open_session(
    server_name: &str,
    connection: &ServerConnection,
) -> Result<StdioSession, BridgeError> {
    let session = StdioSession::spawn(server_name, connection).await?;
    session.initialize().await?;
    Ok(session)
}

/// One scoped `tools/list` round trip, returning the raw entries.
async fn list_tools_once(
    server_name: &str,
    connection: &ServerConnection,
) -> Result<Vec<Value>, BridgeError> {
    let session = open_session(server_name, connection).await?;
    let result = session.request(RequestFromClient::ListToolsRequest(None)).await;
    session.close();
    let result = result?;

    result
        .get("tools")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| BridgeError::Protocol("Tool listing had no tools array.".to_string()))
}

/// One scoped `tools/call` round trip, returning the raw result value.
async fn call_tool_once(
    server_name: &str,
    connection: &ServerConnection,
    tool_name: &str,
    arguments: Map<String, Value>,
) -> Result<Value, BridgeError> {
    let session = open_session(server_name, connection).await?;
    let mut params = CallToolRequestParams::new(tool_name);
    if !arguments.is_empty() {
        params = params.with_arguments(arguments);
    }
    let result = session
        .request(RequestFromClient::CallToolRequest(params))
        .await;
    session.close();
    result
}

/// List the tools a server advertises.
///
/// Total: any failure is logged and yields an empty list; entries missing
/// required attributes are skipped individually rather than aborting the
/// whole discovery.
pub async fn discover_tools(server_name: &str, connection: &ServerConnection) -> Vec<Tool> {
    let raw = match list_tools_once(server_name, connection).await {
        Ok(raw) => raw,
        Err(err) => {
            error!(server = %server_name, error = %err, "Tool discovery failed");
            return Vec::new();
        }
    };

    let mut tools = Vec::with_capacity(raw.len());
    for entry in &raw {
        match probe_tool_entry(entry) {
            RawToolEntry::Complete {
                name,
                description,
                schema,
            } => {
                let schema = serde_json::to_string_pretty(&schema)
                    .unwrap_or_else(|_| "{}".to_string());
                tools.push(Tool {
                    name,
                    description,
                    schema,
                });
            }
            RawToolEntry::Incomplete(raw_entry) => {
                warn!(server = %server_name, entry = %raw_entry, "Skipping tool entry with missing attributes");
            }
        }
    }
    tools
}

/// Invoke one tool through the resource-bounded invoker.
///
/// Total: every outcome, including timeouts and spawn failures, comes back
/// as a [`ToolResponse`] carrying the logger's entry for this exact call.
pub async fn invoke_tool(
    invoker: &Invoker,
    logger: &RequestLogger,
    server_name: &str,
    connection: &ServerConnection,
    tool_name: &str,
    arguments: Map<String, Value>,
    timeout: Duration,
) -> ToolResponse {
    let args_value = Value::Object(arguments.clone());
    let op_server = server_name.to_string();
    let op_connection = connection.clone();
    let op_tool = tool_name.to_string();
    let raw = invoker
        .run(timeout, move || {
            let server = op_server.clone();
            let connection = op_connection.clone();
            let tool = op_tool.clone();
            let arguments = arguments.clone();
            async move { call_tool_once(&server, &connection, &tool, arguments).await }
        })
        .await;

    match raw {
        Ok(value) => match probe_call_result(&value) {
            CallOutcome::Failure(message) => {
                let log_entry = logger.record(
                    server_name,
                    tool_name,
                    args_value,
                    json!({ "error": message.clone() }),
                    true,
                );
                ToolResponse::failed(message, log_entry)
            }
            outcome => {
                let payload = outcome.into_payload();
                let log_entry =
                    logger.record(server_name, tool_name, args_value, payload.clone(), false);
                ToolResponse::succeeded(payload, log_entry)
            }
        },
        Err(err) => {
            let message = err.to_string();
            let log_entry = logger.record(
                server_name,
                tool_name,
                args_value,
                json!({ "error": message.clone() }),
                true,
            );
            ToolResponse::failed(message, log_entry)
        }
    }
}
