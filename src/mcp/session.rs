use crate::core::config::ServerConnection;
use crate::mcp::error::BridgeError;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    ClientCapabilities, Implementation, InitializeRequestParams, RequestId, RpcError,
    LATEST_PROTOCOL_VERSION,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

const WRITE_TIMEOUT_SECONDS: u64 = 10;
const REQUEST_TIMEOUT_SECONDS: u64 = 60;

/// One handshake-initialized duplex channel to a server subprocess, scoped
/// to a single discovery or invocation.
///
/// The child is spawned with `kill_on_drop`, so teardown is guaranteed on
/// every exit path, including cancellation mid-await.
pub(crate) struct StdioSession {
    child: Child,
    stdin: Mutex<ChildStdin>,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>,
    next_request_id: AtomicI64,
    server_name: String,
}

impl StdioSession {
    pub(crate) async fn spawn(
        server_name: &str,
        connection: &ServerConnection,
    ) -> Result<Self, BridgeError> {
        debug!(server = %server_name, command = %connection.command, args = ?connection.args, "Starting stdio server");
        let mut cmd = Command::new(&connection.command);
        cmd.args(&connection.args)
            .envs(&connection.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(BridgeError::Spawn)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::Transport("Unable to retrieve stdin.".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::Transport("Unable to retrieve stdout.".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::Transport("Unable to retrieve stderr.".to_string()))?;

        let pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        Self::spawn_stdout_reader(pending.clone(), stdout, server_name.to_string());
        Self::spawn_stderr_drain(stderr);

        Ok(Self {
            child,
            stdin: Mutex::new(stdin),
            pending,
            next_request_id: AtomicI64::new(0),
            server_name: server_name.to_string(),
        })
    }

    fn spawn_stdout_reader(
        pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>,
        stdout: tokio::process::ChildStdout,
        server_name: String,
    ) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let message = match serde_json::from_str::<ServerMessage>(&line) {
                    Ok(message) => message,
                    Err(_) => continue,
                };
                Self::dispatch_message(&pending, message, &server_name).await;
            }
            // Stream closed: fail any request still waiting for an answer.
            pending.lock().await.clear();
        });
    }

    fn spawn_stderr_drain(stderr: tokio::process::ChildStderr) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(_)) = reader.next_line().await {}
        });
    }

    async fn dispatch_message(
        pending: &Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>,
        message: ServerMessage,
        server_name: &str,
    ) {
        match &message {
            ServerMessage::Response(response) => {
                debug!(server = %server_name, response_id = ?response.id, "Received stdio response");
                if let Some(tx) = pending.lock().await.remove(&response.id) {
                    let _ = tx.send(message);
                }
            }
            ServerMessage::Error(error) => {
                debug!(
                    server = %server_name,
                    error_id = ?error.id,
                    error_code = error.error.code,
                    "Received stdio error"
                );
                if let Some(id) = error.id.as_ref() {
                    if let Some(tx) = pending.lock().await.remove(id) {
                        let _ = tx.send(message);
                    }
                }
            }
            ServerMessage::Request(request) => {
                // The harness never serves server-initiated requests.
                debug!(server = %server_name, method = %request.method(), "Ignoring server-initiated request");
            }
            ServerMessage::Notification(_) => {
                debug!(server = %server_name, "Received stdio notification");
            }
        }
    }

    /// Perform the initialize handshake and acknowledge it.
    pub(crate) async fn initialize(&self) -> Result<Value, BridgeError> {
        let result = self
            .request(RequestFromClient::InitializeRequest(client_details()))
            .await
            .map_err(|err| match err {
                timeout @ BridgeError::Timeout(_) => timeout,
                other => BridgeError::Handshake(other.to_string()),
            })?;
        if !result.is_object() {
            return Err(BridgeError::Handshake(
                "Initialize result was not an object.".to_string(),
            ));
        }
        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await
            .map_err(|err| BridgeError::Handshake(err.to_string()))?;
        Ok(result)
    }

    /// Send one request and await the matching response, returning the raw
    /// result value.
    pub(crate) async fn request(&self, request: RequestFromClient) -> Result<Value, BridgeError> {
        let request_id = self.next_request_id();
        debug!(server = %self.server_name, request_id = ?request_id, "Sending stdio request");
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| BridgeError::Protocol(err.to_string()))?;
        let payload = serde_json::to_string(&message)
            .map_err(|err| BridgeError::Protocol(err.to_string()))?;

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(request_id.clone(), tx);
        }

        if let Err(err) = self.write_line(&payload).await {
            self.pending.lock().await.remove(&request_id);
            return Err(err);
        }

        let timeout = tokio::time::Duration::from_secs(REQUEST_TIMEOUT_SECONDS);
        let message = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => message,
            Ok(Err(_)) => {
                return Err(BridgeError::Transport(
                    "Session closed before a response arrived.".to_string(),
                ));
            }
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                return Err(BridgeError::Timeout(format!(
                    "Request timed out after {REQUEST_TIMEOUT_SECONDS}s."
                )));
            }
        };

        match message {
            ServerMessage::Response(response) => serde_json::to_value(&response.result)
                .map_err(|err| BridgeError::Protocol(err.to_string())),
            ServerMessage::Error(error) => Err(BridgeError::Rpc {
                code: error.error.code,
                message: rpc_message(&error.error),
            }),
            other => Err(BridgeError::Protocol(format!(
                "Unexpected server message: {other:?}"
            ))),
        }
    }

    async fn send_notification(
        &self,
        notification: NotificationFromClient,
    ) -> Result<(), BridgeError> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| BridgeError::Protocol(err.to_string()))?;
        let payload = serde_json::to_string(&message)
            .map_err(|err| BridgeError::Protocol(err.to_string()))?;
        self.write_line(&payload).await
    }

    async fn write_line(&self, payload: &str) -> Result<(), BridgeError> {
        let write_timeout = tokio::time::Duration::from_secs(WRITE_TIMEOUT_SECONDS);
        let mut stdin = self.stdin.lock().await;
        debug!(server = %self.server_name, bytes = payload.len(), "Writing stdio message");
        tokio::time::timeout(write_timeout, stdin.write_all(payload.as_bytes()))
            .await
            .map_err(|_| BridgeError::Timeout("Timed out writing stdio message.".to_string()))?
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        tokio::time::timeout(write_timeout, stdin.write_all(b"\n"))
            .await
            .map_err(|_| BridgeError::Timeout("Timed out writing stdio newline.".to_string()))?
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        tokio::time::timeout(write_timeout, stdin.flush())
            .await
            .map_err(|_| BridgeError::Timeout("Timed out flushing stdio message.".to_string()))?
            .map_err(|err| BridgeError::Transport(err.to_string()))?;
        Ok(())
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        RequestId::Integer(id)
    }

    /// Tear the session down. Dropping the session has the same effect via
    /// `kill_on_drop`; closing explicitly keeps teardown visible at the end
    /// of each scoped use.
    pub(crate) fn close(mut self) {
        debug!(server = %self.server_name, "Closing stdio session");
        let _ = self.child.start_kill();
    }
}

fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "passerelle".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Passerelle MCP Harness".to_string()),
            description: Some("Passerelle tool-server test harness".to_string()),
            icons: Vec::new(),
            website_url: Some("https://github.com/permacommons/passerelle".to_string()),
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

fn rpc_message(error: &RpcError) -> String {
    let mut output = error.message.clone();
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()));
        if let Some(details) = details {
            if !details.is_empty() {
                output.push_str(": ");
                output.push_str(&details);
            }
        }
    }
    output
}
