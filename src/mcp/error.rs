use std::error::Error as StdError;
use std::fmt;

/// Failures raised inside the session bridge and classified for the retry
/// policy. Only transient kinds (process/stream/handshake/timeout) are
/// eligible for retry; tool-reported and malformed-response failures
/// surface immediately.
#[derive(Debug)]
pub enum BridgeError {
    /// The server subprocess could not be spawned.
    Spawn(std::io::Error),

    /// A stream read/write on the session channel failed.
    Transport(String),

    /// The initialize handshake did not complete.
    Handshake(String),

    /// A request, or the whole invocation, ran out of time.
    Timeout(String),

    /// The server answered with a JSON-RPC error.
    Rpc { code: i64, message: String },

    /// The server answered with a shape the bridge does not recognize.
    Protocol(String),
}

impl BridgeError {
    /// Whether the retry policy may re-attempt after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Spawn(_)
                | BridgeError::Transport(_)
                | BridgeError::Handshake(_)
                | BridgeError::Timeout(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BridgeError::Timeout(_))
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Spawn(source) => write!(f, "Failed to spawn server process: {source}"),
            BridgeError::Transport(message) => write!(f, "Session transport failed: {message}"),
            BridgeError::Handshake(message) => write!(f, "Session handshake failed: {message}"),
            BridgeError::Timeout(message) => write!(f, "{message}"),
            BridgeError::Rpc { code, message } => write!(f, "Server error {code}: {message}"),
            BridgeError::Protocol(message) => write!(f, "Unexpected server response: {message}"),
        }
    }
}

impl StdError for BridgeError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BridgeError::Spawn(source) => Some(source),
            _ => None,
        }
    }
}
