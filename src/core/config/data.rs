use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// On-disk shape of `servers.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServersFile {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: HashMap<String, RawServerConfig>,
}

/// One declarative server entry, exactly as written by the user.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RawServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(rename = "alwaysAllow", default, skip_serializing_if = "Option::is_none")]
    pub always_allow: Option<Vec<String>>,
    #[serde(
        rename = "defaultArguments",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_arguments: Option<Map<String, Value>>,
}

/// Connection parameters ready to spawn a server subprocess.
///
/// Produced by [`crate::core::config::translate`]; environment placeholders
/// are resolved and argument paths rewritten, so consumers never see the raw
/// configuration format.
#[derive(Debug, Clone)]
pub struct ServerConnection {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub always_allow: Option<Vec<String>>,
    pub default_arguments: Option<Map<String, Value>>,
}
