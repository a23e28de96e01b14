use crate::core::config::data::{RawServerConfig, ServerConnection, ServersFile};
use std::collections::HashMap;
use tracing::debug;

/// Commands that run as Windows-native executables even from inside WSL;
/// their arguments keep Windows path syntax.
const WINDOWS_NATIVE_COMMANDS: &[&str] = &["node", "cmd", "powershell", "cmd.exe", "powershell.exe"];

/// Turn the declarative server list into spawnable connection parameters.
pub fn translate(file: &ServersFile) -> HashMap<String, ServerConnection> {
    file.mcp_servers
        .iter()
        .map(|(name, raw)| {
            let connection = translate_entry(raw);
            debug!(server = %name, command = %connection.command, "Prepared server connection");
            (name.clone(), connection)
        })
        .collect()
}

fn translate_entry(raw: &RawServerConfig) -> ServerConnection {
    let env = resolve_env(&raw.env);
    let windows_native = WINDOWS_NATIVE_COMMANDS.contains(&raw.command.as_str());
    let args = raw
        .args
        .iter()
        .map(|arg| {
            if !windows_native && (arg.contains('/') || arg.contains('\\')) {
                convert_windows_path(arg)
            } else {
                arg.clone()
            }
        })
        .collect();

    ServerConnection {
        command: raw.command.clone(),
        args,
        env,
        always_allow: raw.always_allow.clone(),
        default_arguments: raw.default_arguments.clone(),
    }
}

/// Resolve environment placeholders: an empty value means "inherit from the
/// process environment". `PATH` is always propagated so spawned servers can
/// find their own interpreters.
fn resolve_env(raw: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = HashMap::new();
    for (key, value) in raw {
        if value.is_empty() {
            if let Ok(inherited) = std::env::var(key) {
                env.insert(key.clone(), inherited);
            }
        } else {
            env.insert(key.clone(), value.clone());
        }
    }

    if let Ok(path) = std::env::var("PATH") {
        env.insert("PATH".to_string(), path);
    }

    env
}

/// Rewrite a Windows-style filesystem path into its WSL equivalent.
pub(crate) fn convert_windows_path(path: &str) -> String {
    let normalized = path.replace('\\', "/");

    if let Some(rest) = normalized.strip_prefix("C:/") {
        return format!("/mnt/c/{rest}");
    }

    if normalized.len() >= 2 && normalized.as_bytes()[1] == b':' {
        let drive = normalized.chars().next().unwrap_or_default();
        return format!(
            "/mnt/{}{}",
            drive.to_ascii_lowercase(),
            &normalized[2..]
        );
    }

    normalized
}
