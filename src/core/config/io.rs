use crate::core::config::data::ServersFile;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Errors that can occur when loading the server configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file does not exist.
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The configuration file exists but could not be read.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON of the expected shape.
    Parse {
        /// Path to the configuration file with invalid contents.
        path: PathBuf,
        /// The JSON deserialization error.
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotFound { path } => {
                write!(f, "Config file not found: {}", path.display())
            }
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::NotFound { .. } => None,
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load and deserialize `servers.json` from `config_path`.
pub fn load_servers_file(config_path: &Path) -> Result<ServersFile, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound {
            path: config_path.to_path_buf(),
        });
    }

    let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    let file: ServersFile =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })?;
    info!(path = %config_path.display(), servers = file.mcp_servers.len(), "Loaded server config");
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_reports_not_found() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("servers.json");

        let err = load_servers_file(&path).expect_err("expected missing-file error");
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn malformed_json_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("servers.json");
        let mut file = fs::File::create(&path).expect("file should create");
        file.write_all(b"{not json").expect("write should succeed");

        let err = load_servers_file(&path).expect_err("expected parse error");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn well_formed_config_loads_entries() {
        let dir = tempfile::tempdir().expect("tempdir should create");
        let path = dir.path().join("servers.json");
        fs::write(
            &path,
            r#"{"mcpServers": {"echo": {"command": "echo", "args": ["hi"], "env": {}}}}"#,
        )
        .expect("write should succeed");

        let file = load_servers_file(&path).expect("config should load");
        let entry = file.mcp_servers.get("echo").expect("echo entry should exist");
        assert_eq!(entry.command, "echo");
        assert_eq!(entry.args, vec!["hi".to_string()]);
        assert!(entry.env.is_empty());
    }
}
