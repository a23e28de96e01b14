use crate::core::config::{self, ServerConnection};
use crate::logging::RequestLogger;
use crate::mcp::cache::ToolCache;
use crate::mcp::invoker::{Invoker, DEFAULT_CALL_TIMEOUT};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Everything the runtime shares, built once at startup and passed by
/// reference. There is deliberately no module-scoped state anywhere in the
/// crate.
pub struct AppContext {
    connections: HashMap<String, ServerConnection>,
    pub cache: ToolCache,
    pub logger: RequestLogger,
    pub invoker: Invoker,
    pub call_timeout: Duration,
}

impl AppContext {
    pub fn new(connections: HashMap<String, ServerConnection>, logger: RequestLogger) -> Self {
        Self {
            connections,
            cache: ToolCache::new(),
            logger,
            invoker: Invoker::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Load the configuration, translate it, and assemble the context.
    pub fn from_files(
        config_path: &Path,
        log_dir: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let file = config::load_servers_file(config_path)?;
        let connections = config::translate(&file);
        let logger = RequestLogger::new(log_dir)?;
        Ok(Self::new(connections, logger))
    }

    pub fn connection(&self, name: &str) -> Option<&ServerConnection> {
        self.connections.get(name)
    }

    pub fn connections(&self) -> &HashMap<String, ServerConnection> {
        &self.connections
    }

    /// Configured server names, sorted for stable presentation.
    pub fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.keys().cloned().collect();
        names.sort();
        names
    }
}
