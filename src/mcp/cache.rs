use std::collections::HashMap;
use std::sync::Mutex;

/// Per-server snapshot of discovered tools, stored as `(label, schema)`
/// pairs ready for presentation.
///
/// All operations copy in or out under one blocking lock; nothing performs
/// I/O or awaits while holding it, so the cache is safe to touch from UI
/// callback threads as well as from the async runtime.
#[derive(Default)]
pub struct ToolCache {
    entries: Mutex<HashMap<String, Vec<(String, String)>>>,
}

impl ToolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one server's tool list wholesale.
    pub fn set(&self, server: &str, tools: Vec<(String, String)>) {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.insert(server.to_string(), tools);
    }

    /// Defensive copy of one server's tool list; empty when unknown.
    pub fn get(&self, server: &str) -> Vec<(String, String)> {
        let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.get(server).cloned().unwrap_or_default()
    }

    /// Defensive copy of the entire mapping.
    pub fn snapshot(&self) -> HashMap<String, Vec<(String, String)>> {
        let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.clone()
    }

    /// Drop everything, e.g. when a configuration reload fails and stale
    /// tools must not be served.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
        entries.clear();
    }
}
