//! Passerelle is a command-line harness for exercising MCP tool servers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns configuration loading, translation of declarative server
//!   entries into spawnable connection parameters, and the application
//!   context that ties the runtime pieces together.
//! - [`mcp`] speaks the tool-server protocol: scoped stdio sessions, shape
//!   normalization, the resource-bounded invoker, and the per-server tool
//!   cache.
//! - [`logging`] records every tool invocation to paired human-readable and
//!   line-delimited JSON sinks.
//! - [`harness`] exposes the callable surface (`list_servers`, `list_tools`,
//!   `get_schema`, `call_tool`) used by the CLI.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::run`].

pub mod cli;
pub mod core;
pub mod harness;
pub mod logging;
pub mod mcp;
