//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, assembles the application
//! context, and executes the requested harness command.

use crate::core::context::AppContext;
use crate::harness::ToolHarness;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "passerelle")]
#[command(about = "A command-line harness for exercising MCP tool servers")]
#[command(
    long_about = "Passerelle spawns locally configured MCP tool servers over stdio, lists the \
tools they advertise, and invokes them with JSON arguments.\n\n\
Configuration:\n\
  Servers are declared in a JSON file (default: config/servers.json) with a\n\
  top-level \"mcpServers\" mapping of name -> {command, args, env}. Empty env\n\
  values are resolved from the process environment; PATH is always propagated.\n\n\
Logs:\n\
  Every invocation is recorded to a paired text/JSONL log under the log\n\
  directory. Set RUST_LOG to control diagnostic output on stderr."
)]
pub struct Args {
    /// Path to the server configuration file.
    #[arg(long, default_value = "config/servers.json")]
    pub config: PathBuf,

    /// Directory for the invocation log pair (defaults to the platform data
    /// directory).
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the configured servers
    Servers,
    /// Discover and list the tools a server advertises
    Tools {
        /// Server name from the configuration file
        server: String,
    },
    /// Print the argument schema for one tool
    Schema {
        server: String,
        /// Tool label as printed by `tools` ("name - description")
        label: String,
    },
    /// Invoke a tool and print the outcome
    Call {
        server: String,
        label: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
        /// End-to-end timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);
    let context = Arc::new(AppContext::from_files(&args.config, &log_dir)?);
    let harness = ToolHarness::new(context);

    match args.command {
        Commands::Servers => {
            for name in harness.list_servers() {
                println!("{name}");
            }
        }
        Commands::Tools { server } => {
            harness.refresh().await;
            let tools = harness.list_tools(&server);
            if tools.is_empty() {
                println!("No tools advertised by {server}.");
            }
            for (label, _) in tools {
                println!("{label}");
            }
        }
        Commands::Schema { server, label } => {
            harness.refresh().await;
            println!("{}", harness.get_schema(&server, &label));
        }
        Commands::Call {
            server,
            label,
            args: call_args,
            timeout,
        } => {
            harness.refresh().await;
            let rendered = harness
                .call_tool_with_timeout(&server, &label, &call_args, Duration::from_secs(timeout))
                .await;
            println!("{rendered}");
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("passerelle=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn default_log_dir() -> PathBuf {
    ProjectDirs::from("org", "permacommons", "passerelle")
        .map(|dirs| dirs.data_local_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
