//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MCP server for playing Kakomimasu matches from a tool-calling client
///
/// Serves the streamable HTTP transport on `/mcp` and relays tool calls to
/// the Kakomimasu match API.
#[derive(Parser, Debug)]
#[command(name = "kakomcp")]
#[command(author, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// The command to execute (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the MCP HTTP server
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print the effective configuration as TOML
    Config,
}

impl Commands {
    pub fn serve_default() -> Self {
        Commands::Serve {
            host: None,
            port: None,
        }
    }
}
