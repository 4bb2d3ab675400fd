//! `kakomcp` - MCP server for Kakomimasu matches
//!
//! Exposes the streamable HTTP transport of the Model Context Protocol and
//! lets tool-calling clients create, join and play matches turn by turn.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Cli, Commands};
use kakomcp_core::config::Config;

mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        let blue = Style::new().blue();
        println!(
            "{} v{} ({})",
            blue.apply_to("kakomcp"),
            env!("CARGO_PKG_VERSION"),
            env!("GIT_HASH")
        );
        return Ok(());
    }

    let mut config = Config::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command.clone().unwrap_or_else(Commands::serve_default) {
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
        Commands::Serve { host, port } => {
            init_tracing();
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let router = kakomcp_core::create_router(&config)
                .await
                .context("Failed to initialize MCP server")?;
            let addr = format!("{}:{}", config.server.host, config.server.port);
            server::serve(&addr, router).await?;
        }
    }

    Ok(())
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`)
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
