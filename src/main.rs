//! onionport - publish a local port as a Tor onion service
//!
//! Reaches Tor one of three ways (a private bundled Tor, automatic
//! discovery of a running Tor Browser or system tor, or an explicit
//! control port/socket), checks what it supports, and publishes an
//! ephemeral onion service that disappears again on exit.
//!
//! # Usage
//!
//! ```bash
//! # Share a local web server through a private Tor
//! onionport share --port 8080
//!
//! # Use a running Tor Browser instead, with client authorization
//! onionport --connection-type automatic share --port 8080 --stealth
//!
//! # See what the configured Tor supports
//! onionport probe
//! ```

use anyhow::Result;
use clap::Parser;
use onionport::cli::{self, Cli, Commands};
use onionport::logging;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    logging::init_with_level(log_level);

    info!("onionport v{} starting", onionport::VERSION);

    match &cli.command {
        Commands::Share(args) => {
            cli::run_share(&cli, args).await?;
        },
        Commands::Probe(args) => {
            cli::run_probe(&cli, args).await?;
        },
    }

    Ok(())
}
