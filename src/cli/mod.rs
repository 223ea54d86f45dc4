//! Command-line interface for onionport
//!
//! Provides main commands:
//! - `share` - Publish a local port as an onion service until Ctrl-C
//! - `probe` - Connect to Tor and report what it supports

mod probe;
mod share;

pub use probe::run_probe;
pub use share::run_share;

use crate::bootstrap::BootstrapState;
use crate::config::{self, Settings};
use crate::platform::Platform;
use crate::service::{ManagerBuilder, OnionManager};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

/// onionport - Publish local services as Tor onion services
#[derive(Parser, Debug)]
#[command(name = "onionport")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file (defaults to ./settings.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured connection type
    /// (bundled, automatic, control_port, socket_file)
    #[arg(long, global = true)]
    pub connection_type: Option<String>,

    /// Verbose output
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Publish a local port as an onion service
    Share(ShareArgs),

    /// Report Tor version, capabilities and SOCKS endpoint
    Probe(ProbeArgs),
}

/// Arguments for share command
#[derive(Parser, Debug)]
pub struct ShareArgs {
    /// Local port to expose on the onion service's port 80
    #[arg(short, long)]
    pub port: u16,

    /// Require client authorization
    #[arg(long, default_value_t = false)]
    pub stealth: bool,
}

/// Arguments for probe command
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// List every automatic candidate that failed
    #[arg(long, default_value_t = false)]
    pub show_attempts: bool,
}

/// Settings from file with command-line overrides applied
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = config::load_settings(cli.config.as_deref())?;
    if let Some(connection_type) = &cli.connection_type {
        settings.connection_type = connection_type.clone();
    }
    Ok(settings)
}

/// Manager builder for the loaded settings, reporting bootstrap progress on stderr
fn manager_builder(settings: &Settings) -> Result<ManagerBuilder> {
    let platform = Platform::current();
    let connection = settings.connection_config(&platform)?;

    Ok(OnionManager::builder(connection)
        .platform(platform)
        .timeouts(settings.channel_timeouts())
        .control_wait(settings.control_wait())
        .on_progress(print_progress))
}

fn print_progress(state: &BootstrapState) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "\rConnecting to the Tor network: {}\x1b[K", state);
    if state.is_done() {
        let _ = writeln!(stderr);
    }
    let _ = stderr.flush();
}
