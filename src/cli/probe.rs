//! Probe command - report what the reachable Tor supports

use super::{load_settings, manager_builder, Cli, ProbeArgs};
use anyhow::{Context, Result};

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Run the probe command
pub async fn run_probe(cli: &Cli, args: &ProbeArgs) -> Result<()> {
    let settings = load_settings(cli)?;

    let mut manager = manager_builder(&settings)?
        .connect()
        .await
        .context("Failed to connect to Tor")?;

    let capabilities = manager.capabilities();
    println!("Tor version:        {}", manager.tor_version());
    println!(
        "Ephemeral services: {}",
        yes_no(capabilities.ephemeral_supported)
    );
    println!(
        "Stealth services:   {}",
        yes_no(capabilities.stealth_supported)
    );
    println!("SOCKS proxy:        {}", manager.socks_endpoint());

    if args.show_attempts && !manager.candidate_attempts().is_empty() {
        println!("Skipped controllers:");
        for attempt in manager.candidate_attempts() {
            println!("  {}", attempt);
        }
    }

    manager.cleanup().await;
    Ok(())
}
