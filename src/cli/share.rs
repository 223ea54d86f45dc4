//! Share command - publish a local port until interrupted

use super::{load_settings, manager_builder, Cli, ShareArgs};
use anyhow::{bail, Context, Result};
use std::future::Future;
use tokio::sync::watch;
use tracing::{info, warn};

/// Run the share command
pub async fn run_share(cli: &Cli, args: &ShareArgs) -> Result<()> {
    let settings = load_settings(cli)?;

    // One Ctrl-C listener for the whole run; it aborts the bootstrap, the
    // publication wait, or the share itself.
    let (interrupt_tx, mut interrupted) = watch::channel(false);
    let listener = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = interrupt_tx.send(true);
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let mut manager = manager_builder(&settings)?
        .stealth(args.stealth)
        .cancel_on(interrupted.clone())
        .connect()
        .await
        .context("Failed to connect to Tor")?;

    let started = interruptible(manager.start(args.port), &mut interrupted).await;
    let onion_host = match started {
        Some(Ok(host)) => host,
        Some(Err(e)) => {
            manager.cleanup().await;
            return Err(e).context("Failed to start the onion service");
        }
        None => {
            info!("Interrupted while publishing");
            manager.cleanup().await;
            return Ok(());
        }
    };

    println!("Sharing 127.0.0.1:{} at http://{}", args.port, onion_host);
    if let Some(auth) = manager.auth_string() {
        println!("Clients need this line in their torrc:");
        println!("  {}", auth);
    }
    println!("Press Ctrl-C to stop");

    let stopped = interrupted.wait_for(|stop| *stop).await.is_ok();
    listener.abort();

    info!("Shutting down");
    manager.cleanup().await;

    if !stopped {
        bail!("Failed to listen for Ctrl-C");
    }
    Ok(())
}

/// Drive `work` to completion unless `interrupted` flips to true first
async fn interruptible<F: Future>(
    work: F,
    interrupted: &mut watch::Receiver<bool>,
) -> Option<F::Output> {
    tokio::select! {
        output = work => Some(output),
        Ok(_) = interrupted.wait_for(|stop| *stop) => None,
    }
}
