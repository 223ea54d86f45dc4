//! Bootstrap progress monitoring for a bundled Tor
//!
//! Polls `status/bootstrap-phase` until Tor reports `Done`, forwarding
//! every parsed phase to an optional progress sink. Gives up and stops the
//! process after the configured deadline.

pub mod phase;

use crate::classify;
use crate::error::{Error, Result};
use crate::process::Supervisor;
use crate::tor::{ControlChannel, BOOTSTRAP_PHASE_KEY};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);
pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_secs(45);

/// Receives a snapshot after every successful poll
pub type ProgressSink = Box<dyn FnMut(&BootstrapState) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapState {
    pub percent: u8,
    pub summary: String,
    pub elapsed: Duration,
}

impl BootstrapState {
    pub fn is_done(&self) -> bool {
        self.summary == "Done"
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% - {}", self.percent, self.summary)
    }
}

/// Wait for the Tor behind `channel` to finish bootstrapping.
///
/// On timeout or cancellation the supervised process is terminated before
/// the error is returned. A reply that does not parse is logged and
/// polling continues.
pub async fn wait_for_bootstrap(
    channel: &mut dyn ControlChannel,
    supervisor: &mut dyn Supervisor,
    policy: &BootstrapPolicy,
    mut progress: Option<&mut ProgressSink>,
    mut cancel: Option<&mut watch::Receiver<bool>>,
) -> Result<()> {
    let started = Instant::now();

    loop {
        if is_cancelled(&cancel) {
            info!("Bootstrap cancelled");
            supervisor.terminate().await;
            return Err(Error::Cancelled);
        }

        let reply = channel
            .get_info(BOOTSTRAP_PHASE_KEY)
            .await
            .map_err(|e| classify::query_failure(BOOTSTRAP_PHASE_KEY, e))?;

        match phase::parse(&reply) {
            Ok(phase) => {
                let state = BootstrapState {
                    percent: phase.progress,
                    summary: phase.summary,
                    elapsed: started.elapsed(),
                };
                debug!("Bootstrap {}", state);

                if let Some(sink) = progress.as_deref_mut() {
                    sink(&state);
                }

                if state.is_done() {
                    info!("Tor bootstrapped in {:?}", state.elapsed);
                    return Ok(());
                }
            }
            Err(e) => warn!("Ignoring bootstrap status {:?}: {}", reply, e),
        }

        tokio::select! {
            _ = sleep(policy.poll_interval) => {}
            _ = cancelled(&mut cancel) => continue,
        }

        let waited = started.elapsed();
        if waited > policy.timeout {
            warn!("Tor did not bootstrap within {:?}", policy.timeout);
            supervisor.terminate().await;
            return Err(Error::BundledTorTimeout { waited });
        }
    }
}

fn is_cancelled(cancel: &Option<&mut watch::Receiver<bool>>) -> bool {
    cancel.as_ref().is_some_and(|rx| *rx.borrow())
}

/// Resolves once cancellation is requested; never without a receiver
async fn cancelled(cancel: &mut Option<&mut watch::Receiver<bool>>) {
    if let Some(rx) = cancel.as_deref_mut() {
        let closed = rx.wait_for(|requested| *requested).await.is_err();
        if !closed {
            return;
        }
    }
    std::future::pending::<()>().await
}
