//! Connection strategies
//!
//! Turns a [`ConnectionConfig`] into an authenticated control channel and
//! the SOCKS endpoint that goes with it:
//!
//! - **Bundled**: launch a private Tor, authenticate with its cookie and
//!   wait for bootstrap
//! - **Automatic**: try well-known local control ports and sockets in
//!   order, keeping the first that authenticates
//! - **Manual**: one user-specified endpoint and credential

mod automatic;
mod bundled;
mod manual;

pub use automatic::{
    AutomaticCandidates, AUTOMATIC_SOCKS_PORT, DEFAULT_AUTOMATIC_PORTS, TOR_CONTROL_PORT_ENV,
};
pub use bundled::CONTROL_POLL_INTERVAL;

use crate::bootstrap::{BootstrapPolicy, ProgressSink};
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::platform::Platform;
use crate::process::Supervisor;
use crate::tor::{Connector, ControlChannel, ControlEndpoint, SocksEndpoint};
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// Which step an automatic candidate failed at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Connect,
    Authenticate,
}

/// One failed automatic candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttempt {
    pub endpoint: ControlEndpoint,
    pub stage: AttemptStage,
    pub reason: String,
}

impl fmt::Display for CandidateAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            AttemptStage::Connect => "connect",
            AttemptStage::Authenticate => "authenticate",
        };
        write!(f, "{} ({}): {}", self.endpoint, stage, self.reason)
    }
}

/// An authenticated channel ready for capability probing
pub struct Resolution {
    pub channel: Box<dyn ControlChannel>,
    pub socks: SocksEndpoint,
    /// Automatic candidates that failed before the one that worked
    pub attempts: Vec<CandidateAttempt>,
}

/// Collaborators a strategy may need
pub struct ResolveContext<'a> {
    pub connector: &'a dyn Connector,
    pub supervisor: &'a mut dyn Supervisor,
    pub platform: &'a Platform,
    pub bootstrap: &'a BootstrapPolicy,
    /// How long a bundled Tor's control endpoint may take to appear
    pub control_wait: Duration,
    pub progress: Option<&'a mut ProgressSink>,
    pub cancel: Option<&'a mut watch::Receiver<bool>>,
}

pub async fn resolve(config: &ConnectionConfig, ctx: ResolveContext<'_>) -> Result<Resolution> {
    match config {
        ConnectionConfig::Bundled(bundled) => bundled::resolve(bundled, ctx).await,
        ConnectionConfig::Automatic(candidates) => {
            automatic::resolve(candidates, ctx.connector).await
        }
        ConnectionConfig::Manual(manual) => manual::resolve(manual, ctx.connector).await,
    }
}
