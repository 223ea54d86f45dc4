//! Automatic discovery of a local Tor controller

use super::{AttemptStage, CandidateAttempt, Resolution};
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::tor::{AuthMethod, Connector, ControlEndpoint, SocksEndpoint};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Overrides the guessed control ports with a single one
pub const TOR_CONTROL_PORT_ENV: &str = "TOR_CONTROL_PORT";

/// Tor Browser, Tor Messenger, system tor
pub const DEFAULT_AUTOMATIC_PORTS: [u16; 3] = [9151, 9153, 9051];

/// Tor Browser's SOCKS port
pub const AUTOMATIC_SOCKS_PORT: u16 = 9150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutomaticCandidates {
    /// Valid `TOR_CONTROL_PORT` value, replacing `ports` when set
    pub env_override: Option<u16>,
    pub ports: Vec<u16>,
    pub socket_paths: Vec<PathBuf>,
    pub socks: SocksEndpoint,
}

impl AutomaticCandidates {
    pub fn discover(platform: &Platform) -> Self {
        Self::with_env_override(
            platform,
            std::env::var(TOR_CONTROL_PORT_ENV).ok().as_deref(),
        )
    }

    /// Candidates for `platform` given a raw `TOR_CONTROL_PORT` value
    pub fn with_env_override(platform: &Platform, env_value: Option<&str>) -> Self {
        let env_override = env_value.and_then(|raw| match raw.trim().parse::<u16>() {
            Ok(port) if port != 0 => Some(port),
            _ => {
                warn!(
                    "Ignoring invalid {} value {:?}",
                    TOR_CONTROL_PORT_ENV, raw
                );
                None
            }
        });

        Self {
            env_override,
            ports: DEFAULT_AUTOMATIC_PORTS.to_vec(),
            socket_paths: platform.automatic_socket_paths.clone(),
            socks: SocksEndpoint::localhost(AUTOMATIC_SOCKS_PORT),
        }
    }

    /// Endpoints to try, in order
    pub fn endpoints(&self) -> Vec<ControlEndpoint> {
        let ports = match self.env_override {
            Some(port) => vec![port],
            None => self.ports.clone(),
        };

        ports
            .into_iter()
            .map(ControlEndpoint::localhost)
            .chain(self.socket_paths.iter().map(ControlEndpoint::socket))
            .collect()
    }
}

pub(super) async fn resolve(
    candidates: &AutomaticCandidates,
    connector: &dyn Connector,
) -> Result<Resolution> {
    let mut attempts = Vec::new();

    for endpoint in candidates.endpoints() {
        debug!("Trying Tor controller at {}", endpoint);

        let mut channel = match connector.connect(&endpoint).await {
            Ok(channel) => channel,
            Err(e) => {
                debug!("{}: {}", endpoint, e);
                attempts.push(CandidateAttempt {
                    endpoint,
                    stage: AttemptStage::Connect,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Err(e) = channel.authenticate(&AuthMethod::None).await {
            debug!("{}: {}", endpoint, e);
            attempts.push(CandidateAttempt {
                endpoint,
                stage: AttemptStage::Authenticate,
                reason: e.to_string(),
            });
            continue;
        }

        info!("Connected to Tor controller at {}", endpoint);
        return Ok(Resolution {
            channel,
            socks: candidates.socks.clone(),
            attempts,
        });
    }

    warn!(
        "No Tor controller found automatically ({} candidates)",
        attempts.len()
    );
    Err(Error::Automatic { attempts })
}
