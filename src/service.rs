//! Onion service lifecycle
//!
//! [`OnionManager`] owns the authenticated control channel, the optional
//! bundled Tor, the probed capabilities and at most one active onion
//! service. Build one with [`OnionManager::builder`].

use crate::bootstrap::{BootstrapPolicy, BootstrapState, ProgressSink};
use crate::capability::{self, CapabilitySet, STEALTH_CLIENT_NAME};
use crate::classify;
use crate::config::ConnectionConfig;
use crate::error::{Error, Feature, Result};
use crate::platform::Platform;
use crate::process::{Supervisor, TorSupervisor};
use crate::strategy::{self, CandidateAttempt, ResolveContext};
use crate::tor::{
    ChannelTimeouts, Connector, ControlChannel, EphemeralServiceRequest, PortMap, SocksEndpoint,
    TorConnector,
};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

/// Virtual port every service is published on
pub const VIRTUAL_PORT: u16 = 80;

pub const DEFAULT_CONTROL_WAIT: Duration = Duration::from_secs(10);

/// The published onion service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionServiceRecord {
    pub service_id: String,
    /// `<service_id>.onion`
    pub onion_host: String,
    pub target_port: u16,
    pub stealth: bool,
    /// Client cookie for stealth services
    pub auth_cookie: Option<String>,
}

impl OnionServiceRecord {
    /// `HidServAuth <host> <cookie>` line for a Tor client's torrc
    pub fn auth_string(&self) -> Option<String> {
        self.auth_cookie
            .as_ref()
            .map(|cookie| format!("HidServAuth {} {}", self.onion_host, cookie))
    }
}

pub struct ManagerBuilder {
    config: ConnectionConfig,
    stealth: bool,
    platform: Platform,
    connector: Option<Box<dyn Connector>>,
    supervisor: Option<Box<dyn Supervisor>>,
    bootstrap: BootstrapPolicy,
    timeouts: ChannelTimeouts,
    control_wait: Duration,
    progress: Option<ProgressSink>,
    cancel: Option<watch::Receiver<bool>>,
}

impl ManagerBuilder {
    /// Request client-authorized services
    pub fn stealth(mut self, stealth: bool) -> Self {
        self.stealth = stealth;
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replace the real control port connector
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Box::new(connector));
        self
    }

    /// Replace the real Tor process supervisor
    pub fn supervisor(mut self, supervisor: impl Supervisor + 'static) -> Self {
        self.supervisor = Some(Box::new(supervisor));
        self
    }

    pub fn bootstrap_policy(mut self, policy: BootstrapPolicy) -> Self {
        self.bootstrap = policy;
        self
    }

    /// Timeouts for the default connector
    pub fn timeouts(mut self, timeouts: ChannelTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn control_wait(mut self, wait: Duration) -> Self {
        self.control_wait = wait;
        self
    }

    /// Called with every bootstrap status while a bundled Tor starts
    pub fn on_progress(mut self, sink: impl FnMut(&BootstrapState) + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Abort bundled bootstrap once `cancel` becomes true
    pub fn cancel_on(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Connect, authenticate and probe capabilities
    pub async fn connect(self) -> Result<OnionManager> {
        let ManagerBuilder {
            config,
            stealth,
            platform,
            connector,
            supervisor,
            bootstrap,
            timeouts,
            control_wait,
            mut progress,
            mut cancel,
        } = self;

        let connector = connector.unwrap_or_else(|| Box::new(TorConnector::new(timeouts)));
        let mut supervisor =
            supervisor.unwrap_or_else(|| Box::new(TorSupervisor::new(platform.clone())));

        let resolution = strategy::resolve(
            &config,
            ResolveContext {
                connector: connector.as_ref(),
                supervisor: supervisor.as_mut(),
                platform: &platform,
                bootstrap: &bootstrap,
                control_wait,
                progress: progress.as_mut(),
                cancel: cancel.as_mut(),
            },
        )
        .await?;

        let mut channel = resolution.channel;
        let tor_version = match channel.get_version().await {
            Ok(version) => version,
            Err(e) => {
                supervisor.terminate().await;
                return Err(classify::query_failure("GETINFO version", e));
            }
        };
        info!("Connected to Tor {}", tor_version);

        let capabilities = capability::probe(channel.as_mut(), tor_version).await;

        Ok(OnionManager {
            channel,
            supervisor,
            capabilities,
            stealth,
            socks: resolution.socks,
            attempts: resolution.attempts,
            service: None,
        })
    }
}

/// Connected Tor plus at most one published onion service.
///
/// Call [`OnionManager::cleanup`] before dropping; a bundled Tor is
/// killed on drop but the service is not removed gracefully.
pub struct OnionManager {
    channel: Box<dyn ControlChannel>,
    supervisor: Box<dyn Supervisor>,
    capabilities: CapabilitySet,
    stealth: bool,
    socks: SocksEndpoint,
    attempts: Vec<CandidateAttempt>,
    service: Option<OnionServiceRecord>,
}

impl OnionManager {
    pub fn builder(config: ConnectionConfig) -> ManagerBuilder {
        ManagerBuilder {
            config,
            stealth: false,
            platform: Platform::current(),
            connector: None,
            supervisor: None,
            bootstrap: BootstrapPolicy::default(),
            timeouts: ChannelTimeouts::default(),
            control_wait: DEFAULT_CONTROL_WAIT,
            progress: None,
            cancel: None,
        }
    }

    /// Connect with default collaborators
    pub async fn connect(config: ConnectionConfig, stealth: bool) -> Result<Self> {
        Self::builder(config).stealth(stealth).connect().await
    }

    /// Publish `local_port` as an onion service on port 80.
    ///
    /// Returns the `.onion` host once Tor has uploaded the descriptor.
    pub async fn start(&mut self, local_port: u16) -> Result<String> {
        if let Some(active) = &self.service {
            return Err(Error::ServiceAlreadyRunning {
                onion_host: active.onion_host.clone(),
            });
        }
        if !self.capabilities.ephemeral_supported {
            return Err(self.unsupported(Feature::Ephemeral));
        }
        if self.stealth && !self.capabilities.stealth_supported {
            return Err(self.unsupported(Feature::Stealth));
        }

        info!("Configuring onion service on port {}", local_port);

        let request = EphemeralServiceRequest {
            ports: PortMap::from([(VIRTUAL_PORT, local_port)]),
            basic_auth: self.stealth.then(capability::stealth_auth),
            await_publication: true,
        };
        let service = self
            .channel
            .create_ephemeral_service(&request)
            .await
            .map_err(classify::service_failure)?;

        let auth_cookie = if self.stealth {
            match service.auth_cookie(STEALTH_CLIENT_NAME) {
                Some(cookie) => Some(cookie.to_string()),
                None => {
                    self.remove_quietly(&service.service_id).await;
                    return Err(Error::ProtocolError(
                        "Tor did not return a client cookie for the stealth service".into(),
                    ));
                }
            }
        } else {
            None
        };

        let onion_host = format!("{}.onion", service.service_id);
        info!("Onion service published at {}", onion_host);

        self.service = Some(OnionServiceRecord {
            service_id: service.service_id,
            onion_host: onion_host.clone(),
            target_port: local_port,
            stealth: self.stealth,
            auth_cookie,
        });

        Ok(onion_host)
    }

    /// Remove the active service and stop a bundled Tor. Never fails and
    /// may be called repeatedly.
    pub async fn cleanup(&mut self) {
        if let Some(service) = self.service.take() {
            info!("Removing onion service {}", service.onion_host);
            self.remove_quietly(&service.service_id).await;
        }
        self.supervisor.terminate().await;
    }

    /// SOCKS proxy for reaching the onion network through this Tor
    pub fn socks_endpoint(&self) -> &SocksEndpoint {
        &self.socks
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn tor_version(&self) -> &str {
        &self.capabilities.tor_version
    }

    pub fn stealth(&self) -> bool {
        self.stealth
    }

    pub fn active_service(&self) -> Option<&OnionServiceRecord> {
        self.service.as_ref()
    }

    /// `HidServAuth` line for the active stealth service
    pub fn auth_string(&self) -> Option<String> {
        self.service.as_ref().and_then(OnionServiceRecord::auth_string)
    }

    /// Automatic candidates that failed before the connection was made
    pub fn candidate_attempts(&self) -> &[CandidateAttempt] {
        &self.attempts
    }

    fn unsupported(&self, feature: Feature) -> Error {
        Error::FeatureUnsupported {
            feature,
            tor_version: self.capabilities.tor_version.clone(),
        }
    }

    async fn remove_quietly(&mut self, service_id: &str) {
        if let Err(e) = self.channel.remove_ephemeral_service(service_id).await {
            warn!("Failed to remove onion service {}: {}", service_id, e);
        }
    }
}
