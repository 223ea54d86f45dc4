//! Capability probe
//!
//! Determines once per connection whether the controller can create
//! ephemeral onion services, and whether it accepts client authorization
//! on them.

use crate::tor::{BasicAuth, ControlChannel, EphemeralServiceRequest, PortMap};
use tracing::{debug, info, warn};

/// First Tor release with usable ephemeral onion services
pub const MIN_EPHEMERAL_VERSION: &str = "0.2.7.1";

/// Client name used for stealth services
pub const STEALTH_CLIENT_NAME: &str = "onionport";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilitySet {
    pub ephemeral_supported: bool,
    pub stealth_supported: bool,
    pub tor_version: String,
}

/// Whether a Tor version string is new enough for ephemeral services.
///
/// Only the leading version token is compared, as a plain string.
pub fn version_supports_ephemeral(tor_version: &str) -> bool {
    let number = tor_version.split_whitespace().next().unwrap_or_default();
    number >= MIN_EPHEMERAL_VERSION
}

/// Client authorization for a stealth service, letting Tor pick the cookie
pub fn stealth_auth() -> BasicAuth {
    BasicAuth::from([(STEALTH_CLIENT_NAME.to_string(), None)])
}

pub async fn probe(channel: &mut dyn ControlChannel, tor_version: String) -> CapabilitySet {
    let exposes_ephemeral = match channel.list_ephemeral_services().await {
        Ok(_) => true,
        Err(e) => {
            debug!("Listing ephemeral services failed: {}", e);
            false
        }
    };
    let ephemeral_supported = exposes_ephemeral && version_supports_ephemeral(&tor_version);

    let stealth_supported = ephemeral_supported && probe_stealth(channel).await;

    info!(
        "Tor {}: ephemeral services {}, stealth {}",
        tor_version,
        if ephemeral_supported { "supported" } else { "unsupported" },
        if stealth_supported { "supported" } else { "unsupported" },
    );

    CapabilitySet {
        ephemeral_supported,
        stealth_supported,
        tor_version,
    }
}

/// Create and immediately remove a throwaway client-authorized service
async fn probe_stealth(channel: &mut dyn ControlChannel) -> bool {
    let request = EphemeralServiceRequest {
        ports: PortMap::from([(1, 1)]),
        basic_auth: Some(stealth_auth()),
        await_publication: false,
    };

    match channel.create_ephemeral_service(&request).await {
        Ok(service) => {
            if let Err(e) = channel.remove_ephemeral_service(&service.service_id).await {
                warn!("Failed to remove stealth probe service: {}", e);
            }
            true
        }
        Err(e) => {
            debug!("Stealth onion services unavailable: {}", e);
            false
        }
    }
}
