//! User-specified control endpoint

use super::Resolution;
use crate::classify;
use crate::config::ManualConfig;
use crate::error::Result;
use crate::tor::Connector;
use tracing::info;

pub(super) async fn resolve(config: &ManualConfig, connector: &dyn Connector) -> Result<Resolution> {
    let mut channel = connector
        .connect(&config.endpoint)
        .await
        .map_err(|e| classify::connect_failure(&config.endpoint, e))?;

    channel
        .authenticate(&config.auth)
        .await
        .map_err(|e| classify::auth_failure(&config.endpoint, e))?;

    info!("Connected to Tor controller at {}", config.endpoint);

    Ok(Resolution {
        channel,
        socks: config.socks.clone(),
        attempts: Vec::new(),
    })
}
