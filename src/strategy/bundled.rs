//! Private, supervised Tor

use super::{Resolution, ResolveContext};
use crate::bootstrap;
use crate::classify;
use crate::config::BundledConfig;
use crate::error::{Error, Result};
use crate::process::LaunchedTor;
use crate::tor::{AuthMethod, ControlChannel, SocksEndpoint};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

/// Delay between attempts to reach a starting Tor's control endpoint
pub const CONTROL_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub(super) async fn resolve(config: &BundledConfig, mut ctx: ResolveContext<'_>) -> Result<Resolution> {
    if !ctx.platform.bundled_supported {
        return Err(Error::BundledTorNotSupported);
    }

    let launched = ctx.supervisor.spawn(config).await?;

    match connect_and_bootstrap(&launched, &mut ctx).await {
        Ok(channel) => Ok(Resolution {
            channel,
            socks: SocksEndpoint::localhost(launched.socks_port),
            attempts: Vec::new(),
        }),
        Err(e) => {
            ctx.supervisor.terminate().await;
            Err(e)
        }
    }
}

async fn connect_and_bootstrap(
    launched: &LaunchedTor,
    ctx: &mut ResolveContext<'_>,
) -> Result<Box<dyn ControlChannel>> {
    let mut channel = wait_for_control(launched, ctx).await?;

    channel
        .authenticate(&AuthMethod::Cookie(Some(launched.cookie_auth_file.clone())))
        .await
        .map_err(|e| classify::auth_failure(&launched.control, e))?;
    info!("Authenticated to bundled Tor at {}", launched.control);

    bootstrap::wait_for_bootstrap(
        channel.as_mut(),
        &mut *ctx.supervisor,
        ctx.bootstrap,
        ctx.progress.as_deref_mut(),
        ctx.cancel.as_deref_mut(),
    )
    .await?;

    Ok(channel)
}

/// Tor needs a moment to open its control endpoint after launch
async fn wait_for_control(
    launched: &LaunchedTor,
    ctx: &mut ResolveContext<'_>,
) -> Result<Box<dyn ControlChannel>> {
    let deadline = Instant::now() + ctx.control_wait;

    loop {
        match ctx.connector.connect(&launched.control).await {
            Ok(channel) => return Ok(channel),
            Err(e) => {
                if !ctx.supervisor.is_running() {
                    return Err(Error::BundledTorStart(
                        "Tor exited before its control endpoint came up".into(),
                    ));
                }
                if Instant::now() >= deadline {
                    return Err(classify::connect_failure(&launched.control, e));
                }
                debug!("Control endpoint {} not ready: {}", launched.control, e);
                sleep(CONTROL_POLL_INTERVAL).await;
            }
        }
    }
}
