//! Settings validation
//!
//! Fail-fast validation of settings invariants. Unknown connection and
//! auth types are left to [`Settings::connection_config`], which reports
//! them as typed errors.

use super::Settings;
use anyhow::{bail, Result};

/// Validate settings invariants
pub fn validate(settings: &Settings) -> Result<()> {
    validate_connection(settings)?;
    validate_socks(settings)?;
    validate_timeouts(settings)?;
    Ok(())
}

fn validate_connection(settings: &Settings) -> Result<()> {
    match settings.connection_type.as_str() {
        "control_port" => {
            if settings.control_port_address.is_empty() {
                bail!("control_port_address cannot be empty");
            }
            if settings.control_port_port == 0 {
                bail!("control_port_port cannot be 0");
            }
        },
        "socket_file" => {
            if settings.socket_file_path.as_os_str().is_empty() {
                bail!("socket_file_path cannot be empty");
            }
        },
        _ => {},
    }
    Ok(())
}

fn validate_socks(settings: &Settings) -> Result<()> {
    let manual = matches!(
        settings.connection_type.as_str(),
        "control_port" | "socket_file"
    );
    if manual && settings.socks_port == 0 {
        bail!("socks_port cannot be 0");
    }
    Ok(())
}

fn validate_timeouts(settings: &Settings) -> Result<()> {
    let timeouts = &settings.timeouts;
    if timeouts.command_secs == 0 {
        bail!("timeouts.command_secs must be greater than 0");
    }
    if timeouts.publication_secs < timeouts.command_secs {
        bail!(
            "timeouts.publication_secs ({}) should be >= timeouts.command_secs ({})",
            timeouts.publication_secs,
            timeouts.command_secs
        );
    }
    if timeouts.control_wait_secs == 0 {
        bail!("timeouts.control_wait_secs must be greater than 0");
    }
    Ok(())
}
