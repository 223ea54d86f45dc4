//! Mapping of control channel failures onto the public error taxonomy

use crate::error::Error;
use crate::tor::{ChannelError, ControlEndpoint};
use tracing::debug;

/// A channel could not be opened to `endpoint`
pub fn connect_failure(endpoint: &ControlEndpoint, err: ChannelError) -> Error {
    match err {
        ChannelError::Protocol(msg) => Error::ProtocolError(msg),
        other => {
            debug!("Connecting to {} failed: {}", endpoint, other);
            Error::unreachable(endpoint)
        }
    }
}

/// Authentication on an open channel to `endpoint` failed
pub fn auth_failure(endpoint: &ControlEndpoint, err: ChannelError) -> Error {
    match err {
        ChannelError::MissingPassword => Error::MissingPassword,
        ChannelError::UnreadableCookie { path, .. } => Error::UnreadableCookieFile { path },
        ChannelError::Protocol(msg) => Error::ProtocolError(msg),
        ChannelError::Connect { .. } => Error::unreachable(endpoint),
        other => {
            debug!("Authenticating to {} failed: {}", endpoint, other);
            Error::AuthError {
                endpoint: endpoint.to_string(),
            }
        }
    }
}

/// Tor refused or failed to create an onion service
pub fn service_failure(err: ChannelError) -> Error {
    Error::ProtocolError(format!("creating the onion service failed: {}", err))
}

/// A query on an authenticated channel failed
pub fn query_failure(what: &str, err: ChannelError) -> Error {
    Error::ProtocolError(format!("{}: {}", what, err))
}
