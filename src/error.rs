//! Error types for onionport.
//!
//! Every initialization or service failure surfaces as one [`Error`]
//! variant. [`Error::kind`] collapses the variants into the coarse
//! [`ErrorKind`] taxonomy callers usually branch on.

use crate::strategy::CandidateAttempt;
use crate::tor::ControlEndpoint;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A feature gated on the connected Tor/control-channel pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Ephemeral (ADD_ONION) onion services.
    Ephemeral,
    /// Stealth (client-authorized) ephemeral onion services.
    Stealth,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feature::Ephemeral => write!(f, "ephemeral"),
            Feature::Stealth => write!(f, "stealth"),
        }
    }
}

/// Public error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The settings name an unknown connection or authentication type.
    #[error("invalid Tor connection setting: {0}")]
    InvalidSetting(String),

    /// Bundled Tor was requested on a platform/build that forbids it.
    #[error("using the bundled Tor binary is not supported on this platform or build")]
    BundledTorNotSupported,

    /// The bundled Tor process could not be prepared or launched.
    #[error("failed to start bundled Tor: {0}")]
    BundledTorStart(String),

    /// Bundled Tor did not finish bootstrapping in time.
    #[error("bundled Tor did not finish connecting within {}s", .waited.as_secs())]
    BundledTorTimeout {
        /// Time spent polling before giving up.
        waited: Duration,
    },

    /// Could not reach the control port over TCP.
    #[error("can't connect to the Tor controller at {address}:{port}")]
    SocketPort {
        /// Host that was attempted.
        address: String,
        /// Port that was attempted.
        port: u16,
    },

    /// Could not reach the control socket file.
    #[error("can't connect to the Tor controller using socket file {}", .path.display())]
    SocketFile {
        /// Socket path that was attempted.
        path: PathBuf,
    },

    /// The controller requires a password but none was configured.
    #[error("connected to the Tor controller, but it requires a password")]
    MissingPassword,

    /// The cookie file exists but this user cannot read it.
    #[error("connected to the Tor controller, but the cookie file is not readable by this user")]
    UnreadableCookieFile {
        /// Cookie path, when known.
        path: Option<PathBuf>,
    },

    /// Credentials were supplied but rejected.
    #[error("connected to {endpoint}, but can't authenticate; it may not be a Tor controller")]
    AuthError {
        /// Endpoint the channel was opened against.
        endpoint: String,
    },

    /// No automatic candidate produced an authenticated channel.
    #[error("could not connect to the Tor controller automatically ({} candidates tried)", .attempts.len())]
    Automatic {
        /// Every candidate tried, in order, with its failure.
        attempts: Vec<CandidateAttempt>,
    },

    /// The controller replied in a way that does not match the control protocol.
    #[error("the Tor controller is not behaving like a Tor controller: {0}")]
    ProtocolError(String),

    /// The connected Tor does not support a requested feature.
    #[error("{feature} onion services are not supported by Tor {tor_version}")]
    FeatureUnsupported {
        /// Missing feature.
        feature: Feature,
        /// Version string reported by Tor.
        tor_version: String,
    },

    /// `start` was called while a service is already published.
    #[error("an onion service is already running at {onion_host}")]
    ServiceAlreadyRunning {
        /// Host of the active service.
        onion_host: String,
    },

    /// The caller cancelled initialization.
    #[error("connecting to Tor was cancelled")]
    Cancelled,
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ConfigInvalid,
    BundledUnsupported,
    BundledStartFailed,
    BundledTimeout,
    TransportUnreachable,
    AuthMissingCredential,
    AuthUnreadableCookie,
    AuthFailed,
    AutomaticDiscoveryFailed,
    ProtocolError,
    FeatureUnsupported,
    ServiceAlreadyRunning,
    Cancelled,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSetting(_) => ErrorKind::ConfigInvalid,
            Error::BundledTorNotSupported => ErrorKind::BundledUnsupported,
            Error::BundledTorStart(_) => ErrorKind::BundledStartFailed,
            Error::BundledTorTimeout { .. } => ErrorKind::BundledTimeout,
            Error::SocketPort { .. } | Error::SocketFile { .. } => ErrorKind::TransportUnreachable,
            Error::MissingPassword => ErrorKind::AuthMissingCredential,
            Error::UnreadableCookieFile { .. } => ErrorKind::AuthUnreadableCookie,
            Error::AuthError { .. } => ErrorKind::AuthFailed,
            Error::Automatic { .. } => ErrorKind::AutomaticDiscoveryFailed,
            Error::ProtocolError(_) => ErrorKind::ProtocolError,
            Error::FeatureUnsupported { .. } => ErrorKind::FeatureUnsupported,
            Error::ServiceAlreadyRunning { .. } => ErrorKind::ServiceAlreadyRunning,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Transport error naming the endpoint that could not be reached.
    pub fn unreachable(endpoint: &ControlEndpoint) -> Self {
        match endpoint {
            ControlEndpoint::Tcp { host, port } => Error::SocketPort {
                address: host.clone(),
                port: *port,
            },
            ControlEndpoint::Socket(path) => Error::SocketFile { path: path.clone() },
        }
    }
}

/// Result type alias using onionport's Error.
pub type Result<T> = std::result::Result<T, Error>;
