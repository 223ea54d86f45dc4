//! Control channel contract
//!
//! The rest of the crate talks to Tor only through [`Connector`] and
//! [`ControlChannel`]. [`super::TorConnector`] is the production
//! implementation; tests substitute scripted ones.

use super::endpoint::{AuthMethod, ControlEndpoint};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Virtual onion port -> local target port
pub type PortMap = BTreeMap<u16, u16>;

/// Client name -> optional pre-shared cookie, for `Flags=BasicAuth`
pub type BasicAuth = BTreeMap<String, Option<String>>;

/// Failure reported by a control channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Transport-level connect failure
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    /// Controller only accepts a password and none was given
    #[error("controller requires a password")]
    MissingPassword,

    /// Cookie file missing or unreadable
    #[error("cookie file is not readable")]
    UnreadableCookie {
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    /// AUTHENTICATE was rejected
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Command answered with a non-250 status
    #[error("controller replied {code}: {message}")]
    Rejected { code: u16, message: String },

    /// Reply did not follow the control protocol
    #[error("malformed controller reply: {0}")]
    Protocol(String),

    /// No reply within the command timeout
    #[error("timed out waiting for the controller")]
    Timeout,

    /// Controller closed the connection
    #[error("control connection closed")]
    Closed,

    /// The channel does not implement an operation
    #[error("operation not supported by this control channel: {0}")]
    Unsupported(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parameters of an `ADD_ONION` request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EphemeralServiceRequest {
    pub ports: PortMap,
    pub basic_auth: Option<BasicAuth>,
    /// Return only once a descriptor has been uploaded
    pub await_publication: bool,
}

/// Reply to a successful `ADD_ONION`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EphemeralService {
    /// Service ID (onion hostname without `.onion`)
    pub service_id: String,
    /// Client name -> cookie, for services created with basic auth
    pub client_auth: BTreeMap<String, String>,
}

impl EphemeralService {
    /// Cookie issued to `client`
    pub fn auth_cookie(&self, client: &str) -> Option<&str> {
        self.client_auth.get(client).map(String::as_str)
    }
}

/// Opens control channels
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        endpoint: &ControlEndpoint,
    ) -> Result<Box<dyn ControlChannel>, ChannelError>;
}

/// A live connection to a Tor control port
#[async_trait]
pub trait ControlChannel: Send {
    async fn authenticate(&mut self, auth: &AuthMethod) -> Result<(), ChannelError>;

    /// `GETINFO <key>`, returning the value only
    async fn get_info(&mut self, key: &str) -> Result<String, ChannelError>;

    /// Tor version string as reported by the controller
    async fn get_version(&mut self) -> Result<String, ChannelError>;

    /// Service IDs of the ephemeral services owned by this channel
    async fn list_ephemeral_services(&mut self) -> Result<Vec<String>, ChannelError>;

    async fn create_ephemeral_service(
        &mut self,
        request: &EphemeralServiceRequest,
    ) -> Result<EphemeralService, ChannelError>;

    async fn remove_ephemeral_service(&mut self, service_id: &str) -> Result<(), ChannelError>;
}
