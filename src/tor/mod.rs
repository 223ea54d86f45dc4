//! Tor daemon interaction
//!
//! The control channel contract the rest of the crate depends on, plus a
//! concrete control-port client. Tor is treated as a black box.

mod channel;
pub mod control;
mod endpoint;
pub mod reply;

pub use channel::{
    BasicAuth, ChannelError, Connector, ControlChannel, EphemeralService,
    EphemeralServiceRequest, PortMap,
};
pub use control::{ChannelTimeouts, TorConnector, TorControlChannel};
pub use endpoint::{AuthMethod, ControlEndpoint, SocksEndpoint, LOCALHOST};

/// GETINFO key reporting bootstrap progress
pub const BOOTSTRAP_PHASE_KEY: &str = "status/bootstrap-phase";
