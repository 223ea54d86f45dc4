//! Configuration loading and validation
//!
//! Handles TOML settings parsing with strict validation, and the typed
//! [`ConnectionConfig`] the connection strategies consume. Settings are
//! immutable after load.

pub mod file;
mod validation;

pub use file::load_settings;
pub use validation::validate;

use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::process::TorPaths;
use crate::strategy::AutomaticCandidates;
use crate::tor::{AuthMethod, ChannelTimeouts, ControlEndpoint, SocksEndpoint};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// How to reach Tor, after settings have been interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// Launch and supervise a private Tor
    Bundled(BundledConfig),
    /// Probe well-known local control ports and sockets
    Automatic(AutomaticCandidates),
    /// A single user-specified control endpoint
    Manual(ManualConfig),
}

/// Paths needed to launch a bundled Tor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledConfig {
    pub tor_path: PathBuf,
    pub geo_ip_file: PathBuf,
    pub geo_ipv6_file: PathBuf,
    /// Custom torrc template; the built-in one is used when absent
    pub torrc_template: Option<PathBuf>,
}

impl BundledConfig {
    /// Platform default binary and GeoIP locations
    pub fn detect() -> Self {
        let paths = TorPaths::detect();
        Self {
            tor_path: paths.tor,
            geo_ip_file: paths.geo_ip_file,
            geo_ipv6_file: paths.geo_ipv6_file,
            torrc_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualConfig {
    pub endpoint: ControlEndpoint,
    pub auth: AuthMethod,
    pub socks: SocksEndpoint,
}

/// Root settings document
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// `bundled`, `automatic`, `control_port` or `socket_file`
    #[serde(default = "default_connection_type")]
    pub connection_type: String,
    #[serde(default = "default_control_port_address")]
    pub control_port_address: String,
    #[serde(default = "default_control_port_port")]
    pub control_port_port: u16,
    #[serde(default = "default_socket_file_path")]
    pub socket_file_path: PathBuf,
    /// `no_auth`, `password` or `cookie`
    #[serde(default = "default_auth_type")]
    pub auth_type: String,
    #[serde(default)]
    pub auth_password: String,
    /// Overrides the cookie path Tor advertises
    pub auth_cookie_file: Option<PathBuf>,
    #[serde(default = "default_socks_address")]
    pub socks_address: String,
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,
    #[serde(default)]
    pub bundled: BundledSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// Overrides for the bundled Tor's file locations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundledSettings {
    pub tor_path: Option<PathBuf>,
    pub geo_ip_file: Option<PathBuf>,
    pub geo_ipv6_file: Option<PathBuf>,
    pub torrc_template: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutSettings {
    /// Per control command reply
    #[serde(default = "default_command_secs")]
    pub command_secs: u64,
    /// Waiting for a new service's descriptor upload
    #[serde(default = "default_publication_secs")]
    pub publication_secs: u64,
    /// Waiting for a bundled Tor's control port to accept connections
    #[serde(default = "default_control_wait_secs")]
    pub control_wait_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_secs: default_command_secs(),
            publication_secs: default_publication_secs(),
            control_wait_secs: default_control_wait_secs(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connection_type: default_connection_type(),
            control_port_address: default_control_port_address(),
            control_port_port: default_control_port_port(),
            socket_file_path: default_socket_file_path(),
            auth_type: default_auth_type(),
            auth_password: String::new(),
            auth_cookie_file: None,
            socks_address: default_socks_address(),
            socks_port: default_socks_port(),
            bundled: BundledSettings::default(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

fn default_connection_type() -> String {
    "bundled".to_string()
}
fn default_control_port_address() -> String {
    "127.0.0.1".to_string()
}
fn default_control_port_port() -> u16 {
    9051
}
fn default_socket_file_path() -> PathBuf {
    PathBuf::from("/var/run/tor/control")
}
fn default_auth_type() -> String {
    "no_auth".to_string()
}
fn default_socks_address() -> String {
    "127.0.0.1".to_string()
}
fn default_socks_port() -> u16 {
    9050
}
fn default_command_secs() -> u64 {
    30
}
fn default_publication_secs() -> u64 {
    180
}
fn default_control_wait_secs() -> u64 {
    10
}

impl Settings {
    /// Interpret the settings for the given platform
    pub fn connection_config(&self, platform: &Platform) -> Result<ConnectionConfig> {
        match self.connection_type.as_str() {
            "bundled" => Ok(ConnectionConfig::Bundled(self.bundled_config())),
            "automatic" => Ok(ConnectionConfig::Automatic(AutomaticCandidates::discover(
                platform,
            ))),
            "control_port" => Ok(ConnectionConfig::Manual(ManualConfig {
                endpoint: ControlEndpoint::tcp(
                    self.control_port_address.clone(),
                    self.control_port_port,
                ),
                auth: self.auth_method()?,
                socks: self.socks_endpoint(),
            })),
            "socket_file" => Ok(ConnectionConfig::Manual(ManualConfig {
                endpoint: ControlEndpoint::socket(&self.socket_file_path),
                auth: self.auth_method()?,
                socks: self.socks_endpoint(),
            })),
            other => Err(Error::InvalidSetting(format!(
                "unknown connection_type {:?}",
                other
            ))),
        }
    }

    pub fn auth_method(&self) -> Result<AuthMethod> {
        match self.auth_type.as_str() {
            "no_auth" => Ok(AuthMethod::None),
            "password" => Ok(AuthMethod::Password(self.auth_password.clone())),
            "cookie" => Ok(AuthMethod::Cookie(self.auth_cookie_file.clone())),
            other => Err(Error::InvalidSetting(format!(
                "unknown auth_type {:?}",
                other
            ))),
        }
    }

    pub fn socks_endpoint(&self) -> SocksEndpoint {
        SocksEndpoint::new(self.socks_address.clone(), self.socks_port)
    }

    /// Detected defaults with any `[bundled]` overrides applied
    pub fn bundled_config(&self) -> BundledConfig {
        let detected = BundledConfig::detect();
        BundledConfig {
            tor_path: self.bundled.tor_path.clone().unwrap_or(detected.tor_path),
            geo_ip_file: self
                .bundled
                .geo_ip_file
                .clone()
                .unwrap_or(detected.geo_ip_file),
            geo_ipv6_file: self
                .bundled
                .geo_ipv6_file
                .clone()
                .unwrap_or(detected.geo_ipv6_file),
            torrc_template: self.bundled.torrc_template.clone(),
        }
    }

    pub fn channel_timeouts(&self) -> ChannelTimeouts {
        ChannelTimeouts {
            command: Duration::from_secs(self.timeouts.command_secs),
            publication: Duration::from_secs(self.timeouts.publication_secs),
            ..ChannelTimeouts::default()
        }
    }

    pub fn control_wait(&self) -> Duration {
        Duration::from_secs(self.timeouts.control_wait_secs)
    }
}
