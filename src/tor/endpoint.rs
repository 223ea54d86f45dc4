//! Control and SOCKS endpoint descriptions

use std::fmt;
use std::path::{Path, PathBuf};

/// Loopback host used for every endpoint onionport allocates itself.
pub const LOCALHOST: &str = "127.0.0.1";

/// Where a Tor control port listens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlEndpoint {
    /// TCP control port
    Tcp { host: String, port: u16 },
    /// Local domain socket (`ControlSocket` in torrc)
    Socket(PathBuf),
}

impl ControlEndpoint {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// TCP control port on the loopback interface
    pub fn localhost(port: u16) -> Self {
        Self::tcp(LOCALHOST, port)
    }

    pub fn socket(path: impl AsRef<Path>) -> Self {
        Self::Socket(path.as_ref().to_path_buf())
    }
}

impl fmt::Display for ControlEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } => write!(f, "{}:{}", host, port),
            Self::Socket(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

/// Address of the SOCKS proxy applications should use to reach Tor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocksEndpoint {
    pub host: String,
    pub port: u16,
}

impl SocksEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn localhost(port: u16) -> Self {
        Self::new(LOCALHOST, port)
    }
}

impl fmt::Display for SocksEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How to authenticate a freshly opened control channel
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// No credential. Tor's NULL method, or cookie auth when that is all
    /// the controller offers.
    None,
    /// `HashedControlPassword` authentication
    Password(String),
    /// Cookie authentication; the path overrides the one Tor advertises
    Cookie(Option<PathBuf>),
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Password(_) => write!(f, "Password([REDACTED])"),
            Self::Cookie(path) => f.debug_tuple("Cookie").field(path).finish(),
        }
    }
}
