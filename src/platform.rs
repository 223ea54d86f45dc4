//! Host platform capabilities
//!
//! Everything that differs between operating systems is decided once,
//! here, and threaded through the rest of the crate as a [`Platform`].

use std::path::PathBuf;

/// How a bundled Tor exposes its control port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlTransport {
    /// Two TCP ports (control, SOCKS) on loopback
    TcpPort,
    /// A control socket inside the data directory plus a SOCKS TCP port
    Socket,
}

/// How the bundled Tor process is stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// SIGTERM, short grace period, then SIGKILL
    Signal,
    /// Terminate through the process handle directly
    Handle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub control_transport: ControlTransport,
    pub termination: Termination,
    /// Whether launching a bundled Tor is allowed on this platform/build
    pub bundled_supported: bool,
    /// Local control sockets worth guessing in automatic mode, in order
    pub automatic_socket_paths: Vec<PathBuf>,
}

impl Platform {
    /// Capabilities of the platform this binary was built for
    pub fn current() -> Self {
        let (control_transport, termination) = if cfg!(windows) {
            (ControlTransport::TcpPort, Termination::Handle)
        } else {
            (ControlTransport::Socket, Termination::Signal)
        };

        // Development builds on Windows and macOS have no Tor binary next
        // to the executable.
        let bundled_supported =
            !(cfg!(any(windows, target_os = "macos")) && cfg!(debug_assertions));

        Self {
            control_transport,
            termination,
            bundled_supported,
            automatic_socket_paths: automatic_socket_paths(),
        }
    }
}

fn automatic_socket_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if cfg!(windows) {
        return paths;
    }

    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join("Library/Application Support/TorBrowser-Data/Tor/control.socket"));
        }
    }

    paths.extend(runtime_socket_guesses(dirs::runtime_dir(), effective_uid()));
    paths
}

/// `$XDG_RUNTIME_DIR/Tor/control.socket`, then the systemd default
/// `/run/user/<euid>/Tor/control.socket`
fn runtime_socket_guesses(runtime_dir: Option<PathBuf>, euid: Option<u32>) -> Vec<PathBuf> {
    let mut guesses: Vec<PathBuf> = Vec::new();
    let fallback = euid.map(|uid| PathBuf::from(format!("/run/user/{}", uid)));

    for dir in runtime_dir.into_iter().chain(fallback) {
        let socket = dir.join("Tor/control.socket");
        if !guesses.contains(&socket) {
            guesses.push(socket);
        }
    }
    guesses
}

#[cfg(unix)]
fn effective_uid() -> Option<u32> {
    Some(nix::unistd::geteuid().as_raw())
}

#[cfg(not(unix))]
fn effective_uid() -> Option<u32> {
    None
}
