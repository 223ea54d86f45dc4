//! Bundled Tor process supervision
//!
//! Launches a private Tor with a generated torrc in a temporary data
//! directory, and tears it down again. The data directory lives exactly
//! as long as the process handle.

mod ports;
mod torrc;

pub use ports::allocate_ports;
pub use torrc::{
    default_template, render, TorrcValues, TORRC_TEMPLATE_PORT, TORRC_TEMPLATE_SOCKET,
};

use crate::config::BundledConfig;
use crate::error::{Error, Result};
use crate::platform::{ControlTransport, Platform, Termination};
use crate::tor::ControlEndpoint;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Time a signalled Tor gets to exit before it is killed
pub const TERMINATE_GRACE: Duration = Duration::from_millis(200);

const DATA_DIR_PREFIX: &str = "onionport-tor-";

/// Where to reach a freshly launched Tor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedTor {
    pub control: ControlEndpoint,
    pub cookie_auth_file: PathBuf,
    pub socks_port: u16,
}

/// Owns at most one bundled Tor process
#[async_trait]
pub trait Supervisor: Send {
    /// Launch Tor; any previous process is terminated first
    async fn spawn(&mut self, config: &BundledConfig) -> Result<LaunchedTor>;

    /// Whether a launched process is still alive
    fn is_running(&mut self) -> bool;

    /// Stop the process and release the data directory. Idempotent.
    async fn terminate(&mut self);
}

/// Default locations of the Tor binary and its GeoIP databases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TorPaths {
    pub tor: PathBuf,
    pub geo_ip_file: PathBuf,
    pub geo_ipv6_file: PathBuf,
}

impl TorPaths {
    pub fn detect() -> Self {
        if cfg!(windows) {
            let base = exe_dir().join("tor");
            Self {
                tor: base.join("Tor").join("tor.exe"),
                geo_ip_file: base.join("Data").join("Tor").join("geoip"),
                geo_ipv6_file: base.join("Data").join("Tor").join("geoip6"),
            }
        } else if cfg!(target_os = "macos") {
            let base = exe_dir()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join("Resources")
                .join("Tor");
            Self {
                tor: base.join("tor"),
                geo_ip_file: base.join("geoip"),
                geo_ipv6_file: base.join("geoip6"),
            }
        } else {
            Self {
                tor: PathBuf::from("/usr/bin/tor"),
                geo_ip_file: PathBuf::from("/usr/share/tor/geoip"),
                geo_ipv6_file: PathBuf::from("/usr/share/tor/geoip6"),
            }
        }
    }
}

fn exe_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_default()
}

/// A running bundled Tor and the directory it owns
#[derive(Debug)]
pub struct TorProcess {
    child: Child,
    pid: Option<u32>,
    data_dir: TempDir,
    torrc_path: PathBuf,
}

impl TorProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn data_directory(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn torrc_path(&self) -> &Path {
        &self.torrc_path
    }
}

/// Supervisor for a real `tor` executable
pub struct TorSupervisor {
    platform: Platform,
    process: Option<TorProcess>,
}

impl TorSupervisor {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            process: None,
        }
    }

    pub fn process(&self) -> Option<&TorProcess> {
        self.process.as_ref()
    }
}

#[async_trait]
impl Supervisor for TorSupervisor {
    async fn spawn(&mut self, config: &BundledConfig) -> Result<LaunchedTor> {
        self.terminate().await;

        let data_dir = tempfile::Builder::new()
            .prefix(DATA_DIR_PREFIX)
            .tempdir()
            .map_err(|e| start_error("create data directory", e))?;
        let dir = data_dir.path().to_path_buf();

        let (control, control_port, control_socket, socks_port) =
            match self.platform.control_transport {
                ControlTransport::TcpPort => {
                    let [control_port, socks_port] =
                        allocate_ports::<2>().map_err(|e| start_error("allocate ports", e))?;
                    (
                        ControlEndpoint::localhost(control_port),
                        Some(control_port),
                        None,
                        socks_port,
                    )
                }
                ControlTransport::Socket => {
                    let [socks_port] =
                        allocate_ports::<1>().map_err(|e| start_error("allocate ports", e))?;
                    let socket = dir.join("control_socket");
                    (
                        ControlEndpoint::socket(socket.clone()),
                        None,
                        Some(socket),
                        socks_port,
                    )
                }
            };

        let cookie_auth_file = dir.join("cookie");
        let torrc_path = dir.join("torrc");
        let values = TorrcValues {
            data_directory: dir.clone(),
            control_port,
            control_socket,
            cookie_auth_file: cookie_auth_file.clone(),
            geo_ip_file: config.geo_ip_file.clone(),
            geo_ipv6_file: config.geo_ipv6_file.clone(),
            socks_port,
        };
        write_torrc(config, self.platform.control_transport, &values, &torrc_path).await?;

        let child = Command::new(&config.tor_path)
            .arg("-f")
            .arg(&torrc_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| start_error(&format!("launch {}", config.tor_path.display()), e))?;
        let pid = child.id();

        info!(
            "Started bundled Tor (pid {:?}), control {}, SOCKS port {}",
            pid, control, socks_port
        );
        debug!("Tor data directory: {}", dir.display());

        self.process = Some(TorProcess {
            child,
            pid,
            data_dir,
            torrc_path,
        });

        Ok(LaunchedTor {
            control,
            cookie_auth_file,
            socks_port,
        })
    }

    fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => matches!(process.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    async fn terminate(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };

        info!("Stopping bundled Tor (pid {:?})", process.pid);
        if let Err(e) = stop_child(&mut process, self.platform.termination).await {
            warn!("Failed to stop bundled Tor: {}", e);
        }
        // Dropping the handle removes the data directory.
    }
}

async fn write_torrc(
    config: &BundledConfig,
    transport: ControlTransport,
    values: &TorrcValues,
    path: &Path,
) -> Result<()> {
    let template = match &config.torrc_template {
        Some(template_path) => tokio::fs::read_to_string(template_path)
            .await
            .map_err(|e| start_error(&format!("read {}", template_path.display()), e))?,
        None => default_template(transport).to_string(),
    };

    tokio::fs::write(path, render(&template, values))
        .await
        .map_err(|e| start_error("write torrc", e))
}

async fn stop_child(process: &mut TorProcess, termination: Termination) -> io::Result<()> {
    if termination == Termination::Signal {
        if let Some(pid) = process.pid {
            if let Err(e) = send_sigterm(pid) {
                debug!("SIGTERM to {} failed: {}", pid, e);
            }
        }
        if let Ok(Ok(status)) = tokio::time::timeout(TERMINATE_GRACE, process.child.wait()).await {
            debug!("Bundled Tor exited with {}", status);
            return Ok(());
        }
    }

    process.child.start_kill()?;
    // A child that is not reaped in time is left to the runtime's reaper.
    match tokio::time::timeout(TERMINATE_GRACE, process.child.wait()).await {
        Ok(status) => status.map(|_| ()),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            "killed process did not exit in time",
        )),
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    kill(Pid::from_raw(pid), Signal::SIGTERM).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are not available on this platform",
    ))
}

fn start_error(step: &str, err: io::Error) -> Error {
    Error::BundledTorStart(format!("{}: {}", step, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detected_paths_name_geoip_files() {
        let paths = TorPaths::detect();
        assert!(paths.geo_ip_file.ends_with("geoip"));
        assert!(paths.geo_ipv6_file.ends_with("geoip6"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_uses_system_tor() {
        assert_eq!(TorPaths::detect().tor, PathBuf::from("/usr/bin/tor"));
    }

    #[tokio::test]
    async fn test_terminate_without_process_is_noop() {
        let mut supervisor = TorSupervisor::new(Platform::current());
        supervisor.terminate().await;
        supervisor.terminate().await;
        assert!(!supervisor.is_running());
        assert!(supervisor.process().is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_is_start_error() {
        let mut supervisor = TorSupervisor::new(Platform::current());
        let config = BundledConfig {
            tor_path: PathBuf::from("/nonexistent/onionport/tor"),
            geo_ip_file: PathBuf::from("/nonexistent/geoip"),
            geo_ipv6_file: PathBuf::from("/nonexistent/geoip6"),
            torrc_template: None,
        };

        let err = supervisor.spawn(&config).await.unwrap_err();
        assert!(matches!(err, Error::BundledTorStart(_)));
        assert!(!supervisor.is_running());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_stops_process_and_removes_data_dir() {
        // Any long-running executable stands in for tor here.
        let mut supervisor = TorSupervisor::new(Platform::current());
        let config = BundledConfig {
            tor_path: PathBuf::from("/bin/sleep"),
            geo_ip_file: PathBuf::from("/nonexistent/geoip"),
            geo_ipv6_file: PathBuf::from("/nonexistent/geoip6"),
            torrc_template: None,
        };

        // `sleep -f <torrc>` exits immediately with a usage error on most
        // systems, so only the bookkeeping is checked.
        let launched = supervisor.spawn(&config).await.unwrap();
        let data_dir = supervisor.process().unwrap().data_directory().to_path_buf();
        assert!(data_dir.join("torrc").exists());
        assert_eq!(launched.cookie_auth_file, data_dir.join("cookie"));

        supervisor.terminate().await;
        assert!(supervisor.process().is_none());
        assert!(!data_dir.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_is_bounded_when_sigterm_is_ignored() {
        // `sh -f <torrc>` runs the rendered torrc as a shell script.
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("stubborn.torrc");
        std::fs::write(&template, "trap '' TERM\nexec sleep 30\n").unwrap();

        let mut supervisor = TorSupervisor::new(Platform::current());
        let config = BundledConfig {
            tor_path: PathBuf::from("/bin/sh"),
            geo_ip_file: PathBuf::from("/nonexistent/geoip"),
            geo_ipv6_file: PathBuf::from("/nonexistent/geoip6"),
            torrc_template: Some(template),
        };

        supervisor.spawn(&config).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(supervisor.is_running());

        let started = std::time::Instant::now();
        supervisor.terminate().await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!supervisor.is_running());
        assert!(supervisor.process().is_none());
    }
}
