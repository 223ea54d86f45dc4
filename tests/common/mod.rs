//! Scripted fakes shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use onionport::config::BundledConfig;
use onionport::platform::{ControlTransport, Platform, Termination};
use onionport::process::{LaunchedTor, Supervisor};
use onionport::tor::{
    AuthMethod, ChannelError, Connector, ControlChannel, ControlEndpoint, EphemeralService,
    EphemeralServiceRequest,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const SERVICE_ID: &str = "abcdefghijklmnopqrstuvwxyz234567abcdefghijklmnopqrstuvwx";
pub const CLIENT_COOKIE: &str = "dGhpc2lzYWNvb2tpZTEy";
pub const DONE: &str = "NOTICE BOOTSTRAP PROGRESS=100 TAG=done SUMMARY=\"Done\"";

pub fn progress(percent: u8, summary: &str) -> String {
    format!(
        "NOTICE BOOTSTRAP PROGRESS={} TAG=conn SUMMARY=\"{}\"",
        percent, summary
    )
}

/// Every call made against the fakes, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(ControlEndpoint),
    Authenticate(AuthMethod),
    GetInfo(String),
    GetVersion,
    ListEphemeral,
    Create(EphemeralServiceRequest),
    Remove(String),
    Spawn,
    Terminate,
}

pub type Log = Arc<Mutex<Vec<Call>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &Log) -> Vec<Call> {
    log.lock().unwrap().clone()
}

pub fn count(log: &Log, pred: impl Fn(&Call) -> bool) -> usize {
    log.lock().unwrap().iter().filter(|c| pred(c)).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Accept,
    MissingPassword,
    UnreadableCookie,
    Reject,
    Garbage,
}

/// How a fake controller behaves
#[derive(Debug, Clone)]
pub struct ChannelScript {
    pub auth: AuthOutcome,
    /// `None` makes `GETINFO version` fail
    pub version: Option<String>,
    pub lists_ephemeral: bool,
    pub stealth: bool,
    /// Fail the real (publication-awaiting) create
    pub create_fails: bool,
    pub omit_client_cookie: bool,
    pub remove_fails: bool,
    /// Bootstrap replies in order; the last one repeats
    pub bootstrap: Vec<String>,
}

impl Default for ChannelScript {
    fn default() -> Self {
        Self {
            auth: AuthOutcome::Accept,
            version: Some("0.4.8.10".to_string()),
            lists_ephemeral: true,
            stealth: true,
            create_fails: false,
            omit_client_cookie: false,
            remove_fails: false,
            bootstrap: vec![DONE.to_string()],
        }
    }
}

pub struct FakeChannel {
    script: ChannelScript,
    log: Log,
    polls: usize,
}

impl FakeChannel {
    pub fn new(script: ChannelScript, log: Log) -> Self {
        Self {
            script,
            log,
            polls: 0,
        }
    }

    fn record(&self, call: Call) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ControlChannel for FakeChannel {
    async fn authenticate(&mut self, auth: &AuthMethod) -> Result<(), ChannelError> {
        self.record(Call::Authenticate(auth.clone()));
        match self.script.auth {
            AuthOutcome::Accept => Ok(()),
            AuthOutcome::MissingPassword => Err(ChannelError::MissingPassword),
            AuthOutcome::UnreadableCookie => Err(ChannelError::UnreadableCookie {
                path: Some(PathBuf::from("/run/tor/control.authcookie")),
                source: None,
            }),
            AuthOutcome::Reject => Err(ChannelError::AuthFailed(
                "515 Authentication failed".into(),
            )),
            AuthOutcome::Garbage => Err(ChannelError::Protocol("HTTP/1.0 400 Bad Request".into())),
        }
    }

    async fn get_info(&mut self, key: &str) -> Result<String, ChannelError> {
        self.record(Call::GetInfo(key.to_string()));
        let reply = self
            .script
            .bootstrap
            .get(self.polls)
            .or_else(|| self.script.bootstrap.last())
            .cloned()
            .unwrap_or_else(|| DONE.to_string());
        self.polls += 1;
        Ok(reply)
    }

    async fn get_version(&mut self) -> Result<String, ChannelError> {
        self.record(Call::GetVersion);
        self.script.version.clone().ok_or(ChannelError::Closed)
    }

    async fn list_ephemeral_services(&mut self) -> Result<Vec<String>, ChannelError> {
        self.record(Call::ListEphemeral);
        if self.script.lists_ephemeral {
            Ok(Vec::new())
        } else {
            Err(ChannelError::Rejected {
                code: 552,
                message: "Unrecognized key \"onions/current\"".into(),
            })
        }
    }

    async fn create_ephemeral_service(
        &mut self,
        request: &EphemeralServiceRequest,
    ) -> Result<EphemeralService, ChannelError> {
        self.record(Call::Create(request.clone()));

        if request.basic_auth.is_some() && !self.script.stealth {
            return Err(ChannelError::Rejected {
                code: 512,
                message: "Unrecognized flag \"BasicAuth\"".into(),
            });
        }
        if request.await_publication && self.script.create_fails {
            return Err(ChannelError::Rejected {
                code: 551,
                message: "Failed to add onion service".into(),
            });
        }

        let mut client_auth = BTreeMap::new();
        if let Some(auth) = &request.basic_auth {
            if !self.script.omit_client_cookie {
                for client in auth.keys() {
                    client_auth.insert(client.clone(), CLIENT_COOKIE.to_string());
                }
            }
        }

        let service_id = if request.await_publication {
            SERVICE_ID.to_string()
        } else {
            "probeprobeprobeprobeprobeprobeprobeprobeprobeprobeprob".to_string()
        };

        Ok(EphemeralService {
            service_id,
            client_auth,
        })
    }

    async fn remove_ephemeral_service(&mut self, service_id: &str) -> Result<(), ChannelError> {
        self.record(Call::Remove(service_id.to_string()));
        if self.script.remove_fails {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

/// Serves scripted channels for known endpoints and refuses the rest
pub struct FakeConnector {
    log: Log,
    served: HashMap<ControlEndpoint, ChannelScript>,
    /// Connects refused before endpoints start answering
    refusals: Mutex<usize>,
}

impl FakeConnector {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            served: HashMap::new(),
            refusals: Mutex::new(0),
        }
    }

    pub fn serve(mut self, endpoint: ControlEndpoint, script: ChannelScript) -> Self {
        self.served.insert(endpoint, script);
        self
    }

    pub fn refuse_first(self, refusals: usize) -> Self {
        *self.refusals.lock().unwrap() = refusals;
        self
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        endpoint: &ControlEndpoint,
    ) -> Result<Box<dyn ControlChannel>, ChannelError> {
        self.log.lock().unwrap().push(Call::Connect(endpoint.clone()));

        let refused = {
            let mut refusals = self.refusals.lock().unwrap();
            if *refusals > 0 {
                *refusals -= 1;
                true
            } else {
                false
            }
        };

        match self.served.get(endpoint) {
            Some(script) if !refused => Ok(Box::new(FakeChannel::new(
                script.clone(),
                self.log.clone(),
            ))),
            _ => Err(ChannelError::Connect {
                endpoint: endpoint.to_string(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            }),
        }
    }
}

/// Pretends to launch Tor; terminations are only logged while running
pub struct FakeSupervisor {
    log: Log,
    launched: LaunchedTor,
    fail_spawn: bool,
    running: bool,
}

impl FakeSupervisor {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            launched: bundled_launch(),
            fail_spawn: false,
            running: false,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail_spawn = true;
        self
    }
}

#[async_trait]
impl Supervisor for FakeSupervisor {
    async fn spawn(&mut self, _config: &BundledConfig) -> onionport::Result<LaunchedTor> {
        self.log.lock().unwrap().push(Call::Spawn);
        if self.fail_spawn {
            return Err(onionport::Error::BundledTorStart(
                "launch /usr/bin/tor: No such file or directory".into(),
            ));
        }
        self.running = true;
        Ok(self.launched.clone())
    }

    fn is_running(&mut self) -> bool {
        self.running
    }

    async fn terminate(&mut self) {
        if self.running {
            self.running = false;
            self.log.lock().unwrap().push(Call::Terminate);
        }
    }
}

pub fn bundled_launch() -> LaunchedTor {
    LaunchedTor {
        control: ControlEndpoint::localhost(47001),
        cookie_auth_file: PathBuf::from("/tmp/onionport-tor-test/cookie"),
        socks_port: 47002,
    }
}

pub fn bundled_config() -> BundledConfig {
    BundledConfig {
        tor_path: PathBuf::from("/usr/bin/tor"),
        geo_ip_file: PathBuf::from("/usr/share/tor/geoip"),
        geo_ipv6_file: PathBuf::from("/usr/share/tor/geoip6"),
        torrc_template: None,
    }
}

pub fn test_platform(bundled_supported: bool) -> Platform {
    Platform {
        control_transport: ControlTransport::TcpPort,
        termination: Termination::Handle,
        bundled_supported,
        automatic_socket_paths: vec![PathBuf::from("/run/user/1000/Tor/control.socket")],
    }
}
