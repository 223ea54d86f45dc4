//! Tor Control Port client
//!
//! Communicates with a Tor daemon via the control protocol, over TCP or
//! a local socket.

use super::channel::{
    ChannelError, Connector, ControlChannel, EphemeralService, EphemeralServiceRequest,
};
use super::endpoint::{AuthMethod, ControlEndpoint};
use super::reply::{self, LineKind, ProtocolInfo, Reply};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

const NO_ONION_SERVICES: &str = "No onion services of the specified type";

/// Byte stream a control channel runs over
pub trait ControlStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ControlStream for T {}

/// Bounds applied to every control port interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelTimeouts {
    /// Opening the transport
    pub connect: Duration,
    /// Each command's reply
    pub command: Duration,
    /// Waiting for a new service's descriptor to be uploaded
    pub publication: Duration,
}

impl Default for ChannelTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            command: Duration::from_secs(30),
            publication: Duration::from_secs(180),
        }
    }
}

/// Opens [`TorControlChannel`]s over real sockets
#[derive(Debug, Clone, Default)]
pub struct TorConnector {
    timeouts: ChannelTimeouts,
}

impl TorConnector {
    pub fn new(timeouts: ChannelTimeouts) -> Self {
        Self { timeouts }
    }
}

#[async_trait]
impl Connector for TorConnector {
    async fn connect(
        &self,
        endpoint: &ControlEndpoint,
    ) -> Result<Box<dyn ControlChannel>, ChannelError> {
        debug!("Connecting to Tor control port: {}", endpoint);

        let connect_error = |source: std::io::Error| ChannelError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let stream: Box<dyn ControlStream> = match endpoint {
            ControlEndpoint::Tcp { host, port } => {
                let addr = format!("{}:{}", host, port);
                let stream = timeout(self.timeouts.connect, TcpStream::connect(&addr))
                    .await
                    .map_err(|_| connect_error(std::io::ErrorKind::TimedOut.into()))?
                    .map_err(connect_error)?;
                Box::new(stream)
            },
            ControlEndpoint::Socket(path) => connect_socket(path).await.map_err(connect_error)?,
        };

        Ok(Box::new(TorControlChannel::new(stream, self.timeouts)))
    }
}

#[cfg(unix)]
async fn connect_socket(path: &Path) -> std::io::Result<Box<dyn ControlStream>> {
    let stream = tokio::net::UnixStream::connect(path).await?;
    Ok(Box::new(stream))
}

#[cfg(not(unix))]
async fn connect_socket(_path: &Path) -> std::io::Result<Box<dyn ControlStream>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "control sockets are not supported on this platform",
    ))
}

/// Connection to a Tor control port
pub struct TorControlChannel {
    stream: BufReader<Box<dyn ControlStream>>,
    timeouts: ChannelTimeouts,
    /// Asynchronous events read while waiting for a command reply
    events: VecDeque<Reply>,
    authenticated: bool,
}

impl TorControlChannel {
    pub fn new(stream: Box<dyn ControlStream>, timeouts: ChannelTimeouts) -> Self {
        Self {
            stream: BufReader::new(stream),
            timeouts,
            events: VecDeque::new(),
            authenticated: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Send a command and read its reply, failing on non-250 status
    async fn command(&mut self, cmd: &str) -> Result<Reply, ChannelError> {
        self.send(cmd).await?;
        self.read_command_reply().await?.into_result()
    }

    async fn send(&mut self, cmd: &str) -> Result<(), ChannelError> {
        // Never log credentials
        let preview = if cmd.starts_with("AUTHENTICATE") {
            "AUTHENTICATE ..."
        } else {
            cmd
        };
        debug!("Sending Tor command: {}", preview);

        let line = format!("{}\r\n", cmd);
        timeout(self.timeouts.command, async {
            self.stream.write_all(line.as_bytes()).await?;
            self.stream.flush().await
        })
        .await
        .map_err(|_| ChannelError::Timeout)??;
        Ok(())
    }

    /// Read the next non-event reply, queueing any events seen before it
    async fn read_command_reply(&mut self) -> Result<Reply, ChannelError> {
        loop {
            let reply = self.read_reply(self.timeouts.command).await?;
            if reply.is_event() {
                self.events.push_back(reply);
                continue;
            }
            return Ok(reply);
        }
    }

    /// Read one complete reply; each line must arrive within `limit`
    async fn read_reply(&mut self, limit: Duration) -> Result<Reply, ChannelError> {
        let mut lines = Vec::new();

        loop {
            let raw = self.read_line(limit).await?;
            if raw.is_empty() {
                continue;
            }

            let line = reply::parse_reply_line(&raw)
                .ok_or_else(|| ChannelError::Protocol(format!("unexpected line: {:?}", raw)))?;

            match line.kind {
                LineKind::Mid => lines.push(line.text.to_string()),
                LineKind::Data => {
                    let mut text = line.text.to_string();
                    let mut first = true;
                    loop {
                        let data = self.read_line(limit).await?;
                        if data == "." {
                            break;
                        }
                        if !first {
                            text.push('\n');
                        }
                        first = false;
                        // Leading dots are doubled inside data blocks
                        let unescaped = data.strip_prefix('.').filter(|d| d.starts_with('.'));
                        text.push_str(unescaped.unwrap_or(data.as_str()));
                    }
                    lines.push(text);
                },
                LineKind::End => {
                    lines.push(line.text.to_string());
                    return Ok(Reply {
                        code: line.code,
                        lines,
                    });
                },
            }
        }
    }

    async fn read_line(&mut self, limit: Duration) -> Result<String, ChannelError> {
        let mut line = String::new();
        let bytes_read = timeout(limit, self.stream.read_line(&mut line))
            .await
            .map_err(|_| ChannelError::Timeout)??;

        if bytes_read == 0 {
            return Err(ChannelError::Closed);
        }

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    async fn protocol_info(&mut self) -> Result<ProtocolInfo, ChannelError> {
        let reply = self.command("PROTOCOLINFO 1").await?;
        Ok(reply::parse_protocol_info(&reply.lines))
    }

    async fn send_authenticate(&mut self, token: Option<String>) -> Result<(), ChannelError> {
        let cmd = match token {
            Some(token) => format!("AUTHENTICATE {}", token),
            None => "AUTHENTICATE".to_string(),
        };
        self.send(&cmd).await?;

        let reply = self.read_command_reply().await?;
        if !reply.is_ok() {
            return Err(ChannelError::AuthFailed(reply.message()));
        }

        self.authenticated = true;
        info!("Authenticated with Tor control port");
        Ok(())
    }

    async fn authenticate_cookie(
        &mut self,
        path: Option<PathBuf>,
    ) -> Result<(), ChannelError> {
        let Some(path) = path else {
            return Err(ChannelError::UnreadableCookie {
                path: None,
                source: None,
            });
        };

        let cookie = tokio::fs::read(&path)
            .await
            .map_err(|e| ChannelError::UnreadableCookie {
                path: Some(path.clone()),
                source: Some(e),
            })?;
        debug!("Authenticating with cookie from {}", path.display());

        self.send_authenticate(Some(hex::encode(cookie))).await
    }

    /// Wait for `650 HS_DESC UPLOADED <service_id>`
    async fn wait_for_upload(&mut self, service_id: &str) -> Result<(), ChannelError> {
        let deadline = Instant::now() + self.timeouts.publication;

        loop {
            let event = match self.events.pop_front() {
                Some(event) => event,
                None => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Err(ChannelError::Timeout);
                    }
                    let reply = self.read_reply(remaining).await?;
                    if !reply.is_event() {
                        return Err(ChannelError::Protocol(format!(
                            "unexpected reply while waiting for publication: {}",
                            reply.message()
                        )));
                    }
                    reply
                },
            };

            let Some(first) = event.lines.first() else {
                continue;
            };
            let mut words = first.split_whitespace();
            if words.next() == Some("HS_DESC")
                && words.next() == Some("UPLOADED")
                && words.next() == Some(service_id)
            {
                debug!("Descriptor for {} uploaded", service_id);
                return Ok(());
            }
        }
    }

    fn add_onion_command(request: &EphemeralServiceRequest) -> String {
        let mut flags = vec!["DiscardPK"];
        if request.basic_auth.is_some() {
            flags.push("BasicAuth");
        }

        let mut cmd = format!("ADD_ONION NEW:BEST Flags={}", flags.join(","));
        for (virtual_port, target_port) in &request.ports {
            cmd.push_str(&format!(" Port={},{}", virtual_port, target_port));
        }
        if let Some(clients) = &request.basic_auth {
            for (name, cookie) in clients {
                match cookie {
                    Some(cookie) => cmd.push_str(&format!(" ClientAuth={}:{}", name, cookie)),
                    None => cmd.push_str(&format!(" ClientAuth={}", name)),
                }
            }
        }
        cmd
    }
}

#[async_trait]
impl ControlChannel for TorControlChannel {
    async fn authenticate(&mut self, auth: &AuthMethod) -> Result<(), ChannelError> {
        let info = self.protocol_info().await?;
        debug!(
            "Tor auth methods: {:?}, cookie file: {:?}",
            info.auth_methods, info.cookie_file
        );

        match auth {
            AuthMethod::Password(password) => {
                if !info.accepts("HASHEDPASSWORD") && info.accepts("NULL") {
                    return self.send_authenticate(None).await;
                }
                let token = format!("\"{}\"", reply::escape(password));
                self.send_authenticate(Some(token)).await
            },
            AuthMethod::Cookie(path) => {
                let path = path.clone().or(info.cookie_file);
                self.authenticate_cookie(path).await
            },
            AuthMethod::None => {
                if info.accepts("NULL") {
                    self.send_authenticate(None).await
                } else if info.accepts_cookie() {
                    self.authenticate_cookie(info.cookie_file).await
                } else if info.accepts("HASHEDPASSWORD") {
                    Err(ChannelError::MissingPassword)
                } else {
                    Err(ChannelError::Protocol(format!(
                        "no usable authentication method in {:?}",
                        info.auth_methods
                    )))
                }
            },
        }
    }

    async fn get_info(&mut self, key: &str) -> Result<String, ChannelError> {
        let reply = self.command(&format!("GETINFO {}", key)).await?;
        reply::getinfo_value(&reply.lines, key)
            .ok_or_else(|| ChannelError::Protocol(format!("{} not found in GETINFO reply", key)))
    }

    async fn get_version(&mut self) -> Result<String, ChannelError> {
        self.get_info("version").await
    }

    async fn list_ephemeral_services(&mut self) -> Result<Vec<String>, ChannelError> {
        match self.get_info("onions/current").await {
            Ok(value) => Ok(reply::parse_onion_list(&value)),
            // Tor before 0.3.0 reports an empty list as an error
            Err(ChannelError::Rejected { code: 551, message })
                if message.contains(NO_ONION_SERVICES) =>
            {
                Ok(Vec::new())
            },
            Err(e) => Err(e),
        }
    }

    async fn create_ephemeral_service(
        &mut self,
        request: &EphemeralServiceRequest,
    ) -> Result<EphemeralService, ChannelError> {
        if request.await_publication {
            self.command("SETEVENTS HS_DESC").await?;
        }

        let created = match self.command(&Self::add_onion_command(request)).await {
            Ok(reply) => reply::parse_add_onion(&reply.lines),
            Err(e) => Err(e),
        };

        let service = match created {
            Ok(service) => service,
            Err(e) => {
                if request.await_publication {
                    let _ = self.command("SETEVENTS").await;
                }
                return Err(e);
            },
        };

        if request.await_publication {
            let uploaded = self.wait_for_upload(&service.service_id).await;
            self.events.clear();
            if let Err(e) = self.command("SETEVENTS").await {
                warn!("Failed to reset event subscription: {}", e);
            }
            if let Err(e) = uploaded {
                if let Err(del) = self.remove_ephemeral_service(&service.service_id).await {
                    warn!("Failed to remove unpublished onion service: {}", del);
                }
                return Err(e);
            }
        }

        info!("Created onion service {}.onion", service.service_id);
        Ok(service)
    }

    async fn remove_ephemeral_service(&mut self, service_id: &str) -> Result<(), ChannelError> {
        self.command(&format!("DEL_ONION {}", service_id)).await?;
        info!("Removed onion service {}.onion", service_id);
        Ok(())
    }
}
