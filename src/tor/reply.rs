//! Control protocol reply parsing
//!
//! Reply lines look like `250-key=value`, `250+key=` (data block
//! terminated by a lone `.`) or `250 OK`. Asynchronous events use
//! status 650.

use super::channel::{ChannelError, EphemeralService};
use std::path::PathBuf;

/// Status code for asynchronous events
pub const EVENT_CODE: u16 = 650;

/// Position of a line within a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `-`: more lines follow
    Mid,
    /// `+`: a data block follows
    Data,
    /// ` `: final line
    End,
}

/// One parsed reply line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyLine<'a> {
    pub code: u16,
    pub kind: LineKind,
    pub text: &'a str,
}

/// Parse a single reply line (without its CRLF)
pub fn parse_reply_line(line: &str) -> Option<ReplyLine<'_>> {
    let code_str = line.get(..3)?;
    if !code_str.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let code = code_str.parse().ok()?;

    let kind = match line.as_bytes().get(3) {
        None | Some(b' ') => LineKind::End,
        Some(b'-') => LineKind::Mid,
        Some(b'+') => LineKind::Data,
        Some(_) => return None,
    };
    let text = line.get(4..).unwrap_or("");

    Some(ReplyLine { code, kind, text })
}

/// A complete reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    /// Line texts in order; data blocks are folded into their header line
    pub lines: Vec<String>,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.code == 250
    }

    pub fn is_event(&self) -> bool {
        self.code == EVENT_CODE
    }

    pub fn message(&self) -> String {
        self.lines.join("; ")
    }

    pub fn into_result(self) -> Result<Self, ChannelError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ChannelError::Rejected {
                code: self.code,
                message: self.message(),
            })
        }
    }
}

/// Result of `PROTOCOLINFO 1`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolInfo {
    /// Accepted authentication methods (`NULL`, `HASHEDPASSWORD`, `COOKIE`, `SAFECOOKIE`)
    pub auth_methods: Vec<String>,
    /// Cookie file advertised by Tor
    pub cookie_file: Option<PathBuf>,
    pub tor_version: Option<String>,
}

impl ProtocolInfo {
    pub fn accepts(&self, method: &str) -> bool {
        self.auth_methods.iter().any(|m| m == method)
    }

    pub fn accepts_cookie(&self) -> bool {
        self.accepts("COOKIE") || self.accepts("SAFECOOKIE")
    }
}

/// Parse the lines of a `PROTOCOLINFO` reply
pub fn parse_protocol_info(lines: &[String]) -> ProtocolInfo {
    let mut info = ProtocolInfo::default();

    for line in lines {
        if let Some(auth_part) = line.strip_prefix("AUTH ") {
            for (key, value) in key_values(auth_part) {
                match key {
                    "METHODS" => {
                        info.auth_methods = value.split(',').map(String::from).collect();
                    },
                    "COOKIEFILE" => info.cookie_file = Some(PathBuf::from(value)),
                    _ => {},
                }
            }
        } else if let Some(version_part) = line.strip_prefix("VERSION ") {
            for (key, value) in key_values(version_part) {
                if key == "Tor" {
                    info.tor_version = Some(value);
                }
            }
        }
    }

    info
}

/// Value of `key` in a `GETINFO` reply
pub fn getinfo_value(lines: &[String], key: &str) -> Option<String> {
    lines.iter().find_map(|line| {
        line.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix('='))
            .map(|value| value.trim_end().to_string())
    })
}

/// Parse an `ADD_ONION` reply
pub fn parse_add_onion(lines: &[String]) -> Result<EphemeralService, ChannelError> {
    let mut service = EphemeralService::default();

    for line in lines {
        if let Some(id) = line.strip_prefix("ServiceID=") {
            service.service_id = id.trim().to_string();
        } else if let Some(auth) = line.strip_prefix("ClientAuth=") {
            let (name, cookie) = auth.trim().split_once(':').ok_or_else(|| {
                ChannelError::Protocol(format!("malformed ClientAuth line: {}", line))
            })?;
            service
                .client_auth
                .insert(name.to_string(), cookie.to_string());
        }
    }

    if service.service_id.is_empty() {
        return Err(ChannelError::Protocol(
            "ADD_ONION response missing ServiceID".into(),
        ));
    }

    Ok(service)
}

/// Parse the value of `GETINFO onions/current`
pub fn parse_onion_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Escape a string for use inside a quoted control-protocol argument.
pub fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Split `KEY=value KEY="quoted value"` pairs. Bare words are skipped.
fn key_values(s: &str) -> Vec<(&str, String)> {
    let mut pairs = Vec::new();
    let mut rest = s.trim_start();

    while !rest.is_empty() {
        let word_end = rest.find(|c: char| c == ' ' || c == '=').unwrap_or(rest.len());
        let key = &rest[..word_end];
        rest = &rest[word_end..];

        if let Some(after_eq) = rest.strip_prefix('=') {
            let (value, remaining) = if let Some(quoted) = after_eq.strip_prefix('"') {
                take_quoted(quoted)
            } else {
                let end = after_eq.find(' ').unwrap_or(after_eq.len());
                (after_eq[..end].to_string(), &after_eq[end..])
            };
            pairs.push((key, value));
            rest = remaining;
        }

        rest = rest.trim_start();
    }

    pairs
}

/// Read a quoted string body (opening quote already consumed)
fn take_quoted(s: &str) -> (String, &str) {
    let mut value = String::new();
    let mut chars = s.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                if let Some((_, escaped)) = chars.next() {
                    value.push(escaped);
                }
            },
            '"' => return (value, &s[i + 1..]),
            _ => value.push(c),
        }
    }

    (value, "")
}
