//! Parser for `status/bootstrap-phase` replies
//!
//! Tor reports bootstrap progress as
//! `NOTICE BOOTSTRAP PROGRESS=85 TAG=ap_conn_done SUMMARY="Connected to a relay"`.
//! Values may be quoted with C-style escapes; keys other than PROGRESS,
//! TAG and SUMMARY are ignored.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPhase {
    pub severity: String,
    pub progress: u8,
    pub tag: Option<String>,
    pub summary: String,
}

impl BootstrapPhase {
    pub fn is_done(&self) -> bool {
        self.summary == "Done"
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("not a BOOTSTRAP status line")]
    NotBootstrap,
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid PROGRESS value {0:?}")]
    InvalidProgress(String),
    #[error("unterminated quoted value")]
    Unterminated,
}

pub fn parse(reply: &str) -> Result<BootstrapPhase, PhaseError> {
    let tokens = tokenize(reply.trim())?;
    let mut tokens = tokens.into_iter();

    let severity = tokens.next().ok_or(PhaseError::NotBootstrap)?;
    if tokens.next().as_deref() != Some("BOOTSTRAP") {
        return Err(PhaseError::NotBootstrap);
    }

    let mut progress = None;
    let mut tag = None;
    let mut summary = None;

    for token in tokens {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "PROGRESS" => progress = Some(parse_progress(value)?),
            "TAG" => tag = Some(value.to_string()),
            "SUMMARY" => summary = Some(value.to_string()),
            _ => {}
        }
    }

    Ok(BootstrapPhase {
        severity,
        progress: progress.ok_or(PhaseError::Missing("PROGRESS"))?,
        tag,
        summary: summary.ok_or(PhaseError::Missing("SUMMARY"))?,
    })
}

fn parse_progress(value: &str) -> Result<u8, PhaseError> {
    value
        .parse::<u8>()
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| PhaseError::InvalidProgress(value.to_string()))
}

/// Split on whitespace, keeping quoted runs together and unquoting them
fn tokenize(line: &str) -> Result<Vec<String>, PhaseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('n') => current.push('\n'),
                        Some('t') => current.push('\t'),
                        Some(other) => current.push(other),
                        None => return Err(PhaseError::Unterminated),
                    },
                    Some(other) => current.push(other),
                    None => return Err(PhaseError::Unterminated),
                }
            },
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}
