//! onionport library crate
//!
//! Connects to Tor and publishes ephemeral onion services.
//!
//! # Modules
//!
//! - [`service`] - Onion service lifecycle ([`OnionManager`])
//! - [`strategy`] - Bundled, automatic and manual connection strategies
//! - [`process`] - Bundled Tor process supervision
//! - [`bootstrap`] - Bootstrap progress monitoring
//! - [`capability`] - Ephemeral/stealth capability probe
//! - [`tor`] - Control channel contract and control port client
//! - [`config`] - Settings loading and validation
//! - [`cli`] - Command-line interface (share, probe)

#![allow(clippy::doc_markdown)] // Doc formatting is secondary
#![allow(clippy::uninlined_format_args)] // Format string style preference
#![allow(clippy::module_name_repetitions)] // Names read better in full
#![allow(clippy::missing_errors_doc)] // Error taxonomy is documented on Error
#![allow(clippy::single_match_else)] // Match for clarity
#![allow(clippy::redundant_closure_for_method_calls)] // Explicit closures
#![allow(clippy::map_unwrap_or)] // map().unwrap_or is clearer

pub mod bootstrap;
pub mod capability;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod process;
pub mod service;
pub mod strategy;
pub mod tor;

pub use config::ConnectionConfig;
pub use error::{Error, ErrorKind, Feature, Result};
pub use service::{ManagerBuilder, OnionManager, OnionServiceRecord};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
