//! Boundary to the external NETCONF-over-SSH transport.
//!
//! Framing, XML parsing and SSH live behind these traits. The session only
//! sees [`Element`] trees and [`TransportError`]s.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use cw7_common::{Element, TransportError};

/// Result type for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

/// NETCONF configuration datastores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datastore {
    #[default]
    Running,
    Candidate,
    Startup,
}

impl Datastore {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datastore::Running => "running",
            Datastore::Candidate => "candidate",
            Datastore::Startup => "startup",
        }
    }
}

impl fmt::Display for Datastore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a connector needs to open one session.
#[derive(Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
    pub hostkey_verify: bool,
    pub allow_agent: bool,
    pub look_for_keys: bool,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("hostkey_verify", &self.hostkey_verify)
            .field("allow_agent", &self.allow_agent)
            .field("look_for_keys", &self.look_for_keys)
            .finish()
    }
}

/// One live NETCONF connection.
///
/// `cli_config` and `cli_display` tunnel raw command text through the
/// vendor `<CLI>` RPC and return the reply envelope unchanged; the session
/// extracts the text.
#[async_trait]
pub trait Transport: Send {
    async fn get(&mut self, filter: &Element) -> TransportResult<Element>;

    async fn edit_config(&mut self, target: Datastore, config: &Element)
        -> TransportResult<Element>;

    async fn action(&mut self, action: &Element) -> TransportResult<Element>;

    async fn cli_config(&mut self, commands: &str) -> TransportResult<Element>;

    async fn cli_display(&mut self, commands: &str) -> TransportResult<Element>;

    /// Saves the running configuration to `filename`.
    async fn save(&mut self, filename: &str) -> TransportResult<Element>;

    /// Rolls the running configuration back to `filename`.
    async fn rollback(&mut self, filename: &str) -> TransportResult<Element>;

    async fn lock(&mut self, target: Datastore) -> TransportResult<()>;

    async fn unlock(&mut self, target: Datastore) -> TransportResult<()>;

    /// Sends `<close-session>` and tears the channel down.
    async fn close(&mut self) -> TransportResult<()>;
}

/// Opens transports.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, params: &ConnectParams) -> TransportResult<Box<dyn Transport>>;
}
