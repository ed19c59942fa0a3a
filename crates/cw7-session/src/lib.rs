//! NETCONF session layer for Comware switches.
//!
//! A [`Session`] owns one transport connection. Feature modules stage
//! commands into its [`StagingQueue`]; [`Session::execute_all`] drains the
//! queue in order, and [`Session::commit`] offers the dry-run surface.
//!
//! The NETCONF/SSH transport itself is external and plugs in through the
//! [`Connector`] and [`Transport`] traits.

pub mod config;
pub mod engine;
pub mod logging;
pub mod response;
pub mod session;
pub mod staging;
pub mod transport;

pub use config::{DeviceConfig, LogConfig, SessionConfig};
pub use engine::{Commit, ExecReport};
pub use session::{Reply, Session};
pub use staging::{StagingQueue, REBOOT_COMMAND};
pub use transport::{ConnectParams, Connector, Datastore, Transport, TransportResult};
