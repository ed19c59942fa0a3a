//! Test infrastructure for cw7 sessions and feature modules
//!
//! Provides:
//! - An in-memory device that speaks the transport traits
//! - Fixtures for interface, VLAN and IRF data trees
//! - Call-log verification helpers

pub mod fixtures;
mod mock;
mod verification;

pub use fixtures::DeviceBuilder;
pub use mock::{Call, MockConnector, MockDevice, MockTransport, MOCK_TIMEOUT};
pub use verification::*;
