//! Common building blocks for Comware NETCONF automation.
//!
//! - [`command`]: the staged command model (kind + payload)
//! - [`element`]: structured configuration trees and their XML rendering
//! - [`error`]: the error taxonomy shared by sessions and features
//! - [`fields`]: typed key/value translation tables and the delta rule
//!
//! # Reconciliation
//!
//! Feature modules follow one contract:
//!
//! 1. Query existing state and translate it with a [`FieldKey`] table
//! 2. Compute `declared.delta(&existing)`
//! 3. Translate only the delta into staged commands
//!
//! ```
//! use cw7_common::{Element, FieldKey, FieldMap, ValueCodec};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
//! enum Key { Admin }
//!
//! static ADMIN: ValueCodec = ValueCodec::new(&[("1", "up"), ("2", "down")]);
//!
//! impl FieldKey for Key {
//!     const ALL: &'static [Self] = &[Key::Admin];
//!     fn tag(self) -> &'static str { "AdminStatus" }
//!     fn name(self) -> &'static str { "admin" }
//!     fn codec(self) -> Option<&'static ValueCodec> { Some(&ADMIN) }
//! }
//!
//! let existing = FieldMap::<Key>::from_element(
//!     &Element::new("Interface").with_child(Element::leaf("AdminStatus", 1)),
//! );
//! let declared = FieldMap::new().with(Key::Admin, "up");
//! assert!(declared.delta(&existing).is_empty());
//! ```

pub mod command;
pub mod element;
pub mod error;
pub mod fields;

pub use command::{CommandKind, Payload, StagedCommand};
pub use element::{ns, EditOperation, Element};
pub use error::{ErrorKind, FeatureError, NcError, NcResult, RpcError, TransportError};
pub use fields::{FieldKey, FieldMap, FieldValue, ValueCodec};

/// Device file names that operators and rollback recovery depend on.
pub mod files {
    /// Safety backup written before any risky replace.
    pub const SAFETY_FILE: &str = "flash:/safety_file.cfg";
    /// Active startup configuration.
    pub const STARTUP_FILE: &str = "flash:/startup.cfg";
}
