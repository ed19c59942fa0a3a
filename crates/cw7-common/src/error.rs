//! Error types for NETCONF session, staging and feature operations.
//!
//! Two layers exist:
//!
//! - [`TransportError`] is what the external NETCONF/SSH transport reports.
//!   It never escapes the session.
//! - [`NcError`] is what every session primitive, the execution engine and
//!   the feature modules return. Callers branch on [`NcError::kind`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::command::CommandKind;

/// Result type alias for session and feature operations.
pub type NcResult<T> = Result<T, NcError>;

/// Structured `<rpc-error>` details returned by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    /// The `error-tag` (e.g. `lock-denied`, `invalid-value`).
    pub tag: String,
    /// The human readable `error-message`.
    pub message: String,
    /// The offending element from `error-info/bad-element`, if any.
    pub bad_element: Option<String>,
}

impl RpcError {
    /// Creates an rpc error without a bad element.
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
            bad_element: None,
        }
    }

    /// Attaches the offending element name.
    pub fn with_bad_element(mut self, element: impl Into<String>) -> Self {
        self.bad_element = Some(element.into());
        self
    }

    /// Returns true if the device refused a lock because another session holds it.
    pub fn is_lock_denied(&self) -> bool {
        matches!(self.tag.as_str(), "lock-denied" | "in-use" | "resource-denied")
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.message)?;
        if let Some(bad) = &self.bad_element {
            write!(f, " (bad element: {})", bad)?;
        }
        Ok(())
    }
}

/// Errors surfaced by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The device answered with an `<rpc-error>`.
    #[error("rpc error {0}")]
    Rpc(RpcError),

    /// The transport gave up waiting for a reply.
    #[error("rpc timed out")]
    Timeout,

    /// The underlying SSH channel is gone.
    #[error("transport disconnected")]
    Disconnected,

    /// Credentials were rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// SSH or NETCONF hello exchange failed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// DNS lookup of the device failed.
    #[error("could not resolve host {0}")]
    UnresolvedHost(String),

    /// Anything the transport could not classify.
    #[error("{0}")]
    Other(String),
}

/// Feature precondition violations.
///
/// These are raised before anything is staged, so a failing precondition
/// never leaves partial configuration on the device.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// A referenced interface does not exist on the device.
    #[error("interface '{name}' does not exist on the device")]
    InterfaceNotFound {
        /// Interface name as given by the caller.
        name: String,
    },

    /// A referenced VLAN does not exist on the device.
    #[error("VLAN {vlan} does not exist on the device")]
    VlanNotFound {
        /// VLAN identifier.
        vlan: u16,
    },

    /// Interfaces would be unbound from an IRF port without an override.
    #[error(
        "removing {interfaces:?} from member {member_id} irf-port {port} may split the fabric; \
         pass the removal override to proceed"
    )]
    DangerousRemoval {
        /// IRF member identifier.
        member_id: u32,
        /// IRF port number (1 or 2).
        port: u8,
        /// Interfaces that would be unbound.
        interfaces: Vec<String>,
    },

    /// A non-idempotent action was requested without confirmation.
    #[error("{action} requires explicit confirmation")]
    ConfirmationRequired {
        /// The action that was refused.
        action: String,
    },

    /// A declared value is outside the accepted set or range.
    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        /// Caller-side key.
        field: String,
        /// Offending value.
        value: String,
        /// Why it was refused.
        reason: String,
    },

    /// A declared key is not known to the feature.
    #[error("{feature} has no parameter named '{key}'")]
    UnknownKey {
        /// Feature name.
        feature: String,
        /// Offending key.
        key: String,
    },
}

impl FeatureError {
    /// Creates an invalid value error.
    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates an interface not found error.
    pub fn interface_not_found(name: impl Into<String>) -> Self {
        Self::InterfaceNotFound { name: name.into() }
    }

    /// Creates a confirmation required error.
    pub fn confirmation_required(action: impl Into<String>) -> Self {
        Self::ConfirmationRequired {
            action: action.into(),
        }
    }
}

/// Errors returned by sessions, the staging queue and feature modules.
#[derive(Debug, Error)]
pub enum NcError {
    /// Credentials were rejected while opening the session.
    #[error("authentication to {host} failed: {message}")]
    Authentication {
        /// Device host.
        host: String,
        /// Transport detail.
        message: String,
    },

    /// SSH or NETCONF handshake failed while opening the session.
    #[error("handshake with {host} failed: {message}")]
    Handshake {
        /// Device host.
        host: String,
        /// Transport detail.
        message: String,
    },

    /// The device host name could not be resolved.
    #[error("could not resolve host {host}")]
    UnresolvedHost {
        /// Device host.
        host: String,
    },

    /// Connecting failed for an unclassified reason.
    #[error("could not connect to {host}: {message}")]
    Connection {
        /// Device host.
        host: String,
        /// Transport detail.
        message: String,
    },

    /// The device answered an operation with an `<rpc-error>`.
    #[error("{operation} failed with {tag}: {message}")]
    Rpc {
        /// The primitive that failed (e.g. `edit-config`).
        operation: String,
        /// The `error-tag`.
        tag: String,
        /// The `error-message`.
        message: String,
        /// The offending element, if the device named one.
        bad_element: Option<String>,
    },

    /// No reply arrived within the configured per-RPC timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The primitive that timed out.
        operation: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// Another session holds the datastore lock.
    #[error("{target} datastore is locked by another session: {message}")]
    LockConflict {
        /// Locked datastore.
        target: String,
        /// Device message.
        message: String,
    },

    /// The datastore lock could not be released.
    #[error("could not release {target} datastore lock: {message}")]
    UnlockConflict {
        /// Datastore.
        target: String,
        /// Device message.
        message: String,
    },

    /// An operation was attempted on a session with no live transport.
    #[error("session is closed")]
    Closed,

    /// A staged command named a kind outside the fixed enumeration.
    #[error("unknown command kind '{kind}'")]
    UnknownCommandKind {
        /// The rejected kind.
        kind: String,
    },

    /// A staged payload cannot be dispatched by its kind.
    #[error("{kind} cannot carry a {payload} payload")]
    PayloadMismatch {
        /// Command kind.
        kind: CommandKind,
        /// Payload description.
        payload: &'static str,
    },

    /// A feature precondition failed before anything was staged.
    #[error(transparent)]
    Precondition(#[from] FeatureError),

    /// A staged batch stopped at `index`; earlier entries stay applied.
    #[error("staged command {index} ({kind}) failed after {applied} applied: {source}")]
    Batch {
        /// Zero based position of the failing entry.
        index: usize,
        /// Kind of the failing entry.
        kind: CommandKind,
        /// Entries that completed before the failure.
        applied: usize,
        /// The underlying failure.
        #[source]
        source: Box<NcError>,
    },

    /// Session configuration is invalid or unreadable.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

/// Flat classification of [`NcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Handshake,
    UnresolvedHost,
    Connection,
    Rpc,
    Timeout,
    LockConflict,
    UnlockConflict,
    Closed,
    InvalidCommand,
    Precondition,
    Config,
}

impl ErrorKind {
    /// Returns true for failures that mean the device stopped answering.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::Closed)
    }

    /// Returns true for failures raised while opening a session.
    pub fn is_connect(&self) -> bool {
        matches!(
            self,
            ErrorKind::Authentication
                | ErrorKind::Handshake
                | ErrorKind::UnresolvedHost
                | ErrorKind::Connection
        )
    }
}

impl NcError {
    /// Creates an rpc error for `operation` from device error details.
    pub fn rpc(operation: impl Into<String>, error: RpcError) -> Self {
        Self::Rpc {
            operation: operation.into(),
            tag: error.tag,
            message: error.message,
            bad_element: error.bad_element,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Translates a transport failure raised while connecting to `host`.
    pub fn from_connect(host: &str, error: TransportError) -> Self {
        let host = host.to_string();
        match error {
            TransportError::Authentication(message) => Self::Authentication { host, message },
            TransportError::Handshake(message) => Self::Handshake { host, message },
            TransportError::UnresolvedHost(_) => Self::UnresolvedHost { host },
            other => Self::Connection {
                host,
                message: other.to_string(),
            },
        }
    }

    /// Returns the classification, looking through batch wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NcError::Authentication { .. } => ErrorKind::Authentication,
            NcError::Handshake { .. } => ErrorKind::Handshake,
            NcError::UnresolvedHost { .. } => ErrorKind::UnresolvedHost,
            NcError::Connection { .. } => ErrorKind::Connection,
            NcError::Rpc { .. } => ErrorKind::Rpc,
            NcError::Timeout { .. } => ErrorKind::Timeout,
            NcError::LockConflict { .. } => ErrorKind::LockConflict,
            NcError::UnlockConflict { .. } => ErrorKind::UnlockConflict,
            NcError::Closed => ErrorKind::Closed,
            NcError::UnknownCommandKind { .. } | NcError::PayloadMismatch { .. } => {
                ErrorKind::InvalidCommand
            }
            NcError::Precondition(_) => ErrorKind::Precondition,
            NcError::Batch { source, .. } => source.kind(),
            NcError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Returns the innermost error, unwrapping batch context.
    pub fn root(&self) -> &NcError {
        match self {
            NcError::Batch { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the feature precondition, if that is what failed.
    pub fn precondition(&self) -> Option<&FeatureError> {
        match self.root() {
            NcError::Precondition(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true if an explicit caller retry may succeed.
    ///
    /// Nothing in this workspace retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::LockConflict | ErrorKind::Timeout)
    }
}
