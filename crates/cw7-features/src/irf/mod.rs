//! IRF fabric configuration: member identity and port bindings.

pub mod member;
pub mod ports;
pub mod types;

pub use member::{IrfMember, MemberConfig, MemberKey};
pub use ports::{IrfPorts, ACTIVATE_COMMAND};
pub use types::{
    check_member_id, IrfPort, PortBindings, PortChange, PortDeclaration, MEMBER_ID_RANGE,
    PRIORITY_RANGE,
};
