//! Declarative feature modules for Comware switches.
//!
//! Every module reads the device's existing state, diffs it against the
//! declared state and stages only the difference into the session queue:
//!
//! - [`interface`]: admin state, description, MTU, speed, duplex, link mode
//! - [`vlan`]: VLAN creation, naming and removal
//! - [`irf`]: IRF member settings, renumbering and port bindings
//! - [`config_file`]: configuration replace with a safety checkpoint
//! - [`reboot`]: immediate or scheduled reboot
//!
//! Passing `stage = false` to a `build` call executes the session queue
//! right away; otherwise the caller commits when ready.

pub mod config_file;
pub mod feature;
pub mod interface;
pub mod irf;
pub mod reboot;
pub mod tables;
pub mod vlan;

pub use config_file::ConfigFile;
pub use feature::{BuildOutcome, Feature, NamedConfig};
pub use interface::{Interface, InterfaceConfig, InterfaceKey, InterfaceTable};
pub use irf::{IrfMember, IrfPort, IrfPorts, MemberConfig, MemberKey, PortDeclaration};
pub use reboot::Reboot;
pub use vlan::{get_vlan_list, Vlan, VlanConfig, VlanKey};
