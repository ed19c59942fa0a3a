//! Type definitions for IRF fabric configuration

use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use cw7_common::FeatureError;

/// Valid IRF member identifiers
pub const MEMBER_ID_RANGE: RangeInclusive<u32> = 1..=10;

/// Valid IRF member priorities
pub const PRIORITY_RANGE: RangeInclusive<u32> = 1..=32;

/// Checks a member identifier against [`MEMBER_ID_RANGE`].
pub fn check_member_id(field: &str, id: u32) -> Result<u32, FeatureError> {
    if MEMBER_ID_RANGE.contains(&id) {
        Ok(id)
    } else {
        Err(FeatureError::invalid_value(
            field,
            id.to_string(),
            "expected an IRF member id between 1 and 10",
        ))
    }
}

/// One of the two logical IRF ports of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IrfPort {
    /// irf-port N/1
    One,
    /// irf-port N/2
    Two,
}

impl IrfPort {
    pub const ALL: [IrfPort; 2] = [IrfPort::One, IrfPort::Two];

    /// Port number on the wire
    pub fn number(&self) -> u8 {
        match self {
            IrfPort::One => 1,
            IrfPort::Two => 2,
        }
    }

    /// Caller-facing key
    pub fn as_str(&self) -> &'static str {
        match self {
            IrfPort::One => "irf_p1",
            IrfPort::Two => "irf_p2",
        }
    }
}

impl fmt::Display for IrfPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl FromStr for IrfPort {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "irf_p1" => Ok(IrfPort::One),
            "2" | "irf_p2" => Ok(IrfPort::Two),
            other => Err(FeatureError::invalid_value(
                "irf_port",
                other,
                "expected 1 or 2",
            )),
        }
    }
}

/// Interfaces currently bound to each IRF port of one member
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBindings {
    pub irf_p1: Vec<String>,
    pub irf_p2: Vec<String>,
}

impl PortBindings {
    pub fn get(&self, port: IrfPort) -> &[String] {
        match port {
            IrfPort::One => &self.irf_p1,
            IrfPort::Two => &self.irf_p2,
        }
    }

    pub fn get_mut(&mut self, port: IrfPort) -> &mut Vec<String> {
        match port {
            IrfPort::One => &mut self.irf_p1,
            IrfPort::Two => &mut self.irf_p2,
        }
    }
}

/// Declared IRF port bindings
///
/// `None` leaves a port untouched; `Some(vec![])` unbinds everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDeclaration {
    pub irf_p1: Option<Vec<String>>,
    pub irf_p2: Option<Vec<String>>,
    /// Allow interfaces to be unbound
    #[serde(default)]
    pub removal_override: bool,
    /// Stage `irf-port-configuration active` after the bindings
    #[serde(default)]
    pub activate: bool,
}

impl PortDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port1<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.irf_p1 = Some(interfaces.into_iter().map(Into::into).collect());
        self
    }

    pub fn port2<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.irf_p2 = Some(interfaces.into_iter().map(Into::into).collect());
        self
    }

    pub fn allow_removal(mut self) -> Self {
        self.removal_override = true;
        self
    }

    pub fn activate(mut self) -> Self {
        self.activate = true;
        self
    }

    pub fn get(&self, port: IrfPort) -> Option<&[String]> {
        match port {
            IrfPort::One => self.irf_p1.as_deref(),
            IrfPort::Two => self.irf_p2.as_deref(),
        }
    }
}

/// Binding change for one port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortChange {
    /// Bound now, absent from the declaration
    pub removed: BTreeSet<String>,
    /// Declared, not bound now
    pub added: BTreeSet<String>,
}

impl PortChange {
    pub fn between(existing: &[String], declared: &[String]) -> Self {
        let existing: BTreeSet<&String> = existing.iter().collect();
        let declared: BTreeSet<&String> = declared.iter().collect();
        Self {
            removed: existing.difference(&declared).map(|s| s.to_string()).collect(),
            added: declared.difference(&existing).map(|s| s.to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irf_port_from_str() {
        assert_eq!("1".parse::<IrfPort>().unwrap(), IrfPort::One);
        assert_eq!("irf_p2".parse::<IrfPort>().unwrap(), IrfPort::Two);
        assert!("3".parse::<IrfPort>().is_err());
        assert_eq!(IrfPort::Two.to_string(), "2");
    }

    #[test]
    fn test_member_id_range() {
        assert!(check_member_id("member_id", 0).is_err());
        assert!(check_member_id("member_id", 11).is_err());
        assert_eq!(check_member_id("member_id", 10).unwrap(), 10);
    }

    #[test]
    fn test_port_change_is_set_based() {
        let existing = vec!["A".to_string(), "B".to_string()];
        let change = PortChange::between(&existing, &["B".to_string(), "A".to_string()]);
        assert!(change.is_empty());

        let change = PortChange::between(&existing, &["A".to_string(), "C".to_string()]);
        assert_eq!(change.removed, BTreeSet::from(["B".to_string()]));
        assert_eq!(change.added, BTreeSet::from(["C".to_string()]));
    }

    #[test]
    fn test_declaration_absent_vs_empty() {
        let declared = PortDeclaration::new().port1(Vec::<String>::new());
        assert_eq!(declared.get(IrfPort::One), Some(&[][..]));
        assert_eq!(declared.get(IrfPort::Two), None);
    }
}
