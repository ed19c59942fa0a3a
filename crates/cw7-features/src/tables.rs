//! Schema paths and tree helpers for the Comware data model

use cw7_common::{ns, Element};

/// Interface table rows
pub const IFMGR_INTERFACES: &str = "Ifmgr/Interfaces/Interface";

/// VLAN table rows
pub const VLAN_VLANS: &str = "VLAN/VLANs/VLAN";

/// IRF member rows
pub const IRF_MEMBERS: &str = "IRF/Members/Member";

/// IRF port binding rows
pub const IRF_PORTS: &str = "IRF/IRFPorts/IRFPort";

/// IRF global configuration
pub const IRF_CONFIGURATION: &str = "IRF/Configuration";

/// MAD-exclude interface rows
pub const MAD_EXCLUDES: &str = "MAD/ExcludeInterfaces/Interface";

/// Device tags shared across features
pub mod fields {
    /// Interface index
    pub const IF_INDEX: &str = "IfIndex";

    /// Full interface name
    pub const NAME: &str = "Name";

    /// Interface name in IRF port lists
    pub const IF_NAME: &str = "IfName";

    /// VLAN identifier
    pub const VLAN_ID: &str = "ID";

    /// IRF member identifier
    pub const MEMBER_ID: &str = "MemberID";

    /// Renumbered IRF member identifier
    pub const NEW_MEMBER_ID: &str = "NewMemberID";

    /// IRF port number (1 or 2)
    pub const PORT: &str = "Port";

    /// IRF domain
    pub const DOMAIN_ID: &str = "DomainID";

    /// Container of interfaces bound to an IRF port
    pub const INTERFACES: &str = "Interfaces";

    /// One bound interface
    pub const INTERFACE: &str = "Interface";
}

/// Wraps `rows` in the containers of `path` below a `<top>` in `namespace`.
///
/// The last step of `path` names the rows themselves and is not created.
pub fn wrap(namespace: &str, path: &str, rows: impl IntoIterator<Item = Element>) -> Element {
    let containers: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let parents = &containers[..containers.len().saturating_sub(1)];
    let mut nodes: Vec<Element> = parents.iter().map(|name| Element::new(*name)).collect();
    let mut current = match nodes.pop() {
        Some(last) => last.with_children(rows),
        None => return Element::top(namespace).with_children(rows),
    };
    while let Some(parent) = nodes.pop() {
        current = parent.with_child(current);
    }
    Element::top(namespace).with_child(current)
}

/// Get filter selecting `rows` of `path`.
pub fn filter(path: &str, rows: impl IntoIterator<Item = Element>) -> Element {
    wrap(ns::DATA, path, rows)
}

/// Edit-config body carrying `rows` of `path`.
pub fn config(path: &str, rows: impl IntoIterator<Item = Element>) -> Element {
    wrap(ns::CONFIG, path, rows)
}

/// Rows of `path` in a get reply, wherever the reply puts its `<top>`.
pub fn rows<'a>(reply: &'a Element, path: &str) -> Vec<&'a Element> {
    let top = if reply.local_name() == "top" {
        Some(reply)
    } else {
        reply.descendant("top")
    };
    top.map(|top| top.find_all(path)).unwrap_or_default()
}

/// Finds the row of `path` whose `key` leaf equals `value`.
pub fn find_row<'a>(reply: &'a Element, path: &str, key: &str, value: &str) -> Option<&'a Element> {
    rows(reply, path)
        .into_iter()
        .find(|row| row.child_text(key) == Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_builds_containers() {
        let tree = config(VLAN_VLANS, [Element::new("VLAN").with_child(Element::leaf("ID", 5))]);
        assert_eq!(
            tree.to_xml(),
            format!(
                "<top xmlns=\"{}\" xmlns:xc=\"{}\"><VLAN><VLANs><VLAN><ID>5</ID></VLAN></VLANs></VLAN></top>",
                ns::CONFIG,
                ns::NETCONF_BASE
            )
        );
    }

    #[test]
    fn test_rows_from_reply() {
        let reply = Element::new("data").with_child(filter(
            VLAN_VLANS,
            [
                Element::new("VLAN").with_child(Element::leaf("ID", 1)),
                Element::new("VLAN").with_child(Element::leaf("ID", 10)),
            ],
        ));
        assert_eq!(rows(&reply, VLAN_VLANS).len(), 2);
        assert!(find_row(&reply, VLAN_VLANS, fields::VLAN_ID, "10").is_some());
        assert!(find_row(&reply, VLAN_VLANS, fields::VLAN_ID, "20").is_none());
        assert!(rows(&Element::new("data"), VLAN_VLANS).is_empty());
    }
}
