//! Device data fixtures
//!
//! Builders for the running-configuration trees the mock device serves.

use cw7_common::{ns, Element};

/// Builds a `<top>` data tree from table rows
#[derive(Debug, Clone, Default)]
pub struct DeviceBuilder {
    interfaces: Vec<Element>,
    vlans: Vec<Element>,
    irf_members: Vec<Element>,
    irf_ports: Vec<Element>,
    irf_domain: Option<u32>,
    mad_excludes: Vec<u32>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an `Ifmgr/Interfaces/Interface` row
    pub fn interface(mut self, row: Element) -> Self {
        self.interfaces.push(row);
        self
    }

    /// Adds a `VLAN/VLANs/VLAN` row
    pub fn vlan(mut self, row: Element) -> Self {
        self.vlans.push(row);
        self
    }

    /// Adds an `IRF/Members/Member` row
    pub fn irf_member(mut self, row: Element) -> Self {
        self.irf_members.push(row);
        self
    }

    /// Adds an `IRF/IRFPorts/IRFPort` row
    pub fn irf_port(mut self, row: Element) -> Self {
        self.irf_ports.push(row);
        self
    }

    pub fn irf_domain(mut self, domain: u32) -> Self {
        self.irf_domain = Some(domain);
        self
    }

    /// Excludes the interface with `if_index` from MAD
    pub fn mad_exclude(mut self, if_index: u32) -> Self {
        self.mad_excludes.push(if_index);
        self
    }

    pub fn build(self) -> Element {
        let mut irf = Element::new("IRF")
            .with_child(Element::new("Members").with_children(self.irf_members))
            .with_child(Element::new("IRFPorts").with_children(self.irf_ports));
        if let Some(domain) = self.irf_domain {
            irf.push(Element::new("Configuration").with_child(Element::leaf("DomainID", domain)));
        }
        let excludes = self
            .mad_excludes
            .into_iter()
            .map(|index| Element::new("Interface").with_child(Element::leaf("IfIndex", index)));

        Element::top(ns::DATA)
            .with_child(
                Element::new("Ifmgr").with_child(Element::new("Interfaces").with_children(self.interfaces)),
            )
            .with_child(Element::new("VLAN").with_child(Element::new("VLANs").with_children(self.vlans)))
            .with_child(irf)
            .with_child(
                Element::new("MAD").with_child(Element::new("ExcludeInterfaces").with_children(excludes)),
            )
    }
}

impl From<DeviceBuilder> for Element {
    fn from(builder: DeviceBuilder) -> Self {
        builder.build()
    }
}

/// Interface row with index and name
pub fn interface(name: &str, if_index: u32) -> Element {
    Element::new("Interface")
        .with_child(Element::leaf("IfIndex", if_index))
        .with_child(Element::leaf("Name", name))
}

/// VLAN row with id and name
pub fn vlan(id: u16, name: &str) -> Element {
    Element::new("VLAN")
        .with_child(Element::leaf("ID", id))
        .with_child(Element::leaf("Name", name))
}

/// IRF member row with priority
pub fn irf_member(member_id: u32, priority: u32) -> Element {
    Element::new("Member")
        .with_child(Element::leaf("MemberID", member_id))
        .with_child(Element::leaf("Priority", priority))
}

/// IRF port row binding `interfaces`; an empty slice is an unbound port
pub fn irf_port(member_id: u32, port: u8, interfaces: &[&str]) -> Element {
    let bound = interfaces.iter().map(|name| {
        Element::new("Interface").with_child(Element::leaf("IfName", name))
    });
    Element::new("IRFPort")
        .with_child(Element::leaf("MemberID", member_id))
        .with_child(Element::leaf("Port", port))
        .with_child(Element::new("Interfaces").with_children(bound))
}

/// Two-member fabric: each member has two 10G uplinks bound to port 1.
pub fn two_member_fabric() -> DeviceBuilder {
    let mut builder = DeviceBuilder::new().irf_domain(10);
    for member in 1..=2u32 {
        let first = format!("Ten-GigabitEthernet{}/0/49", member);
        let second = format!("Ten-GigabitEthernet{}/0/50", member);
        let base = member * 100;
        builder = builder
            .interface(interface(&first, base + 49))
            .interface(interface(&second, base + 50))
            .interface(interface(&format!("Ten-GigabitEthernet{}/0/51", member), base + 51))
            .irf_member(irf_member(member, 33 - member))
            .irf_port(irf_port(member, 1, &[first.as_str(), second.as_str()]))
            .irf_port(irf_port(member, 2, &[]));
    }
    builder
}
