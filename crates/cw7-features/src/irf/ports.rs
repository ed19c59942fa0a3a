//! IRF port bindings for one member.
//!
//! Rebinding is sequenced: every interface whose binding changes is shut
//! down first, the new port lists are written, newly bound interfaces are
//! brought back up, the configuration is saved and the ports are
//! optionally activated. Interfaces that end up unbound stay down.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{info, instrument};

use cw7_common::{
    files, CommandKind, EditOperation, Element, FeatureError, FieldValue, NcResult, Payload,
};
use cw7_session::Session;

use super::types::{check_member_id, IrfPort, PortBindings, PortChange, PortDeclaration};
use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};
use crate::interface::{self, InterfaceTable};
use crate::tables::{self, fields, IRF_PORTS};

/// CLI that activates pending IRF port configuration.
pub const ACTIVATE_COMMAND: &str = "irf-port-configuration active";

/// The IRF ports of one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrfPorts {
    member_id: u32,
}

impl IrfPorts {
    pub fn new(member_id: u32) -> Result<Self, FeatureError> {
        Ok(Self {
            member_id: check_member_id("member_id", member_id)?,
        })
    }

    pub fn member_id(&self) -> u32 {
        self.member_id
    }

    /// Interfaces bound to each port right now.
    pub async fn bindings(&self, session: &mut Session) -> NcResult<PortBindings> {
        let filter = tables::filter(
            IRF_PORTS,
            [Element::new("IRFPort")
                .with_child(Element::leaf(fields::MEMBER_ID, self.member_id))
                .with_child(Element::new(fields::PORT))
                .with_child(Element::new(fields::INTERFACES))],
        );
        let reply = session.get(&filter).await?;
        let member = self.member_id.to_string();

        let mut bindings = PortBindings::default();
        for row in tables::rows(&reply, IRF_PORTS) {
            if row.child_text(fields::MEMBER_ID) != Some(member.as_str()) {
                continue;
            }
            let Some(port) = row
                .child_text(fields::PORT)
                .and_then(|p| p.parse::<IrfPort>().ok())
            else {
                continue;
            };
            let bound = bindings.get_mut(port);
            for interface in row.find_all("Interfaces/Interface") {
                if let Some(name) = interface.child_text(fields::IF_NAME) {
                    bound.push(name.to_string());
                }
            }
        }
        Ok(bindings)
    }

    /// Stages the binding changes needed to reach `declared`.
    ///
    /// Fails before staging anything if an interface would be unbound
    /// without `removal_override`, or if a newly bound interface does not
    /// exist. Moving an interface between the two ports is not an unbind.
    #[instrument(skip(self, session, declared), fields(member = self.member_id))]
    pub async fn build(
        &self,
        session: &mut Session,
        declared: &PortDeclaration,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        let existing = self.bindings(session).await?;

        let changes: Vec<(IrfPort, &[String], PortChange)> = IrfPort::ALL
            .into_iter()
            .filter_map(|port| {
                let wanted = declared.get(port)?;
                let change = PortChange::between(existing.get(port), wanted);
                (!change.is_empty()).then_some((port, wanted, change))
            })
            .collect();
        if changes.is_empty() {
            return finish(session, "irf_ports", 0, stage).await;
        }

        let still_bound: BTreeSet<&String> = IrfPort::ALL
            .into_iter()
            .flat_map(|port| declared.get(port).unwrap_or(existing.get(port)))
            .collect();
        if !declared.removal_override {
            for (port, _, change) in &changes {
                let unbound: Vec<String> = change
                    .removed
                    .iter()
                    .filter(|name| !still_bound.contains(name))
                    .cloned()
                    .collect();
                if !unbound.is_empty() {
                    return Err(FeatureError::DangerousRemoval {
                        member_id: self.member_id,
                        port: port.number(),
                        interfaces: unbound,
                    }
                    .into());
                }
            }
        }

        let added: BTreeSet<String> = changes
            .iter()
            .flat_map(|(_, _, change)| change.added.iter().cloned())
            .collect();
        if !added.is_empty() {
            InterfaceTable::fetch(session).await?.require_all(&added)?;
        }

        let changing: BTreeSet<String> = changes
            .iter()
            .flat_map(|(_, _, change)| change.removed.union(&change.added).cloned())
            .collect();
        let changing: Vec<String> = changing.into_iter().collect();
        let added: Vec<String> = added.into_iter().collect();

        interface::stage_shutdown(session, &changing)?;
        let rows = changes
            .iter()
            .map(|(port, wanted, _)| self.port_row(*port, wanted));
        session.stage(tables::config(IRF_PORTS, rows), CommandKind::EditConfig)?;
        interface::stage_up(session, &added)?;
        session.stage(Payload::file(files::STARTUP_FILE), CommandKind::Save)?;
        let mut staged = if added.is_empty() { 3 } else { 4 };
        if declared.activate {
            session.stage(Payload::cli(ACTIVATE_COMMAND), CommandKind::CliConfig)?;
            staged += 1;
        }

        info!(
            changing = changing.len(),
            added = added.len(),
            activate = declared.activate,
            "IRF port binding changes staged"
        );
        finish(session, "irf_ports", staged, stage).await
    }

    /// Replaces the whole interface list of one port.
    fn port_row(&self, port: IrfPort, interfaces: &[String]) -> Element {
        let bound = interfaces.iter().map(|name| {
            Element::new(fields::INTERFACE).with_child(Element::leaf(fields::IF_NAME, name))
        });
        Element::new("IRFPort")
            .with_operation(EditOperation::Replace)
            .with_child(Element::leaf(fields::MEMBER_ID, self.member_id))
            .with_child(Element::leaf(fields::PORT, port.number()))
            .with_child(Element::new(fields::INTERFACES).with_children(bound))
    }
}

#[async_trait]
impl Feature for IrfPorts {
    fn name(&self) -> &'static str {
        "irf_ports"
    }

    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        let bindings = self.bindings(session).await?;
        Ok(IrfPort::ALL
            .into_iter()
            .map(|port| (port.as_str(), FieldValue::List(bindings.get(port).to_vec())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw7_common::ErrorKind;
    use cw7_test::{fixtures, MockDevice};
    use pretty_assertions::assert_eq;

    const A: &str = "Ten-GigabitEthernet1/0/49";
    const B: &str = "Ten-GigabitEthernet1/0/50";
    const C: &str = "Ten-GigabitEthernet1/0/51";

    fn device() -> MockDevice {
        MockDevice::new(
            fixtures::DeviceBuilder::new()
                .interface(fixtures::interface(A, 49))
                .interface(fixtures::interface(B, 50))
                .interface(fixtures::interface(C, 51))
                .irf_port(fixtures::irf_port(1, 1, &[A, B]))
                .irf_port(fixtures::irf_port(1, 2, &[])),
        )
    }

    #[tokio::test]
    async fn test_bindings() {
        let device = device();
        let mut session = device.session().await;
        let bindings = IrfPorts::new(1).unwrap().bindings(&mut session).await.unwrap();
        assert_eq!(bindings.irf_p1, vec![A, B]);
        assert!(bindings.irf_p2.is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_when_sets_match() {
        let device = device();
        let mut session = device.session().await;
        let declared = PortDeclaration::new().port1([B, A]).activate();
        let outcome = IrfPorts::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert!(outcome.is_unchanged());
    }

    #[tokio::test]
    async fn test_move_between_ports_is_not_removal() {
        let device = device();
        let mut session = device.session().await;
        let declared = PortDeclaration::new().port1([A]).port2([B]);
        let outcome = IrfPorts::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Staged(4));
        let rendered = session.stringify();
        assert_eq!(&rendered[..2], &[format!("interface {}", B), "shutdown".to_string()]);
    }

    #[tokio::test]
    async fn test_new_interface_must_exist() {
        let device = device();
        let mut session = device.session().await;
        let declared = PortDeclaration::new().port2(["FortyGigE1/0/53"]);
        let err = IrfPorts::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(session.staged().is_empty());
    }

    #[tokio::test]
    async fn test_activate_is_last() {
        let device = device();
        let mut session = device.session().await;
        let declared = PortDeclaration::new().port2([C]).activate();
        let outcome = IrfPorts::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Staged(5));
        let rendered = session.stringify();
        assert_eq!(rendered.last().map(String::as_str), Some(ACTIVATE_COMMAND));
    }

    #[tokio::test]
    async fn test_get_config_lists_both_ports() {
        let device = device();
        let mut session = device.session().await;
        let config = IrfPorts::new(1)
            .unwrap()
            .get_config(&mut session)
            .await
            .unwrap();
        assert_eq!(config["irf_p1"], FieldValue::from(vec![A, B]));
        assert_eq!(config["irf_p2"], FieldValue::List(vec![]));
    }
}
