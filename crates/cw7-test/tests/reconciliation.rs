//! Declarative features against a mock device
//!
//! Checks that features stage only what differs, converge after one apply,
//! and refuse unsafe IRF rebinding before touching the device.

use cw7_common::{ErrorKind, FeatureError, FieldValue};
use cw7_features::irf::ACTIVATE_COMMAND;
use cw7_features::{
    BuildOutcome, Feature, Interface, InterfaceConfig, InterfaceKey, IrfPorts, PortDeclaration,
    Vlan, VlanConfig, VlanKey,
};
use cw7_test::{assert_call_order, assert_locks_balanced, fixtures, Call, CallVerifier, MockDevice};
use pretty_assertions::assert_eq;

const M1_A: &str = "Ten-GigabitEthernet1/0/49";
const M1_B: &str = "Ten-GigabitEthernet1/0/50";
const M1_C: &str = "Ten-GigabitEthernet1/0/51";

fn fabric() -> MockDevice {
    MockDevice::new(fixtures::two_member_fabric())
}

#[tokio::test]
async fn test_interface_converges_after_one_apply() {
    let device = MockDevice::new(fixtures::DeviceBuilder::new().interface(
        fixtures::interface(M1_A, 49).with_child(cw7_common::Element::leaf("AdminStatus", 1)),
    ));
    let mut session = device.session().await;
    let interface = Interface::new(M1_A);
    let declared = InterfaceConfig::new()
        .with(InterfaceKey::Admin, "down")
        .with(InterfaceKey::Description, "to core");

    let outcome = interface.build(&mut session, &declared, false).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Applied(_)));

    device.clear_calls();
    let outcome = interface.build(&mut session, &declared, true).await.unwrap();
    assert_eq!(outcome, BuildOutcome::Unchanged);
    CallVerifier::new(device.calls())
        .assert_not_called("edit-config")
        .unwrap();

    let config = interface.get_config(&mut session).await.unwrap();
    assert_eq!(config["admin"], FieldValue::from("down"));
    assert_eq!(config["description"], FieldValue::from("to core"));
}

#[tokio::test]
async fn test_undeclared_keys_are_never_asserted() {
    let device = MockDevice::new(fixtures::DeviceBuilder::new().vlan(
        fixtures::vlan(10, "users").with_child(cw7_common::Element::leaf("Description", "keep me")),
    ));
    let mut session = device.session().await;
    let declared = VlanConfig::new().with(VlanKey::Name, "staff");

    Vlan::new(10)
        .unwrap()
        .build(&mut session, &declared, false)
        .await
        .unwrap();

    let config = Vlan::new(10).unwrap().get_config(&mut session).await.unwrap();
    assert_eq!(config["name"], FieldValue::from("staff"));
    assert_eq!(config["description"], FieldValue::from("keep me"));
}

#[tokio::test]
async fn test_features_share_one_batch() {
    let device = fabric();
    let mut session = device.session().await;

    Vlan::new(30)
        .unwrap()
        .build(&mut session, &VlanConfig::new().with(VlanKey::Name, "mgmt"), true)
        .await
        .unwrap();
    Interface::new(M1_C)
        .build(
            &mut session,
            &InterfaceConfig::new().with(InterfaceKey::Description, "spare"),
            true,
        )
        .await
        .unwrap();
    assert_eq!(session.staged().len(), 2);

    device.clear_calls();
    let report = session
        .execute_all(cw7_session::Datastore::Running)
        .await
        .unwrap();
    assert_eq!(report.applied(), 2);

    let calls = device.calls();
    assert_locks_balanced(&calls);
    let edits: Vec<String> = calls
        .iter()
        .filter_map(|call| match call {
            Call::EditConfig(_, tree) => Some(tree.to_xml()),
            _ => None,
        })
        .collect();
    assert_eq!(edits.len(), 2);
    assert!(edits[0].contains("<Name>mgmt</Name>"));
    assert!(edits[1].contains("<Description>spare</Description>"));
}

#[tokio::test]
async fn test_unbinding_requires_override() {
    let device = fabric();
    let mut session = device.session().await;
    let ports = IrfPorts::new(1).unwrap();
    let declared = PortDeclaration::new().port1([M1_A]);

    device.clear_calls();
    let err = ports.build(&mut session, &declared, false).await.unwrap_err();
    assert_eq!(
        err.precondition(),
        Some(&FeatureError::DangerousRemoval {
            member_id: 1,
            port: 1,
            interfaces: vec![M1_B.to_string()],
        })
    );
    assert!(session.staged().is_empty());
    CallVerifier::new(device.calls())
        .assert_not_called("edit-config")
        .unwrap();

    device.clear_calls();
    let outcome = ports
        .build(&mut session, &declared.clone().allow_removal(), false)
        .await
        .unwrap();
    assert!(matches!(outcome, BuildOutcome::Applied(_)));

    let calls = device.calls();
    let edit = calls
        .iter()
        .find(|call| matches!(call, Call::EditConfig(..)))
        .cloned()
        .unwrap();
    assert_call_order(
        &calls,
        &[Call::CliConfig(format!("interface {}\nshutdown", M1_B)), edit],
    );
    assert!(!calls.contains(&Call::CliConfig(format!("interface {}\nundo shutdown", M1_B))));
    CallVerifier::new(calls).assert_count("cli-config", 1).unwrap();

    let bindings = ports.bindings(&mut session).await.unwrap();
    assert_eq!(bindings.irf_p1, vec![M1_A]);
}

#[tokio::test]
async fn test_rebinding_is_sequenced() {
    let device = fabric();
    let mut session = device.session().await;
    let ports = IrfPorts::new(1).unwrap();
    let declared = PortDeclaration::new()
        .port1([M1_A, M1_B])
        .port2([M1_C])
        .activate();

    let outcome = ports.build(&mut session, &declared, true).await.unwrap();
    assert_eq!(outcome, BuildOutcome::Staged(5));

    device.clear_calls();
    session
        .execute_all(cw7_session::Datastore::Running)
        .await
        .unwrap();
    let calls = device.calls();
    let shutdown = Call::CliConfig(format!("interface {}\nshutdown", M1_C));
    let undo = Call::CliConfig(format!("interface {}\nundo shutdown", M1_C));
    let edit = calls
        .iter()
        .find(|call| matches!(call, Call::EditConfig(..)))
        .cloned()
        .unwrap();
    assert_call_order(
        &calls,
        &[
            shutdown,
            edit,
            undo,
            Call::Save(cw7_common::files::STARTUP_FILE.to_string()),
            Call::CliConfig(ACTIVATE_COMMAND.to_string()),
        ],
    );

    let bindings = ports.bindings(&mut session).await.unwrap();
    assert_eq!(bindings.irf_p2, vec![M1_C]);
    let again = ports.build(&mut session, &declared, true).await.unwrap();
    assert!(again.is_unchanged());
}

#[tokio::test]
async fn test_empty_port_list_unbinds_every_interface() {
    let device = fabric();
    let mut session = device.session().await;
    let ports = IrfPorts::new(1).unwrap();
    let declared = PortDeclaration::new()
        .port1(Vec::<String>::new())
        .allow_removal();

    let outcome = ports.build(&mut session, &declared, true).await.unwrap();
    assert!(matches!(outcome, BuildOutcome::Staged(_)));
    let rendered = session.stringify();
    assert_eq!(
        rendered[..4],
        [
            format!("interface {}", M1_A),
            "shutdown".to_string(),
            format!("interface {}", M1_B),
            "shutdown".to_string(),
        ]
    );
    assert!(!rendered.iter().any(|line| line == "undo shutdown"));

    session
        .execute_all(cw7_session::Datastore::Running)
        .await
        .unwrap();
    let bindings = ports.bindings(&mut session).await.unwrap();
    assert!(bindings.irf_p1.is_empty());

    let other = IrfPorts::new(2).unwrap().bindings(&mut session).await.unwrap();
    assert_eq!(other.irf_p1.len(), 2);
}

#[tokio::test]
async fn test_undeclared_port_is_untouched() {
    let device = fabric();
    let mut session = device.session().await;
    let ports = IrfPorts::new(1).unwrap();

    let outcome = ports
        .build(&mut session, &PortDeclaration::new(), true)
        .await
        .unwrap();
    assert!(outcome.is_unchanged());

    let declared = PortDeclaration::new().port2([M1_C]);
    ports.build(&mut session, &declared, true).await.unwrap();
    let rendered = session.stringify();
    assert!(!rendered.iter().any(|line| line.contains(M1_A) || line.contains(M1_B)));

    session
        .execute_all(cw7_session::Datastore::Running)
        .await
        .unwrap();
    let bindings = ports.bindings(&mut session).await.unwrap();
    assert_eq!(bindings.irf_p1, vec![M1_A, M1_B]);
    assert_eq!(bindings.irf_p2, vec![M1_C]);
}

#[tokio::test]
async fn test_unknown_interface_fails_before_staging() {
    let device = fabric();
    let mut session = device.session().await;
    let declared = PortDeclaration::new().port2(["Ten-GigabitEthernet1/0/99"]);
    let err = IrfPorts::new(1)
        .unwrap()
        .build(&mut session, &declared, true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
    assert!(session.staged().is_empty());
}

#[tokio::test]
async fn test_order_of_declared_list_is_irrelevant() {
    let device = fabric();
    let mut session = device.session().await;
    let declared = PortDeclaration::new().port1([M1_B, M1_A, M1_A]);
    let outcome = IrfPorts::new(1)
        .unwrap()
        .build(&mut session, &declared, true)
        .await
        .unwrap();
    assert!(outcome.is_unchanged());
}
