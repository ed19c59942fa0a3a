//! IRF member identity, priority, domain and MAD exclusions.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use cw7_common::{
    files, ns, CommandKind, Element, FeatureError, FieldKey, FieldMap, NcResult, Payload,
};
use cw7_session::Session;

use super::types::{check_member_id, PRIORITY_RANGE};
use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};
use crate::interface::InterfaceTable;
use crate::tables::{self, fields, IRF_CONFIGURATION, IRF_MEMBERS, MAD_EXCLUDES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MemberKey {
    Priority,
    Description,
    /// Fabric-wide; configured through the CLI.
    Domain,
    /// Fabric-wide; configured through the CLI.
    MadExclude,
}

impl FieldKey for MemberKey {
    const ALL: &'static [Self] = &[
        MemberKey::Priority,
        MemberKey::Description,
        MemberKey::Domain,
        MemberKey::MadExclude,
    ];

    fn tag(self) -> &'static str {
        match self {
            MemberKey::Priority => "Priority",
            MemberKey::Description => "Description",
            MemberKey::Domain => fields::DOMAIN_ID,
            MemberKey::MadExclude => "MadExclude",
        }
    }

    fn name(self) -> &'static str {
        match self {
            MemberKey::Priority => "priority",
            MemberKey::Description => "description",
            MemberKey::Domain => "domain",
            MemberKey::MadExclude => "mad_exclude",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, MemberKey::MadExclude)
    }
}

/// Declared IRF member state.
pub type MemberConfig = FieldMap<MemberKey>;

/// One IRF member, addressed by its current member id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrfMember {
    member_id: u32,
}

impl IrfMember {
    pub fn new(member_id: u32) -> Result<Self, FeatureError> {
        Ok(Self {
            member_id: check_member_id("member_id", member_id)?,
        })
    }

    pub fn member_id(&self) -> u32 {
        self.member_id
    }

    fn filter(&self) -> Element {
        let member = Element::new("Member")
            .with_child(Element::leaf(fields::MEMBER_ID, self.member_id))
            .with_child(Element::new("Priority"))
            .with_child(Element::new("Description"));
        Element::top(ns::DATA)
            .with_child(
                Element::new("IRF")
                    .with_child(Element::new("Members").with_child(member))
                    .with_child(
                        Element::new("Configuration").with_child(Element::new(fields::DOMAIN_ID)),
                    ),
            )
            .with_child(
                Element::new("MAD").with_child(
                    Element::new("ExcludeInterfaces").with_child(
                        Element::new(fields::INTERFACE).with_child(Element::new(fields::IF_INDEX)),
                    ),
                ),
            )
    }

    /// Existing state, or a precondition error if the member is unknown.
    pub async fn existing(&self, session: &mut Session) -> NcResult<MemberConfig> {
        let reply = session.get(&self.filter()).await?;
        let id = self.member_id.to_string();
        let row = tables::find_row(&reply, IRF_MEMBERS, fields::MEMBER_ID, &id).ok_or_else(
            || {
                FeatureError::invalid_value(
                    "member_id",
                    id.as_str(),
                    "no such IRF member on the device",
                )
            },
        )?;
        let mut existing = MemberConfig::from_element(row);

        let domain = tables::rows(&reply, IRF_CONFIGURATION)
            .into_iter()
            .find_map(|config| config.child_text(fields::DOMAIN_ID));
        if let Some(domain) = domain {
            existing.insert(MemberKey::Domain, domain);
        }

        let indexes: Vec<String> = tables::rows(&reply, MAD_EXCLUDES)
            .into_iter()
            .filter_map(|row| row.child_text(fields::IF_INDEX).map(str::to_string))
            .collect();
        let excluded = if indexes.is_empty() {
            Vec::new()
        } else {
            let table = InterfaceTable::fetch(session).await?;
            indexes
                .iter()
                .filter_map(|index| match table.name_of(index) {
                    Some(name) => Some(name.to_string()),
                    None => {
                        warn!(index = %index, "MAD exclusion names an unknown interface index");
                        None
                    }
                })
                .collect()
        };
        existing.insert(MemberKey::MadExclude, excluded);
        Ok(existing)
    }

    /// Stages the changed member settings.
    ///
    /// Priority and description go as one structured edit; domain and MAD
    /// exclusions follow as one CLI block.
    #[instrument(skip(self, session, declared), fields(member = self.member_id))]
    pub async fn build(
        &self,
        session: &mut Session,
        declared: &MemberConfig,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        validate(declared)?;
        if let Some(wanted) = declared.get_list(MemberKey::MadExclude) {
            if !wanted.is_empty() {
                InterfaceTable::fetch(session).await?.require_all(wanted)?;
            }
        }

        let existing = self.existing(session).await?;
        let delta = declared.delta(&existing);
        let mut staged = 0;

        let edit: Vec<Element> = [MemberKey::Priority, MemberKey::Description]
            .into_iter()
            .filter_map(|key| {
                delta
                    .get_scalar(key)
                    .map(|value| Element::leaf(key.tag(), value))
            })
            .collect();
        if !edit.is_empty() {
            let member = Element::new("Member")
                .with_child(Element::leaf(fields::MEMBER_ID, self.member_id))
                .with_children(edit);
            session.stage(tables::config(IRF_MEMBERS, [member]), CommandKind::EditConfig)?;
            staged += 1;
        }

        let mut lines = Vec::new();
        if let Some(domain) = delta.get_scalar(MemberKey::Domain) {
            lines.push(format!("irf domain {}", domain));
        }
        if let Some(wanted) = delta.get_list(MemberKey::MadExclude) {
            let wanted: BTreeSet<&str> = wanted.iter().map(String::as_str).collect();
            let current: BTreeSet<&str> = existing
                .get(MemberKey::MadExclude)
                .map(|v| v.item_set())
                .unwrap_or_default();
            lines.extend(
                current
                    .difference(&wanted)
                    .map(|name| format!("undo mad exclude interface {}", name)),
            );
            lines.extend(
                wanted
                    .difference(&current)
                    .map(|name| format!("mad exclude interface {}", name)),
            );
        }
        if !lines.is_empty() {
            session.stage(Payload::Cli(lines), CommandKind::CliConfig)?;
            staged += 1;
        }

        if staged > 0 {
            info!(
                changed = ?delta.to_named().keys().collect::<Vec<_>>(),
                "IRF member changes staged"
            );
        }
        finish(session, "irf_member", staged, stage).await
    }

    /// Stages renumbering of this member to `new_member_id`.
    ///
    /// The new id only takes effect after a reboot, so `reboot` must be set;
    /// the device is saved and rebooted as the last staged steps. The
    /// disconnect that follows is reported as a reboot, not a failure.
    #[instrument(skip(self, session), fields(member = self.member_id))]
    pub async fn renumber(
        &self,
        session: &mut Session,
        new_member_id: u32,
        reboot: bool,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        check_member_id("new_member_id", new_member_id)?;
        if new_member_id == self.member_id {
            return finish(session, "irf_member", 0, stage).await;
        }
        if !reboot {
            return Err(FeatureError::confirmation_required(format!(
                "renumbering IRF member {} to {} (takes effect after reboot)",
                self.member_id, new_member_id
            ))
            .into());
        }
        self.existing(session).await?;

        let member = Element::new("Member")
            .with_child(Element::leaf(fields::MEMBER_ID, self.member_id))
            .with_child(Element::leaf(fields::NEW_MEMBER_ID, new_member_id));
        session.stage(tables::config(IRF_MEMBERS, [member]), CommandKind::EditConfig)?;
        session.stage(Payload::file(files::STARTUP_FILE), CommandKind::Save)?;
        session.stage_reboot()?;
        info!(new_member_id, "IRF member renumbering staged with reboot");
        finish(session, "irf_member", 3, stage).await
    }
}

#[async_trait]
impl Feature for IrfMember {
    fn name(&self) -> &'static str {
        "irf_member"
    }

    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        Ok(self.existing(session).await?.to_named())
    }
}

fn validate(declared: &MemberConfig) -> Result<(), FeatureError> {
    if let Some(priority) = declared.get_scalar(MemberKey::Priority) {
        match priority.parse::<u32>() {
            Ok(p) if PRIORITY_RANGE.contains(&p) => {}
            _ => {
                return Err(FeatureError::invalid_value(
                    "priority",
                    priority,
                    "expected an integer between 1 and 32",
                ))
            }
        }
    }
    if let Some(domain) = declared.get_scalar(MemberKey::Domain) {
        if domain.parse::<u32>().is_err() {
            return Err(FeatureError::invalid_value(
                "domain",
                domain,
                "expected a non-negative integer",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw7_common::{ErrorKind, FieldValue};
    use cw7_session::REBOOT_COMMAND;
    use cw7_test::{fixtures, MockDevice};
    use pretty_assertions::assert_eq;

    const XGE1: &str = "Ten-GigabitEthernet1/0/1";
    const XGE2: &str = "Ten-GigabitEthernet1/0/2";

    fn device() -> MockDevice {
        MockDevice::new(
            fixtures::DeviceBuilder::new()
                .interface(fixtures::interface(XGE1, 1))
                .interface(fixtures::interface(XGE2, 2))
                .irf_member(fixtures::irf_member(1, 1))
                .irf_domain(5)
                .mad_exclude(1),
        )
    }

    #[tokio::test]
    async fn test_get_config() {
        let device = device();
        let mut session = device.session().await;
        let config = IrfMember::new(1)
            .unwrap()
            .get_config(&mut session)
            .await
            .unwrap();
        assert_eq!(config["priority"], FieldValue::from("1"));
        assert_eq!(config["domain"], FieldValue::from("5"));
        assert_eq!(config["mad_exclude"], FieldValue::from(vec![XGE1]));
    }

    #[tokio::test]
    async fn test_build_splits_structured_and_cli() {
        let device = device();
        let mut session = device.session().await;
        let declared = MemberConfig::new()
            .with(MemberKey::Priority, "32")
            .with(MemberKey::Domain, "5")
            .with(MemberKey::MadExclude, vec![XGE2]);

        let outcome = IrfMember::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Staged(2));

        let rendered = session.stringify();
        assert!(rendered[0].contains("<Priority>32</Priority>"));
        assert_eq!(
            &rendered[1..],
            &[
                format!("undo mad exclude interface {}", XGE1),
                format!("mad exclude interface {}", XGE2),
            ]
        );
    }

    #[tokio::test]
    async fn test_mad_exclude_order_is_not_a_change() {
        let device = device();
        let mut session = device.session().await;
        let declared = MemberConfig::new().with(MemberKey::MadExclude, vec![XGE1, XGE1]);
        let outcome = IrfMember::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert!(outcome.is_unchanged());
    }

    #[tokio::test]
    async fn test_unknown_mad_interface_rejected() {
        let device = device();
        let mut session = device.session().await;
        let declared = MemberConfig::new().with(MemberKey::MadExclude, vec!["FortyGigE1/0/9"]);
        let err = IrfMember::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap_err();
        assert_eq!(
            err.precondition(),
            Some(&FeatureError::interface_not_found("FortyGigE1/0/9"))
        );
        assert!(session.staged().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_priority() {
        let device = device();
        let mut session = device.session().await;
        let declared = MemberConfig::new().with(MemberKey::Priority, "33");
        let err = IrfMember::new(1)
            .unwrap()
            .build(&mut session, &declared, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[tokio::test]
    async fn test_renumber_requires_reboot() {
        let device = device();
        let mut session = device.session().await;
        let err = IrfMember::new(1)
            .unwrap()
            .renumber(&mut session, 2, false, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.precondition(),
            Some(FeatureError::ConfirmationRequired { .. })
        ));
        assert!(session.staged().is_empty());
    }

    #[tokio::test]
    async fn test_renumber_stages_save_then_reboot() {
        let device = device();
        let mut session = device.session().await;
        let outcome = IrfMember::new(1)
            .unwrap()
            .renumber(&mut session, 2, true, true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Staged(3));
        let rendered = session.stringify();
        assert!(rendered[0].contains("<NewMemberID>2</NewMemberID>"));
        assert_eq!(rendered[1], format!("save {}", files::STARTUP_FILE));
        assert_eq!(rendered[2], REBOOT_COMMAND);
        assert!(session.staged().has_reboot());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renumber_reboot_timeout_is_success() {
        let device = device();
        let mut session = device.session().await;
        device.hang_next("cli-display");

        let outcome = IrfMember::new(1)
            .unwrap()
            .renumber(&mut session, 2, true, false)
            .await
            .unwrap();
        let BuildOutcome::Applied(report) = outcome else {
            panic!("renumber must execute when not staging");
        };
        assert!(report.rebooted);
        assert_eq!(report.replies.last(), Some(&cw7_session::Reply::Rebooting));
        assert!(!session.is_connected());
        assert!(!session.is_reboot_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renumber_timeout_before_reboot_fails() {
        let device = device();
        let mut session = device.session().await;
        device.hang_next("save");

        let err = IrfMember::new(1)
            .unwrap()
            .renumber(&mut session, 2, true, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(matches!(err, cw7_common::NcError::Batch { index: 1, .. }));
        assert!(session.is_connected());
        assert!(!session.is_reboot_armed());
        assert!(device.is_up());
    }
}
