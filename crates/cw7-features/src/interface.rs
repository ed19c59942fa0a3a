//! Physical and logical interfaces.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{info, instrument};

use cw7_common::{
    CommandKind, Element, FeatureError, FieldKey, FieldMap, NcResult, Payload, ValueCodec,
};
use cw7_session::Session;

use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};
use crate::tables::{self, fields, IFMGR_INTERFACES};

static ADMIN: ValueCodec = ValueCodec::new(&[("1", "up"), ("2", "down")]);

static DUPLEX: ValueCodec = ValueCodec::new(&[("1", "full"), ("2", "half"), ("3", "auto")]);

static SPEED: ValueCodec = ValueCodec::new(&[
    ("1", "auto"),
    ("2", "10"),
    ("4", "100"),
    ("32", "1000"),
    ("1024", "10000"),
    ("4096", "20000"),
    ("8192", "40000"),
    ("16384", "100000"),
]);

static LAYER: ValueCodec = ValueCodec::new(&[("1", "bridged"), ("2", "routed")]);

/// Declarable interface parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceKey {
    Admin,
    Description,
    Mtu,
    Speed,
    Duplex,
    /// Port layer; only settable through the CLI.
    Type,
}

impl FieldKey for InterfaceKey {
    const ALL: &'static [Self] = &[
        InterfaceKey::Admin,
        InterfaceKey::Description,
        InterfaceKey::Mtu,
        InterfaceKey::Speed,
        InterfaceKey::Duplex,
        InterfaceKey::Type,
    ];

    fn tag(self) -> &'static str {
        match self {
            InterfaceKey::Admin => "AdminStatus",
            InterfaceKey::Description => "Description",
            InterfaceKey::Mtu => "ConfigMTU",
            InterfaceKey::Speed => "ConfigSpeed",
            InterfaceKey::Duplex => "ConfigDuplex",
            InterfaceKey::Type => "PortLayer",
        }
    }

    fn name(self) -> &'static str {
        match self {
            InterfaceKey::Admin => "admin",
            InterfaceKey::Description => "description",
            InterfaceKey::Mtu => "mtu",
            InterfaceKey::Speed => "speed",
            InterfaceKey::Duplex => "duplex",
            InterfaceKey::Type => "type",
        }
    }

    fn codec(self) -> Option<&'static ValueCodec> {
        match self {
            InterfaceKey::Admin => Some(&ADMIN),
            InterfaceKey::Speed => Some(&SPEED),
            InterfaceKey::Duplex => Some(&DUPLEX),
            InterfaceKey::Type => Some(&LAYER),
            InterfaceKey::Description | InterfaceKey::Mtu => None,
        }
    }
}

/// Declared interface state.
pub type InterfaceConfig = FieldMap<InterfaceKey>;

/// Name ↔ index lookup over the whole interface table.
#[derive(Debug, Clone, Default)]
pub struct InterfaceTable {
    by_name: BTreeMap<String, String>,
}

impl InterfaceTable {
    /// Reads every interface name and index from the device.
    pub async fn fetch(session: &mut Session) -> NcResult<Self> {
        let filter = tables::filter(
            IFMGR_INTERFACES,
            [Element::new("Interface")
                .with_child(Element::new(fields::IF_INDEX))
                .with_child(Element::new(fields::NAME))],
        );
        let reply = session.get(&filter).await?;
        let by_name = tables::rows(&reply, IFMGR_INTERFACES)
            .into_iter()
            .filter_map(|row| {
                Some((
                    row.child_text(fields::NAME)?.to_string(),
                    row.child_text(fields::IF_INDEX)?.to_string(),
                ))
            })
            .collect();
        Ok(Self { by_name })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    pub fn name_of(&self, index: &str) -> Option<&str> {
        self.by_name
            .iter()
            .find(|(_, i)| i.as_str() == index)
            .map(|(n, _)| n.as_str())
    }

    /// Fails on the first name the device does not have.
    pub fn require_all<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> NcResult<()> {
        for name in names {
            if !self.contains(name) {
                return Err(FeatureError::interface_not_found(name.as_str()).into());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// One interface, addressed by its full name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn filter(&self) -> Element {
        let row = InterfaceKey::ALL.iter().fold(
            Element::new("Interface")
                .with_child(Element::new(fields::IF_INDEX))
                .with_child(Element::leaf(fields::NAME, &self.name)),
            |row, key| row.with_child(Element::new(key.tag())),
        );
        tables::filter(IFMGR_INTERFACES, [row])
    }

    /// The device row for this interface.
    async fn row(&self, session: &mut Session) -> NcResult<Element> {
        let reply = session.get(&self.filter()).await?;
        tables::find_row(&reply, IFMGR_INTERFACES, fields::NAME, &self.name)
            .cloned()
            .ok_or_else(|| FeatureError::interface_not_found(&self.name).into())
    }

    /// Returns the interface index, failing if the interface does not exist.
    pub async fn get_index(&self, session: &mut Session) -> NcResult<String> {
        let row = self.row(session).await?;
        row.child_text(fields::IF_INDEX)
            .map(str::to_string)
            .ok_or_else(|| FeatureError::interface_not_found(&self.name).into())
    }

    /// Existing state in the declared vocabulary.
    pub async fn existing(&self, session: &mut Session) -> NcResult<InterfaceConfig> {
        Ok(FieldMap::from_element(&self.row(session).await?))
    }

    /// Stages the difference between `declared` and the device.
    ///
    /// A port layer change goes first as CLI because it resets the
    /// interface; the remaining keys go as one structured edit.
    #[instrument(skip(self, session, declared), fields(interface = %self.name))]
    pub async fn build(
        &self,
        session: &mut Session,
        declared: &InterfaceConfig,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        validate(declared)?;
        let row = self.row(session).await?;
        let index = row
            .child_text(fields::IF_INDEX)
            .ok_or_else(|| FeatureError::interface_not_found(&self.name))?
            .to_string();
        let existing = FieldMap::from_element(&row);
        let mut delta = declared.delta(&existing);

        let mut staged = 0;
        if let Some(layer) = delta.remove(InterfaceKey::Type) {
            let mode = match layer.as_scalar() {
                Some("routed") => "route",
                _ => "bridge",
            };
            session.stage(
                Payload::lines([
                    format!("interface {}", self.name),
                    format!("port link-mode {}", mode),
                ]),
                CommandKind::CliConfig,
            )?;
            staged += 1;
        }
        if !delta.is_empty() {
            let edit = Element::new("Interface")
                .with_child(Element::leaf(fields::IF_INDEX, &index))
                .with_children(delta.to_elements());
            session.stage(tables::config(IFMGR_INTERFACES, [edit]), CommandKind::EditConfig)?;
            staged += 1;
        }

        if staged > 0 {
            info!(changed = ?delta.to_named().keys().collect::<Vec<_>>(), "Interface changes staged");
        }
        finish(session, self.name(), staged, stage).await
    }

    /// Resets the interface to factory defaults.
    ///
    /// Not diffable, so it is always staged.
    #[instrument(skip(self, session), fields(interface = %self.name))]
    pub async fn default(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        self.get_index(session).await?;
        session.stage(
            Payload::lines([format!("interface {}", self.name), "default".to_string()]),
            CommandKind::CliConfig,
        )?;
        finish(session, self.name(), 1, stage).await
    }

    /// Interfaces cannot be deleted; removing one resets it.
    pub async fn remove(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        self.default(session, stage).await
    }
}

#[async_trait]
impl Feature for Interface {
    fn name(&self) -> &'static str {
        "interface"
    }

    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        Ok(self.existing(session).await?.to_named())
    }
}

fn validate(declared: &InterfaceConfig) -> Result<(), FeatureError> {
    if let Some(mtu) = declared.get_scalar(InterfaceKey::Mtu) {
        match mtu.parse::<u32>() {
            Ok(value) if (46..=9216).contains(&value) => {}
            _ => {
                return Err(FeatureError::invalid_value(
                    "mtu",
                    mtu,
                    "expected an integer between 46 and 9216",
                ))
            }
        }
    }
    Ok(())
}

/// Stages one CLI block that shuts every listed interface down.
pub fn stage_shutdown(session: &mut Session, names: &[String]) -> NcResult<()> {
    stage_admin(session, names, "shutdown")
}

/// Stages one CLI block that brings every listed interface up.
pub fn stage_up(session: &mut Session, names: &[String]) -> NcResult<()> {
    stage_admin(session, names, "undo shutdown")
}

fn stage_admin(session: &mut Session, names: &[String], action: &str) -> NcResult<()> {
    if names.is_empty() {
        return Ok(());
    }
    let lines = names
        .iter()
        .flat_map(|name| [format!("interface {}", name), action.to_string()]);
    session.stage(Payload::lines(lines), CommandKind::CliConfig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw7_common::{ErrorKind, FieldValue};
    use cw7_session::Commit;
    use cw7_test::{fixtures, Call, MockDevice};
    use pretty_assertions::assert_eq;

    const PORT: &str = "Ten-GigabitEthernet1/0/1";

    fn device() -> MockDevice {
        MockDevice::new(fixtures::DeviceBuilder::new().interface(
            fixtures::interface(PORT, 1)
                .with_child(Element::leaf("AdminStatus", 1))
                .with_child(Element::leaf("ConfigMTU", 1500))
                .with_child(Element::leaf("ConfigDuplex", 3))
                .with_child(Element::leaf("PortLayer", 1)),
        ))
    }

    #[tokio::test]
    async fn test_get_config_translates_codes() {
        let device = device();
        let mut session = device.session().await;
        let config = Interface::new(PORT).get_config(&mut session).await.unwrap();
        assert_eq!(config["admin"], FieldValue::from("up"));
        assert_eq!(config["duplex"], FieldValue::from("auto"));
        assert_eq!(config["type"], FieldValue::from("bridged"));
        assert_eq!(config["mtu"], FieldValue::from("1500"));
    }

    #[tokio::test]
    async fn test_build_stages_only_delta() {
        let device = device();
        let mut session = device.session().await;
        let declared = InterfaceConfig::new()
            .with(InterfaceKey::Admin, "down")
            .with(InterfaceKey::Mtu, "1500")
            .with(InterfaceKey::Description, "uplink");

        let outcome = Interface::new(PORT)
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Staged(1));

        let Commit::DryRun(lines) = session.commit(true).await.unwrap() else {
            panic!("expected dry run");
        };
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("<AdminStatus>2</AdminStatus>"));
        assert!(lines[0].contains("<Description>uplink</Description>"));
        assert!(!lines[0].contains("ConfigMTU"));
    }

    #[tokio::test]
    async fn test_build_matching_state_is_unchanged() {
        let device = device();
        let mut session = device.session().await;
        let declared = InterfaceConfig::new()
            .with(InterfaceKey::Admin, "up")
            .with(InterfaceKey::Type, "bridged");
        let outcome = Interface::new(PORT)
            .build(&mut session, &declared, true)
            .await
            .unwrap();
        assert!(outcome.is_unchanged());
        assert!(session.staged().is_empty());
    }

    #[tokio::test]
    async fn test_build_link_mode_goes_through_cli() {
        let device = device();
        let mut session = device.session().await;
        let declared = InterfaceConfig::new().with(InterfaceKey::Type, "routed");
        Interface::new(PORT)
            .build(&mut session, &declared, false)
            .await
            .unwrap();
        assert!(device.calls().contains(&Call::CliConfig(format!(
            "interface {}\nport link-mode route",
            PORT
        ))));
    }

    #[tokio::test]
    async fn test_missing_interface_is_precondition() {
        let device = device();
        let mut session = device.session().await;
        let err = Interface::new("FortyGigE1/0/53")
            .build(&mut session, &InterfaceConfig::new(), true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(session.staged().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_mtu_rejected_before_query() {
        let device = device();
        let mut session = device.session().await;
        let declared = InterfaceConfig::new().with(InterfaceKey::Mtu, "jumbo");
        let err = Interface::new(PORT)
            .build(&mut session, &declared, true)
            .await
            .unwrap_err();
        assert!(matches!(
            err.precondition(),
            Some(FeatureError::InvalidValue { field, .. }) if field == "mtu"
        ));
        assert!(device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_table_lookup() {
        let device = device();
        let mut session = device.session().await;
        let table = InterfaceTable::fetch(&mut session).await.unwrap();
        assert_eq!(table.index_of(PORT), Some("1"));
        assert_eq!(table.name_of("1"), Some(PORT));
        assert!(table
            .require_all(&["FortyGigE1/0/53".to_string()])
            .is_err());
    }

    #[tokio::test]
    async fn test_shutdown_block() {
        let device = device();
        let mut session = device.session().await;
        stage_shutdown(&mut session, &["A".to_string(), "B".to_string()]).unwrap();
        stage_up(&mut session, &[]).unwrap();
        assert_eq!(
            session.stringify(),
            vec!["interface A", "shutdown", "interface B", "shutdown"]
        );
    }
}
