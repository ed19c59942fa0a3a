//! VLANs.

use async_trait::async_trait;
use tracing::{info, instrument};

use cw7_common::{
    CommandKind, EditOperation, Element, FeatureError, FieldKey, FieldMap, NcResult,
};
use cw7_session::Session;

use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};
use crate::tables::{self, fields, VLAN_VLANS};

/// Lowest and highest configurable VLAN.
pub const VLAN_RANGE: std::ops::RangeInclusive<u16> = 1..=4094;

/// The default VLAN, which the device refuses to delete.
pub const DEFAULT_VLAN: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VlanKey {
    Name,
    Description,
}

impl FieldKey for VlanKey {
    const ALL: &'static [Self] = &[VlanKey::Name, VlanKey::Description];

    fn tag(self) -> &'static str {
        match self {
            VlanKey::Name => "Name",
            VlanKey::Description => "Description",
        }
    }

    fn name(self) -> &'static str {
        match self {
            VlanKey::Name => "name",
            VlanKey::Description => "description",
        }
    }
}

/// Declared VLAN state.
pub type VlanConfig = FieldMap<VlanKey>;

/// One VLAN, addressed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vlan {
    id: u16,
}

impl Vlan {
    /// Fails for ids outside 1-4094.
    pub fn new(id: u16) -> Result<Self, FeatureError> {
        if !VLAN_RANGE.contains(&id) {
            return Err(FeatureError::invalid_value(
                "vlanid",
                id.to_string(),
                "expected 1-4094",
            ));
        }
        Ok(Self { id })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    fn key(&self) -> Element {
        Element::leaf(fields::VLAN_ID, self.id)
    }

    async fn row(&self, session: &mut Session) -> NcResult<Option<Element>> {
        let filter = tables::filter(
            VLAN_VLANS,
            [Element::new("VLAN")
                .with_child(self.key())
                .with_child(Element::new("Name"))
                .with_child(Element::new("Description"))],
        );
        let reply = session.get(&filter).await?;
        Ok(
            tables::find_row(&reply, VLAN_VLANS, fields::VLAN_ID, &self.id.to_string())
                .cloned(),
        )
    }

    pub async fn exists(&self, session: &mut Session) -> NcResult<bool> {
        Ok(self.row(session).await?.is_some())
    }

    /// Stages creation or the changed keys of this VLAN.
    #[instrument(skip(self, session, declared), fields(vlan = self.id))]
    pub async fn build(
        &self,
        session: &mut Session,
        declared: &VlanConfig,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        let (delta, created) = match self.row(session).await? {
            Some(row) => (declared.delta(&FieldMap::from_element(&row)), false),
            None => (declared.clone(), true),
        };
        if delta.is_empty() && !created {
            return finish(session, "vlan", 0, stage).await;
        }

        let edit = Element::new("VLAN")
            .with_child(self.key())
            .with_children(delta.to_elements());
        session.stage(tables::config(VLAN_VLANS, [edit]), CommandKind::EditConfig)?;
        info!(created, "VLAN changes staged");
        finish(session, "vlan", 1, stage).await
    }

    /// Stages deletion; an absent VLAN is left alone.
    #[instrument(skip(self, session), fields(vlan = self.id))]
    pub async fn remove(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        if self.id == DEFAULT_VLAN {
            return Err(FeatureError::invalid_value(
                "vlanid",
                "1",
                "the default VLAN cannot be removed",
            )
            .into());
        }
        if !self.exists(session).await? {
            return finish(session, "vlan", 0, stage).await;
        }
        let edit = Element::new("VLAN")
            .with_operation(EditOperation::Delete)
            .with_child(self.key());
        session.stage(tables::config(VLAN_VLANS, [edit]), CommandKind::EditConfig)?;
        finish(session, "vlan", 1, stage).await
    }
}

/// Every VLAN id configured on the device, ascending.
pub async fn get_vlan_list(session: &mut Session) -> NcResult<Vec<u16>> {
    let filter = tables::filter(
        VLAN_VLANS,
        [Element::new("VLAN").with_child(Element::new(fields::VLAN_ID))],
    );
    let reply = session.get(&filter).await?;
    let mut ids: Vec<u16> = tables::rows(&reply, VLAN_VLANS)
        .into_iter()
        .filter_map(|row| row.child_text(fields::VLAN_ID)?.parse().ok())
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

#[async_trait]
impl Feature for Vlan {
    fn name(&self) -> &'static str {
        "vlan"
    }

    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        let row = self
            .row(session)
            .await?
            .ok_or(FeatureError::VlanNotFound { vlan: self.id })?;
        Ok(FieldMap::<VlanKey>::from_element(&row).to_named())
    }
}
