//! Device reboot, immediate or scheduled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use cw7_common::{CommandKind, FeatureError, FieldValue, NcResult, Payload};
use cw7_session::Session;

use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};

const DISPLAY_SCHEDULE: &str = "display scheduler reboot";

/// Longest delay the scheduler accepts, in minutes.
pub const MAX_DELAY_MINUTES: u32 = 30 * 24 * 60;

/// Reboot request.
///
/// An immediate reboot drops the connection; the engine treats that as
/// success. A delayed reboot only arms the device scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reboot {
    /// Must be set; rebooting is never implied.
    #[serde(default)]
    pub confirm: bool,
    /// Minutes until the reboot; `None` reboots now.
    #[serde(default)]
    pub delay: Option<u32>,
}

impl Reboot {
    pub fn now(confirm: bool) -> Self {
        Self {
            confirm,
            delay: None,
        }
    }

    pub fn after(confirm: bool, minutes: u32) -> Self {
        Self {
            confirm,
            delay: Some(minutes),
        }
    }

    /// CLI that schedules this reboot, if delayed.
    fn schedule_command(&self) -> Option<String> {
        self.delay
            .map(|minutes| format!("scheduler reboot delay {}", minutes))
    }

    fn validate(&self) -> Result<(), FeatureError> {
        if !self.confirm {
            return Err(FeatureError::confirmation_required("rebooting the device"));
        }
        match self.delay {
            Some(minutes) if minutes == 0 || minutes > MAX_DELAY_MINUTES => {
                Err(FeatureError::invalid_value(
                    "delay",
                    minutes.to_string(),
                    "expected between 1 and 43200 minutes",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Stages the reboot behind whatever is already queued.
    #[instrument(skip(session))]
    pub async fn build(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        self.validate()?;
        match self.schedule_command() {
            Some(command) => {
                session.stage(Payload::cli(command), CommandKind::CliDisplay)?;
                info!(delay = self.delay, "Scheduled reboot staged");
            }
            None => {
                session.stage_reboot()?;
                info!("Immediate reboot staged");
            }
        }
        finish(session, "reboot", 1, stage).await
    }
}

#[async_trait]
impl Feature for Reboot {
    fn name(&self) -> &'static str {
        "reboot"
    }

    /// The device's pending reboot schedule.
    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        let reply = session.cli_display(&[DISPLAY_SCHEDULE]).await?;
        let text = reply.text().unwrap_or_default().to_string();
        Ok(NamedConfig::from([("schedule", FieldValue::Scalar(text))]))
    }
}
