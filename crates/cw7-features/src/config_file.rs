//! Whole-configuration replace, safety checkpoint and startup save.

use async_trait::async_trait;
use tracing::{info, instrument};

use cw7_common::{files, CommandKind, FeatureError, FieldValue, NcResult, Payload};
use cw7_session::Session;

use crate::feature::{finish, BuildOutcome, Feature, NamedConfig};

/// Storage prefix used when a filename names no device.
pub const FLASH: &str = "flash:/";

const DISPLAY_STARTUP: &str = "display startup";

/// Qualifies a bare filename with [`FLASH`].
pub fn flash_path(name: &str) -> Result<String, FeatureError> {
    let name = name.trim();
    if name.is_empty() || name.ends_with('/') {
        return Err(FeatureError::invalid_value(
            "filename",
            name,
            "expected a configuration file name",
        ));
    }
    if name.contains(":/") {
        Ok(name.to_string())
    } else {
        Ok(format!("{}{}", FLASH, name.trim_start_matches('/')))
    }
}

/// Configuration files on the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigFile;

impl ConfigFile {
    pub fn new() -> Self {
        Self
    }

    /// Replaces the running configuration with `file`.
    ///
    /// The running configuration is saved to the safety file first so
    /// [`ConfigFile::restore_safety`] can undo the replace.
    #[instrument(skip(self, session))]
    pub async fn replace(
        &self,
        session: &mut Session,
        file: &str,
        stage: bool,
    ) -> NcResult<BuildOutcome> {
        let target = flash_path(file)?;
        session.stage(Payload::file(files::SAFETY_FILE), CommandKind::Save)?;
        session.stage(Payload::file(target.as_str()), CommandKind::Rollback)?;
        info!(file = %target, "Configuration replace staged");
        finish(session, "config_file", 2, stage).await
    }

    /// Rolls the running configuration back to the safety file.
    #[instrument(skip(self, session))]
    pub async fn restore_safety(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        session.stage(Payload::file(files::SAFETY_FILE), CommandKind::Rollback)?;
        finish(session, "config_file", 1, stage).await
    }

    /// Saves the running configuration as the startup configuration.
    #[instrument(skip(self, session))]
    pub async fn save_startup(&self, session: &mut Session, stage: bool) -> NcResult<BuildOutcome> {
        session.stage(Payload::file(files::STARTUP_FILE), CommandKind::Save)?;
        finish(session, "config_file", 1, stage).await
    }
}

#[async_trait]
impl Feature for ConfigFile {
    fn name(&self) -> &'static str {
        "config_file"
    }

    /// Startup file selection as the device reports it.
    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig> {
        let reply = session.cli_display(&[DISPLAY_STARTUP]).await?;
        let text = reply.text().unwrap_or_default().to_string();
        Ok(NamedConfig::from([("startup", FieldValue::Scalar(text))]))
    }
}
