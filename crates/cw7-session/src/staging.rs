//! Staging queue: ordered, append-only list of pending commands.

use tracing::{debug, warn};

use cw7_common::{CommandKind, NcResult, Payload, StagedCommand};

/// CLI line that reboots the device without prompting.
pub const REBOOT_COMMAND: &str = "reboot force";

/// Commands accumulated by feature modules before one execution pass.
///
/// Staging never talks to the device. The queue remembers which entry is
/// the reboot trigger so the engine can treat the disconnect that follows
/// as the expected outcome.
#[derive(Debug, Clone, Default)]
pub struct StagingQueue {
    entries: Vec<StagedCommand>,
    reboot_at: Option<usize>,
}

impl StagingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command; fails only if `kind` cannot carry `payload`.
    pub fn stage(&mut self, payload: Payload, kind: CommandKind) -> NcResult<()> {
        let command = StagedCommand::new(payload, kind)?;
        debug!(index = self.entries.len(), kind = %kind, "Staged command");
        self.entries.push(command);
        Ok(())
    }

    /// Appends a command whose kind is given by name.
    pub fn stage_named(&mut self, payload: Payload, kind: &str) -> NcResult<()> {
        self.stage(payload, kind.parse()?)
    }

    /// Appends the reboot trigger.
    ///
    /// Only the first trigger is kept; later ones are ignored.
    pub fn stage_reboot(&mut self) -> NcResult<()> {
        if let Some(index) = self.reboot_at {
            warn!(index, "Reboot already staged, second trigger ignored");
            return Ok(());
        }
        self.stage(Payload::cli(REBOOT_COMMAND), CommandKind::CliDisplay)?;
        self.reboot_at = Some(self.entries.len() - 1);
        Ok(())
    }

    /// Returns true if the entry at `index` is the reboot trigger.
    pub fn is_reboot_point(&self, index: usize) -> bool {
        self.reboot_at == Some(index)
    }

    /// Returns true if a reboot trigger is staged.
    pub fn has_reboot(&self) -> bool {
        self.reboot_at.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedCommand> {
        self.entries.iter()
    }

    /// Renders every entry, in order, without consuming the queue.
    pub fn stringify(&self) -> Vec<String> {
        self.entries.iter().flat_map(StagedCommand::render).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reboot_at = None;
    }
}
