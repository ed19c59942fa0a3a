//! The contract every feature module follows.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::debug;

use cw7_common::{FieldValue, NcResult};
use cw7_session::{Datastore, ExecReport, Session};

/// Caller-facing view of a feature's existing state.
pub type NamedConfig = BTreeMap<&'static str, FieldValue>;

/// What a `build` or `remove` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Existing state already matched; nothing was staged.
    Unchanged,
    /// This many commands were appended to the session's queue.
    Staged(usize),
    /// The queue was executed immediately.
    Applied(ExecReport),
}

impl BuildOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, BuildOutcome::Unchanged)
    }

    /// Commands staged by the call, or zero once applied or unchanged.
    pub fn staged(&self) -> usize {
        match self {
            BuildOutcome::Staged(n) => *n,
            _ => 0,
        }
    }
}

/// A configuration domain on the device.
///
/// Implementations query existing state with [`Feature::get_config`], diff
/// it against the declared state and stage only the difference.
#[async_trait]
pub trait Feature: Send + Sync {
    /// Feature name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Reads the existing state of this instance from the device.
    async fn get_config(&self, session: &mut Session) -> NcResult<NamedConfig>;
}

/// Turns the number of commands a feature staged into its outcome.
///
/// With `stage` unset the whole session queue runs right away.
pub(crate) async fn finish(
    session: &mut Session,
    feature: &str,
    staged: usize,
    stage: bool,
) -> NcResult<BuildOutcome> {
    if staged == 0 {
        debug!(feature, "Existing state matches, nothing staged");
        return Ok(BuildOutcome::Unchanged);
    }
    if stage {
        return Ok(BuildOutcome::Staged(staged));
    }
    let report = session.execute_all(Datastore::Running).await?;
    Ok(BuildOutcome::Applied(report))
}
