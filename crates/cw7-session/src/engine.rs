//! Execution engine: drains the staging queue against the session.

use tracing::{debug, info, instrument, warn};

use cw7_common::{CommandKind, NcError, NcResult, Payload, StagedCommand};

use crate::session::{Reply, Session};
use crate::transport::Datastore;

/// Outcome of one full pass over the staging queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecReport {
    /// One reply per dispatched entry, in staging order.
    pub replies: Vec<Reply>,
    /// The batch reached its reboot trigger.
    pub rebooted: bool,
}

impl ExecReport {
    /// Number of entries that were dispatched.
    pub fn applied(&self) -> usize {
        self.replies.len()
    }
}

/// Result of [`Session::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit {
    /// Check mode: the rendered queue, nothing sent.
    DryRun(Vec<String>),
    Applied(ExecReport),
}

impl Session {
    /// Executes every staged command in insertion order.
    ///
    /// The queue is emptied whatever happens. On the first failure the rest
    /// of the queue is abandoned and [`NcError::Batch`] reports how many
    /// entries were already applied; those are not rolled back. Reaching
    /// the reboot trigger ends the pass, and a disconnect at that point is
    /// reported as success with `rebooted` set.
    #[instrument(skip(self), fields(staged = self.staged.len()))]
    pub async fn execute_all(&mut self, target: Datastore) -> NcResult<ExecReport> {
        let queue = std::mem::take(&mut self.staged);
        let total = queue.len();
        let mut report = ExecReport {
            replies: Vec::with_capacity(total),
            rebooted: false,
        };

        for (index, command) in queue.iter().enumerate() {
            let reboot_point = queue.is_reboot_point(index);
            if reboot_point {
                self.arm_reboot();
            }

            let result = self.dispatch(command, target).await;
            if reboot_point {
                self.finish_reboot(result.is_ok());
            }
            let reply = match result {
                Ok(reply) => reply,
                Err(source) => {
                    warn!(
                        index,
                        kind = %command.kind(),
                        applied = index,
                        error = %source,
                        "Staged batch aborted, earlier commands remain applied"
                    );
                    return Err(NcError::Batch {
                        index,
                        kind: command.kind(),
                        applied: index,
                        source: Box::new(source),
                    });
                }
            };
            report.replies.push(reply);

            if reboot_point {
                report.rebooted = true;
                let dropped = total - index - 1;
                if dropped > 0 {
                    warn!(dropped, "Device rebooting, later staged commands dropped");
                }
                break;
            }
        }

        info!(
            applied = report.applied(),
            rebooted = report.rebooted,
            "Executed staged batch"
        );
        Ok(report)
    }

    /// Dry-run surface: renders the queue in check mode, executes otherwise.
    pub async fn commit(&mut self, check_mode: bool) -> NcResult<Commit> {
        if check_mode {
            return Ok(Commit::DryRun(self.stringify()));
        }
        self.execute_all(Datastore::Running)
            .await
            .map(Commit::Applied)
    }

    async fn dispatch(&mut self, command: &StagedCommand, target: Datastore) -> NcResult<Reply> {
        debug!(kind = %command.kind(), "Dispatching staged command");
        match (command.kind(), command.payload()) {
            (CommandKind::EditConfig, Payload::Tree(tree)) => self.edit_config(target, tree).await,
            (CommandKind::Action, Payload::Tree(tree)) => self.action(tree).await,
            (CommandKind::CliConfig, Payload::Cli(lines)) => self.cli_config(lines.as_slice()).await,
            (CommandKind::CliDisplay, Payload::Cli(lines)) => self.cli_display(lines.as_slice()).await,
            (CommandKind::Save, Payload::File(name)) => self.save(name).await,
            (CommandKind::Rollback, Payload::File(name)) => self.rollback(name).await,
            (kind, payload) => Err(NcError::PayloadMismatch {
                kind,
                payload: payload.describe(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use cw7_common::{Element, ErrorKind, TransportError};

    use crate::config::DeviceConfig;
    use crate::transport::{ConnectParams, Connector, Transport, TransportResult};

    struct Unreachable;

    #[async_trait]
    impl Connector for Unreachable {
        async fn connect(&self, params: &ConnectParams) -> TransportResult<Box<dyn Transport>> {
            Err(TransportError::UnresolvedHost(params.host.clone()))
        }
    }

    fn session() -> Session {
        Session::new(DeviceConfig::default(), Arc::new(Unreachable))
    }

    #[tokio::test]
    async fn test_check_mode_renders_without_executing() {
        let mut session = session();
        session
            .stage(Payload::cli("vlan 20"), CommandKind::CliConfig)
            .unwrap();
        session
            .stage(Element::leaf("ID", 20), CommandKind::EditConfig)
            .unwrap();

        let commit = session.commit(true).await.unwrap();
        assert_eq!(
            commit,
            Commit::DryRun(vec!["vlan 20".to_string(), "<ID>20</ID>".to_string()])
        );
        assert_eq!(session.staged().len(), 2);
    }

    #[test]
    fn test_empty_queue_is_a_no_op() {
        let mut session = session();
        let report = tokio_test::block_on(session.execute_all(Datastore::Running));
        assert_eq!(tokio_test::assert_ok!(report), ExecReport::default());
    }

    #[tokio::test]
    async fn test_closed_session_aborts_batch_and_clears_queue() {
        let mut session = session();
        session
            .stage(Payload::file("flash:/startup.cfg"), CommandKind::Save)
            .unwrap();
        session
            .stage(Payload::cli("display irf"), CommandKind::CliDisplay)
            .unwrap();

        let err = session.execute_all(Datastore::Running).await.unwrap_err();
        assert!(matches!(
            err,
            NcError::Batch {
                index: 0,
                kind: CommandKind::Save,
                applied: 0,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::Closed);
        assert!(session.staged().is_empty());
    }
}
