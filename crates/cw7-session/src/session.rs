//! NETCONF session with per-operation datastore locking.
//!
//! Every primitive runs the same wrapper: lock the datastore, call the
//! transport under the configured timeout, unlock on every exit path and
//! translate transport failures into [`NcError`]. The lock is held per
//! operation, never across a batch.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, info, instrument, warn};

use cw7_common::{CommandKind, Element, NcError, NcResult, Payload, TransportError};

use crate::config::DeviceConfig;
use crate::response;
use crate::staging::{StagingQueue, REBOOT_COMMAND};
use crate::transport::{Connector, Datastore, Transport, TransportResult};

/// Result of one session primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The device acknowledged the request.
    Ok,
    /// Structured reply data (actions).
    Data(Element),
    /// Normalised CLI output.
    Text(String),
    /// The connection dropped while a reboot was armed.
    ///
    /// This is the expected terminal outcome of a reboot, not a failure.
    Rebooting,
}

impl Reply {
    pub fn is_rebooting(&self) -> bool {
        matches!(self, Reply::Rebooting)
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Reply::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn data(&self) -> Option<&Element> {
        match self {
            Reply::Data(data) => Some(data),
            _ => None,
        }
    }
}

/// One transport call, described so the lock wrapper can run it.
enum Rpc<'a> {
    Get(&'a Element),
    EditConfig(Datastore, &'a Element),
    Action(&'a Element),
    CliConfig(String),
    CliDisplay(String),
    Save(&'a str),
    Rollback(&'a str),
}

impl Rpc<'_> {
    fn name(&self) -> &'static str {
        match self {
            Rpc::Get(_) => "get",
            Rpc::EditConfig(..) => "edit-config",
            Rpc::Action(_) => "action",
            Rpc::CliConfig(_) => "cli-config",
            Rpc::CliDisplay(_) => "cli-display",
            Rpc::Save(_) => "save",
            Rpc::Rollback(_) => "rollback",
        }
    }

    /// Datastore the call locks.
    fn target(&self) -> Datastore {
        match self {
            Rpc::EditConfig(target, _) => *target,
            _ => Datastore::Running,
        }
    }

    async fn send(&self, transport: &mut dyn Transport) -> TransportResult<Element> {
        match self {
            Rpc::Get(filter) => transport.get(filter).await,
            Rpc::EditConfig(target, config) => transport.edit_config(*target, config).await,
            Rpc::Action(action) => transport.action(action).await,
            Rpc::CliConfig(commands) => transport.cli_config(commands).await,
            Rpc::CliDisplay(commands) => transport.cli_display(commands).await,
            Rpc::Save(filename) => transport.save(filename).await,
            Rpc::Rollback(filename) => transport.rollback(filename).await,
        }
    }
}

/// What the lock wrapper produced.
enum Outcome {
    Done(Element),
    Rebooting,
}

/// A connection to one device plus its staging queue.
pub struct Session {
    config: DeviceConfig,
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    locked: bool,
    reboot_armed: bool,
    pub(crate) staged: StagingQueue,
}

impl Session {
    /// Creates an unconnected session.
    pub fn new(config: DeviceConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            transport: None,
            locked: false,
            reboot_armed: false,
            staged: StagingQueue::new(),
        }
    }

    /// Creates a session and opens it with the flags from `config`.
    pub async fn connect(config: DeviceConfig, connector: Arc<dyn Connector>) -> NcResult<Self> {
        let (hostkey_verify, allow_agent, look_for_keys) =
            (config.hostkey_verify, config.allow_agent, config.look_for_keys);
        let mut session = Self::new(config, connector);
        session.open(hostkey_verify, allow_agent, look_for_keys).await?;
        Ok(session)
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Per-RPC timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    /// True only while an operation holds the datastore lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_reboot_armed(&self) -> bool {
        self.reboot_armed
    }

    /// Treats the next timeout or disconnect as the device rebooting.
    ///
    /// Stays armed until the reboot trigger has run or the session is reopened.
    pub fn arm_reboot(&mut self) {
        debug!(host = %self.config.host, "Reboot armed");
        self.reboot_armed = true;
    }

    pub fn disarm_reboot(&mut self) {
        self.reboot_armed = false;
    }

    /// Leaves reboot mode once the trigger has run.
    ///
    /// An acknowledged trigger also drops the transport; later calls fail
    /// as `Closed` until the session is reopened.
    pub(crate) fn finish_reboot(&mut self, acknowledged: bool) {
        self.reboot_armed = false;
        if acknowledged && self.transport.take().is_some() {
            self.locked = false;
            info!(host = %self.config.host, "Reboot acknowledged, session dropped");
        }
    }

    /// Establishes the transport.
    ///
    /// Re-entry is not detected; opening an open session replaces its
    /// transport without closing it.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn open(
        &mut self,
        hostkey_verify: bool,
        allow_agent: bool,
        look_for_keys: bool,
    ) -> NcResult<()> {
        let params = self
            .config
            .connect_params(hostkey_verify, allow_agent, look_for_keys);
        let connected = time::timeout(self.timeout(), self.connector.connect(&params))
            .await
            .unwrap_or(Err(TransportError::Timeout));
        let transport = connected.map_err(|e| NcError::from_connect(&self.config.host, e))?;

        self.transport = Some(transport);
        self.locked = false;
        self.reboot_armed = false;
        info!(port = self.config.port, "Session opened");
        Ok(())
    }

    /// Tears the transport down.
    ///
    /// A timeout or disconnect while closing is logged and ignored; the
    /// session ends up closed either way.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn close(&mut self) -> NcResult<()> {
        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        self.locked = false;

        let limit = self.timeout();
        match time::timeout(limit, transport.close()).await {
            Ok(Ok(())) => {
                info!("Session closed");
                Ok(())
            }
            Ok(Err(TransportError::Timeout | TransportError::Disconnected)) | Err(_) => {
                warn!("Close did not complete cleanly, session dropped");
                Ok(())
            }
            Ok(Err(err)) => Err(self.translate("close-session", err)),
        }
    }

    /// Read-only retrieval.
    #[instrument(skip(self, filter))]
    pub async fn get(&mut self, filter: &Element) -> NcResult<Element> {
        match self.execute(Rpc::Get(filter)).await? {
            Outcome::Done(data) => Ok(data),
            Outcome::Rebooting => Err(NcError::Closed),
        }
    }

    /// Structured configuration write.
    #[instrument(skip(self, config))]
    pub async fn edit_config(&mut self, target: Datastore, config: &Element) -> NcResult<Reply> {
        self.execute(Rpc::EditConfig(target, config))
            .await
            .map(|outcome| outcome.into_reply(|_| Reply::Ok))
    }

    /// Structured vendor action.
    #[instrument(skip(self, action))]
    pub async fn action(&mut self, action: &Element) -> NcResult<Reply> {
        self.execute(Rpc::Action(action))
            .await
            .map(|outcome| outcome.into_reply(Reply::Data))
    }

    /// Runs CLI lines in system view and returns their normalised output.
    #[instrument(skip(self, commands))]
    pub async fn cli_config<S: AsRef<str>>(&mut self, commands: &[S]) -> NcResult<Reply> {
        self.execute(Rpc::CliConfig(join(commands)))
            .await
            .map(|outcome| outcome.into_reply(|reply| Reply::Text(response::cli_text(&reply))))
    }

    /// Runs CLI lines in user view and returns their normalised output.
    #[instrument(skip(self, commands))]
    pub async fn cli_display<S: AsRef<str>>(&mut self, commands: &[S]) -> NcResult<Reply> {
        self.execute(Rpc::CliDisplay(join(commands)))
            .await
            .map(|outcome| outcome.into_reply(|reply| Reply::Text(response::cli_text(&reply))))
    }

    /// Saves the running configuration to `filename`.
    #[instrument(skip(self))]
    pub async fn save(&mut self, filename: &str) -> NcResult<Reply> {
        self.execute(Rpc::Save(filename))
            .await
            .map(|outcome| outcome.into_reply(|_| Reply::Ok))
    }

    /// Rolls the running configuration back to `filename`.
    #[instrument(skip(self))]
    pub async fn rollback(&mut self, filename: &str) -> NcResult<Reply> {
        self.execute(Rpc::Rollback(filename))
            .await
            .map(|outcome| outcome.into_reply(|_| Reply::Ok))
    }

    /// Reboots the device now.
    ///
    /// Returns [`Reply::Rebooting`] when the connection drops as expected.
    /// The same timeout outside a reboot is still an error.
    #[instrument(skip(self), fields(host = %self.config.host))]
    pub async fn reboot(&mut self) -> NcResult<Reply> {
        self.arm_reboot();
        let reply = self.cli_display(&[REBOOT_COMMAND]).await;
        self.finish_reboot(reply.is_ok());
        reply
    }

    /// Appends a command to the staging queue.
    pub fn stage(&mut self, payload: impl Into<Payload>, kind: CommandKind) -> NcResult<()> {
        self.staged.stage(payload.into(), kind)
    }

    /// Appends the reboot trigger to the staging queue.
    pub fn stage_reboot(&mut self) -> NcResult<()> {
        self.staged.stage_reboot()
    }

    pub fn staged(&self) -> &StagingQueue {
        &self.staged
    }

    /// Renders the staging queue for audit without consuming it.
    pub fn stringify(&self) -> Vec<String> {
        self.staged.stringify()
    }

    /// Drops every staged command.
    pub fn discard_staged(&mut self) {
        self.staged.clear();
    }

    async fn execute(&mut self, rpc: Rpc<'_>) -> NcResult<Outcome> {
        let operation = rpc.name();
        let target = rpc.target();
        let limit = self.timeout();

        self.acquire(target, limit).await?;
        self.locked = true;

        let result = self.call(&rpc, limit).await;
        if self.reboot_armed
            && matches!(
                result,
                Err(TransportError::Timeout | TransportError::Disconnected)
            )
        {
            self.transport = None;
            self.locked = false;
            info!(host = %self.config.host, operation, "Device is rebooting");
            return Ok(Outcome::Rebooting);
        }

        let outcome = result.map_err(|err| self.translate(operation, err));
        let released = self.release(target, limit).await;
        self.locked = false;

        match (outcome, released) {
            (Ok(reply), Ok(())) => Ok(Outcome::Done(reply)),
            (Ok(_), Err(unlock)) => Err(unlock),
            (Err(err), Err(unlock)) => {
                debug!(error = %unlock, "Unlock failed after operation error");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
        }
    }

    async fn acquire(&mut self, target: Datastore, limit: Duration) -> NcResult<()> {
        let transport = self.transport.as_deref_mut().ok_or(NcError::Closed)?;
        let result = time::timeout(limit, transport.lock(target))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        match result {
            Ok(()) => Ok(()),
            Err(TransportError::Rpc(err)) if err.is_lock_denied() => Err(NcError::LockConflict {
                target: target.to_string(),
                message: err.message,
            }),
            Err(err) => Err(self.translate("lock", err)),
        }
    }

    async fn call(&mut self, rpc: &Rpc<'_>, limit: Duration) -> TransportResult<Element> {
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or(TransportError::Disconnected)?;
        debug!(operation = rpc.name(), "Sending rpc");
        time::timeout(limit, rpc.send(transport))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }

    /// Releases the lock; a transport that already went away has no lock.
    async fn release(&mut self, target: Datastore, limit: Duration) -> NcResult<()> {
        let Some(transport) = self.transport.as_deref_mut() else {
            return Ok(());
        };
        let result = time::timeout(limit, transport.unlock(target))
            .await
            .unwrap_or(Err(TransportError::Timeout));

        result.map_err(|err| {
            if err == TransportError::Disconnected {
                self.transport = None;
            }
            NcError::UnlockConflict {
                target: target.to_string(),
                message: err.to_string(),
            }
        })
    }

    fn translate(&mut self, operation: &str, err: TransportError) -> NcError {
        match err {
            TransportError::Rpc(err) => NcError::rpc(operation, err),
            TransportError::Timeout => NcError::timeout(operation, self.timeout()),
            TransportError::Disconnected => {
                warn!(host = %self.config.host, operation, "Transport disconnected");
                self.transport = None;
                NcError::Closed
            }
            other => NcError::Connection {
                host: self.config.host.clone(),
                message: other.to_string(),
            },
        }
    }
}

impl Outcome {
    fn into_reply(self, done: impl FnOnce(Element) -> Reply) -> Reply {
        match self {
            Outcome::Done(reply) => done(reply),
            Outcome::Rebooting => Reply::Rebooting,
        }
    }
}

fn join<S: AsRef<str>>(commands: &[S]) -> String {
    commands
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("\n")
}
