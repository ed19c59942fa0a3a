//! In-memory device behind the transport traits
//!
//! [`MockDevice`] keeps a data tree, applies edit-config bodies to it the
//! way the device merges them, and records every call a session makes so
//! tests can check ordering and lock discipline. Failures and hangs can be
//! queued per operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use cw7_common::element::OPERATION_ATTR;
use cw7_common::{ns, Element, RpcError, TransportError};
use cw7_session::{
    ConnectParams, Connector, Datastore, DeviceConfig, Session, Transport, TransportResult,
    REBOOT_COMMAND,
};

/// Per-RPC timeout of sessions opened by [`MockDevice::session`].
pub const MOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Leaves that identify a list row when edits are merged.
const KEY_TAGS: &[&str] = &["IfIndex", "ID", "MemberID", "Port", "IfName"];

/// One transport call as the device saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Lock(Datastore),
    Unlock(Datastore),
    Get,
    EditConfig(Datastore, Element),
    Action(Element),
    CliConfig(String),
    CliDisplay(String),
    Save(String),
    Rollback(String),
    Close,
}

impl Call {
    /// Operation name used by [`MockDevice::fail_next`] and [`MockDevice::hang_next`].
    pub fn op(&self) -> &'static str {
        match self {
            Call::Lock(_) => "lock",
            Call::Unlock(_) => "unlock",
            Call::Get => "get",
            Call::EditConfig(..) => "edit-config",
            Call::Action(_) => "action",
            Call::CliConfig(_) => "cli-config",
            Call::CliDisplay(_) => "cli-display",
            Call::Save(_) => "save",
            Call::Rollback(_) => "rollback",
            Call::Close => "close",
        }
    }
}

#[derive(Debug)]
struct DeviceState {
    data: Element,
    calls: Vec<Call>,
    failures: Vec<(String, TransportError)>,
    hangs: Vec<String>,
    cli_outputs: HashMap<String, String>,
    locked: Option<Datastore>,
    up: bool,
    connects: usize,
}

impl DeviceState {
    fn take_failure(&mut self, op: &str) -> Option<TransportError> {
        let pos = self.failures.iter().position(|(o, _)| o == op)?;
        Some(self.failures.remove(pos).1)
    }

    fn take_hang(&mut self, op: &str) -> bool {
        match self.hangs.iter().position(|o| o == op) {
            Some(pos) => {
                self.hangs.remove(pos);
                true
            }
            None => false,
        }
    }

    /// The device went away; its locks die with the sessions.
    fn go_down(&mut self) {
        self.up = false;
        self.locked = None;
    }
}

/// Scripted in-memory device
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    /// Creates a device serving `data` as its running configuration.
    pub fn new(data: impl Into<Element>) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                data: data.into(),
                calls: Vec::new(),
                failures: Vec::new(),
                hangs: Vec::new(),
                cli_outputs: HashMap::new(),
                locked: None,
                up: true,
                connects: 0,
            })),
        }
    }

    pub fn connector(&self) -> MockConnector {
        MockConnector {
            state: Arc::clone(&self.state),
        }
    }

    /// Session settings pointing at this device.
    pub fn config(&self) -> DeviceConfig {
        DeviceConfig::new("mock-device", "admin", "admin").with_timeout(MOCK_TIMEOUT)
    }

    /// An unopened session.
    pub fn unopened_session(&self) -> Session {
        Session::new(self.config(), Arc::new(self.connector()))
    }

    /// An open session.
    pub async fn session(&self) -> Session {
        Session::connect(self.config(), Arc::new(self.connector()))
            .await
            .expect("mock device accepts connections")
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Makes the next `op` call fail with `error`.
    ///
    /// `op` is a [`Call::op`] name or `"connect"`.
    pub fn fail_next(&self, op: &str, error: TransportError) {
        self.state.lock().failures.push((op.to_string(), error));
    }

    /// Makes the next `op` call never answer.
    pub fn hang_next(&self, op: &str) {
        self.state.lock().hangs.push(op.to_string());
    }

    /// Output returned for an exact CLI command text.
    pub fn cli_output(&self, command: &str, output: &str) {
        self.state
            .lock()
            .cli_outputs
            .insert(command.to_string(), output.to_string());
    }

    /// Current running configuration.
    pub fn data(&self) -> Element {
        self.state.lock().data.clone()
    }

    pub fn set_data(&self, data: impl Into<Element>) {
        self.state.lock().data = data.into();
    }

    /// False after a reboot until the next connect.
    pub fn is_up(&self) -> bool {
        self.state.lock().up
    }

    /// Datastore locked right now, if any.
    pub fn lock_held(&self) -> Option<Datastore> {
        self.state.lock().locked
    }

    /// Number of successful connects.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }
}

/// Connector handing out transports to a [`MockDevice`]
#[derive(Debug, Clone)]
pub struct MockConnector {
    state: Arc<Mutex<DeviceState>>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, params: &ConnectParams) -> TransportResult<Box<dyn Transport>> {
        let hang = {
            let mut state = self.state.lock();
            if let Some(err) = state.take_failure("connect") {
                return Err(err);
            }
            state.take_hang("connect")
        };
        if hang {
            return std::future::pending().await;
        }

        let mut state = self.state.lock();
        state.up = true;
        state.locked = None;
        state.connects += 1;
        debug!(host = %params.host, "Mock device connected");
        Ok(Box::new(MockTransport {
            state: Arc::clone(&self.state),
        }))
    }
}

/// One session's view of a [`MockDevice`]
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<DeviceState>>,
}

impl MockTransport {
    /// Records `call`, applies queued failures and hangs, then runs `handle`.
    async fn exchange<F>(&mut self, call: Call, handle: F) -> TransportResult<Element>
    where
        F: FnOnce(&mut DeviceState) -> TransportResult<Element> + Send,
    {
        let op = call.op();
        let hang = {
            let mut state = self.state.lock();
            state.calls.push(call);
            if !state.up {
                return Err(TransportError::Disconnected);
            }
            if let Some(err) = state.take_failure(op) {
                return Err(err);
            }
            state.take_hang(op)
        };
        if hang {
            return std::future::pending().await;
        }

        let mut state = self.state.lock();
        handle(&mut *state)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&mut self, _filter: &Element) -> TransportResult<Element> {
        self.exchange(Call::Get, |state| {
            Ok(Element::new("data").with_child(state.data.clone()))
        })
        .await
    }

    async fn edit_config(
        &mut self,
        target: Datastore,
        config: &Element,
    ) -> TransportResult<Element> {
        self.exchange(Call::EditConfig(target, config.clone()), |state| {
            if config.local_name() != "top" {
                return Err(TransportError::Rpc(
                    RpcError::new("unknown-element", "edit body must be a <top> element")
                        .with_bad_element(config.local_name()),
                ));
            }
            merge(&mut state.data, config).map_err(TransportError::Rpc)?;
            Ok(ok())
        })
        .await
    }

    async fn action(&mut self, action: &Element) -> TransportResult<Element> {
        self.exchange(Call::Action(action.clone()), |_| Ok(ok()))
            .await
    }

    async fn cli_config(&mut self, commands: &str) -> TransportResult<Element> {
        self.exchange(Call::CliConfig(commands.to_string()), |state| {
            let output = state
                .cli_outputs
                .get(commands)
                .cloned()
                .unwrap_or_else(|| format!("system-view\r\n{}\r\n", commands));
            Ok(cli_reply("Configuration", output))
        })
        .await
    }

    async fn cli_display(&mut self, commands: &str) -> TransportResult<Element> {
        self.exchange(Call::CliDisplay(commands.to_string()), |state| {
            if commands.lines().any(|line| line.trim() == REBOOT_COMMAND) {
                state.go_down();
                return Err(TransportError::Disconnected);
            }
            let output = state.cli_outputs.get(commands).cloned().unwrap_or_default();
            Ok(cli_reply("Execution", output))
        })
        .await
    }

    async fn save(&mut self, filename: &str) -> TransportResult<Element> {
        self.exchange(Call::Save(filename.to_string()), |_| Ok(ok()))
            .await
    }

    async fn rollback(&mut self, filename: &str) -> TransportResult<Element> {
        self.exchange(Call::Rollback(filename.to_string()), |_| Ok(ok()))
            .await
    }

    async fn lock(&mut self, target: Datastore) -> TransportResult<()> {
        self.exchange(Call::Lock(target), |state| {
            if state.locked.is_some() {
                return Err(TransportError::Rpc(RpcError::new(
                    "lock-denied",
                    "lock is already held",
                )));
            }
            state.locked = Some(target);
            Ok(ok())
        })
        .await
        .map(|_| ())
    }

    async fn unlock(&mut self, target: Datastore) -> TransportResult<()> {
        self.exchange(Call::Unlock(target), |state| {
            if state.locked != Some(target) {
                return Err(TransportError::Rpc(RpcError::new(
                    "operation-failed",
                    format!("{} is not locked", target),
                )));
            }
            state.locked = None;
            Ok(ok())
        })
        .await
        .map(|_| ())
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.exchange(Call::Close, |state| {
            state.locked = None;
            Ok(ok())
        })
        .await
        .map(|_| ())
    }
}

fn ok() -> Element {
    Element::new("rpc-reply").with_child(Element::new("ok"))
}

fn cli_reply(section: &str, output: String) -> Element {
    Element::new("rpc-reply")
        .with_attr("xmlns", ns::NETCONF_BASE)
        .with_child(Element::new("CLI").with_child(Element::leaf(section, output)))
}

/// Key leaves of a list row.
fn keys(node: &Element) -> Vec<(&str, Option<&str>)> {
    node.children()
        .iter()
        .filter(|c| c.is_leaf() && KEY_TAGS.contains(&c.local_name()))
        .map(|c| (c.local_name(), c.text()))
        .collect()
}

/// True if `node` is the instance `change` addresses.
fn addresses(node: &Element, change: &Element) -> bool {
    node.local_name() == change.local_name()
        && keys(change)
            .into_iter()
            .all(|(tag, value)| node.child(tag).and_then(Element::text) == value)
}

/// Copy of `change` without operation attributes, as stored by the device.
fn stored(change: &Element) -> Element {
    let mut copy = change.clone();
    strip(&mut copy);
    copy
}

fn strip(node: &mut Element) {
    node.remove_attr(OPERATION_ATTR);
    for child in node.children_mut() {
        strip(child);
    }
}

/// Applies the children of `edit` to the children of `data`.
fn merge(data: &mut Element, edit: &Element) -> Result<(), RpcError> {
    for change in edit.children() {
        let position = data
            .children()
            .iter()
            .position(|node| addresses(node, change));
        match (change.attr(OPERATION_ATTR), position) {
            (Some("delete"), None) => {
                return Err(RpcError::new(
                    "data-missing",
                    format!("{} does not exist", change.local_name()),
                )
                .with_bad_element(change.local_name()));
            }
            (Some("create"), Some(_)) => {
                return Err(RpcError::new(
                    "data-exists",
                    format!("{} already exists", change.local_name()),
                )
                .with_bad_element(change.local_name()));
            }
            (Some("delete" | "remove"), Some(pos)) => {
                data.children_mut().remove(pos);
            }
            (Some("remove"), None) => {}
            (Some("replace"), Some(pos)) => {
                data.children_mut()[pos] = stored(change);
            }
            (_, None) => data.push(stored(change)),
            (_, Some(pos)) => {
                let node = &mut data.children_mut()[pos];
                if change.is_leaf() {
                    if let Some(text) = change.text() {
                        node.set_text(text);
                    }
                } else {
                    merge(node, change)?;
                }
            }
        }
    }
    Ok(())
}
