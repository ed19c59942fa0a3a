//! Command model: the units of work a feature stages for execution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::error::{NcError, NcResult};

/// The fixed set of primitive operations a staged command can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Structured `<edit-config>` write.
    EditConfig,
    /// Raw CLI lines run in system view.
    CliConfig,
    /// Raw CLI lines run in user view.
    CliDisplay,
    /// Save the running configuration to a file.
    Save,
    /// Roll the running configuration back to a file.
    Rollback,
    /// Structured `<action>` request.
    Action,
}

impl CommandKind {
    /// All kinds, in declaration order.
    pub const ALL: [CommandKind; 6] = [
        CommandKind::EditConfig,
        CommandKind::CliConfig,
        CommandKind::CliDisplay,
        CommandKind::Save,
        CommandKind::Rollback,
        CommandKind::Action,
    ];

    /// Returns the canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::EditConfig => "edit_config",
            CommandKind::CliConfig => "cli_config",
            CommandKind::CliDisplay => "cli_display",
            CommandKind::Save => "save",
            CommandKind::Rollback => "rollback",
            CommandKind::Action => "action",
        }
    }

    /// Returns true if `payload` can be dispatched by this kind.
    pub fn accepts(&self, payload: &Payload) -> bool {
        match (self, payload) {
            (CommandKind::EditConfig | CommandKind::Action, Payload::Tree(_)) => true,
            (CommandKind::CliConfig | CommandKind::CliDisplay, Payload::Cli(lines)) => {
                !lines.is_empty()
            }
            (CommandKind::Save | CommandKind::Rollback, Payload::File(name)) => !name.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = NcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| NcError::UnknownCommandKind { kind: s.to_string() })
    }
}

/// What a staged command carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    /// A structured config tree.
    Tree(Element),
    /// One or more CLI lines, run in order.
    Cli(Vec<String>),
    /// A file name on the device.
    File(String),
}

impl Payload {
    /// Creates a single CLI line payload.
    pub fn cli(line: impl Into<String>) -> Self {
        Payload::Cli(vec![line.into()])
    }

    /// Creates a multi-line CLI payload.
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Payload::Cli(lines.into_iter().map(Into::into).collect())
    }

    /// Creates a file payload.
    pub fn file(name: impl Into<String>) -> Self {
        Payload::File(name.into())
    }

    /// Short description used in error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            Payload::Tree(_) => "config tree",
            Payload::Cli(lines) if lines.is_empty() => "empty command list",
            Payload::Cli(_) => "command list",
            Payload::File(name) if name.is_empty() => "empty file name",
            Payload::File(_) => "file name",
        }
    }
}

impl From<Element> for Payload {
    fn from(tree: Element) -> Self {
        Payload::Tree(tree)
    }
}

/// One pending unit of work.
///
/// Fields are private: a staged command is validated once when created and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedCommand {
    payload: Payload,
    kind: CommandKind,
}

impl StagedCommand {
    /// Validates that `kind` can dispatch `payload`.
    pub fn new(payload: Payload, kind: CommandKind) -> NcResult<Self> {
        if !kind.accepts(&payload) {
            return Err(NcError::PayloadMismatch {
                kind,
                payload: payload.describe(),
            });
        }
        Ok(Self { payload, kind })
    }

    /// Parses the kind by name first, rejecting unknown kinds.
    pub fn parse(payload: Payload, kind: &str) -> NcResult<Self> {
        Self::new(payload, kind.parse()?)
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Renders the command as the lines an operator would audit.
    pub fn render(&self) -> Vec<String> {
        match (&self.kind, &self.payload) {
            (_, Payload::Cli(lines)) => lines.clone(),
            (_, Payload::Tree(tree)) => vec![tree.to_xml()],
            (CommandKind::Rollback, Payload::File(name)) => vec![format!("rollback {}", name)],
            (_, Payload::File(name)) => vec![format!("save {}", name)],
        }
    }
}

impl fmt::Display for StagedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render().join("\n"))
    }
}
