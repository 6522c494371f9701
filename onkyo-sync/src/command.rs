//! Logical receiver commands and their encoding

use std::fmt;
use std::sync::Arc;

use onkyo_link::ReceiverLink;

use crate::config::MAX_VOLUME;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Power,
    Volume,
    Selector,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Power => "power",
            Action::Volume => "volume",
            Action::Selector => "selector",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandValue {
    Level(u8),
    Name(String),
}

impl fmt::Display for CommandValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandValue::Level(level) => write!(f, "{}", level),
            CommandValue::Name(name) => f.write_str(name),
        }
    }
}

/// One logical command, zone-independent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub value: CommandValue,
}

impl Command {
    pub fn power_on() -> Self {
        Self {
            action: Action::Power,
            value: CommandValue::Name("on".to_string()),
        }
    }

    pub fn standby() -> Self {
        Self {
            action: Action::Power,
            value: CommandValue::Name("standby".to_string()),
        }
    }

    /// Volume on the player scale (0-100)
    pub fn volume(level: u8) -> Self {
        Self {
            action: Action::Volume,
            value: CommandValue::Level(level),
        }
    }

    pub fn selector(input: impl Into<String>) -> Self {
        Self {
            action: Action::Selector,
            value: CommandValue::Name(input.into()),
        }
    }

    pub fn is_standby(&self) -> bool {
        self.action == Action::Power
            && matches!(&self.value, CommandValue::Name(name) if name == "standby")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.action, self.value)
    }
}

/// Encodes commands and hands them to the link
///
/// Only writes to an already open session; opening and closing sessions
/// belongs to the supervisor.
#[derive(Clone)]
pub struct CommandDispatcher {
    link: Arc<dyn ReceiverLink>,
}

impl CommandDispatcher {
    pub fn new(link: Arc<dyn ReceiverLink>) -> Self {
        Self { link }
    }

    /// Wire string for a command: `<zone>.<action>=<value>`
    ///
    /// Volume is the only transformed value: player scale 0-100 doubles to
    /// the receiver's 0-200.
    pub fn encode(zone: &str, command: &Command) -> String {
        let value = match (&command.action, &command.value) {
            (Action::Volume, CommandValue::Level(level)) => {
                (u16::from((*level).min(MAX_VOLUME)) * 2).to_string()
            }
            (_, value) => value.to_string(),
        };
        format!("{}.{}={}", zone, command.action, value)
    }

    /// Send one command, returning the wire string that was handed over
    pub fn send(&self, zone: &str, command: &Command) -> Result<String> {
        let wire = Self::encode(zone, command);
        self.link.send(&wire)?;
        tracing::debug!("Sent {}", wire);
        Ok(wire)
    }
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("connected", &self.link.is_connected())
            .finish()
    }
}
