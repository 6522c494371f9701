//! Translation of high-level `zone.action=value` commands into raw ISCP messages
//!
//! Receivers speak a terse three-letter command language (`PWR01`, `MVL28`,
//! `SLZ2B`). Callers address them with readable commands such as
//! `main.power=on` or `zone2.selector=network`; this module owns the table
//! between the two.

use std::fmt;

use crate::error::{LinkError, Result};

/// Zones addressable through the command table, in receiver order
pub const ZONES: &[&str] = &["main", "zone2", "zone3", "zone4"];

/// Maximum raw volume step accepted by the receiver
pub const MAX_WIRE_VOLUME: u16 = 200;

/// Named inputs and their selector codes
const INPUTS: &[(&str, &str)] = &[
    ("video1", "00"),
    ("vcr/dvr", "00"),
    ("video2", "01"),
    ("cbl/sat", "01"),
    ("video3", "02"),
    ("game", "02"),
    ("video4", "03"),
    ("aux1", "03"),
    ("video5", "04"),
    ("aux2", "04"),
    ("video6", "05"),
    ("pc", "05"),
    ("video7", "06"),
    ("dvd", "10"),
    ("bd/dvd", "10"),
    ("strm-box", "11"),
    ("tv", "12"),
    ("tape-1", "20"),
    ("tape2", "21"),
    ("phono", "22"),
    ("cd", "23"),
    ("fm", "24"),
    ("am", "25"),
    ("tuner", "26"),
    ("music-server", "27"),
    ("dlna", "27"),
    ("internet-radio", "28"),
    ("usb", "29"),
    ("usb-rear", "2A"),
    ("network", "2B"),
    ("net", "2B"),
    ("airplay", "2D"),
    ("bluetooth", "2E"),
    ("multi-ch", "30"),
    ("universal-port", "40"),
    ("line", "41"),
    ("line1", "41"),
    ("line2", "42"),
    ("optical", "44"),
    ("coaxial", "45"),
    ("hdmi-5", "55"),
    ("hdmi-6", "56"),
    ("hdmi-7", "57"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Power,
    Volume,
    Selector,
    Mute,
}

impl Action {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "power" | "system-power" => Some(Action::Power),
            "volume" | "master-volume" => Some(Action::Volume),
            "selector" | "input-selector" => Some(Action::Selector),
            "mute" | "audio-muting" => Some(Action::Mute),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Action::Power => "power",
            Action::Volume => "volume",
            Action::Selector => "selector",
            Action::Mute => "mute",
        }
    }

    fn prefix(self, zone: &str) -> Option<&'static str> {
        let prefix = match (zone, self) {
            ("main", Action::Power) => "PWR",
            ("main", Action::Volume) => "MVL",
            ("main", Action::Selector) => "SLI",
            ("main", Action::Mute) => "AMT",
            ("zone2", Action::Power) => "ZPW",
            ("zone2", Action::Volume) => "ZVL",
            ("zone2", Action::Selector) => "SLZ",
            ("zone2", Action::Mute) => "ZMT",
            ("zone3", Action::Power) => "PW3",
            ("zone3", Action::Volume) => "VL3",
            ("zone3", Action::Selector) => "SL3",
            ("zone3", Action::Mute) => "MT3",
            ("zone4", Action::Power) => "PW4",
            ("zone4", Action::Volume) => "VL4",
            ("zone4", Action::Selector) => "SL4",
            ("zone4", Action::Mute) => "MT4",
            _ => return None,
        };
        Some(prefix)
    }

    fn encode(self, value: &str) -> Result<String> {
        let invalid = || LinkError::InvalidValue {
            action: self.name().to_string(),
            value: value.to_string(),
        };

        if value == "query" {
            return Ok("QSTN".to_string());
        }

        let argument = match self {
            Action::Power => match value {
                "on" => "01".to_string(),
                "standby" | "off" => "00".to_string(),
                _ => return Err(invalid()),
            },
            Action::Mute => match value {
                "on" => "01".to_string(),
                "off" => "00".to_string(),
                "toggle" => "TG".to_string(),
                _ => return Err(invalid()),
            },
            Action::Volume => match value {
                "up" => "UP".to_string(),
                "down" => "DOWN".to_string(),
                level => {
                    let level: u16 = level.parse().map_err(|_| invalid())?;
                    if level > MAX_WIRE_VOLUME {
                        return Err(invalid());
                    }
                    format!("{:02X}", level)
                }
            },
            Action::Selector => {
                if let Some((_, code)) = INPUTS.iter().find(|(name, _)| *name == value) {
                    code.to_string()
                } else if value.len() == 2 && value.chars().all(|c| c.is_ascii_hexdigit()) {
                    value.to_ascii_uppercase()
                } else {
                    return Err(invalid());
                }
            }
        };

        Ok(argument)
    }
}

/// A raw ISCP message, ready to be framed and written to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IscpCommand {
    message: String,
}

impl IscpCommand {
    /// Translate a `zone.action=value` command
    ///
    /// A command without a zone (`power=on`) addresses the main zone.
    pub fn parse(command: &str) -> Result<Self> {
        let unknown = || LinkError::UnknownCommand(command.to_string());

        let (target, value) = command.split_once('=').ok_or_else(unknown)?;
        let (zone, action) = match target.split_once('.') {
            Some((zone, action)) => (zone.trim(), action.trim()),
            None => ("main", target.trim()),
        };

        let action = Action::parse(action).ok_or_else(unknown)?;
        let prefix = action.prefix(zone).ok_or_else(unknown)?;
        let argument = action.encode(value.trim())?;

        Ok(Self {
            message: format!("{}{}", prefix, argument),
        })
    }

    /// The ISCP message without framing
    pub fn as_str(&self) -> &str {
        &self.message
    }

    /// Names accepted by the `selector` action
    pub fn input_names() -> impl Iterator<Item = &'static str> {
        INPUTS.iter().map(|(name, _)| *name)
    }
}

impl fmt::Display for IscpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
