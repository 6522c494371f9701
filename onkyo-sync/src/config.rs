//! Configuration snapshot consumed by the sync engine
//!
//! Settings are read fresh on every decision and never written by the
//! engine itself. Keys follow the plugin's `config.json` (camelCase);
//! out-of-range numbers are clamped rather than rejected so a bad value in
//! the file never stops the engine from starting.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize};

/// Zone used when none is configured
pub const DEFAULT_ZONE: &str = "main";

/// Input selected when input sync is on and none is configured
pub const DEFAULT_INPUT: &str = "line1";

/// Upper bound of the player-side volume scale
pub const MAX_VOLUME: u8 = 100;

/// Behaviour toggles and receiver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Bind to the first discovered receiver instead of the configured one
    pub auto_discovery: bool,

    #[serde(rename = "receiverIP", deserialize_with = "non_empty")]
    pub receiver_ip: Option<String>,

    #[serde(deserialize_with = "port")]
    pub receiver_port: Option<u16>,

    #[serde(deserialize_with = "non_empty")]
    pub receiver_model: Option<String>,

    /// Zone commands are addressed to
    pub zone: String,

    /// Power the receiver on when playback starts
    pub power_on: bool,

    /// Ceiling applied to every volume sent to the receiver
    #[serde(deserialize_with = "volume")]
    pub max_volume: u8,

    /// Force a volume when the receiver is powered on
    pub set_volume: bool,

    /// Volume forced at power on; `max_volume` when unset
    #[serde(deserialize_with = "optional_volume")]
    pub set_volume_value: Option<u8>,

    /// Select an input when the receiver is powered on
    pub set_input: bool,

    pub set_input_value: String,

    /// Put the receiver in standby when playback pauses or stops
    pub standby: bool,

    /// Seconds to wait before going to standby
    #[serde(deserialize_with = "seconds")]
    pub standby_delay: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_discovery: true,
            receiver_ip: None,
            receiver_port: None,
            receiver_model: None,
            zone: DEFAULT_ZONE.to_string(),
            power_on: true,
            max_volume: MAX_VOLUME,
            set_volume: false,
            set_volume_value: None,
            set_input: false,
            set_input_value: DEFAULT_INPUT.to_string(),
            standby: true,
            standby_delay: 0,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document
    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.normalized())
    }

    /// Read settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Fill blank string settings with their defaults
    pub fn normalized(mut self) -> Self {
        if self.zone.trim().is_empty() {
            self.zone = DEFAULT_ZONE.to_string();
        }
        if self.set_input_value.trim().is_empty() {
            self.set_input_value = DEFAULT_INPUT.to_string();
        }
        self
    }

    /// Volume forced onto the receiver at power on
    pub fn target_volume(&self) -> u8 {
        self.clamp_volume(self.set_volume_value.unwrap_or(self.max_volume))
    }

    /// Clamp a player volume to the configured ceiling
    pub fn clamp_volume(&self, volume: u8) -> u8 {
        volume.min(self.max_volume).min(MAX_VOLUME)
    }

    pub fn standby_delay(&self) -> Duration {
        Duration::from_secs(self.standby_delay)
    }
}

/// Values submitted from the action settings section
///
/// Numbers arrive signed and unchecked; [`ActionUpdate::apply`] clamps them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ActionUpdate {
    pub power_on: bool,
    pub standby: bool,
    pub zone: Option<String>,
    pub standby_delay: i64,
    pub set_volume: bool,
    pub set_volume_value: i64,
    pub max_volume: i64,
    pub set_input: bool,
    pub set_input_value: Option<String>,
}

impl ActionUpdate {
    pub fn apply(&self, settings: &mut Settings) {
        settings.power_on = self.power_on;
        settings.standby = self.standby;
        settings.zone = self
            .zone
            .clone()
            .filter(|z| !z.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ZONE.to_string());
        settings.standby_delay = self.standby_delay.max(0) as u64;
        settings.set_volume = self.set_volume;
        settings.set_volume_value = Some(clamp_volume(self.set_volume_value));
        settings.max_volume = clamp_volume(self.max_volume);
        settings.set_input = self.set_input;
        settings.set_input_value = self
            .set_input_value
            .clone()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INPUT.to_string());
    }
}

/// Read-only view of the current settings
pub trait ConfigSource: Send + Sync {
    fn snapshot(&self) -> Settings;
}

impl ConfigSource for Settings {
    fn snapshot(&self) -> Settings {
        self.clone()
    }
}

/// Settings shared between the engine and whoever edits them
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Edit the settings in place
    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        let mut settings = self.inner.write();
        f(&mut settings);
    }

    pub fn replace(&self, settings: Settings) {
        *self.inner.write() = settings.normalized();
    }

    /// Apply a submitted action section
    pub fn apply_actions(&self, update: &ActionUpdate) {
        self.update(|settings| update.apply(settings));
    }
}

impl ConfigSource for SharedSettings {
    fn snapshot(&self) -> Settings {
        self.inner.read().clone()
    }
}

fn clamp_volume(value: i64) -> u8 {
    value.clamp(0, MAX_VOLUME as i64) as u8
}

/// Numbers in `config.json` may be written as numbers or strings
#[derive(Deserialize)]
#[serde(untagged)]
enum Number {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Number {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(*i),
            Number::Float(f) if f.is_finite() => Some(*f as i64),
            Number::Float(_) => None,
            Number::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(Option::<Number>::deserialize(deserializer)?.and_then(|n| n.as_i64()))
}

fn volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    Ok(number(deserializer)?.map(clamp_volume).unwrap_or(MAX_VOLUME))
}

fn optional_volume<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u8>, D::Error> {
    Ok(number(deserializer)?.map(clamp_volume))
}

fn seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(number(deserializer)?.map(|s| s.max(0) as u64).unwrap_or(0))
}

fn port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(number(deserializer)?.and_then(|p| u16::try_from(p).ok()).filter(|p| *p != 0))
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.auto_discovery);
        assert_eq!(settings.zone, "main");
        assert!(settings.power_on);
        assert_eq!(settings.max_volume, 100);
        assert_eq!(settings.set_input_value, "line1");
        assert!(settings.standby);
        assert_eq!(settings.standby_delay(), Duration::ZERO);
    }

    #[test]
    fn test_parse_config_file_shape() {
        let json = r#"{
            "autoDiscovery": false,
            "receiverIP": "192.168.1.50",
            "receiverPort": "60128",
            "receiverModel": "TX-NR686",
            "zone": "zone2",
            "maxVolume": 80,
            "setVolume": true,
            "setVolumeValue": 35,
            "setInput": true,
            "setInputValue": "network",
            "standbyDelay": 30
        }"#;

        let settings = Settings::from_json_str(json).unwrap();
        assert!(!settings.auto_discovery);
        assert_eq!(settings.receiver_ip.as_deref(), Some("192.168.1.50"));
        assert_eq!(settings.receiver_port, Some(60128));
        assert_eq!(settings.zone, "zone2");
        assert_eq!(settings.max_volume, 80);
        assert_eq!(settings.set_volume_value, Some(35));
        assert_eq!(settings.standby_delay(), Duration::from_secs(30));
        // Missing keys keep their defaults
        assert!(settings.power_on);
        assert!(settings.standby);
    }

    #[rstest]
    #[case(r#"{"maxVolume": -5}"#, 0)]
    #[case(r#"{"maxVolume": 250}"#, 100)]
    #[case(r#"{"maxVolume": "70"}"#, 70)]
    #[case(r#"{"maxVolume": null}"#, 100)]
    fn test_max_volume_is_clamped(#[case] json: &str, #[case] expected: u8) {
        assert_eq!(Settings::from_json_str(json).unwrap().max_volume, expected);
    }

    #[test]
    fn test_negative_delay_clamps_to_zero() {
        let settings = Settings::from_json_str(r#"{"standbyDelay": -3}"#).unwrap();
        assert_eq!(settings.standby_delay, 0);
    }

    #[test]
    fn test_blank_strings_fall_back() {
        let settings =
            Settings::from_json_str(r#"{"zone": "", "setInputValue": " ", "receiverIP": ""}"#)
                .unwrap();
        assert_eq!(settings.zone, "main");
        assert_eq!(settings.set_input_value, "line1");
        assert_eq!(settings.receiver_ip, None);
    }

    #[test]
    fn test_target_volume() {
        let mut settings = Settings {
            max_volume: 80,
            ..Default::default()
        };
        assert_eq!(settings.target_volume(), 80);

        settings.set_volume_value = Some(40);
        assert_eq!(settings.target_volume(), 40);

        settings.set_volume_value = Some(95);
        assert_eq!(settings.target_volume(), 80);
    }

    #[test]
    fn test_action_update_clamps() {
        let shared = SharedSettings::default();
        shared.apply_actions(&ActionUpdate {
            power_on: false,
            standby: true,
            zone: Some("zone2".to_string()),
            standby_delay: -10,
            set_volume: true,
            set_volume_value: -1,
            max_volume: 120,
            set_input: true,
            set_input_value: None,
        });

        let settings = shared.snapshot();
        assert!(!settings.power_on);
        assert_eq!(settings.zone, "zone2");
        assert_eq!(settings.standby_delay, 0);
        assert_eq!(settings.set_volume_value, Some(0));
        assert_eq!(settings.max_volume, 100);
        assert_eq!(settings.set_input_value, "line1");
    }
}
