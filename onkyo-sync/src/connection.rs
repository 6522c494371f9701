//! Which receiver the engine is bound to
//!
//! Covers the bound [`ReceiverConnection`], the [`ZoneSet`] of the bound
//! model, decoding receiver selector values, and choosing a receiver from a
//! discovery round.

use std::fmt;

use onkyo_discovery::{Device, DiscoveryOutcome};
use onkyo_link::{DEFAULT_PORT, ZONES};

use crate::config::{Settings, DEFAULT_ZONE};
use crate::error::{Result, SyncError};

/// Notice shown once when no receiver can be bound
pub const NO_RECEIVERS_NOTICE: &str = "No Onkyo receivers found. Please manually configure.";

/// Address of the receiver commands are sent to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiverConnection {
    pub host: String,
    pub port: u16,
    pub model: String,
}

impl ReceiverConnection {
    pub fn new(host: impl Into<String>, port: u16, model: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            model: model.into(),
        }
    }

    /// A manually entered receiver; an empty or non-numeric port falls back
    /// to the eISCP default
    pub fn manual(host: &str, port: &str, model: &str) -> Self {
        let port = port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PORT);
        Self::new(host.trim(), port, model.trim())
    }

    /// Host present and port set; nothing may be dispatched otherwise
    pub fn is_valid(&self) -> bool {
        !self.host.is_empty() && self.port != 0
    }
}

impl From<&Device> for ReceiverConnection {
    fn from(device: &Device) -> Self {
        Self::new(device.host.clone(), device.port, device.model.clone())
    }
}

impl fmt::Display for ReceiverConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model.is_empty() {
            write!(f, "{}:{}", self.host, self.port)
        } else {
            write!(f, "{} at {}:{}", self.model, self.host, self.port)
        }
    }
}

/// A receiver picked in the connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverChoice {
    /// One of the discovered receivers
    Discovered { connection: ReceiverConnection, mac: String },
    /// The user typed the address in
    Manual,
}

impl ReceiverChoice {
    /// Decode a selector value, `manual` or `<host>_<model>_<mac>_<port>`
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("manual") {
            return Ok(ReceiverChoice::Manual);
        }

        let invalid = || SyncError::Config(format!("Invalid receiver selector: {}", value));

        // Host and port never contain '_', the model might
        let (rest, port) = value.rsplit_once('_').ok_or_else(invalid)?;
        let (rest, mac) = rest.rsplit_once('_').ok_or_else(invalid)?;
        let (host, model) = rest.split_once('_').ok_or_else(invalid)?;

        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }

        Ok(ReceiverChoice::Discovered {
            connection: ReceiverConnection::new(host, port, model),
            mac: mac.to_string(),
        })
    }

    /// Resolve the choice, using the manual fields for [`ReceiverChoice::Manual`]
    pub fn into_connection(self, host: &str, port: &str, model: &str) -> ReceiverConnection {
        match self {
            ReceiverChoice::Discovered { connection, .. } => connection,
            ReceiverChoice::Manual => ReceiverConnection::manual(host, port, model),
        }
    }
}

/// Zones addressable on the bound model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSet {
    model: String,
    zones: Vec<String>,
}

/// Zone count per model family, matched on the model name prefix
///
/// Longer prefixes come first so a specific entry wins over its family.
const MODEL_ZONES: &[(&str, usize)] = &[
    ("TX-SR3", 1),
    ("TX-SR", 2),
    ("TX-NR5", 2),
    ("TX-NR", 3),
    ("TX-RZ", 3),
    ("PR-RZ", 3),
    ("PR-SC", 4),
];

impl ZoneSet {
    /// Zones for a model
    ///
    /// Models outside the table get every zone in the command table.
    pub fn for_model(model: &str) -> Self {
        let upper = model.trim().to_ascii_uppercase();
        let count = MODEL_ZONES
            .iter()
            .find(|(prefix, _)| upper.starts_with(prefix))
            .map_or(ZONES.len(), |(_, count)| *count);

        Self {
            model: model.to_string(),
            zones: ZONES.iter().take(count).map(|z| z.to_string()).collect(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn zones(&self) -> &[String] {
        &self.zones
    }

    pub fn contains(&self, zone: &str) -> bool {
        self.zones.iter().any(|z| z == zone)
    }

    /// The configured zone if supported, otherwise `main`
    pub fn resolve<'a>(&self, configured: &'a str) -> &'a str {
        if self.contains(configured) {
            configured
        } else {
            tracing::warn!(
                "Zone '{}' is not available on {}, using {}",
                configured,
                self.model,
                DEFAULT_ZONE
            );
            DEFAULT_ZONE
        }
    }
}

impl Default for ZoneSet {
    fn default() -> Self {
        Self::for_model("")
    }
}

/// What a discovery round means for the bound receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Bind(ReceiverConnection),
    NeedsConfiguration,
}

/// Pick the receiver to bind after a discovery round
pub fn select_connection(outcome: &DiscoveryOutcome, settings: &Settings) -> Selection {
    if let DiscoveryOutcome::Malformed(reason) = outcome {
        tracing::warn!("Discovery reply could not be used: {}", reason);
    }

    let connection = match outcome.first() {
        Some(first) if settings.auto_discovery => ReceiverConnection::from(first),
        Some(first) => ReceiverConnection::new(
            settings.receiver_ip.clone().unwrap_or_else(|| first.host.clone()),
            settings.receiver_port.unwrap_or(first.port),
            settings
                .receiver_model
                .clone()
                .unwrap_or_else(|| first.model.clone()),
        ),
        None if !settings.auto_discovery => match (&settings.receiver_ip, settings.receiver_port) {
            (Some(host), Some(port)) => ReceiverConnection::new(
                host.clone(),
                port,
                settings.receiver_model.clone().unwrap_or_default(),
            ),
            _ => return Selection::NeedsConfiguration,
        },
        None => return Selection::NeedsConfiguration,
    };

    if connection.is_valid() {
        Selection::Bind(connection)
    } else {
        Selection::NeedsConfiguration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn device(host: &str, model: &str) -> Device {
        Device {
            host: host.to_string(),
            port: 60128,
            model: model.to_string(),
            mac: "0009B0E4A2F1".to_string(),
        }
    }

    fn manual_settings() -> Settings {
        Settings {
            auto_discovery: false,
            receiver_ip: Some("10.0.0.8".to_string()),
            receiver_port: Some(60129),
            receiver_model: Some("TX-SR333".to_string()),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("192.168.1.50", 60128, true)]
    #[case("", 60128, false)]
    #[case("192.168.1.50", 0, false)]
    fn test_connection_validity(#[case] host: &str, #[case] port: u16, #[case] valid: bool) {
        assert_eq!(ReceiverConnection::new(host, port, "").is_valid(), valid);
    }

    #[rstest]
    #[case("60130", 60130)]
    #[case("", 60128)]
    #[case("abc", 60128)]
    #[case("0", 60128)]
    fn test_manual_port_default(#[case] port: &str, #[case] expected: u16) {
        assert_eq!(ReceiverConnection::manual("10.0.0.8", port, "").port, expected);
    }

    #[test]
    fn test_parse_discovered_choice() {
        let choice = ReceiverChoice::parse("192.168.1.50_TX-NR686_0009B0E4A2F1_60128").unwrap();
        assert_eq!(
            choice,
            ReceiverChoice::Discovered {
                connection: ReceiverConnection::new("192.168.1.50", 60128, "TX-NR686"),
                mac: "0009B0E4A2F1".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_model_with_underscore() {
        let choice = ReceiverChoice::parse("10.0.0.8_TX_NR_0009B0_60128").unwrap();
        let connection = choice.into_connection("", "", "");
        assert_eq!(connection.model, "TX_NR");
        assert_eq!(connection.port, 60128);
    }

    #[test]
    fn test_parse_manual_choice() {
        let choice = ReceiverChoice::parse("manual").unwrap();
        assert_eq!(choice, ReceiverChoice::Manual);
        assert_eq!(
            choice.into_connection("10.0.0.8", "", "TX-SR333"),
            ReceiverConnection::new("10.0.0.8", 60128, "TX-SR333")
        );
    }

    #[rstest]
    #[case("")]
    #[case("192.168.1.50")]
    #[case("192.168.1.50_TX-NR686_mac_port")]
    fn test_parse_invalid_choice(#[case] value: &str) {
        assert!(matches!(ReceiverChoice::parse(value), Err(SyncError::Config(_))));
    }

    #[rstest]
    #[case("TX-SR393", &["main"])]
    #[case("TX-SR444", &["main", "zone2"])]
    #[case("TX-NR525", &["main", "zone2"])]
    #[case("TX-NR686", &["main", "zone2", "zone3"])]
    #[case("tx-rz50", &["main", "zone2", "zone3"])]
    #[case("PR-SC5530", &["main", "zone2", "zone3", "zone4"])]
    #[case("", &["main", "zone2", "zone3", "zone4"])]
    #[case("HT-R695", &["main", "zone2", "zone3", "zone4"])]
    fn test_zones_for_model(#[case] model: &str, #[case] expected: &[&str]) {
        assert_eq!(ZoneSet::for_model(model).zones(), expected);
    }

    #[test]
    fn test_zone_resolution() {
        let zones = ZoneSet::for_model("TX-NR686");
        assert!(zones.contains("zone2"));
        assert!(!zones.contains("dock"));
        assert_eq!(zones.resolve("zone3"), "zone3");
        assert_eq!(zones.resolve("zone4"), "main");
        assert_eq!(zones.resolve("patio"), "main");
    }

    #[test]
    fn test_select_first_device_with_auto_discovery() {
        let outcome = DiscoveryOutcome::Found(vec![
            device("192.168.1.50", "TX-NR686"),
            device("192.168.1.60", "TX-RZ50"),
        ]);
        assert_eq!(
            select_connection(&outcome, &Settings::default()),
            Selection::Bind(ReceiverConnection::new("192.168.1.50", 60128, "TX-NR686"))
        );
    }

    #[test]
    fn test_select_configured_device_without_auto_discovery() {
        let outcome = DiscoveryOutcome::Found(vec![device("192.168.1.50", "TX-NR686")]);
        assert_eq!(
            select_connection(&outcome, &manual_settings()),
            Selection::Bind(ReceiverConnection::new("10.0.0.8", 60129, "TX-SR333"))
        );

        // Unset fields come from the first device
        let partial = Settings {
            auto_discovery: false,
            receiver_ip: Some("10.0.0.8".to_string()),
            ..Default::default()
        };
        assert_eq!(
            select_connection(&outcome, &partial),
            Selection::Bind(ReceiverConnection::new("10.0.0.8", 60128, "TX-NR686"))
        );
    }

    #[rstest]
    #[case(DiscoveryOutcome::Empty)]
    #[case(DiscoveryOutcome::Malformed("bad".to_string()))]
    fn test_nothing_found(#[case] outcome: DiscoveryOutcome) {
        assert_eq!(
            select_connection(&outcome, &Settings::default()),
            Selection::NeedsConfiguration
        );
        assert_eq!(
            select_connection(&outcome, &manual_settings()),
            Selection::Bind(ReceiverConnection::new("10.0.0.8", 60129, "TX-SR333"))
        );
    }
}
