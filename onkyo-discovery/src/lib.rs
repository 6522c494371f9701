//! Onkyo receiver discovery results
//!
//! This crate defines what a discovered receiver looks like and how a batch
//! of discovery replies is turned into an explicit [`DiscoveryOutcome`]. The
//! network broadcast itself lives behind the [`Discover`] trait so callers
//! can plug in whatever mechanism their platform provides.
//!
//! # Quick Start
//!
//! ```
//! use onkyo_discovery::{collect_replies, DiscoveryOutcome};
//!
//! let replies = vec![("192.168.1.50", "!1ECNTX-NR686/60128/DX/0009B0E4A2F1\x1A")];
//!
//! match collect_replies(replies) {
//!     DiscoveryOutcome::Found(devices) => {
//!         for device in devices {
//!             println!("Found {} at {}:{}", device.model, device.host, device.port);
//!         }
//!     }
//!     DiscoveryOutcome::Empty => println!("No receivers answered"),
//!     DiscoveryOutcome::Malformed(reason) => println!("Unusable replies: {}", reason),
//! }
//! ```

mod error;
mod ecn;

pub use ecn::{collect_replies, parse_ecn_reply};
pub use error::{DiscoveryError, Result};

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Information about a discovered receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// IP address or hostname the receiver answered from
    pub host: String,
    /// eISCP port (typically 60128)
    pub port: u16,
    /// Model name (e.g., "TX-NR686")
    pub model: String,
    /// MAC address as reported by the receiver, may be empty
    pub mac: String,
}

impl Device {
    /// Selector value identifying this device in a receiver picker:
    /// `<host>_<model>_<mac>_<port>`.
    pub fn selector_value(&self) -> String {
        format!("{}_{}_{}_{}", self.host, self.model, self.mac, self.port)
    }

    /// Human readable label, `<model> : <mac>`
    pub fn label(&self) -> String {
        format!("{} : {}", self.model, self.mac)
    }
}

/// Result of one discovery round.
///
/// Keeps "nobody answered" apart from "something answered but we could not
/// make sense of it" so callers can log them differently while handling both
/// with the same fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// At least one receiver was found, in reply order
    Found(Vec<Device>),
    /// No receiver replied
    Empty,
    /// Replies arrived but none could be parsed
    Malformed(String),
}

impl DiscoveryOutcome {
    /// Build an outcome from an already-parsed device list
    pub fn from_devices(devices: Vec<Device>) -> Self {
        if devices.is_empty() {
            DiscoveryOutcome::Empty
        } else {
            DiscoveryOutcome::Found(devices)
        }
    }

    /// Devices found, empty for `Empty` and `Malformed`
    pub fn devices(&self) -> &[Device] {
        match self {
            DiscoveryOutcome::Found(devices) => devices,
            _ => &[],
        }
    }

    /// First device found, if any
    pub fn first(&self) -> Option<&Device> {
        self.devices().first()
    }
}

/// Capability to look for receivers.
pub trait Discover: Send + Sync {
    /// Run one discovery round, waiting at most `timeout` for replies
    fn discover(&self, timeout: Duration) -> DiscoveryOutcome;
}

/// Discovery that always returns the same devices.
///
/// Useful when receivers are known up front, and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    devices: Vec<Device>,
}

impl StaticDiscovery {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }
}

impl Discover for StaticDiscovery {
    fn discover(&self, _timeout: Duration) -> DiscoveryOutcome {
        DiscoveryOutcome::from_devices(self.devices.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> Device {
        Device {
            host: "192.168.1.50".to_string(),
            port: 60128,
            model: "TX-NR686".to_string(),
            mac: "0009B0E4A2F1".to_string(),
        }
    }

    #[test]
    fn test_selector_value() {
        assert_eq!(
            device().selector_value(),
            "192.168.1.50_TX-NR686_0009B0E4A2F1_60128"
        );
        assert_eq!(device().label(), "TX-NR686 : 0009B0E4A2F1");
    }

    #[test]
    fn test_from_devices() {
        assert_eq!(DiscoveryOutcome::from_devices(vec![]), DiscoveryOutcome::Empty);

        let outcome = DiscoveryOutcome::from_devices(vec![device()]);
        assert_eq!(outcome.first(), Some(&device()));
    }

    #[test]
    fn test_static_discovery() {
        let discovery = StaticDiscovery::new(vec![device()]);
        assert_eq!(discovery.discover(Duration::from_secs(1)).devices().len(), 1);

        let empty = StaticDiscovery::default();
        assert_eq!(empty.discover(Duration::from_secs(1)), DiscoveryOutcome::Empty);
    }
}
