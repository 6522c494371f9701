//! Parsing of eISCP `ECN` discovery replies.
//!
//! A receiver answers the `ECNQSTN` broadcast with
//! `!1ECN<model>/<port>/<area>/<mac>` followed by an EOF byte and usually
//! `\r\n`, e.g. `!1ECNTX-NR686/60128/DX/0009B0E4A2F1`.

use std::collections::HashSet;

use crate::error::{DiscoveryError, Result};
use crate::{Device, DiscoveryOutcome};

/// Parse one ECN reply received from `host`.
///
/// # Errors
///
/// Returns `DiscoveryError::NotEcnReply` when the payload is some other
/// ISCP message, and `DiscoveryError::ParseError` when fields are missing
/// or the port is not numeric.
pub fn parse_ecn_reply(host: &str, payload: &str) -> Result<Device> {
    let text = payload.trim_end_matches(['\x1A', '\r', '\n']);
    let text = match text.strip_prefix('!') {
        Some(rest) => rest.get(1..).unwrap_or_default(),
        None => text,
    };

    let body = text
        .strip_prefix("ECN")
        .ok_or_else(|| DiscoveryError::NotEcnReply(text.to_string()))?;

    let mut fields = body.split('/');
    let model = fields.next().unwrap_or_default().trim();
    let port = fields.next().unwrap_or_default().trim();
    let _area = fields.next();
    let mac = fields.next().unwrap_or_default().trim();

    if model.is_empty() {
        return Err(DiscoveryError::ParseError(format!(
            "missing model in '{}'",
            body
        )));
    }

    let port: u16 = port
        .parse()
        .map_err(|_| DiscoveryError::ParseError(format!("invalid port '{}' in '{}'", port, body)))?;

    if host.trim().is_empty() {
        return Err(DiscoveryError::ParseError("reply without sender host".to_string()));
    }

    Ok(Device {
        host: host.trim().to_string(),
        port,
        model: model.to_string(),
        mac: mac.to_string(),
    })
}

/// Fold raw `(host, payload)` replies into a discovery outcome.
///
/// Replies are deduplicated by MAC address (by host when the MAC is
/// missing), keeping the first. Unparseable replies are ignored as long as
/// at least one reply was usable; if every reply was unusable the outcome
/// is `Malformed`.
pub fn collect_replies<I, H, P>(replies: I) -> DiscoveryOutcome
where
    I: IntoIterator<Item = (H, P)>,
    H: AsRef<str>,
    P: AsRef<str>,
{
    let mut devices = Vec::new();
    let mut seen = HashSet::new();
    let mut first_error: Option<DiscoveryError> = None;

    for (host, payload) in replies {
        match parse_ecn_reply(host.as_ref(), payload.as_ref()) {
            Ok(device) => {
                let key = if device.mac.is_empty() {
                    device.host.clone()
                } else {
                    device.mac.clone()
                };
                if seen.insert(key) {
                    devices.push(device);
                }
            }
            Err(e) => {
                tracing::warn!("Ignoring discovery reply from {}: {}", host.as_ref(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match (devices.is_empty(), first_error) {
        (false, _) => DiscoveryOutcome::Found(devices),
        (true, Some(e)) => DiscoveryOutcome::Malformed(e.to_string()),
        (true, None) => DiscoveryOutcome::Empty,
    }
}
