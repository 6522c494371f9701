//! Playback side of the bridge: notifications in, player messages out

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::MAX_VOLUME;

/// Playback status as last reported by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    #[default]
    Unknown,
}

impl PlaybackStatus {
    /// Parse a player status string; anything unrecognised is `Unknown`
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "play" | "playing" => PlaybackStatus::Playing,
            "pause" | "paused" => PlaybackStatus::Paused,
            "stop" | "stopped" => PlaybackStatus::Stopped,
            _ => PlaybackStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackStatus::Playing => "play",
            PlaybackStatus::Paused => "pause",
            PlaybackStatus::Stopped => "stop",
            PlaybackStatus::Unknown => "unknown",
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }
}

impl From<String> for PlaybackStatus {
    fn from(status: String) -> Self {
        Self::from_status(&status)
    }
}

impl From<PlaybackStatus> for &'static str {
    fn from(status: PlaybackStatus) -> Self {
        status.as_str()
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One playback notification, `{"status": "play", "volume": 40}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackNotification {
    pub status: PlaybackStatus,
    #[serde(default, deserialize_with = "player_volume")]
    pub volume: Option<u8>,
}

impl PlaybackNotification {
    pub fn new(status: PlaybackStatus, volume: u8) -> Self {
        Self {
            status,
            volume: Some(volume.min(MAX_VOLUME)),
        }
    }

    pub fn playing(volume: u8) -> Self {
        Self::new(PlaybackStatus::Playing, volume)
    }

    pub fn paused(volume: u8) -> Self {
        Self::new(PlaybackStatus::Paused, volume)
    }

    pub fn stopped(volume: u8) -> Self {
        Self::new(PlaybackStatus::Stopped, volume)
    }
}

fn player_volume<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let volume = Option::<f64>::deserialize(deserializer)?;
    Ok(volume
        .filter(|v| v.is_finite())
        .map(|v| v.round().clamp(0.0, MAX_VOLUME as f64) as u8))
}

/// Receiver power as tracked by the engine; the receiver is never polled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    On,
    #[default]
    Off,
}

/// Messages the engine sends back to the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlayerMessage {
    /// Volume forced onto the receiver at power on
    Volume(u8),
    /// Ask the player to publish its current state
    GetState(bool),
    /// Informational notice for the user
    Notice(String),
}

/// Capability to talk back to the player
pub trait PlayerBridge: Send + Sync {
    fn push_volume(&self, volume: u8);
    fn request_state(&self);
    fn notice(&self, message: &str);
}

/// Player bridge that forwards messages onto a channel
#[derive(Debug, Clone)]
pub struct ChannelPlayer {
    tx: mpsc::UnboundedSender<PlayerMessage>,
}

impl ChannelPlayer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PlayerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, message: PlayerMessage) {
        if self.tx.send(message).is_err() {
            tracing::debug!("Player message receiver dropped");
        }
    }
}

impl PlayerBridge for ChannelPlayer {
    fn push_volume(&self, volume: u8) {
        self.forward(PlayerMessage::Volume(volume));
    }

    fn request_state(&self) {
        self.forward(PlayerMessage::GetState(true));
    }

    fn notice(&self, message: &str) {
        self.forward(PlayerMessage::Notice(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("play", PlaybackStatus::Playing)]
    #[case("Playing", PlaybackStatus::Playing)]
    #[case("pause", PlaybackStatus::Paused)]
    #[case("stop", PlaybackStatus::Stopped)]
    #[case("", PlaybackStatus::Unknown)]
    #[case("buffering", PlaybackStatus::Unknown)]
    fn test_status_parsing(#[case] raw: &str, #[case] expected: PlaybackStatus) {
        assert_eq!(PlaybackStatus::from_status(raw), expected);
    }

    #[test]
    fn test_notification_json() {
        let n: PlaybackNotification =
            serde_json::from_str(r#"{"status":"play","volume":40}"#).unwrap();
        assert_eq!(n, PlaybackNotification::playing(40));

        let n: PlaybackNotification =
            serde_json::from_str(r#"{"status":"pause","volume":140,"title":"x"}"#).unwrap();
        assert_eq!(n.volume, Some(100));

        let n: PlaybackNotification = serde_json::from_str(r#"{"status":"stop"}"#).unwrap();
        assert_eq!(n.status, PlaybackStatus::Stopped);
        assert_eq!(n.volume, None);
    }

    #[rstest]
    #[case(r#"{"volume":40}"#)]
    #[case(r#"{}"#)]
    #[case(r#"{"saveActions":{"maxVolume":"abc"}}"#)]
    fn test_notification_requires_status(#[case] line: &str) {
        assert!(serde_json::from_str::<PlaybackNotification>(line).is_err());
    }

    #[test]
    fn test_player_message_json() {
        assert_eq!(
            serde_json::to_string(&PlayerMessage::Volume(40)).unwrap(),
            r#"{"volume":40}"#
        );
        assert_eq!(
            serde_json::to_string(&PlayerMessage::GetState(true)).unwrap(),
            r#"{"getState":true}"#
        );
    }

    #[test]
    fn test_channel_player_forwards() {
        let (player, mut rx) = ChannelPlayer::new();
        player.push_volume(35);
        player.notice("hello");

        assert_eq!(rx.try_recv().unwrap(), PlayerMessage::Volume(35));
        assert_eq!(rx.try_recv().unwrap(), PlayerMessage::Notice("hello".to_string()));
    }
}
