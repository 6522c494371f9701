//! Recording player bridge and engine fixtures for integration tests.
//!
//! `RecordingPlayer` keeps every message the engine sends to the player so
//! tests can assert on volume broadcasts, state requests and notices.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use onkyo_link::LoopbackLink;
use onkyo_sync::{
    EngineHandle, PlayerBridge, PlayerMessage, ReceiverConnection, Reconciler, Settings,
    SyncEngine,
};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct RecordingPlayer {
    messages: Arc<Mutex<Vec<PlayerMessage>>>,
}

impl RecordingPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PlayerMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                PlayerMessage::Notice(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn volumes(&self) -> Vec<u8> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                PlayerMessage::Volume(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    fn record(&self, message: PlayerMessage) {
        self.messages.lock().unwrap().push(message);
    }
}

impl PlayerBridge for RecordingPlayer {
    fn push_volume(&self, volume: u8) {
        self.record(PlayerMessage::Volume(volume));
    }

    fn request_state(&self) {
        self.record(PlayerMessage::GetState(true));
    }

    fn notice(&self, message: &str) {
        self.record(PlayerMessage::Notice(message.to_string()));
    }
}

pub fn receiver() -> ReceiverConnection {
    ReceiverConnection::new("192.168.1.50", 60128, "TX-NR686")
}

/// A running engine over a loopback link
pub struct Fixture {
    pub engine: EngineHandle,
    pub task: JoinHandle<Reconciler>,
    pub link: Arc<LoopbackLink>,
    pub player: RecordingPlayer,
}

impl Fixture {
    pub fn start(settings: Settings) -> Self {
        let (link, events) = LoopbackLink::new();
        Self::with_link(link, events, settings)
    }

    pub fn unreachable(settings: Settings) -> Self {
        let (link, events) = LoopbackLink::unreachable();
        Self::with_link(link, events, settings)
    }

    fn with_link(
        link: LoopbackLink,
        events: tokio::sync::mpsc::UnboundedReceiver<onkyo_link::LinkEvent>,
        settings: Settings,
    ) -> Self {
        let link = Arc::new(link);
        let player = RecordingPlayer::new();
        let reconciler = Reconciler::new(
            link.clone(),
            Arc::new(settings),
            Arc::new(player.clone()),
        );
        let (engine, task) = SyncEngine::start(reconciler, events);
        Self {
            engine,
            task,
            link,
            player,
        }
    }

    /// Wait until the engine has handled everything sent so far
    pub async fn settle(&self) {
        self.engine.status().await.unwrap();
    }
}
