//! The serialized event loop
//!
//! One tokio task owns the [`Reconciler`]. Messages from [`EngineHandle`]s,
//! link events and due timers are handled one at a time in that order of
//! priority, so a timer always sees every notification queued before it
//! came due.

use std::sync::Arc;

use onkyo_discovery::DiscoveryOutcome;
use onkyo_link::{LinkEvent, ReceiverLink};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::ConfigSource;
use crate::connection::ReceiverConnection;
use crate::error::{Result, SyncError};
use crate::playback::{PlaybackNotification, PlayerBridge};
use crate::reconciler::{EngineStatus, Reconciler};

/// Messages sent from handles to the engine task
#[derive(Debug)]
pub enum Message {
    Playback(PlaybackNotification),
    Discovery(DiscoveryOutcome),
    Rebind(ReceiverConnection),
    Status(oneshot::Sender<EngineStatus>),
    Shutdown,
}

/// Cheap, cloneable way to talk to a running engine
#[derive(Debug, Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl EngineHandle {
    pub fn notify_playback(&self, notification: PlaybackNotification) -> Result<()> {
        self.send(Message::Playback(notification))
    }

    pub fn discovery_finished(&self, outcome: DiscoveryOutcome) -> Result<()> {
        self.send(Message::Discovery(outcome))
    }

    /// Bind to a different receiver; a no-op if it is the current one
    pub fn rebind(&self, connection: ReceiverConnection) -> Result<()> {
        self.send(Message::Rebind(connection))
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Message::Status(tx))?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Stop the engine and close the receiver session
    pub fn shutdown(&self) -> Result<()> {
        self.send(Message::Shutdown)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, message: Message) -> Result<()> {
        self.tx.send(message).map_err(|_| SyncError::EngineStopped)
    }
}

pub struct SyncEngine;

impl SyncEngine {
    /// Spawn an engine on the current runtime
    pub fn spawn(
        link: Arc<dyn ReceiverLink>,
        link_events: mpsc::UnboundedReceiver<LinkEvent>,
        config: Arc<dyn ConfigSource>,
        player: Arc<dyn PlayerBridge>,
    ) -> EngineHandle {
        let (handle, _task) = Self::start(Reconciler::new(link, config, player), link_events);
        handle
    }

    /// Spawn an engine around an existing reconciler
    ///
    /// The task hands the reconciler back when the engine stops.
    pub fn start(
        reconciler: Reconciler,
        link_events: mpsc::UnboundedReceiver<LinkEvent>,
    ) -> (EngineHandle, JoinHandle<Reconciler>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_engine(reconciler, rx, link_events));
        (EngineHandle { tx }, task)
    }
}

async fn run_engine(
    mut reconciler: Reconciler,
    mut messages: mpsc::UnboundedReceiver<Message>,
    mut link_events: mpsc::UnboundedReceiver<LinkEvent>,
) -> Reconciler {
    tracing::info!("Sync engine started");
    let mut link_open = true;

    loop {
        let deadline = reconciler.next_deadline();

        tokio::select! {
            biased;

            message = messages.recv() => match message {
                Some(Message::Shutdown) => {
                    tracing::info!("Sync engine received shutdown");
                    break;
                }
                Some(message) => handle_message(&mut reconciler, message),
                None => {
                    tracing::debug!("All engine handles dropped, shutting down");
                    break;
                }
            },

            event = link_events.recv(), if link_open => match event {
                Some(event) => reconciler.on_link_event(event),
                None => {
                    tracing::debug!("Link event stream ended");
                    link_open = false;
                }
            },

            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                reconciler.fire_next(Instant::now());
            }
        }
    }

    reconciler.shutdown();
    tracing::info!("Sync engine stopped");
    reconciler
}

fn handle_message(reconciler: &mut Reconciler, message: Message) {
    match message {
        Message::Playback(notification) => {
            if let Err(e) = reconciler.on_playback(notification) {
                tracing::debug!("Ignoring {} notification: {}", notification.status, e);
            }
        }
        Message::Discovery(outcome) => {
            if let Err(e) = reconciler.on_discovery(&outcome) {
                tracing::info!("Discovery left the receiver unbound: {}", e);
            }
        }
        Message::Rebind(connection) => {
            reconciler.rebind(connection);
        }
        Message::Status(reply) => {
            let _ = reply.send(reconciler.status());
        }
        Message::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::playback::{ChannelPlayer, PowerState};
    use onkyo_link::LoopbackLink;

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_session() {
        let (link, events) = LoopbackLink::new();
        let link = Arc::new(link);
        let (player, _rx) = ChannelPlayer::new();
        let reconciler =
            Reconciler::new(link.clone(), Arc::new(Settings::default()), Arc::new(player));

        let (handle, task) = SyncEngine::start(reconciler, events);
        handle
            .rebind(ReceiverConnection::new("192.168.1.50", 60128, "TX-NR686"))
            .unwrap();
        handle.notify_playback(PlaybackNotification::playing(30)).unwrap();

        let status = handle.status().await.unwrap();
        assert!(status.connected);
        assert_eq!(status.power, PowerState::On);

        handle.shutdown().unwrap();
        let reconciler = task.await.unwrap();
        assert!(!link.is_connected());
        assert_eq!(reconciler.power(), PowerState::On);
        assert!(matches!(
            handle.notify_playback(PlaybackNotification::paused(30)),
            Err(SyncError::EngineStopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handles_stops_engine() {
        let (link, events) = LoopbackLink::new();
        let (player, _rx) = ChannelPlayer::new();
        let reconciler =
            Reconciler::new(Arc::new(link), Arc::new(Settings::default()), Arc::new(player));

        let (handle, task) = SyncEngine::start(reconciler, events);
        let other = handle.clone();
        drop(handle);
        assert!(other.is_running());
        drop(other);

        let reconciler = task.await.unwrap();
        assert_eq!(reconciler.power(), PowerState::Off);
    }
}
