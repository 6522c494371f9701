//! # onkyo-sync
//!
//! Keeps an Onkyo/Integra receiver's power, volume and input in step with a
//! media player's playback state.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use onkyo_link::TcpLink;
//! use onkyo_sync::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (link, link_events) = TcpLink::new()?;
//!     let (player, mut player_messages) = ChannelPlayer::new();
//!     let settings = SharedSettings::new(Settings::default());
//!
//!     let engine = SyncEngine::spawn(
//!         Arc::new(link),
//!         link_events,
//!         Arc::new(settings),
//!         Arc::new(player),
//!     );
//!
//!     engine.rebind(ReceiverConnection::new("192.168.1.50", 60128, "TX-NR686"))?;
//!     engine.notify_playback(PlaybackNotification::playing(40))?;
//!
//!     while let Some(message) = player_messages.recv().await {
//!         println!("{}", serde_json::to_string(&message)?);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! playback notifications ─┐
//! discovery rounds ───────┼─► SyncEngine task ─► Reconciler
//! link events ────────────┘                        │
//!                               StandbyTimer ◄─────┤
//!                                                  ▼
//!                  ConnectionSupervisor ─► CommandDispatcher ─► ReceiverLink
//! ```
//!
//! Retries and standby checks are entries in a [`TimerQueue`] owned by the
//! engine task, never sleeps, so notifications keep flowing while the
//! receiver is unreachable.

pub mod command;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod logging;
pub mod playback;
pub mod reconciler;
pub mod standby;
pub mod supervisor;
pub mod timers;

pub use command::{Action, Command, CommandDispatcher, CommandValue};
pub use config::{ActionUpdate, ConfigSource, Settings, SharedSettings};
pub use connection::{
    select_connection, ReceiverChoice, ReceiverConnection, Selection, ZoneSet,
    NO_RECEIVERS_NOTICE,
};
pub use engine::{EngineHandle, SyncEngine};
pub use error::{Result, SyncError};
pub use playback::{
    ChannelPlayer, PlaybackNotification, PlaybackStatus, PlayerBridge, PlayerMessage, PowerState,
};
pub use reconciler::{EngineStatus, Reconciler};
pub use standby::{StandbyArm, StandbyTimer};
pub use supervisor::{BackoffSchedule, ConnectionSupervisor, DispatchOutcome, PendingRetry};
pub use timers::{TimerEvent, TimerQueue};

/// Everything needed to wire up an engine
pub mod prelude {
    pub use crate::{
        ChannelPlayer, ConfigSource, EngineHandle, PlaybackNotification, PlaybackStatus,
        PlayerBridge, PlayerMessage, ReceiverConnection, Settings, SharedSettings, SyncEngine,
    };
}
