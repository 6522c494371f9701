//! Connection supervision and best-effort delivery
//!
//! Commands are only handed to the link over a live session. When there is
//! none, the supervisor asks the link to connect and schedules the same
//! command again following a [`BackoffSchedule`]; once the schedule is used
//! up the command is dropped and logged. Delivery is best effort: the
//! engine must stay responsive, a lost volume change is not a problem.

use std::sync::Arc;
use std::time::Duration;

use onkyo_link::{LinkError, ReceiverLink};

use crate::command::{Command, CommandDispatcher};
use crate::connection::ReceiverConnection;
use crate::error::SyncError;
use crate::timers::{TimerEvent, TimerQueue};

/// Ordered waits before each retry; running off the end means give up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    waits: Vec<Duration>,
}

impl BackoffSchedule {
    pub fn new(waits: Vec<Duration>) -> Self {
        Self { waits }
    }

    /// Wait before retrying after failed attempt number `attempt` (0-based),
    /// `None` once retries are exhausted
    pub fn wait_for(&self, attempt: usize) -> Option<Duration> {
        self.waits.get(attempt).copied()
    }

    /// Total attempts made before giving up
    pub fn max_attempts(&self) -> usize {
        self.waits.len() + 1
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self::new(vec![
            Duration::ZERO,
            Duration::from_millis(500),
            Duration::from_millis(5000),
        ])
    }
}

/// A command waiting for a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRetry {
    pub zone: String,
    pub command: Command,
    /// Attempts already made
    pub attempt: usize,
}

impl PendingRetry {
    pub fn new(zone: impl Into<String>, command: Command) -> Self {
        Self {
            zone: zone.into(),
            command,
            attempt: 0,
        }
    }

    fn next(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// What happened to a dispatched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handed to the link as this wire string
    Sent(String),
    /// No session yet; retried after this wait
    Scheduled(Duration),
    /// Given up on
    Dropped,
}

/// Sole owner of the session lifecycle
#[derive(Clone)]
pub struct ConnectionSupervisor {
    link: Arc<dyn ReceiverLink>,
    dispatcher: CommandDispatcher,
    schedule: BackoffSchedule,
}

impl ConnectionSupervisor {
    pub fn new(link: Arc<dyn ReceiverLink>) -> Self {
        Self::with_schedule(link, BackoffSchedule::default())
    }

    pub fn with_schedule(link: Arc<dyn ReceiverLink>, schedule: BackoffSchedule) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(link.clone()),
            link,
            schedule,
        }
    }

    pub fn with_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// Replace any current session with one to `connection`
    pub fn open(&self, connection: &ReceiverConnection) {
        if self.link.is_connected() {
            self.link.close();
        }
        tracing::info!("Connecting to {}", connection);
        self.link.connect(&connection.host, connection.port);
    }

    pub fn close(&self) {
        self.link.close();
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Send `retry.command` now if a session is open, otherwise ask for one
    /// and schedule the next attempt
    pub fn dispatch(
        &self,
        connection: &ReceiverConnection,
        retry: PendingRetry,
        timers: &mut TimerQueue,
    ) -> DispatchOutcome {
        if !connection.is_valid() {
            tracing::debug!("No valid receiver connection, dropping {}", retry.command);
            return DispatchOutcome::Dropped;
        }

        if self.link.is_connected() {
            match self.dispatcher.send(&retry.zone, &retry.command) {
                Ok(wire) => return DispatchOutcome::Sent(wire),
                Err(SyncError::Link(e)) if is_transport_error(&e) => {
                    tracing::warn!("Session lost while sending {}: {}", retry.command, e);
                }
                Err(e) => {
                    tracing::error!("Dropping {}.{}: {}", retry.zone, retry.command, e);
                    return DispatchOutcome::Dropped;
                }
            }
        }

        // Fire and forget; the next attempt will see whether it worked
        self.link.connect(&connection.host, connection.port);

        match self.schedule.wait_for(retry.attempt) {
            Some(wait) => {
                tracing::debug!(
                    "Receiver {} not connected, retrying {}.{} in {:?}",
                    connection,
                    retry.zone,
                    retry.command,
                    wait
                );
                timers.schedule(wait, TimerEvent::Retry(retry.next()));
                DispatchOutcome::Scheduled(wait)
            }
            None => {
                tracing::error!(
                    "Receiver {} not connected, giving up on {}.{} after {} attempts",
                    connection,
                    retry.zone,
                    retry.command,
                    retry.attempt + 1
                );
                DispatchOutcome::Dropped
            }
        }
    }

    /// Log a link failure; never fatal
    pub fn on_link_error(&self, error: &str) {
        tracing::warn!("Receiver link error: {}", error);
    }
}

fn is_transport_error(error: &LinkError) -> bool {
    matches!(
        error,
        LinkError::NotConnected | LinkError::Closed | LinkError::Io(_) | LinkError::Timeout(_)
    )
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("connected", &self.link.is_connected())
            .field("schedule", &self.schedule)
            .finish()
    }
}
