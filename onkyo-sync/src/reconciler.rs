//! The receiver state machine
//!
//! [`Reconciler`] holds everything the engine knows about the receiver and
//! the player, and decides which commands to send for each playback
//! notification, discovery round or timer. The engine owns it and feeds it
//! one event at a time.

use std::sync::Arc;

use onkyo_discovery::DiscoveryOutcome;
use onkyo_link::{LinkEvent, ReceiverLink};
use tokio::time::Instant;

use crate::command::Command;
use crate::config::ConfigSource;
use crate::connection::{
    select_connection, ReceiverConnection, Selection, ZoneSet, NO_RECEIVERS_NOTICE,
};
use crate::error::{Result, SyncError};
use crate::playback::{PlaybackNotification, PlaybackStatus, PlayerBridge, PowerState};
use crate::standby::{StandbyArm, StandbyTimer};
use crate::supervisor::{BackoffSchedule, ConnectionSupervisor, DispatchOutcome, PendingRetry};
use crate::timers::{TimerEvent, TimerQueue};

/// Snapshot of the reconciler's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub connection: Option<ReceiverConnection>,
    pub connected: bool,
    pub playback: PlaybackStatus,
    pub power: PowerState,
    pub volume: u8,
    pub pending_timers: usize,
}

pub struct Reconciler {
    config: Arc<dyn ConfigSource>,
    supervisor: ConnectionSupervisor,
    player: Arc<dyn PlayerBridge>,
    connection: Option<ReceiverConnection>,
    zones: ZoneSet,
    playback: PlaybackStatus,
    last_notification: Option<PlaybackNotification>,
    power: PowerState,
    volume: u8,
    standby: StandbyTimer,
    timers: TimerQueue,
    notice_sent: bool,
}

impl Reconciler {
    pub fn new(
        link: Arc<dyn ReceiverLink>,
        config: Arc<dyn ConfigSource>,
        player: Arc<dyn PlayerBridge>,
    ) -> Self {
        Self {
            config,
            supervisor: ConnectionSupervisor::new(link),
            player,
            connection: None,
            zones: ZoneSet::default(),
            playback: PlaybackStatus::Unknown,
            last_notification: None,
            power: PowerState::Off,
            volume: 0,
            standby: StandbyTimer::new(),
            timers: TimerQueue::new(),
            notice_sent: false,
        }
    }

    /// Use a different retry schedule
    pub fn with_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.supervisor = self.supervisor.with_backoff(schedule);
        self
    }

    /// Handle one playback notification
    ///
    /// Fails with [`SyncError::NoValidConnection`] while no receiver is
    /// bound; the notification is then dropped without touching any state.
    pub fn on_playback(&mut self, notification: PlaybackNotification) -> Result<()> {
        if !self.has_valid_connection() {
            return Err(SyncError::NoValidConnection);
        }

        if self.last_notification == Some(notification) {
            return Ok(());
        }
        self.last_notification = Some(notification);

        let settings = self.config.snapshot();

        if notification.status != self.playback {
            let previous = std::mem::replace(&mut self.playback, notification.status);
            tracing::debug!("Playback {} -> {}", previous, notification.status);

            match notification.status {
                PlaybackStatus::Playing if self.power == PowerState::Off => {
                    self.power_on_sequence();
                }
                PlaybackStatus::Paused | PlaybackStatus::Stopped
                    if settings.standby && self.power == PowerState::On =>
                {
                    self.standby.arm(settings.standby_delay(), &mut self.timers);
                }
                _ => {}
            }
            return Ok(());
        }

        let Some(volume) = notification.volume else {
            return Ok(());
        };
        if self.power != PowerState::On {
            return Ok(());
        }

        let volume = settings.clamp_volume(volume);
        if volume != self.volume {
            self.volume = volume;
            self.dispatch(Command::volume(volume));
        }
        Ok(())
    }

    fn power_on_sequence(&mut self) {
        let settings = self.config.snapshot();
        tracing::info!("Playback started, powering on receiver");

        if settings.power_on {
            self.dispatch(Command::power_on());
        }

        if settings.set_volume {
            let volume = settings.target_volume();
            self.volume = volume;
            self.player.push_volume(volume);
            self.dispatch(Command::volume(volume));
        }

        if settings.set_input {
            self.dispatch(Command::selector(settings.set_input_value.clone()));
        }

        self.power = PowerState::On;
    }

    /// Handle a timer that came due
    pub fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Retry(retry) => self.retry(retry),
            TimerEvent::Standby(arm) => self.on_standby(arm),
        }
    }

    fn on_standby(&mut self, arm: StandbyArm) {
        if !self.config.snapshot().standby {
            tracing::debug!("Standby disabled since it was armed, skipping");
            return;
        }
        if !self.standby.should_fire(&arm, self.playback, self.power) {
            return;
        }

        tracing::info!("Playback idle for {:?}, putting receiver in standby", arm.delay);
        let outcome = self.dispatch(Command::standby());
        self.on_standby_outcome(&outcome);
    }

    /// Power is only tracked as off once the standby command went out
    fn on_standby_outcome(&mut self, outcome: &DispatchOutcome) {
        if let DispatchOutcome::Sent(_) = outcome {
            self.power = PowerState::Off;
        }
    }

    fn retry(&mut self, retry: PendingRetry) {
        let Some(connection) = &self.connection else {
            tracing::debug!("Receiver unbound, dropping retry of {}", retry.command);
            return;
        };

        let standby = retry.command.is_standby();
        if standby && self.playback.is_playing() {
            tracing::debug!("Playback resumed, dropping pending standby");
            return;
        }

        let outcome = self.supervisor.dispatch(connection, retry, &mut self.timers);
        if standby {
            self.on_standby_outcome(&outcome);
        }
    }

    /// Fire the earliest timer due at `now`; false if none was due
    pub fn fire_next(&mut self, now: Instant) -> bool {
        match self.timers.pop_due(now) {
            Some(event) => {
                self.on_timer(event);
                true
            }
            None => false,
        }
    }

    /// Fire every timer due at `now`, including ones scheduled while firing
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while self.fire_next(now) {
            fired += 1;
        }
        fired
    }

    /// Act on a finished discovery round
    ///
    /// Fails when the round leaves no receiver bound, after telling the
    /// player once that manual configuration is needed.
    pub fn on_discovery(&mut self, outcome: &DiscoveryOutcome) -> Result<Selection> {
        let selection = select_connection(outcome, &self.config.snapshot());
        match &selection {
            Selection::Bind(connection) => {
                if self.bind(connection.clone()) {
                    self.player.request_state();
                }
            }
            Selection::NeedsConfiguration if self.has_valid_connection() => {
                tracing::debug!("Discovery found nothing, keeping current receiver");
            }
            Selection::NeedsConfiguration => {
                if !self.notice_sent {
                    tracing::info!("{}", NO_RECEIVERS_NOTICE);
                    self.player.notice(NO_RECEIVERS_NOTICE);
                    self.notice_sent = true;
                }
                return Err(match outcome {
                    DiscoveryOutcome::Empty => SyncError::DiscoveryEmpty,
                    DiscoveryOutcome::Malformed(reason) => {
                        SyncError::DiscoveryMalformed(reason.clone())
                    }
                    DiscoveryOutcome::Found(_) => SyncError::NoValidConnection,
                });
            }
        }
        Ok(selection)
    }

    /// Bind to `connection`, reconnecting only if it differs from the
    /// current one; true if the binding changed
    pub fn bind(&mut self, connection: ReceiverConnection) -> bool {
        if !connection.is_valid() {
            tracing::warn!("Ignoring incomplete receiver address {:?}", connection);
            return false;
        }
        if self.connection.as_ref() == Some(&connection) {
            tracing::debug!("Already bound to {}", connection);
            return false;
        }

        self.supervisor.close();
        self.zones = ZoneSet::for_model(&connection.model);
        self.power = PowerState::Off;
        self.volume = 0;
        self.last_notification = None;
        self.playback = PlaybackStatus::Unknown;
        self.supervisor.open(&connection);
        self.connection = Some(connection);
        true
    }

    /// Rebind after the connection settings changed
    pub fn rebind(&mut self, connection: ReceiverConnection) -> bool {
        let changed = self.bind(connection);
        if changed {
            self.player.request_state();
        }
        changed
    }

    pub fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected => tracing::info!("Receiver session open"),
            LinkEvent::Disconnected => tracing::warn!("Receiver session closed"),
            LinkEvent::Received(message) => tracing::trace!("Receiver said {}", message),
            LinkEvent::Error(error) => self.supervisor.on_link_error(&error),
        }
    }

    /// Close the session and forget scheduled work
    pub fn shutdown(&mut self) {
        self.timers.clear();
        self.supervisor.close();
    }

    fn dispatch(&mut self, command: Command) -> DispatchOutcome {
        let Some(connection) = self.connection.as_ref().filter(|c| c.is_valid()) else {
            tracing::debug!("No valid receiver connection, skipping {}", command);
            return DispatchOutcome::Dropped;
        };

        let settings = self.config.snapshot();
        let zone = self.zones.resolve(&settings.zone).to_string();
        self.supervisor
            .dispatch(connection, PendingRetry::new(zone, command), &mut self.timers)
    }

    fn has_valid_connection(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_valid())
    }

    pub fn connection(&self) -> Option<&ReceiverConnection> {
        self.connection.as_ref()
    }

    pub fn zones(&self) -> &ZoneSet {
        &self.zones
    }

    pub fn playback(&self) -> PlaybackStatus {
        self.playback
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            connection: self.connection.clone(),
            connected: self.supervisor.is_connected(),
            playback: self.playback,
            power: self.power,
            volume: self.volume,
            pending_timers: self.timers.len(),
        }
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("connection", &self.connection)
            .field("playback", &self.playback)
            .field("power", &self.power)
            .field("volume", &self.volume)
            .field("timers", &self.timers.len())
            .finish()
    }
}
