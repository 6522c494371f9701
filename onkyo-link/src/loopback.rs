//! In-memory link that records commands instead of sending them
//!
//! Used for dry runs and for exercising the layers above the link without a
//! receiver on the network. Commands are still translated through
//! [`IscpCommand`], so anything the loopback accepts a real receiver would
//! receive too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::command::IscpCommand;
use crate::error::{LinkError, Result};
use crate::{LinkEvent, ReceiverLink};

/// A command accepted by the loopback link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// The high-level command as handed to the link
    pub command: String,
    /// The ISCP message it translates to
    pub iscp: String,
    /// When it was accepted
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Journal {
    sent: Vec<SentCommand>,
    connects: Vec<(String, u16, Instant)>,
    closes: usize,
}

/// Link that keeps everything in memory
#[derive(Debug)]
pub struct LoopbackLink {
    connected: AtomicBool,
    reachable: AtomicBool,
    journal: Mutex<Journal>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl LoopbackLink {
    /// A link whose `connect` succeeds immediately
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        Self::build(true)
    }

    /// A link whose `connect` never succeeds until made reachable
    pub fn unreachable() -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        Self::build(false)
    }

    fn build(reachable: bool) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();
        let link = Self {
            connected: AtomicBool::new(false),
            reachable: AtomicBool::new(reachable),
            journal: Mutex::new(Journal::default()),
            events,
        };
        (link, event_rx)
    }

    /// Make subsequent `connect` calls succeed or fail
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Simulate the receiver dropping the session
    pub fn drop_session(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events.send(LinkEvent::Disconnected);
        }
    }

    /// High-level commands accepted so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.journal().sent.iter().map(|s| s.command.clone()).collect()
    }

    /// Accepted commands with their ISCP translation and time
    pub fn sent_commands(&self) -> Vec<SentCommand> {
        self.journal().sent.clone()
    }

    /// Number of times `connect` was called
    pub fn connect_attempts(&self) -> usize {
        self.journal().connects.len()
    }

    /// When each `connect` call happened
    pub fn connect_times(&self) -> Vec<Instant> {
        self.journal().connects.iter().map(|(_, _, at)| *at).collect()
    }

    /// Target of the most recent `connect` call
    pub fn last_target(&self) -> Option<(String, u16)> {
        self.journal()
            .connects
            .last()
            .map(|(host, port, _)| (host.clone(), *port))
    }

    /// Number of times `close` was called
    pub fn close_count(&self) -> usize {
        self.journal().closes
    }

    fn journal(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReceiverLink for LoopbackLink {
    fn connect(&self, host: &str, port: u16) {
        self.journal()
            .connects
            .push((host.to_string(), port, Instant::now()));

        if !self.reachable.load(Ordering::SeqCst) {
            let _ = self.events.send(LinkEvent::Error(
                LinkError::Timeout(format!("{}:{}", host, port)).to_string(),
            ));
            return;
        }

        if !self.connected.swap(true, Ordering::SeqCst) {
            tracing::debug!("Loopback session opened to {}:{}", host, port);
            let _ = self.events.send(LinkEvent::Connected);
        }
    }

    fn close(&self) {
        self.journal().closes += 1;
        self.drop_session();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn send(&self, command: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }

        let iscp = IscpCommand::parse(command)?;
        tracing::info!("Loopback command {} ({})", command, iscp);

        self.journal().sent.push(SentCommand {
            command: command.to_string(),
            iscp: iscp.as_str().to_string(),
            at: Instant::now(),
        });
        Ok(())
    }
}
