//! Session link to Onkyo/Integra receivers over eISCP
//!
//! This crate is the lowest layer of onkyo-sync. It knows how to open a
//! session to a receiver, how to translate readable commands such as
//! `main.volume=80` into ISCP messages, and how to frame those messages on
//! the wire. It makes no decisions about *when* to send anything.
//!
//! # Example
//!
//! ```rust,no_run
//! use onkyo_link::{ReceiverLink, TcpLink, DEFAULT_PORT};
//!
//! # async fn run() -> onkyo_link::Result<()> {
//! let (link, mut events) = TcpLink::new()?;
//! link.connect("192.168.1.50", DEFAULT_PORT);
//!
//! while let Some(event) = events.recv().await {
//!     if let onkyo_link::LinkEvent::Connected = event {
//!         link.send("main.power=on")?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
pub mod command;
pub mod loopback;
pub mod packet;
pub mod tcp;

pub use command::{IscpCommand, ZONES};
pub use error::{LinkError, Result};
pub use loopback::{LoopbackLink, SentCommand};
pub use tcp::{TcpLink, DEFAULT_PORT};

/// Notifications published by a link about its session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A session was established
    Connected,
    /// The session ended, either closed locally or dropped by the receiver
    Disconnected,
    /// The receiver sent a message (without framing)
    Received(String),
    /// A transport failure; the link stays usable and may be reconnected
    Error(String),
}

/// Capability to hold a session with one receiver
///
/// Implementations must be cheap to call from a single event loop:
/// `connect` and `close` return immediately and `send` only hands the
/// command over to the transport.
pub trait ReceiverLink: Send + Sync {
    /// Start opening a session to `host:port` without waiting for it
    fn connect(&self, host: &str, port: u16);

    /// Close the current session, if any
    fn close(&self);

    /// Whether a session is currently open
    fn is_connected(&self) -> bool;

    /// Send one `zone.action=value` command over the open session
    fn send(&self, command: &str) -> Result<()>;
}
