//! tokio TCP transport for eISCP sessions
//!
//! `connect` never blocks: it spawns a session task on the runtime the link
//! was created in and returns immediately. Connectivity is observable through
//! [`ReceiverLink::is_connected`] and the [`LinkEvent`] channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::command::IscpCommand;
use crate::error::{LinkError, Result};
use crate::packet::{encode_packet, PacketDecoder};
use crate::{LinkEvent, ReceiverLink};

/// Port receivers listen on for eISCP
pub const DEFAULT_PORT: u16 = 60128;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

struct Session {
    outbound: mpsc::UnboundedSender<Bytes>,
    task: JoinHandle<()>,
}

struct Inner {
    runtime: Handle,
    /// Generation of the session currently connected, 0 when none is
    connected: AtomicU64,
    next_generation: AtomicU64,
    session: Mutex<Option<Session>>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl Inner {
    fn emit(&self, event: LinkEvent) {
        // Nobody listening is fine; the link keeps working without observers
        let _ = self.events.send(event);
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// eISCP link over a single TCP session
pub struct TcpLink {
    inner: Arc<Inner>,
}

impl TcpLink {
    /// Create a link bound to the current tokio runtime
    ///
    /// Returns the link together with the receiving end of its event channel.
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<LinkEvent>)> {
        let runtime = Handle::try_current().map_err(|e| LinkError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(runtime))
    }

    /// Create a link that spawns its sessions on `runtime`
    pub fn with_runtime(runtime: Handle) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();

        let link = Self {
            inner: Arc::new(Inner {
                runtime,
                connected: AtomicU64::new(0),
                next_generation: AtomicU64::new(1),
                session: Mutex::new(None),
                events,
            }),
        };

        (link, event_rx)
    }
}

impl ReceiverLink for TcpLink {
    fn connect(&self, host: &str, port: u16) {
        let mut session = self.inner.session();

        if let Some(existing) = session.as_ref() {
            if !existing.task.is_finished() {
                tracing::debug!("Session to receiver already open or opening");
                return;
            }
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::SeqCst);
        let address = format!("{}:{}", host, port);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();

        tracing::debug!("Opening session {} to {}", generation, address);
        let task = self.inner.runtime.spawn(run_session(
            Arc::clone(&self.inner),
            generation,
            address,
            outbound_rx,
        ));

        *session = Some(Session { outbound, task });
    }

    fn close(&self) {
        if let Some(session) = self.inner.session().take() {
            tracing::debug!("Closing receiver session");
            session.task.abort();
            self.inner.connected.store(0, Ordering::SeqCst);
            self.inner.emit(LinkEvent::Disconnected);
        }
    }

    fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst) != 0
    }

    fn send(&self, command: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }

        let iscp = IscpCommand::parse(command)?;
        tracing::debug!("Sending {} as {}", command, iscp);

        let session = self.inner.session();
        let session = session.as_ref().ok_or(LinkError::NotConnected)?;
        session
            .outbound
            .send(encode_packet(iscp.as_str()))
            .map_err(|_| LinkError::Closed)
    }
}

impl Drop for TcpLink {
    fn drop(&mut self) {
        if let Some(session) = self.inner.session().take() {
            session.task.abort();
        }
    }
}

async fn run_session(
    inner: Arc<Inner>,
    generation: u64,
    address: String,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
) {
    let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&address)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            inner.emit(LinkEvent::Error(LinkError::Io(e).to_string()));
            return;
        }
        Err(_) => {
            inner.emit(LinkEvent::Error(LinkError::Timeout(address).to_string()));
            return;
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not disable Nagle on {}: {}", address, e);
    }

    inner.connected.store(generation, Ordering::SeqCst);
    tracing::info!("Connected to receiver at {}", address);
    inner.emit(LinkEvent::Connected);

    let (mut reader, mut writer) = stream.into_split();
    let mut decoder = PacketDecoder::new();
    let mut buf = [0u8; 1024];

    loop {
        tokio::select! {
            packet = outbound.recv() => {
                let Some(packet) = packet else { break };
                if let Err(e) = writer.write_all(&packet).await {
                    inner.emit(LinkEvent::Error(LinkError::Io(e).to_string()));
                    break;
                }
            }

            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => {
                        tracing::info!("Receiver at {} closed the session", address);
                        break;
                    }
                    Ok(n) => {
                        decoder.extend(&buf[..n]);
                        loop {
                            match decoder.next_message() {
                                Ok(Some(message)) => inner.emit(LinkEvent::Received(message)),
                                Ok(None) => break,
                                Err(e) => {
                                    tracing::warn!("Dropping undecodable data from {}: {}", address, e);
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        inner.emit(LinkEvent::Error(LinkError::Io(e).to_string()));
                        break;
                    }
                }
            }
        }
    }

    // A newer session may already own the flag
    let _ = inner
        .connected
        .compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst);
    inner.emit(LinkEvent::Disconnected);
}
