//! WebSocket connection manager
//!
//! Owns the connection thread: endpoint resolution, bounded connect,
//! exponential-backoff reconnects and the frame loop. The main loop talks to
//! it through two bounded channels and reads the live status from a shared
//! atomic, so handlers can be swapped between `pump` calls without touching
//! the connection.

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use super::discovery::{Discovery, DiscoveryError};
use crate::core::constants::TERMINAL_CONNECT_ERROR;
use crate::core::io_traits::ConnectionStatus;
use crate::core::protocol::{HostMessage, OutboundEnvelope};
use crate::core::reconnect::ReconnectPolicy;

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

const CHANNEL_CAPACITY: usize = 128;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("invalid WebSocket URL `{0}`")]
    InvalidUrl(String),
    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
}

/// Incoming events (connection thread -> main thread)
#[derive(Debug)]
pub enum ConnectionEvent {
    Connected { url: String },
    Disconnected { reason: String },
    Reconnecting { attempt: u32, delay: Duration },
    Message(HostMessage),
    /// Attempt ceiling reached; the thread has exited
    Terminal(String),
}

/// Outgoing messages (main thread -> connection thread)
#[derive(Debug)]
enum Outgoing {
    Envelope(OutboundEnvelope),
    Shutdown,
}

/// Receives connection events. Borrowed per `pump` call.
pub trait ConnectionHandler {
    fn on_message(&mut self, message: HostMessage);
    fn on_connect(&mut self, handle: &ConnectionHandle);
    fn on_disconnect(&mut self, reason: &str);
    fn on_reconnecting(&mut self, _attempt: u32, _delay: Duration) {}
    fn on_terminal_error(&mut self, error: &str);
}

// =============================================================================
// CONNECTION HANDLE
// =============================================================================

/// Cheap clonable send path to the live connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: Sender<Outgoing>,
    status: Arc<AtomicU8>,
}

impl ConnectionHandle {
    pub fn status(&self) -> ConnectionStatus {
        load_status(&self.status)
    }

    pub fn is_open(&self) -> bool {
        self.status().is_open()
    }

    /// Queue an envelope for transmission. False if the link is not open or
    /// the queue is full.
    pub fn send_envelope(&self, envelope: OutboundEnvelope) -> bool {
        if !self.is_open() {
            return false;
        }
        let kind = envelope.message.kind();
        match self.tx.try_send(Outgoing::Envelope(envelope)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(kind, "[WS] Outgoing queue full, message dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

fn load_status(status: &AtomicU8) -> ConnectionStatus {
    ConnectionStatus::try_from(status.load(Ordering::SeqCst)).unwrap_or(ConnectionStatus::Closed)
}

fn store_status(status: &AtomicU8, value: ConnectionStatus) {
    status.store(value.into(), Ordering::SeqCst);
}

// =============================================================================
// CONNECTION MANAGER
// =============================================================================

pub struct ConnectionManager {
    discovery: Discovery,
    policy: ReconnectPolicy,
    tx: Option<Sender<Outgoing>>,
    rx: Option<Receiver<ConnectionEvent>>,
    thread_handle: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl ConnectionManager {
    pub fn new(discovery: Discovery, policy: ReconnectPolicy) -> Self {
        Self {
            discovery,
            policy,
            tx: None,
            rx: None,
            thread_handle: None,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            status: Arc::new(AtomicU8::new(ConnectionStatus::Closed.into())),
        }
    }

    pub fn start(&mut self) {
        if self.thread_handle.is_some() {
            warn!("[WS] Already running");
            return;
        }

        let (outgoing_tx, outgoing_rx) = bounded::<Outgoing>(CHANNEL_CAPACITY);
        let (incoming_tx, incoming_rx) = bounded::<ConnectionEvent>(CHANNEL_CAPACITY);

        self.tx = Some(outgoing_tx);
        self.rx = Some(incoming_rx);
        self.shutdown_flag.store(false, Ordering::SeqCst);
        store_status(&self.status, ConnectionStatus::Connecting);

        let link = Link {
            outgoing_rx,
            incoming_tx: incoming_tx.clone(),
            shutdown_flag: Arc::clone(&self.shutdown_flag),
            status: Arc::clone(&self.status),
        };
        let discovery = self.discovery.clone();
        let policy = self.policy.clone();
        let status = Arc::clone(&self.status);

        let handle = thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                connection_thread(discovery, policy, link);
            }));

            if let Err(panic_info) = result {
                let msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("WS thread panic: {}", s)
                } else {
                    "WS thread panic".to_string()
                };
                error!("{}", msg);
                store_status(&status, ConnectionStatus::Failed);
                let _ = incoming_tx.send(ConnectionEvent::Terminal(msg));
            }
        });

        self.thread_handle = Some(handle);
    }

    pub fn stop(&mut self) {
        self.shutdown_flag.store(true, Ordering::SeqCst);
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(Outgoing::Shutdown);
        }
        // Drop the receiver first so a thread blocked on a full queue wakes up
        self.rx = None;
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.tx = None;
        store_status(&self.status, ConnectionStatus::Closed);
    }

    pub fn status(&self) -> ConnectionStatus {
        load_status(&self.status)
    }

    pub fn handle(&self) -> Option<ConnectionHandle> {
        self.tx.as_ref().map(|tx| ConnectionHandle {
            tx: tx.clone(),
            status: Arc::clone(&self.status),
        })
    }

    pub fn poll(&mut self) -> Option<ConnectionEvent> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                // Thread gone (terminal or panic); reap it
                if let Some(handle) = self.thread_handle.take() {
                    let _ = handle.join();
                }
                self.rx = None;
                None
            }
        }
    }

    /// Dispatch every pending event to `handler`. Returns the number handled.
    pub fn pump<H: ConnectionHandler + ?Sized>(&mut self, handler: &mut H) -> usize {
        let mut count = 0;
        while let Some(event) = self.poll() {
            count += 1;
            match event {
                ConnectionEvent::Connected { url } => {
                    debug!(url = %url, "[WS] Dispatching connect");
                    if let Some(handle) = self.handle() {
                        handler.on_connect(&handle);
                    }
                }
                ConnectionEvent::Disconnected { reason } => handler.on_disconnect(&reason),
                ConnectionEvent::Reconnecting { attempt, delay } => {
                    handler.on_reconnecting(attempt, delay)
                }
                ConnectionEvent::Message(message) => handler.on_message(message),
                ConnectionEvent::Terminal(error) => handler.on_terminal_error(&error),
            }
        }
        count
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.stop();
    }
}

// =============================================================================
// CONNECTION THREAD
// =============================================================================

struct Link {
    outgoing_rx: Receiver<Outgoing>,
    incoming_tx: Sender<ConnectionEvent>,
    shutdown_flag: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
}

impl Link {
    fn is_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    fn set_status(&self, status: ConnectionStatus) {
        store_status(&self.status, status);
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.incoming_tx.send(event);
    }

    /// Sleep in small steps so shutdown is not held up by a long backoff
    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.is_shutdown() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

fn connection_thread(discovery: Discovery, policy: ReconnectPolicy, link: Link) {
    link.sleep(policy.initial_delay);
    let mut attempt = 0u32;

    loop {
        if link.is_shutdown() {
            break;
        }

        link.set_status(ConnectionStatus::Connecting);
        let opened = discovery
            .resolve()
            .map_err(ConnectError::from)
            .and_then(|url| open_socket(&url, policy.connect_timeout).map(|s| (url, s)));

        match opened {
            Ok((url, mut socket)) => {
                info!(url = %url, "[WS] Connected");
                attempt = 0;

                // Anything queued while the link was down belongs to the old
                // connection; the client re-sends join and presence itself
                let mut drained = 0u32;
                while let Ok(msg) = link.outgoing_rx.try_recv() {
                    if let Outgoing::Shutdown = msg {
                        let _ = socket.close(None);
                        link.set_status(ConnectionStatus::Closed);
                        return;
                    }
                    drained += 1;
                }
                if drained > 0 {
                    info!(count = drained, "[WS] Drained stale outgoing messages");
                }

                link.set_status(ConnectionStatus::Open);
                link.emit(ConnectionEvent::Connected { url });

                let result = message_loop(&mut socket, &link);
                link.set_status(ConnectionStatus::Closing);
                let _ = socket.close(None);
                let _ = socket.flush();
                link.set_status(ConnectionStatus::Closed);

                match result {
                    Ok(()) => break,
                    Err(reason) => {
                        info!(reason = %reason, "[WS] Disconnected");
                        link.emit(ConnectionEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, attempt, "[WS] Connection failed");
                link.set_status(ConnectionStatus::Closed);
                link.emit(ConnectionEvent::Disconnected {
                    reason: e.to_string(),
                });
            }
        }

        if link.is_shutdown() {
            break;
        }

        match policy.next_delay(attempt) {
            Some(delay) => {
                attempt += 1;
                info!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "[WS] Reconnecting..."
                );
                link.set_status(ConnectionStatus::Reconnecting);
                link.emit(ConnectionEvent::Reconnecting { attempt, delay });
                link.sleep(delay);
            }
            None => {
                error!(attempts = attempt, "[WS] Giving up");
                link.set_status(ConnectionStatus::Failed);
                link.emit(ConnectionEvent::Terminal(TERMINAL_CONNECT_ERROR.to_string()));
                return;
            }
        }
    }

    link.set_status(ConnectionStatus::Closed);
}

/// TCP connect and WebSocket handshake, both bounded by `timeout`
fn open_socket(url: &str, timeout: Duration) -> Result<Socket, ConnectError> {
    let request = url.into_client_request()?;
    let uri = request.uri();
    let host = uri
        .host()
        .ok_or_else(|| ConnectError::InvalidUrl(url.to_string()))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let default_port = match uri.scheme_str() {
        Some("wss") => 443,
        Some("ws") => 80,
        _ => return Err(ConnectError::InvalidUrl(url.to_string())),
    };
    let port = uri.port_u16().unwrap_or(default_port);

    let addr = (host.as_str(), port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| ConnectError::InvalidUrl(url.to_string()))?;

    debug!(url = %url, addr = %addr, "[WS] Connecting...");
    let stream = TcpStream::connect_timeout(&addr, timeout)?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;
    stream.set_nodelay(true)?;

    let (socket, _) = tungstenite::client_tls(request, stream)
        .map_err(|e| ConnectError::Handshake(e.to_string()))?;

    match socket.get_ref() {
        MaybeTlsStream::Plain(tcp) => tcp.set_nonblocking(true)?,
        MaybeTlsStream::NativeTls(tls) => tls.get_ref().set_nonblocking(true)?,
        _ => {}
    }
    Ok(socket)
}

fn is_would_block(e: &tungstenite::Error) -> bool {
    matches!(e, tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::WouldBlock)
}

fn message_loop(socket: &mut Socket, link: &Link) -> Result<(), String> {
    loop {
        if link.is_shutdown() {
            return Ok(());
        }

        // Handle outgoing
        loop {
            match link.outgoing_rx.try_recv() {
                Ok(Outgoing::Envelope(envelope)) => {
                    let json = serde_json::to_string(&envelope).map_err(|e| e.to_string())?;
                    debug!(kind = envelope.message.kind(), "[WS] Sending");
                    match socket.send(Message::Text(json)) {
                        Ok(()) => {}
                        // Buffered; flushed on a later pass
                        Err(e) if is_would_block(&e) => {}
                        Err(e) => return Err(format!("Send error: {}", e)),
                    }
                }
                Ok(Outgoing::Shutdown) => return Ok(()),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err("Channel disconnected".to_string()),
            }
        }

        // Handle incoming
        loop {
            match socket.read() {
                Ok(Message::Text(text)) => match HostMessage::parse(&text) {
                    Ok(message) => link.emit(ConnectionEvent::Message(message)),
                    Err(e) => warn!(error = %e, "[WS] Dropping malformed message"),
                },
                Ok(Message::Close(_)) => return Err("Host closed the connection".to_string()),
                Ok(_) => {}
                Err(e) if is_would_block(&e) => break,
                Err(e) => return Err(format!("Read error: {}", e)),
            }
        }

        match socket.flush() {
            Ok(()) => {}
            Err(e) if is_would_block(&e) => {}
            Err(e) => return Err(format!("Flush error: {}", e)),
        }

        thread::sleep(POLL_INTERVAL);
    }
}

// =============================================================================
// MOCK IMPLEMENTATIONS FOR TESTING
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================
