//! # Reconnecting WebSocket Client
//!
//! [`connect`] spawns one task that owns the socket for the life of the
//! overlay. The task:
//!
//! - publishes every [`ConnectionState`] change both on a watch channel (read
//!   through [`TransportHandle::state`]) and as an ordered [`TransportEvent`];
//! - queues sends made before the first successful open (bounded, oldest
//!   dropped) and flushes them on open;
//! - retries forever with capped exponential backoff after any unexpected loss;
//! - treats a silent socket as lost once the heartbeat threshold passes;
//! - on [`TransportHandle::close`], sends the farewell frame and a close frame
//!   within the close timeout and stops.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::sink::SinkExt;
use futures_util::stream::{SplitSink, SplitStream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_tungstenite::{
    connect_async, tungstenite::protocol::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};

use crate::transport::backoff::Backoff;
use crate::transport::endpoint::Endpoint;
use crate::transport::events::{ConnectionState, RawMessage, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const DEFAULT_FAREWELL: &str = "Client Closed!";

/// Connection tuning. Defaults: 1 s to 60 s backoff, 30 s heartbeat, 32 queued
/// sends, 1 s close timeout.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` disables the watchdog.
    pub heartbeat_threshold: Option<Duration>,
    /// Text frame sent best-effort on caller-initiated close.
    pub farewell: Option<String>,
    pub close_timeout: Duration,
    /// Sends kept while the first connection is being established.
    pub backlog_limit: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            heartbeat_threshold: Some(Duration::from_secs(30)),
            farewell: Some(DEFAULT_FAREWELL.to_string()),
            close_timeout: Duration::from_secs(1),
            backlog_limit: 32,
        }
    }
}

#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// Ordered inbound event stream of one transport.
#[derive(Debug)]
pub struct TransportEvents {
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportEvents {
    /// Next event; `None` once the transport task has ended.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }
}

/// Caller side of a transport: send, observe state, close.
#[derive(Debug)]
pub struct TransportHandle {
    endpoint: Endpoint,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
    close_timeout: Duration,
}

impl TransportHandle {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// A receiver that can await state changes.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Sends a text frame. Queued before the first open, dropped with
    /// [`TransportError::NotOpen`] while reconnecting or closed.
    pub fn send(&self, text: impl Into<String>) -> Result<(), TransportError> {
        let state = self.state();
        match state {
            ConnectionState::Connecting | ConnectionState::Open => self
                .commands
                .send(Command::Send(text.into()))
                .map_err(|_| TransportError::NotOpen(ConnectionState::Closed)),
            other => {
                log::debug!("Dropping outbound frame while {}", other);
                Err(TransportError::NotOpen(other))
            }
        }
    }

    /// Closes the connection best-effort. Never waits longer than the close timeout.
    pub async fn close(mut self) {
        if self.commands.send(Command::Close).is_err() {
            return;
        }
        let grace = self.close_timeout + Duration::from_millis(50);
        if timeout(grace, &mut self.task).await.is_err() {
            log::warn!("Transport did not close within {:?}, aborting", grace);
            self.task.abort();
        }
    }
}

/// Starts the connection task. Must be called inside a tokio runtime.
pub fn connect(endpoint: Endpoint, config: TransportConfig) -> (TransportHandle, TransportEvents) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

    let close_timeout = config.close_timeout;
    let worker = Worker {
        endpoint: endpoint.clone(),
        backoff: Backoff::new(config.base_delay, config.max_delay),
        config,
        commands: command_rx,
        events: event_tx,
        state: state_tx,
        backlog: VecDeque::new(),
        opened: false,
    };
    let task = tokio::spawn(worker.run());

    (
        TransportHandle {
            endpoint,
            commands: command_tx,
            state: state_rx,
            task,
            close_timeout,
        },
        TransportEvents { rx: event_rx },
    )
}

/// How a live session ended.
enum SessionEnd {
    Lost(TransportError),
    Closed,
}

struct Worker {
    endpoint: Endpoint,
    config: TransportConfig,
    backoff: Backoff,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<TransportEvent>,
    state: watch::Sender<ConnectionState>,
    backlog: VecDeque<String>,
    /// Set after the first successful open; the backlog only applies before it.
    opened: bool,
}

impl Worker {
    async fn run(mut self) {
        self.emit(TransportEvent::State(ConnectionState::Connecting));

        loop {
            let ws = match self.establish().await {
                Some(Ok(ws)) => ws,
                Some(Err(error)) => {
                    log::warn!("{}", error);
                    self.emit(TransportEvent::Error(error));
                    if !self.wait_before_retry().await {
                        break;
                    }
                    continue;
                }
                None => break,
            };

            self.opened = true;
            self.backoff.reset();
            log::info!("Connected to {}", self.endpoint);
            self.set_state(ConnectionState::Open);

            match self.session(ws).await {
                SessionEnd::Lost(error) => {
                    log::warn!("{}", error);
                    self.emit(TransportEvent::Error(error));
                    self.set_state(ConnectionState::Reconnecting);
                    if !self.wait_before_retry().await {
                        break;
                    }
                }
                SessionEnd::Closed => break,
            }
        }

        self.set_state(ConnectionState::Closed);
        log::info!("Transport to {} closed", self.endpoint);
    }

    /// One connection attempt. `None` when the caller asked to close meanwhile.
    async fn establish(&mut self) -> Option<Result<WsStream, TransportError>> {
        let url = self.endpoint.as_str().to_string();
        log::debug!("Connecting to {}", url);
        let attempt = connect_async(url.clone());
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                result = &mut attempt => {
                    return Some(result.map(|(ws, _)| ws).map_err(|e| TransportError::ConnectFailed {
                        url,
                        reason: e.to_string(),
                    }));
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => self.hold(text),
                    Some(Command::Close) | None => return None,
                },
                _ = self.events.closed() => return None,
            }
        }
    }

    /// Sleeps the next backoff delay. `false` when the caller asked to close meanwhile.
    async fn wait_before_retry(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        log::info!("Reconnecting to {} in {:?}", self.endpoint, delay);
        let wake = sleep(delay);
        tokio::pin!(wake);

        loop {
            tokio::select! {
                _ = &mut wake => return true,
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => self.hold(text),
                    Some(Command::Close) | None => return false,
                },
                _ = self.events.closed() => return false,
            }
        }
    }

    /// Keeps a send for later, or drops it when a session was already lost.
    fn hold(&mut self, text: String) {
        if self.opened {
            log::debug!("Dropping outbound frame while reconnecting");
            return;
        }
        if self.config.backlog_limit == 0 {
            return;
        }
        if self.backlog.len() >= self.config.backlog_limit {
            self.backlog.pop_front();
            log::debug!("Send backlog full, dropped oldest frame");
        }
        self.backlog.push_back(text);
    }

    async fn session(&mut self, ws: WsStream) -> SessionEnd {
        let (mut write, mut read): (SplitSink<WsStream, WsMessage>, SplitStream<WsStream>) = ws.split();

        let queued: Vec<String> = self.backlog.drain(..).collect();
        if !queued.is_empty() {
            log::debug!("Flushing {} queued frames", queued.len());
        }
        for text in queued {
            if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                return SessionEnd::Lost(TransportError::SendFailed(e.to_string()));
            }
        }

        let watchdog = self.config.heartbeat_threshold.filter(|d| !d.is_zero());
        let far_future = Duration::from_secs(86_400 * 365);
        let mut deadline = Instant::now() + watchdog.unwrap_or(far_future);

        loop {
            tokio::select! {
                frame = read.next() => {
                    if let Some(threshold) = watchdog {
                        deadline = Instant::now() + threshold;
                    }
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            log::trace!("Received text frame: {} bytes", text.len());
                            self.emit(TransportEvent::Message(RawMessage::Text(text.as_str().to_owned())));
                        }
                        Some(Ok(WsMessage::Binary(data))) => {
                            log::trace!("Received binary frame: {} bytes", data.len());
                            self.emit(TransportEvent::Message(RawMessage::Binary(data.to_vec())));
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                                .unwrap_or_else(|| "no close frame".to_string());
                            return SessionEnd::Lost(TransportError::RemoteClosed(reason.trim().to_string()));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return SessionEnd::Lost(TransportError::Lost(e.to_string())),
                        None => return SessionEnd::Lost(TransportError::RemoteClosed("stream ended".to_string())),
                    }
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                            return SessionEnd::Lost(TransportError::SendFailed(e.to_string()));
                        }
                    }
                    Some(Command::Close) | None => {
                        self.say_goodbye(&mut write).await;
                        return SessionEnd::Closed;
                    }
                },
                _ = self.events.closed() => {
                    self.say_goodbye(&mut write).await;
                    return SessionEnd::Closed;
                }
                _ = sleep_until(deadline), if watchdog.is_some() => {
                    let threshold = watchdog.unwrap_or_default();
                    log::warn!("Watchdog triggered: no frame for {}s", threshold.as_secs());
                    return SessionEnd::Lost(TransportError::Inactive(threshold));
                }
            }
        }
    }

    /// Farewell text plus close frame, both within the close timeout.
    async fn say_goodbye(&self, write: &mut SplitSink<WsStream, WsMessage>) {
        let farewell = self.config.farewell.clone();
        let goodbye = async move {
            if let Some(text) = farewell {
                if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                    log::debug!("Farewell frame not delivered: {}", e);
                    return;
                }
            }
            let _ = write.close().await;
        };
        if timeout(self.config.close_timeout, goodbye).await.is_err() {
            log::debug!("Close handshake timed out");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        if *self.state.borrow() == state {
            return;
        }
        self.state.send_replace(state);
        self.emit(TransportEvent::State(state));
    }

    fn emit(&self, event: TransportEvent) {
        // A dropped receiver is noticed by the select loops.
        let _ = self.events.send(event);
    }
}
