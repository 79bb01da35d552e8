//! Notification socket lifecycle with the tokio mpsc command/notification
//! pattern.
//!
//! One background task owns the WebSocket. It dials, keeps the link alive
//! with a heartbeat, decodes pushed frames and redials after unexpected
//! closes. The rest of the client talks to it only through
//! [`ConnectionCommand`]s and receives [`ConnectionNotification`]s, so the
//! socket's lifetime is tied to the session object rather than to any view.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use penlink_shared::constants::DEFAULT_HEARTBEAT_SECS;
use penlink_shared::protocol::{InboundEvent, InboundFrame, OutboundFrame};
use penlink_shared::types::UserId;

use crate::endpoints::Endpoints;
use crate::error::NetError;
use crate::reconnect::ReconnectPolicy;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long `disconnect` waits for the task before aborting it.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Command / notification types
// ---------------------------------------------------------------------------

/// Commands sent *into* the connection task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Write a control frame. Dropped unless the socket is open.
    Send(OutboundFrame),
    /// Foreground/background change. Reconnects wait while hidden.
    SetVisible(bool),
    /// Close deliberately; no reconnect follows.
    Shutdown,
}

/// Notifications sent *from* the connection task.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionNotification {
    /// Dialing; `attempt` counts consecutive tries since the last open link.
    Connecting { attempt: u32 },
    Connected,
    Disconnected { intentional: bool },
    ReconnectScheduled { delay: Duration },
    Event(InboundEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Waiting out the reconnect delay (or for the client to become visible).
    Backoff,
    Closed,
}

/// Timing configuration of the connection task.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub heartbeat: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

struct LiveConnection {
    user_id: UserId,
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

/// Owns at most one connection task per session.
pub struct ConnectionManager {
    endpoints: Endpoints,
    config: ConnectionConfig,
    notif_tx: mpsc::Sender<ConnectionNotification>,
    visible: bool,
    live: Option<LiveConnection>,
}

impl ConnectionManager {
    /// Create a manager and the receiver its notifications arrive on. The
    /// receiver outlives individual connections, so a reconnect after
    /// logout/login keeps feeding the same consumer.
    pub fn new(
        endpoints: Endpoints,
        config: ConnectionConfig,
    ) -> (Self, mpsc::Receiver<ConnectionNotification>) {
        let (notif_tx, notif_rx) = mpsc::channel(256);
        let manager = Self {
            endpoints,
            config,
            notif_tx,
            visible: true,
            live: None,
        };
        (manager, notif_rx)
    }

    /// Open the user's event stream. Returns `false` without doing anything
    /// when a channel is already open, connecting, or waiting to reconnect.
    pub fn connect(&mut self, user_id: &UserId) -> bool {
        if let Some(live) = &self.live {
            if *live.state.borrow() != ConnectionState::Closed && !live.task.is_finished() {
                if &live.user_id != user_id {
                    warn!(
                        current = %live.user_id,
                        requested = %user_id,
                        "Connect requested for another user while connected; ignoring"
                    );
                }
                return false;
            }
        }

        let url = self.endpoints.notifications_socket(user_id);
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let worker = ConnectionTask {
            url,
            config: self.config.clone(),
            cmd_rx,
            notif_tx: self.notif_tx.clone(),
            state_tx,
            visible: self.visible,
        };
        let task = tokio::spawn(worker.run());

        info!(user = %user_id, "Notification socket task started");
        self.live = Some(LiveConnection {
            user_id: user_id.clone(),
            cmd_tx,
            state: state_rx,
            task,
        });
        true
    }

    /// Close the channel deliberately: stops the heartbeat and suppresses the
    /// reconnect path. Waits for the task to finish.
    pub async fn disconnect(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };

        let LiveConnection {
            user_id,
            cmd_tx,
            mut task,
            ..
        } = live;

        let _ = cmd_tx.try_send(ConnectionCommand::Shutdown);
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Notification socket task ended abnormally"),
            Err(_) => {
                warn!("Notification socket task did not stop in time; aborting");
                task.abort();
            }
        }
        info!(user = %user_id, "Notification socket closed");
    }

    /// Queue a control frame. Fails fast when the socket is not open so
    /// callers never buffer typing signals for a dead link.
    pub async fn send(&self, frame: OutboundFrame) -> Result<(), NetError> {
        let live = self.live.as_ref().ok_or(NetError::NotConnected)?;
        if *live.state.borrow() != ConnectionState::Open {
            return Err(NetError::NotConnected);
        }
        live.cmd_tx
            .send(ConnectionCommand::Send(frame))
            .await
            .map_err(|_| NetError::NotConnected)
    }

    pub async fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if let Some(live) = &self.live {
            let _ = live.cmd_tx.send(ConnectionCommand::SetVisible(visible)).await;
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.live
            .as_ref()
            .map(|live| *live.state.borrow())
            .unwrap_or(ConnectionState::Closed)
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

enum SessionEnd {
    Shutdown,
    Dropped,
}

struct ConnectionTask {
    url: String,
    config: ConnectionConfig,
    cmd_rx: mpsc::Receiver<ConnectionCommand>,
    notif_tx: mpsc::Sender<ConnectionNotification>,
    state_tx: watch::Sender<ConnectionState>,
    visible: bool,
}

impl ConnectionTask {
    async fn run(mut self) {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            self.notify(ConnectionNotification::Connecting { attempt }).await;

            let end = match self.dial().await {
                Some(Ok(socket)) => {
                    attempt = 0;
                    info!(url = %self.url, "Notification socket connected");
                    self.set_state(ConnectionState::Open);
                    self.notify(ConnectionNotification::Connected).await;
                    self.run_session(socket).await
                }
                Some(Err(e)) => {
                    warn!(url = %self.url, attempt, error = %e, "Notification socket dial failed");
                    SessionEnd::Dropped
                }
                None => SessionEnd::Shutdown,
            };

            if let SessionEnd::Shutdown = end {
                break;
            }

            self.set_state(ConnectionState::Backoff);
            self.notify(ConnectionNotification::Disconnected { intentional: false })
                .await;

            if !self.wait_for_retry().await {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
        // The consumer may be the one awaiting `disconnect`; never block here.
        let _ = self
            .notif_tx
            .try_send(ConnectionNotification::Disconnected { intentional: true });
        debug!(url = %self.url, "Connection task terminated");
    }

    /// Dial while still honouring commands. `None` means shutdown was
    /// requested before the handshake finished.
    async fn dial(&mut self) -> Option<Result<Socket, NetError>> {
        let connecting = connect_async(self.url.as_str());
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                res = &mut connecting => {
                    return Some(res.map(|(socket, _)| socket).map_err(NetError::from));
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnectionCommand::SetVisible(v)) => self.visible = v,
                    Some(ConnectionCommand::Send(frame)) => {
                        debug!(?frame, "Dropping frame while connecting");
                    }
                    Some(ConnectionCommand::Shutdown) | None => return None,
                },
            }
        }
    }

    async fn run_session(&mut self, socket: Socket) -> SessionEnd {
        let (mut write, mut read) = socket.split();

        let period = self.config.heartbeat;
        let mut heartbeat = tokio::time::interval_at(Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // --- Incoming frames ---
                frame = read.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => self.dispatch_text(&text).await,
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "Server closed notification socket");
                        return SessionEnd::Dropped;
                    }
                    // Transport-level ping/pong is answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Notification socket read failed");
                        return SessionEnd::Dropped;
                    }
                    None => {
                        info!("Notification socket stream ended");
                        return SessionEnd::Dropped;
                    }
                },

                // --- Keepalive ---
                _ = heartbeat.tick() => {
                    if let Err(e) = send_frame(&mut write, &OutboundFrame::Heartbeat).await {
                        warn!(error = %e, "Heartbeat send failed");
                        return SessionEnd::Dropped;
                    }
                    trace!("Heartbeat sent");
                }

                // --- Commands ---
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(ConnectionCommand::Send(frame)) => {
                        if let Err(e) = send_frame(&mut write, &frame).await {
                            warn!(error = %e, "Frame send failed");
                            return SessionEnd::Dropped;
                        }
                    }
                    Some(ConnectionCommand::SetVisible(v)) => self.visible = v,
                    Some(ConnectionCommand::Shutdown) | None => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                },
            }
        }
    }

    /// Sleep out the jittered delay. Hidden clients defer the redial until
    /// they are visible again. Returns `false` if shutdown was requested.
    async fn wait_for_retry(&mut self) -> bool {
        loop {
            while !self.visible {
                debug!("Client hidden; reconnect deferred");
                match self.cmd_rx.recv().await {
                    Some(ConnectionCommand::SetVisible(v)) => self.visible = v,
                    Some(ConnectionCommand::Send(_)) => {}
                    Some(ConnectionCommand::Shutdown) | None => return false,
                }
            }

            let delay = self.config.reconnect.next_delay(&mut rand::thread_rng());
            info!(delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
            self.notify(ConnectionNotification::ReconnectScheduled { delay })
                .await;

            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);

            let slept = loop {
                tokio::select! {
                    _ = &mut sleep => break true,
                    cmd = self.cmd_rx.recv() => match cmd {
                        Some(ConnectionCommand::SetVisible(v)) => self.visible = v,
                        Some(ConnectionCommand::Send(_)) => {}
                        Some(ConnectionCommand::Shutdown) | None => break false,
                    },
                }
            };

            if !slept {
                return false;
            }
            if self.visible {
                return true;
            }
        }
    }

    async fn dispatch_text(&self, text: &str) {
        match InboundFrame::decode(text) {
            Ok(InboundFrame::Heartbeat) => trace!("Heartbeat reply"),
            Ok(InboundFrame::Event(event)) => {
                self.notify(ConnectionNotification::Event(event)).await;
            }
            Err(e) => debug!(error = %e, len = text.len(), "Dropping malformed frame"),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    async fn notify(&self, notification: ConnectionNotification) {
        let _ = self.notif_tx.send(notification).await;
    }
}

async fn send_frame<S>(write: &mut S, frame: &OutboundFrame) -> Result<(), NetError>
where
    S: Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = frame.encode()?;
    write.send(WsMessage::Text(text)).await?;
    Ok(())
}
