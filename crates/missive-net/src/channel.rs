//! Realtime channel task with a typed command/notification pattern.
//!
//! The connection loop runs in a dedicated tokio task. External code
//! communicates with it through an mpsc command channel (outbound messages,
//! shutdown) and an mpsc notification channel (connection lifecycle,
//! inbound events); the live connection state is published on a watch
//! channel so senders can check it without round-tripping the task.
//!
//! The task owns the single WebSocket connection for a session: it is
//! opened with the session credential and reconnects on its own (capped
//! delay growth, reset on success) until told to shut down. No component
//! outside this module ever holds the underlying transport object.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};
use url::Url;

use missive_shared::constants::{MAX_RETRY_DELAY_MS, RETRY_DELAY_MS};
use missive_shared::protocol::{decode_server_event, encode_message, MessageEvent, OutgoingMessage, ServerEvent};
use missive_shared::{ConnectionState, MissiveError, Result};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Commands sent *into* the channel task.
#[derive(Debug)]
pub enum ChannelCommand {
    /// Emit a chat message on the live connection.
    Send(OutgoingMessage),
    /// Tear the connection down and stop reconnecting.
    Shutdown,
}

/// Notifications sent *from* the channel task.
#[derive(Debug, Clone)]
pub enum ChannelNotification {
    Connected,
    Disconnected,
    /// The transport failed to connect or dropped with an error.
    ConnectError(String),
    /// An inbound chat message, already normalized.
    Message(MessageEvent),
}

/// Configuration for the channel task.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub socket_url: Url,
    /// Initial reconnect delay (transport default pacing).
    pub retry_delay: Duration,
    /// Cap on the reconnect delay.
    pub max_retry_delay: Duration,
}

impl ChannelConfig {
    pub fn new(socket_url: Url) -> Self {
        Self {
            socket_url,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            max_retry_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}

/// Handle returned by [`spawn_channel`].
///
/// The notification receiver can be taken exactly once by the consumer
/// that pumps events; command senders are cheap to clone via [`Self::sender`].
pub struct ChannelHandle {
    commands: mpsc::Sender<ChannelCommand>,
    state: watch::Receiver<ConnectionState>,
    notifications: Option<mpsc::Receiver<ChannelNotification>>,
}

impl ChannelHandle {
    pub fn sender(&self) -> ChannelSender {
        ChannelSender {
            commands: self.commands.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn state_watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn take_notifications(&mut self) -> Option<mpsc::Receiver<ChannelNotification>> {
        self.notifications.take()
    }

    /// Request teardown. Dropping the handle has the same effect.
    pub fn shutdown(&self) {
        let _ = self.commands.try_send(ChannelCommand::Shutdown);
    }
}

/// Cloneable outbound side of the channel.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    commands: mpsc::Sender<ChannelCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ChannelSender {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queue an outbound message. Fails with [`MissiveError::NotConnected`]
    /// unless the connection is currently live.
    pub fn try_send(&self, message: OutgoingMessage) -> Result<()> {
        if self.state() != ConnectionState::Connected {
            return Err(MissiveError::NotConnected);
        }
        self.commands
            .try_send(ChannelCommand::Send(message))
            .map_err(|_| MissiveError::NotConnected)
    }
}

/// Spawn the channel task for an authenticated session.
///
/// The credential is presented to the transport as a `token` query
/// parameter on the socket URL.
pub fn spawn_channel(config: ChannelConfig, token: String) -> ChannelHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (note_tx, note_rx) = mpsc::channel(256);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    tokio::spawn(channel_loop(config, token, cmd_rx, note_tx, state_tx));

    ChannelHandle {
        commands: cmd_tx,
        state: state_rx,
        notifications: Some(note_rx),
    }
}

fn authed_url(socket_url: &Url, token: &str) -> Url {
    let mut url = socket_url.clone();
    url.query_pairs_mut().append_pair("token", token);
    url
}

/// How one connected session ended.
enum SessionEnd {
    Shutdown,
    Closed,
    Error(String),
}

async fn channel_loop(
    config: ChannelConfig,
    token: String,
    mut commands: mpsc::Receiver<ChannelCommand>,
    notifications: mpsc::Sender<ChannelNotification>,
    state: watch::Sender<ConnectionState>,
) {
    let url = authed_url(&config.socket_url, &token);
    let mut retry = config.retry_delay;

    loop {
        state.send_replace(ConnectionState::Connecting);
        debug!(url = %config.socket_url, "Connecting realtime channel");

        match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                retry = config.retry_delay;
                state.send_replace(ConnectionState::Connected);
                let _ = notifications.send(ChannelNotification::Connected).await;
                info!("Realtime channel connected");

                let end = run_session(stream, &mut commands, &notifications).await;

                state.send_replace(ConnectionState::Disconnected);
                let _ = notifications.send(ChannelNotification::Disconnected).await;

                match end {
                    SessionEnd::Shutdown => break,
                    SessionEnd::Closed => info!("Realtime channel closed by server"),
                    SessionEnd::Error(e) => {
                        warn!(error = %e, "Realtime channel dropped");
                        let _ = notifications
                            .send(ChannelNotification::ConnectError(e))
                            .await;
                    }
                }
            }
            Err(e) => {
                state.send_replace(ConnectionState::Disconnected);
                warn!(error = %e, "Realtime channel connect failed");
                let _ = notifications
                    .send(ChannelNotification::ConnectError(e.to_string()))
                    .await;
            }
        }

        // Wait out the retry delay, but stay responsive to shutdown.
        // Sends that race a disconnect are dropped with a warning; the
        // sender already treats a non-connected state as a failure.
        tokio::select! {
            _ = tokio::time::sleep(retry) => {}
            cmd = commands.recv() => match cmd {
                Some(ChannelCommand::Shutdown) | None => break,
                Some(ChannelCommand::Send(_)) => {
                    warn!("Dropping outbound message while disconnected");
                }
            }
        }
        retry = (retry * 2).min(config.max_retry_delay);
    }

    state.send_replace(ConnectionState::Disconnected);
    debug!("Realtime channel task exited");
}

async fn run_session(
    stream: WsStream,
    commands: &mut mpsc::Receiver<ChannelCommand>,
    notifications: &mpsc::Sender<ChannelNotification>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(ChannelCommand::Send(message)) => {
                    let text = match encode_message(&message) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode outbound message");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(WsMessage::Text(text.into())).await {
                        return SessionEnd::Error(format!("write failed: {e}"));
                    }
                }
                Some(ChannelCommand::Shutdown) | None => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return SessionEnd::Shutdown;
                }
            },
            msg = read.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return SessionEnd::Error(format!("read failed: {e}")),
                    None => return SessionEnd::Closed,
                };
                match msg {
                    WsMessage::Text(text) => match decode_server_event(&text) {
                        Ok(ServerEvent::Message(event)) => {
                            let _ = notifications
                                .send(ChannelNotification::Message(event))
                                .await;
                        }
                        Ok(ServerEvent::Unknown { event }) => {
                            debug!(%event, "Ignoring unhandled realtime event");
                        }
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed realtime frame");
                        }
                    },
                    WsMessage::Ping(payload) => {
                        if let Err(e) = write.send(WsMessage::Pong(payload)).await {
                            return SessionEnd::Error(format!("pong failed: {e}"));
                        }
                    }
                    WsMessage::Close(_) => return SessionEnd::Closed,
                    _ => {}
                }
            }
        }
    }
}
