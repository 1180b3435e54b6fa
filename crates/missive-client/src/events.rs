//! Typed events surfaced to the embedding UI.

use serde::Serialize;

use missive_shared::{ConnectionState, Message};

/// Everything the presentation layer needs to react to, in one stream.
///
/// Events are best-effort: a UI that lags or disconnects its receiver
/// never blocks the core.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// The session credential was rejected; the UI must return to the
    /// unauthenticated screen.
    SessionExpired,
    /// Realtime connection lifecycle changed.
    ConnectionChanged { state: ConnectionState },
    /// The realtime transport reported a connect failure (non-fatal;
    /// the channel keeps retrying).
    ConnectionError { message: String },
    /// The contact directory or its selection changed.
    DirectoryChanged,
    /// The active conversation changed (opened, history loaded, closed).
    ConversationChanged,
    /// An optimistic entry was appended while awaiting its echo.
    MessagePending { message: Message },
    /// A confirmed message was merged into the active conversation.
    /// `reconciled` is true when it replaced a pending entry in place.
    MessageReceived { message: Message, reconciled: bool },
    /// A pending entry outlived the reconcile window without an echo.
    SendTimedOut { message_id: String },
    /// Best-effort desktop notification request for a message from the
    /// remote peer.
    Notify { title: String, body: String },
}
