//! Headless synchronization core for the Missive chat client.
//!
//! Keeps one user's view of "who I am, who my contacts are, what messages
//! exist in the active conversation" consistent against the remote backend,
//! and surfaces typed [`events::ClientEvent`]s for an embedding UI to
//! render. Presentation writes back only through the explicit operations on
//! [`client::Client`].

pub mod client;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod events;
pub mod session;
pub mod storage;

use tracing_subscriber::{fmt, EnvFilter};

pub use client::Client;
pub use config::ClientConfig;
pub use conversation::{Conversation, Entry, InboundOutcome};
pub use directory::DirectoryCache;
pub use events::ClientEvent;
pub use session::SessionStore;
pub use storage::{PersistedSession, SessionStorage};

/// Initialise tracing with an env-filter default suitable for the client.
///
/// Honors `RUST_LOG`; safe to call more than once (later calls are no-ops).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("missive_client=debug,missive_net=debug,missive_api=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
