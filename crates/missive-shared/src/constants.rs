/// Maximum inline image attachment size in bytes (5 MiB)
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// How long an optimistic pending message waits for its server echo
/// before it is considered unconfirmed, in seconds
pub const RECONCILE_WINDOW_SECS: i64 = 10;

/// Initial delay before the realtime channel retries a failed connection,
/// in milliseconds
pub const RETRY_DELAY_MS: u64 = 1_000;

/// Upper bound on the reconnect delay, in milliseconds
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// How often a pending QR sign-in is polled, in milliseconds
pub const QR_POLL_INTERVAL_MS: u64 = 2_000;

/// Realtime event name for chat messages (both directions)
pub const EVENT_MESSAGE: &str = "message";

/// Default HTTP API base URL (local development)
pub const DEFAULT_API_URL: &str = "http://localhost:4000/";

/// Default realtime socket URL (local development)
pub const DEFAULT_SOCKET_URL: &str = "ws://localhost:4000/ws";

/// File name of the persisted session document
pub const SESSION_FILE: &str = "session.json";
