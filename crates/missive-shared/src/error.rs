use thiserror::Error;

pub type Result<T> = std::result::Result<T, MissiveError>;

#[derive(Error, Debug)]
pub enum MissiveError {
    #[error("No active session")]
    NoSession,

    #[error("Credential rejected by the backend")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Realtime channel is not connected")]
    NotConnected,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MissiveError {
    /// Message suitable for inline display next to the failing form or
    /// action. Server-provided text is passed through; everything else
    /// gets a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            MissiveError::Api { message, .. } => message.clone(),
            MissiveError::Validation(message) => message.clone(),
            MissiveError::Unauthorized => "Your session has expired".to_string(),
            MissiveError::NotConnected => "No connection".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }
}
