// Shared domain types and wire protocol for the Missive client core.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::{MissiveError, Result};
pub use types::{
    Contact, ConnectionState, ConversationKey, Message, MessageKind, User, UserId,
};
