// Realtime messaging channel: one live WebSocket connection per session.

pub mod channel;

pub use channel::{
    spawn_channel, ChannelCommand, ChannelConfig, ChannelHandle, ChannelNotification,
    ChannelSender,
};
