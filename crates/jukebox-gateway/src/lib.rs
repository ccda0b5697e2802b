pub mod channel;
pub mod dispatcher;

pub use channel::{ChannelError, ChannelOptions, ChannelState, RealtimeChannel};
pub use dispatcher::Dispatcher;
