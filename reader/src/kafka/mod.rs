//! Event consumption: the consumer-group loop and the handler that turns
//! `live_stream.found` events into progress records.

mod consumer;
mod live_stream_found;

pub use consumer::{ConsumerLoop, MessageHandler};
pub use live_stream_found::{LiveStreamFoundHandler, ProgressStore};
