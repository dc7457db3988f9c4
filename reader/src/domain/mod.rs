//! Domain model of a live chat: messages, bans, donates, authors, and the
//! per-stream reading progress. Constructors validate their inputs so the
//! rest of the pipeline only ever sees well-formed values.

mod author;
mod ban;
mod chat;
mod donate;
mod progress;
mod text;

pub use author::Author;
pub use ban::{Ban, BanType};
pub use chat::ChatMessages;
pub use donate::Donate;
pub use progress::LiveStreamProgress;
pub use text::TextMessage;

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("{0} is zero")]
    Zero(&'static str),

    #[error("unknown ban type '{0}'")]
    UnknownBanType(String),
}

pub(crate) fn is_zero(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0
}
