use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("{0} is zero")]
    Zero(&'static str),
}

fn is_zero(ts: &DateTime<Utc>) -> bool {
    ts.timestamp() == 0 && ts.timestamp_subsec_nanos() == 0
}

/// A YouTube video with an upcoming live broadcast and an active chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStream {
    id: String,
    title: String,
    channel_id: String,
    channel_title: String,
    thumbnail_url: String,
    chat_id: String,
    published_at: DateTime<Utc>,
    scheduled_start: DateTime<Utc>,
}

impl LiveStream {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        title: String,
        channel_id: String,
        channel_title: String,
        thumbnail_url: String,
        chat_id: String,
        published_at: DateTime<Utc>,
        scheduled_start: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Empty("id"));
        }

        if title.is_empty() {
            return Err(ValidationError::Empty("title"));
        }

        if channel_id.is_empty() {
            return Err(ValidationError::Empty("channel id"));
        }

        if channel_title.is_empty() {
            return Err(ValidationError::Empty("channel title"));
        }

        if thumbnail_url.is_empty() {
            return Err(ValidationError::Empty("thumbnail URL"));
        }

        if chat_id.is_empty() {
            return Err(ValidationError::Empty("chat id"));
        }

        if is_zero(&published_at) {
            return Err(ValidationError::Zero("published at"));
        }

        if is_zero(&scheduled_start) {
            return Err(ValidationError::Zero("scheduled start"));
        }

        Ok(Self {
            id,
            title,
            channel_id,
            channel_title,
            thumbnail_url,
            chat_id,
            published_at,
            scheduled_start,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn channel_title(&self) -> &str {
        &self.channel_title
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.thumbnail_url
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }
}
