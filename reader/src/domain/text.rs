use chrono::{DateTime, Utc};

use super::{is_zero, ValidationError};

/// A plain chat message. The text itself may be empty (deleted or
/// emoji-only messages arrive that way).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    id: String,
    video_id: String,
    author_id: String,
    text: String,
    published_at: DateTime<Utc>,
}

impl TextMessage {
    pub fn new(
        id: String,
        video_id: String,
        author_id: String,
        text: String,
        published_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Empty("id"));
        }

        if video_id.is_empty() {
            return Err(ValidationError::Empty("video id"));
        }

        if author_id.is_empty() {
            return Err(ValidationError::Empty("author id"));
        }

        if is_zero(&published_at) {
            return Err(ValidationError::Zero("published at"));
        }

        Ok(Self {
            id,
            video_id,
            author_id,
            text,
            published_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}
