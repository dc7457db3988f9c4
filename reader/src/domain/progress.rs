use chrono::{DateTime, Utc};

use super::{is_zero, ValidationError};

/// Reading progress of one live stream's chat.
///
/// `next_page_token` is the cursor the next read resumes from; empty means
/// reading has not started. Once `finish` is called the progress is terminal
/// and carries the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStreamProgress {
    id: String,
    chat_id: String,
    scheduled_start: DateTime<Utc>,
    next_page_token: String,
    finished_at: Option<DateTime<Utc>>,
    finish_reason: String,
}

impl LiveStreamProgress {
    pub fn new(
        id: String,
        chat_id: String,
        scheduled_start: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Empty("id"));
        }

        if chat_id.is_empty() {
            return Err(ValidationError::Empty("chat id"));
        }

        if is_zero(&scheduled_start) {
            return Err(ValidationError::Zero("scheduled start"));
        }

        Ok(Self {
            id,
            chat_id,
            scheduled_start,
            next_page_token: String::new(),
            finished_at: None,
            finish_reason: String::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }

    pub fn next_page_token(&self) -> &str {
        &self.next_page_token
    }

    pub fn set_next_page_token(&mut self, token: impl Into<String>) {
        self.next_page_token = token.into();
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn finish_reason(&self) -> &str {
        &self.finish_reason
    }

    /// Mark the reading finished. Terminal: no further cursor advance will
    /// be persisted for a finished progress.
    pub fn finish(&mut self, at: DateTime<Utc>, reason: impl Into<String>) {
        self.finished_at = Some(at);
        self.finish_reason = reason.into();
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}
