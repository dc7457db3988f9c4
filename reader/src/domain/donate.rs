use chrono::{DateTime, Utc};

use super::{is_zero, ValidationError};

/// A super-chat contribution. `amount` is the display string shown in chat,
/// `amount_micros` the machine-readable value in millionths of `currency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Donate {
    id: String,
    author_id: String,
    video_id: String,
    comment: String,
    amount: String,
    amount_micros: u64,
    currency: String,
    published_at: DateTime<Utc>,
}

impl Donate {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        author_id: String,
        video_id: String,
        comment: String,
        amount: String,
        amount_micros: u64,
        currency: String,
        published_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::Empty("id"));
        }

        if author_id.is_empty() {
            return Err(ValidationError::Empty("author id"));
        }

        if video_id.is_empty() {
            return Err(ValidationError::Empty("video id"));
        }

        if amount.is_empty() {
            return Err(ValidationError::Empty("amount"));
        }

        if currency.is_empty() {
            return Err(ValidationError::Empty("currency"));
        }

        if is_zero(&published_at) {
            return Err(ValidationError::Zero("published at"));
        }

        Ok(Self {
            id,
            author_id,
            video_id,
            comment,
            amount,
            amount_micros,
            currency,
            published_at,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }

    pub fn amount_micros(&self) -> u64 {
        self.amount_micros
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}
