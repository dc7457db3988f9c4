use std::time::Duration;

use chrono::{DateTime, Utc};

use super::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanType {
    Permanent,
    Temporary,
}

impl BanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BanType::Permanent => "permanent",
            BanType::Temporary => "temporary",
        }
    }
}

/// A chat ban handed out during a broadcast. Temporary bans always carry a
/// non-zero duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ban {
    id: String,
    author_id: String,
    video_id: String,
    ban_type: BanType,
    duration: Duration,
    published_at: DateTime<Utc>,
}

impl Ban {
    pub fn new(
        id: String,
        author_id: String,
        video_id: String,
        ban_type: &str,
        duration: Duration,
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

        // Upstream labels arrive upper-case; accept either case.
        let ban_type = match ban_type {
            "TEMPORARY" | "temporary" => {
                if duration.is_zero() {
                    return Err(ValidationError::Zero("duration"));
                }

                BanType::Temporary
            }
            "PERMANENT" | "permanent" => BanType::Permanent,
            other => return Err(ValidationError::UnknownBanType(other.to_string())),
        };

        Ok(Self {
            id,
            author_id,
            video_id,
            ban_type,
            duration,
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

    pub fn ban_type(&self) -> BanType {
        self.ban_type
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn published() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 18, 30, 0).unwrap()
    }

    #[test]
    fn temporary_ban_keeps_duration() {
        let ban = Ban::new(
            "b1".into(),
            "a1".into(),
            "v1".into(),
            "TEMPORARY",
            Duration::from_secs(300),
            published(),
        )
        .unwrap();

        assert_eq!(ban.ban_type(), BanType::Temporary);
        assert_eq!(ban.duration(), Duration::from_secs(300));
    }

    #[test]
    fn permanent_ban_keeps_upstream_duration() {
        let ban = Ban::new(
            "b1".into(),
            "a1".into(),
            "v1".into(),
            "permanent",
            Duration::from_secs(300),
            published(),
        )
        .unwrap();

        assert_eq!(ban.ban_type(), BanType::Permanent);
        assert_eq!(ban.duration(), Duration::from_secs(300));
    }

    #[test]
    fn permanent_ban_allows_zero_duration() {
        let ban = Ban::new(
            "b1".into(),
            "a1".into(),
            "v1".into(),
            "PERMANENT",
            Duration::ZERO,
            published(),
        )
        .unwrap();

        assert_eq!(ban.ban_type(), BanType::Permanent);
        assert_eq!(ban.duration(), Duration::ZERO);
    }

    #[test]
    fn temporary_ban_requires_duration() {
        let err = Ban::new(
            "b1".into(),
            "a1".into(),
            "v1".into(),
            "temporary",
            Duration::ZERO,
            published(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "duration is zero");
    }

    #[test]
    fn rejects_unknown_ban_type() {
        let err = Ban::new(
            "b1".into(),
            "a1".into(),
            "v1".into(),
            "SHADOW",
            Duration::from_secs(1),
            published(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), "unknown ban type 'SHADOW'");
    }

    #[test]
    fn rejects_empty_ids() {
        let cases = vec![
            (
                Ban::new(
                    "".into(),
                    "a1".into(),
                    "v1".into(),
                    "permanent",
                    Duration::ZERO,
                    published(),
                ),
                "id is empty",
            ),
            (
                Ban::new(
                    "b1".into(),
                    "".into(),
                    "v1".into(),
                    "permanent",
                    Duration::ZERO,
                    published(),
                ),
                "author id is empty",
            ),
            (
                Ban::new(
                    "b1".into(),
                    "a1".into(),
                    "".into(),
                    "permanent",
                    Duration::ZERO,
                    published(),
                ),
                "video id is empty",
            ),
        ];

        for (result, message) in cases {
            assert_eq!(result.unwrap_err().to_string(), message);
        }
    }
}
