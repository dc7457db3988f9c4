use std::env;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);

/// Configuration of the chat-reading worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: String,
    pub youtube_grpc_target: String,
    pub youtube_api_keys: Vec<String>,
    pub retry_interval: Duration,
    pub advance_start: Duration,
    pub lock_ttl: Duration,
}

/// Configuration of the event consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub database_url: String,
    pub kafka_brokers: String,
    pub group_id: String,
    pub live_stream_found_topic: String,
}

fn required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError(format!("{key} missing")))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Parse `90`, `90s`, `30m` or `1h` into a duration.
fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let value = value.trim();

    let (number, unit) = match value.chars().last() {
        Some(c) if c.is_ascii_digit() => (value, "s"),
        Some('s') => (&value[..value.len() - 1], "s"),
        Some('m') => (&value[..value.len() - 1], "m"),
        Some('h') => (&value[..value.len() - 1], "h"),
        _ => return Err(ConfigError(format!("invalid duration '{value}'"))),
    };

    let number: u64 = number
        .parse()
        .map_err(|_| ConfigError(format!("invalid duration '{value}'")))?;

    let secs = match unit {
        "m" => number * 60,
        "h" => number * 3600,
        _ => number,
    };

    Ok(Duration::from_secs(secs))
}

fn duration_var(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_duration(&value),
        Err(_) => Ok(default),
    }
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());

        let youtube_grpc_target = env::var("YOUTUBE_GRPC_TARGET")
            .unwrap_or_else(|_| "https://youtube.googleapis.com".into());

        let youtube_api_keys = parse_list(&required("YOUTUBE_API_KEYS")?);
        if youtube_api_keys.is_empty() {
            return Err(ConfigError("YOUTUBE_API_KEYS is empty".into()));
        }

        let retry_interval = duration_var("RETRY_INTERVAL", Duration::from_secs(10))?;
        let advance_start = duration_var("ADVANCE_START", Duration::from_secs(30 * 60))?;
        let lock_ttl = duration_var("LOCK_TTL", Duration::from_secs(5))?;

        Ok(Self {
            database_url,
            redis_url,
            youtube_grpc_target,
            youtube_api_keys,
            retry_interval,
            advance_start,
            lock_ttl,
        })
    }
}

impl ConsumerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let kafka_brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into());
        let group_id = env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "livechat-reader".into());
        let live_stream_found_topic = env::var("KAFKA_TOPIC_LIVE_STREAM_FOUND_V1")
            .unwrap_or_else(|_| "live_stream.found.v1".into());

        Ok(Self {
            database_url,
            kafka_brokers,
            group_id,
            live_stream_found_topic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn rejects_malformed_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ten seconds").is_err());
        assert!(parse_duration("10x").is_err());
        assert!(parse_duration("s").is_err());
    }

    #[test]
    fn parses_comma_lists() {
        assert_eq!(
            parse_list("key-a, key-b ,,key-c"),
            vec!["key-a".to_string(), "key-b".to_string(), "key-c".to_string()]
        );
    }
}
