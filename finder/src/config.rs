use std::env;

use dotenvy::dotenv;

use crate::error::FinderError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub youtube_host: String,
    pub youtube_api_key: String,
    pub youtube_channels: Vec<String>,
    pub kafka_brokers: String,
    pub live_stream_found_topic: String,
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self, FinderError> {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| FinderError::Config("DATABASE_URL missing".into()))?;

        let youtube_host =
            env::var("YOUTUBE_HOST").unwrap_or_else(|_| "https://www.googleapis.com".into());

        let youtube_api_key = env::var("YOUTUBE_API_KEY")
            .map_err(|_| FinderError::Config("YOUTUBE_API_KEY missing".into()))?;

        let youtube_channels = env::var("YOUTUBE_CHANNELS")
            .map_err(|_| FinderError::Config("YOUTUBE_CHANNELS missing".into()))
            .map(|v| parse_list(&v))?;
        if youtube_channels.is_empty() {
            return Err(FinderError::Config("YOUTUBE_CHANNELS is empty".into()));
        }

        let kafka_brokers = env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".into());

        let live_stream_found_topic = env::var("KAFKA_TOPIC_LIVE_STREAM_FOUND_V1")
            .unwrap_or_else(|_| "live_stream.found.v1".into());

        Ok(Self {
            database_url,
            youtube_host,
            youtube_api_key,
            youtube_channels,
            kafka_brokers,
            live_stream_found_topic,
        })
    }
}
