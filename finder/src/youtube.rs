//! YouTube Data API v3 client for live stream discovery.
//!
//! Two calls are used: `search` to list upcoming broadcasts per channel and
//! `videos` to fetch the live-streaming details of candidate video ids.
//! Items that have already ended, have no active chat, or carry no scheduled
//! start are not actionable and are dropped.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::domain::LiveStream;
use crate::error::{FinderError, FinderResult};
use crate::find::Catalog;

const MAX_RESULTS: u32 = 50;

pub struct CatalogClient {
    client: Client,
    host: String,
    api_key: String,
}

impl CatalogClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> FinderResult<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(FinderError::Config("youtube api key is empty".into()));
        }

        Ok(Self {
            client: Client::new(),
            host: host.into(),
            api_key,
        })
    }

    /// Identifiers of upcoming live broadcasts for the channel, newest first.
    pub async fn search_upcoming(&self, channel_id: &str) -> FinderResult<Vec<String>> {
        let url = format!("{}/youtube/v3/search", self.host);
        let max_results = MAX_RESULTS.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("part", "snippet"),
                ("channelId", channel_id),
                ("eventType", "upcoming"),
                ("type", "video"),
                ("order", "date"),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FinderError::Youtube(format!("search call: {e}")))?
            .error_for_status()
            .map_err(|e| FinderError::Youtube(format!("search call: {e}")))?
            .json::<SearchResponse>()
            .await
            .map_err(|e| FinderError::Youtube(format!("decode search response: {e}")))?;

        Ok(resp
            .items
            .into_iter()
            .filter_map(|item| item.id.video_id)
            .collect())
    }

    /// Live stream details for the given video ids, filtered down to
    /// broadcasts that are still upcoming and have chat enabled.
    pub async fn list_live_streams(&self, video_ids: &[String]) -> FinderResult<Vec<LiveStream>> {
        let url = format!("{}/youtube/v3/videos", self.host);
        let ids = video_ids.join(",");
        let max_results = MAX_RESULTS.to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("part", "id,snippet,liveStreamingDetails"),
                ("id", ids.as_str()),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| FinderError::Youtube(format!("videos call: {e}")))?
            .error_for_status()
            .map_err(|e| FinderError::Youtube(format!("videos call: {e}")))?
            .json::<VideoListResponse>()
            .await
            .map_err(|e| FinderError::Youtube(format!("decode videos response: {e}")))?;

        live_streams_from_response(resp)
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn search_upcoming(&self, channel_id: &str) -> FinderResult<Vec<String>> {
        CatalogClient::search_upcoming(self, channel_id).await
    }

    async fn list_live_streams(&self, video_ids: &[String]) -> FinderResult<Vec<LiveStream>> {
        CatalogClient::list_live_streams(self, video_ids).await
    }
}

fn parse_rfc3339(value: &str, field: &str) -> FinderResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| FinderError::Other(anyhow!("parse {field}: {e}")))
}

fn live_streams_from_response(resp: VideoListResponse) -> FinderResult<Vec<LiveStream>> {
    let mut live_streams = Vec::new();

    for item in resp.items {
        let Some(details) = item.live_streaming_details else {
            continue;
        };

        if details.actual_end_time.is_some() {
            continue;
        }

        let Some(chat_id) = details.active_live_chat_id else {
            continue;
        };

        let Some(scheduled) = details.scheduled_start_time else {
            continue;
        };

        let scheduled_start = parse_rfc3339(&scheduled, "scheduled start time")?;
        let published_at = parse_rfc3339(&item.snippet.published_at, "published at")?;

        let thumbnail_url = item
            .snippet
            .thumbnails
            .maxres
            .map(|t| t.url)
            .unwrap_or_default();

        let live_stream = LiveStream::new(
            item.id,
            item.snippet.title,
            item.snippet.channel_id,
            item.snippet.channel_title,
            thumbnail_url,
            chat_id,
            published_at,
            scheduled_start,
        )?;

        live_streams.push(live_stream);
    }

    Ok(live_streams)
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(rename = "liveStreamingDetails")]
    live_streaming_details: Option<LiveStreamingDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(rename = "channelId")]
    channel_id: String,
    #[serde(rename = "channelTitle")]
    channel_title: String,
    #[serde(rename = "publishedAt")]
    published_at: String,
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    maxres: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct LiveStreamingDetails {
    #[serde(rename = "scheduledStartTime")]
    scheduled_start_time: Option<String>,
    #[serde(rename = "actualEndTime")]
    actual_end_time: Option<String>,
    #[serde(rename = "activeLiveChatId")]
    active_live_chat_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_json(id: &str, details: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "snippet": {
                "title": format!("stream {id}"),
                "channelId": "ch1",
                "channelTitle": "channel one",
                "publishedAt": "2024-05-01T12:00:00Z",
                "thumbnails": {
                    "maxres": { "url": format!("https://i.ytimg.com/vi/{id}/maxresdefault.jpg") }
                }
            },
            "liveStreamingDetails": details
        })
    }

    #[test]
    fn keeps_only_actionable_upcoming_streams() {
        let resp: VideoListResponse = serde_json::from_value(serde_json::json!({
            "items": [
                video_json("v1", serde_json::json!({
                    "scheduledStartTime": "2024-05-02T18:00:00Z",
                    "activeLiveChatId": "c1"
                })),
                // Already ended.
                video_json("v2", serde_json::json!({
                    "scheduledStartTime": "2024-04-01T18:00:00Z",
                    "actualEndTime": "2024-04-01T20:00:00Z",
                    "activeLiveChatId": "c2"
                })),
                // No chat.
                video_json("v3", serde_json::json!({
                    "scheduledStartTime": "2024-05-02T18:00:00Z"
                })),
                // Never scheduled.
                video_json("v4", serde_json::json!({
                    "activeLiveChatId": "c4"
                })),
            ]
        }))
        .unwrap();

        let streams = live_streams_from_response(resp).unwrap();

        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].id(), "v1");
        assert_eq!(streams[0].chat_id(), "c1");
        assert_eq!(streams[0].channel_title(), "channel one");
    }

    #[test]
    fn skips_plain_videos_without_live_details() {
        let mut item = video_json("v1", serde_json::Value::Null);
        item.as_object_mut().unwrap().remove("liveStreamingDetails");

        let resp: VideoListResponse =
            serde_json::from_value(serde_json::json!({ "items": [item] })).unwrap();

        assert!(live_streams_from_response(resp).unwrap().is_empty());
    }

    #[test]
    fn bad_timestamp_aborts_the_run() {
        let resp: VideoListResponse = serde_json::from_value(serde_json::json!({
            "items": [video_json("v1", serde_json::json!({
                "scheduledStartTime": "not-a-timestamp",
                "activeLiveChatId": "c1"
            }))]
        }))
        .unwrap();

        assert!(live_streams_from_response(resp).is_err());
    }
}
