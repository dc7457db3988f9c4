//! Streaming chat client over the YouTube live chat gRPC API.
//!
//! Each open stream runs two throttled loops: the outer loop issues a fresh
//! `StreamList` call resuming from the local cursor, the inner loop receives
//! one frame per tick. A frame's `next_page_token` feeds the local cursor so
//! the next outer call resumes where the last frame left off; the caller's
//! progress record is never mutated here. Transport failures are translated
//! into the [`StreamError`] taxonomy before they reach the consumer.

use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::{Code, Request, Status};
use tracing::{debug, error, warn};

use crate::domain::{Author, Ban, ChatMessages, Donate, LiveStreamProgress, TextMessage};
use crate::engine::ChatMessageStreamer;
use crate::error::StreamError;
use crate::proto::live_chat_message_snippet::type_wrapper::Type as SnippetType;
use crate::proto::live_chat_message_snippet::DisplayedContent;
use crate::proto::v3_data_live_chat_message_service_client::V3DataLiveChatMessageServiceClient;
use crate::proto::{
    LiveChatMessageListRequest, LiveChatMessageListResponse, LiveChatSuperChatDetails,
    LiveChatUserBannedMessageDetails,
};

const MAX_RESULTS: u32 = 2000;
const PARTS: [&str; 3] = ["id", "snippet", "authorDetails"];

const DEFAULT_THROTTLE: Duration = Duration::from_secs(2);

pub struct StreamChatMessagesGrpcClient {
    grpc: V3DataLiveChatMessageServiceClient<Channel>,
    api_keys: Vec<String>,
    list_period: Duration,
    recv_period: Duration,
}

impl StreamChatMessagesGrpcClient {
    pub fn new(
        grpc: V3DataLiveChatMessageServiceClient<Channel>,
        api_keys: Vec<String>,
    ) -> anyhow::Result<Self> {
        if api_keys.is_empty() {
            return Err(anyhow!("api keys are empty"));
        }

        Ok(Self {
            grpc,
            api_keys,
            list_period: DEFAULT_THROTTLE,
            recv_period: DEFAULT_THROTTLE,
        })
    }

    /// Override the list/receive throttle periods.
    pub fn with_periods(mut self, list_period: Duration, recv_period: Duration) -> Self {
        self.list_period = list_period;
        self.recv_period = recv_period;
        self
    }
}

impl ChatMessageStreamer for StreamChatMessagesGrpcClient {
    fn stream_chat_messages(
        &self,
        cancel: CancellationToken,
        progress: &LiveStreamProgress,
    ) -> (
        mpsc::Receiver<ChatMessages>,
        mpsc::Receiver<StreamError>,
    ) {
        let (cm_tx, cm_rx) = mpsc::channel(1);
        let (err_tx, err_rx) = mpsc::channel(1);

        let worker = StreamWorker {
            client: self.grpc.clone(),
            api_keys: self.api_keys.clone(),
            list_period: self.list_period,
            recv_period: self.recv_period,
            live_stream_id: progress.id().to_string(),
            chat_id: progress.chat_id().to_string(),
            cursor: progress.next_page_token().to_string(),
        };

        tokio::spawn(worker.run(cancel, cm_tx, err_tx));

        (cm_rx, err_rx)
    }
}

struct StreamWorker {
    client: V3DataLiveChatMessageServiceClient<Channel>,
    api_keys: Vec<String>,
    list_period: Duration,
    recv_period: Duration,
    live_stream_id: String,
    chat_id: String,
    cursor: String,
}

impl StreamWorker {
    async fn run(
        mut self,
        cancel: CancellationToken,
        cm_tx: mpsc::Sender<ChatMessages>,
        err_tx: mpsc::Sender<StreamError>,
    ) {
        debug!(live_stream_id = %self.live_stream_id, "YouTube streaming is starting");

        let mut list_throttle = interval(self.list_period);
        list_throttle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = list_throttle.tick() => {
                    if !self.open_and_receive(&cancel, &cm_tx, &err_tx).await {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        debug!(live_stream_id = %self.live_stream_id, "YouTube streaming stopped");
    }

    /// Open one `StreamList` call and drain it. Returns `true` when the call
    /// ended cleanly and the outer loop should reopen from the cursor.
    async fn open_and_receive(
        &mut self,
        cancel: &CancellationToken,
        cm_tx: &mpsc::Sender<ChatMessages>,
        err_tx: &mpsc::Sender<StreamError>,
    ) -> bool {
        debug!(
            live_stream_id = %self.live_stream_id,
            next_page_token = %self.cursor,
            "StreamList call"
        );

        let mut request = Request::new(LiveChatMessageListRequest {
            live_chat_id: Some(self.chat_id.clone()),
            max_results: Some(MAX_RESULTS),
            page_token: Some(self.cursor.clone()),
            part: PARTS.iter().map(|p| p.to_string()).collect(),
        });

        let api_key = match MetadataValue::try_from(self.api_key()) {
            Ok(value) => value,
            Err(err) => {
                let _ = err_tx
                    .send(StreamError::Other(anyhow!("invalid api key metadata: {err}")))
                    .await;
                return false;
            }
        };
        request.metadata_mut().insert("x-goog-api-key", api_key);

        let mut client = self.client.clone();
        let mut stream = match client.stream_list(request).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                if let Some(err) = map_status(&status) {
                    let _ = err_tx.send(err).await;
                }
                return false;
            }
        };

        let mut recv_throttle = interval(self.recv_period);
        recv_throttle.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = recv_throttle.tick() => {
                    debug!(live_stream_id = %self.live_stream_id, "YouTube streamList receiving");

                    match stream.message().await {
                        // Clean end of this call; reopen from the cursor.
                        Ok(None) => return true,
                        Ok(Some(frame)) => {
                            match chat_messages_from_response(&self.live_stream_id, &frame) {
                                Ok(cm) => {
                                    if !cm.next_page_token().is_empty() {
                                        self.cursor = cm.next_page_token().to_string();
                                    }

                                    if cm_tx.send(cm).await.is_err() {
                                        return false;
                                    }
                                }
                                Err(err) => {
                                    let _ = err_tx.send(err).await;
                                    return false;
                                }
                            }
                        }
                        Err(status) => {
                            if let Some(err) = map_status(&status) {
                                let _ = err_tx.send(err).await;
                            }
                            return false;
                        }
                    }
                }
                _ = cancel.cancelled() => return false,
            }
        }
    }

    fn api_key(&self) -> &str {
        let idx = rand::thread_rng().gen_range(0..self.api_keys.len());
        &self.api_keys[idx]
    }
}

fn map_status(status: &Status) -> Option<StreamError> {
    if status.code() == Code::Cancelled {
        warn!(code = ?status.code(), message = status.message(), "GRPC call cancelled");
        return None;
    }

    error!(code = ?status.code(), message = status.message(), "GRPC call failed");

    Some(match status.code() {
        Code::NotFound | Code::PermissionDenied => StreamError::ChatNotFound,
        Code::FailedPrecondition => StreamError::ChatOffline,
        Code::ResourceExhausted => StreamError::UnavailableLiveStream,
        _ => StreamError::Other(anyhow!(
            "grpc status {:?}: {}",
            status.code(),
            status.message()
        )),
    })
}

fn chat_messages_from_response(
    live_stream_id: &str,
    resp: &LiveChatMessageListResponse,
) -> Result<ChatMessages, StreamError> {
    let mut cm = ChatMessages::new(resp.next_page_token());

    for item in &resp.items {
        let Some(snippet) = item.snippet.as_ref() else {
            return Err(StreamError::Other(anyhow!("item snippet is missing")));
        };

        let published_at = DateTime::parse_from_rfc3339(snippet.published_at())
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|e| StreamError::Other(anyhow!("parse published at: {e}")))?;

        match snippet.r#type() {
            SnippetType::TextMessageEvent => {
                let msg = TextMessage::new(
                    item.id().to_string(),
                    live_stream_id.to_string(),
                    snippet.author_channel_id().to_string(),
                    snippet.display_message().to_string(),
                    published_at,
                )
                .map_err(|e| StreamError::Other(anyhow!("new text message: {e}")))?;

                cm.add_text_message(msg);
            }
            SnippetType::UserBannedEvent => {
                let default_details = LiveChatUserBannedMessageDetails::default();
                let details = match &snippet.displayed_content {
                    Some(DisplayedContent::UserBannedDetails(d)) => d,
                    _ => &default_details,
                };

                let banned_channel_id = details
                    .banned_user_details
                    .as_ref()
                    .map(|b| b.channel_id().to_string())
                    .unwrap_or_default();

                let ban = Ban::new(
                    item.id().to_string(),
                    banned_channel_id,
                    live_stream_id.to_string(),
                    details.ban_type().as_str_name(),
                    Duration::from_secs(details.ban_duration_seconds()),
                    published_at,
                )
                .map_err(|e| StreamError::Other(anyhow!("new ban: {e}")))?;

                cm.add_ban(ban);
            }
            SnippetType::SuperChatEvent => {
                let default_details = LiveChatSuperChatDetails::default();
                let details = match &snippet.displayed_content {
                    Some(DisplayedContent::SuperChatDetails(d)) => d,
                    _ => &default_details,
                };

                let donate = Donate::new(
                    item.id().to_string(),
                    snippet.author_channel_id().to_string(),
                    live_stream_id.to_string(),
                    details.user_comment().to_string(),
                    details.amount_display_string().to_string(),
                    details.amount_micros(),
                    details.currency().to_string(),
                    published_at,
                )
                .map_err(|e| StreamError::Other(anyhow!("new donate: {e}")))?;

                cm.add_donate(donate);
            }
            _ => {}
        }

        let author_details = item.author_details.clone().unwrap_or_default();
        let author = Author::new(
            author_details.channel_id().to_string(),
            author_details.display_name().to_string(),
            author_details.profile_image_url().to_string(),
            author_details.is_verified(),
        )
        .map_err(|e| StreamError::Other(anyhow!("new author: {e}")))?;

        cm.add_author(author);
    }

    Ok(cm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BanType;
    use crate::proto::live_chat_user_banned_message_details::ban_type_wrapper::BanType as ProtoBanType;
    use crate::proto::{
        ChannelProfileDetails, LiveChatMessage, LiveChatMessageAuthorDetails,
        LiveChatMessageSnippet,
    };

    fn author_details(channel_id: &str) -> LiveChatMessageAuthorDetails {
        LiveChatMessageAuthorDetails {
            channel_id: Some(channel_id.to_string()),
            display_name: Some(format!("author {channel_id}")),
            profile_image_url: Some(format!("https://example.com/{channel_id}.jpg")),
            is_verified: Some(false),
            ..Default::default()
        }
    }

    fn text_item(id: &str, author_id: &str, message: &str) -> LiveChatMessage {
        LiveChatMessage {
            id: Some(id.to_string()),
            snippet: Some(LiveChatMessageSnippet {
                r#type: Some(SnippetType::TextMessageEvent as i32),
                live_chat_id: Some("c1".to_string()),
                author_channel_id: Some(author_id.to_string()),
                published_at: Some("2024-05-02T18:30:00Z".to_string()),
                display_message: Some(message.to_string()),
                displayed_content: None,
            }),
            author_details: Some(author_details(author_id)),
            ..Default::default()
        }
    }

    fn response(token: &str, items: Vec<LiveChatMessage>) -> LiveChatMessageListResponse {
        LiveChatMessageListResponse {
            next_page_token: Some(token.to_string()),
            items,
            ..Default::default()
        }
    }

    #[test]
    fn parses_text_messages_and_authors() {
        let resp = response("t2", vec![text_item("m1", "a1", "hi"), text_item("m2", "a1", "yo")]);

        let cm = chat_messages_from_response("v1", &resp).unwrap();

        assert_eq!(cm.next_page_token(), "t2");
        assert_eq!(cm.text_messages().len(), 2);
        // The same author appears once even across items.
        assert_eq!(cm.authors().len(), 1);

        let mut texts = cm.text_messages();
        texts.sort_by(|a, b| a.id().cmp(b.id()));
        assert_eq!(texts[0].video_id(), "v1");
        assert_eq!(texts[0].author_id(), "a1");
    }

    #[test]
    fn parses_ban_events() {
        let mut item = text_item("b1", "mod1", "");
        let snippet = item.snippet.as_mut().unwrap();
        snippet.r#type = Some(SnippetType::UserBannedEvent as i32);
        snippet.displayed_content = Some(DisplayedContent::UserBannedDetails(
            LiveChatUserBannedMessageDetails {
                banned_user_details: Some(ChannelProfileDetails {
                    channel_id: Some("troll1".to_string()),
                    ..Default::default()
                }),
                ban_type: Some(ProtoBanType::Temporary as i32),
                ban_duration_seconds: Some(300),
            },
        ));

        let cm = chat_messages_from_response("v1", &response("t2", vec![item])).unwrap();

        let bans = cm.bans();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].author_id(), "troll1");
        assert_eq!(bans[0].ban_type(), BanType::Temporary);
        assert_eq!(bans[0].duration(), Duration::from_secs(300));
        assert!(cm.text_messages().is_empty());
    }

    #[test]
    fn parses_super_chat_events() {
        let mut item = text_item("d1", "fan1", "");
        let snippet = item.snippet.as_mut().unwrap();
        snippet.r#type = Some(SnippetType::SuperChatEvent as i32);
        snippet.displayed_content = Some(DisplayedContent::SuperChatDetails(
            LiveChatSuperChatDetails {
                user_comment: Some("great stream".to_string()),
                amount_display_string: Some("$5.00".to_string()),
                amount_micros: Some(5_000_000),
                currency: Some("USD".to_string()),
            },
        ));

        let cm = chat_messages_from_response("v1", &response("t2", vec![item])).unwrap();

        let donates = cm.donates();
        assert_eq!(donates.len(), 1);
        assert_eq!(donates[0].amount(), "$5.00");
        assert_eq!(donates[0].amount_micros(), 5_000_000);
        assert_eq!(donates[0].currency(), "USD");
        assert_eq!(donates[0].comment(), "great stream");
    }

    #[test]
    fn unhandled_event_types_still_record_the_author() {
        let mut item = text_item("s1", "fan2", "");
        item.snippet.as_mut().unwrap().r#type = Some(SnippetType::SuperStickerEvent as i32);

        let cm = chat_messages_from_response("v1", &response("", vec![item])).unwrap();

        assert!(cm.text_messages().is_empty());
        assert!(cm.donates().is_empty());
        assert_eq!(cm.authors().len(), 1);
    }

    #[test]
    fn bad_published_at_fails_the_batch() {
        let mut item = text_item("m1", "a1", "hi");
        item.snippet.as_mut().unwrap().published_at = Some("yesterday".to_string());

        let err = chat_messages_from_response("v1", &response("t2", vec![item])).unwrap_err();

        assert!(err.to_string().contains("parse published at"));
    }

    #[test]
    fn missing_author_block_fails_the_batch() {
        let mut item = text_item("m1", "a1", "hi");
        item.author_details = None;

        let err = chat_messages_from_response("v1", &response("t2", vec![item])).unwrap_err();

        assert!(err.to_string().contains("new author"));
    }

    #[test]
    fn status_codes_map_to_the_error_taxonomy() {
        assert!(matches!(
            map_status(&Status::new(Code::NotFound, "no chat")),
            Some(StreamError::ChatNotFound)
        ));
        assert!(matches!(
            map_status(&Status::new(Code::PermissionDenied, "forbidden")),
            Some(StreamError::ChatNotFound)
        ));
        assert!(matches!(
            map_status(&Status::new(Code::FailedPrecondition, "offline")),
            Some(StreamError::ChatOffline)
        ));
        assert!(matches!(
            map_status(&Status::new(Code::ResourceExhausted, "quota")),
            Some(StreamError::UnavailableLiveStream)
        ));
        assert!(map_status(&Status::new(Code::Cancelled, "bye")).is_none());
        assert!(matches!(
            map_status(&Status::new(Code::Internal, "boom")),
            Some(StreamError::Other(_))
        ));
    }
}
