//! Live chat reader: consumes `live_stream.found` events into per-stream
//! reading progress, and streams chat of started or upcoming live streams
//! into the content stores until each stream finishes.

pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod kafka;
pub mod lock;
pub mod logging;
pub mod youtube;

pub mod proto {
    tonic::include_proto!("youtube.api.v3");
}
