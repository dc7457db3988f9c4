//! Live stream discovery job: searches configured YouTube channels for
//! upcoming broadcasts, persists the new ones, and emits
//! `live_stream.found` events through the transactional outbox.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod find;
pub mod youtube;
