//! Subtitles, danmaku, hot comments and typed search for Bilibili videos

// Re-export key types for convenience
pub use crate::error::{BiliInfoError, Result, TransportKind};

pub mod api;
pub mod client;
pub mod comment;
pub mod config;
pub mod danmaku;
pub mod error;
pub mod models;
pub mod resolver;
pub mod search;
pub mod subtitle;
pub mod utils;
pub mod wbi;

// Re-export commonly used types
pub use client::BiliClient;
pub use config::ClientConfig;
pub use models::{CommentEntry, DanmakuEntry, SubtitleCue, SubtitleTrack, VideoId};
pub use search::{SearchPage, SearchQuery, SearchResult, SearchType};
