//! Data models for the application

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 规范化的视频标识（BV号），如 BV1x341177NN
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub(crate) fn new_unchecked(bvid: impl Into<String>) -> Self {
        Self(bvid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VideoId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// 平台统一的 JSON 外层结构
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ttl: i32,
    pub data: Option<T>,
}

/// `/x/web-interface/view` 中我们需要的部分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoView {
    pub bvid: String, // 稿件bvid
    pub aid: i64,     // 稿件avid
    pub cid: i64,     // 1P 的 cid
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub pages: Vec<VideoPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoPart {
    pub cid: i64,
    pub page: i32,
    #[serde(default)]
    pub part: String,
    #[serde(default)]
    pub duration: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    #[serde(rename = "lan")]
    pub lang: String, // 语言代码，AI 字幕带 ai- 前缀
    #[serde(rename = "lan_doc", default)]
    pub label: String, // 语言名称，如 "中文（自动生成）"
    #[serde(default)]
    pub subtitle_url: String,
}

impl SubtitleTrack {
    pub fn is_ai_generated(&self) -> bool {
        self.lang.starts_with("ai-")
    }
}

/// 一条字幕
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleCue {
    pub from: f64,
    pub to: f64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanmakuEntry {
    pub offset: f64,  // 弹幕出现时间(秒)
    pub mode: u8,     // 1-3 滚动 4 底部 5 顶部 6 逆向 7 高级 8 代码
    pub font_size: u32,
    pub color: u32, // 十进制 RGB
    pub sent_at: DateTime<Utc>,
    pub pool: u8,
    pub sender_hash: String,
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentEntry {
    pub author: String,
    pub author_mid: i64,
    pub text: String,
    pub likes: i64,
    pub replies: i64,
    pub published_at: DateTime<Utc>,
}
