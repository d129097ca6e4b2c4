//! Hot comment listing

use log::info;
use reqwest::Method;
use serde::Deserialize;

use crate::{
    api::{client::ApiClient, endpoints},
    error::Result,
    models::{CommentEntry, VideoView},
    utils,
};

#[derive(Debug, Default, Deserialize)]
struct ReplyPage {
    #[serde(default)]
    replies: Option<Vec<Reply>>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    mid: i64,
    #[serde(default)]
    like: i64,
    #[serde(default)]
    rcount: i64,
    #[serde(default)]
    ctime: i64,
    #[serde(default)]
    member: Option<Member>,
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    uname: String,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    message: String,
}

impl Reply {
    fn into_entry(self) -> Option<CommentEntry> {
        let text = self.content.map(|c| c.message).unwrap_or_default();
        if text.is_empty() {
            return None;
        }
        let author = self
            .member
            .map(|m| m.uname)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "Unknown User".to_string());
        Some(CommentEntry {
            author,
            author_mid: self.mid,
            text,
            likes: self.like,
            replies: self.rcount,
            published_at: utils::timestamp_to_utc(self.ctime),
        })
    }
}

/// 获取第一页热门评论（sort=2），按平台给出的热度顺序返回
pub async fn get(api: &ApiClient, view: &VideoView) -> Result<Vec<CommentEntry>> {
    let params = [
        ("type".to_string(), "1".to_string()),
        ("oid".to_string(), view.aid.to_string()),
        ("sort".to_string(), "2".to_string()),
    ];
    let page: ReplyPage = api
        .request(Method::GET, endpoints::REPLY, &params, true)
        .await?;
    let comments: Vec<CommentEntry> = page
        .replies
        .unwrap_or_default()
        .into_iter()
        .filter_map(Reply::into_entry)
        .collect();
    info!("视频 {} 获取到 {} 条热门评论", view.bvid, comments.len());
    Ok(comments)
}
