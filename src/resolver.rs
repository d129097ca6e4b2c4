//! Resolve arbitrary video links to a BV id

use std::sync::LazyLock;

use log::{debug, info};
use regex::Regex;
use url::Url;

use crate::{
    api::client::ApiClient,
    error::{BiliInfoError, Result},
    models::VideoId,
};

// BV + 10 位字母数字，前后不能紧贴其他字母数字
static BVID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9A-Za-z])(BV[0-9A-Za-z]{10})(?:[^0-9A-Za-z]|$)").unwrap()
});

/// 从任意字符串中直接提取 BV 号，不发请求
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    BVID_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| VideoId::new_unchecked(m.as_str()))
}

pub struct IdentifierResolver {
    short_link_hosts: Vec<String>,
}

impl IdentifierResolver {
    pub fn new(short_link_hosts: Vec<String>) -> Self {
        Self { short_link_hosts }
    }

    /// 输入是否为短链接（如 b23.tv/xxxx），是则返回补全协议后的地址
    pub fn short_link(&self, input: &str) -> Option<Url> {
        let input = input.trim();
        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let url = Url::parse(&candidate).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        let matched = self
            .short_link_hosts
            .iter()
            .any(|h| host == *h || host.ends_with(&format!(".{}", h)));
        matched.then_some(url)
    }

    pub async fn resolve(&self, api: &ApiClient, input: &str) -> Result<VideoId> {
        if let Some(id) = extract_video_id(input) {
            debug!("直接从输入中提取到 {}", id);
            return Ok(id);
        }

        let Some(short) = self.short_link(input) else {
            return Err(BiliInfoError::InvalidInput(format!(
                "无法从输入中提取BV号: {}",
                input
            )));
        };

        info!("解析短链接: {}", short);
        let location = api
            .locate(short.clone())
            .await?
            .ok_or_else(|| BiliInfoError::UnresolvableLink(format!("{} 没有返回跳转地址", short)))?;
        debug!("短链接跳转到: {}", location);

        extract_video_id(location.as_str()).ok_or_else(|| {
            BiliInfoError::UnresolvableLink(format!("{} 跳转到的 {} 中没有BV号", short, location))
        })
    }
}
