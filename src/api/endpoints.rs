//! API endpoint definitions

use log::debug;
use reqwest::Method;
use serde::Deserialize;

use crate::{
    api::client::ApiClient,
    error::{BiliInfoError, Result},
    models::{VideoId, VideoView},
};

pub const VIEW: &str = "/x/web-interface/view";
pub const NAV: &str = "/x/web-interface/nav";
pub const PLAYER_V2: &str = "/x/player/wbi/v2";
pub const DANMAKU_LIST: &str = "/x/v1/dm/list.so";
pub const REPLY: &str = "/x/v2/reply";
pub const SEARCH_TYPE: &str = "/x/web-interface/search/type";

#[derive(Debug, Deserialize)]
struct WbiImg {
    img_url: String,
    sub_url: String,
}

#[derive(Debug, Deserialize)]
struct NavData {
    wbi_img: WbiImg,
}

/// 获取 aid、cid 等内部数字 id
pub async fn get_video_view(api: &ApiClient, bvid: &VideoId) -> Result<VideoView> {
    let params = [("bvid".to_string(), bvid.to_string())];
    let view: VideoView = api.request(Method::GET, VIEW, &params, true).await?;
    debug!("视频 {} aid={} cid={}", view.bvid, view.aid, view.cid);
    Ok(view)
}

/// 从 nav 接口取 WBI 的 img_key 与 sub_key。未登录时 code=-101，但 wbi_img 仍然存在
pub async fn get_wbi_keys(api: &ApiClient) -> Result<(String, String)> {
    let envelope = api.request_envelope(Method::GET, NAV, &[], true, &[]).await?;
    let data = envelope.data.ok_or_else(|| BiliInfoError::Platform {
        code: envelope.code,
        message: envelope.message.clone(),
    })?;
    let NavData { wbi_img } = serde_json::from_value(data).map_err(BiliInfoError::unexpected)?;
    match (take_filename(&wbi_img.img_url), take_filename(&wbi_img.sub_url)) {
        (Some(img_key), Some(sub_key)) => Ok((img_key, sub_key)),
        _ => Err(BiliInfoError::UnexpectedResponse(format!(
            "无法从 {} / {} 提取WBI密钥",
            wbi_img.img_url, wbi_img.sub_url
        ))),
    }
}

fn take_filename(url: &str) -> Option<String> {
    url.rsplit_once('/')
        .and_then(|(_, s)| s.rsplit_once('.'))
        .map(|(s, _)| s.to_string())
        .filter(|s| !s.is_empty())
}
