//! The client exposed to callers: one instance per credential

use std::collections::BTreeMap;

use log::info;

use crate::{
    api::{client::ApiClient, endpoints},
    comment,
    config::ClientConfig,
    danmaku,
    error::Result,
    models::{CommentEntry, DanmakuEntry, SubtitleCue, SubtitleTrack, VideoId, VideoView},
    resolver::IdentifierResolver,
    search::{self, BuvidCache, SearchPage, SearchQuery},
    subtitle::{self, SubtitleSelection},
    wbi::WbiSigner,
};

/// 所有操作共享同一个只读凭据，可以并发调用
pub struct BiliClient {
    api: ApiClient,
    resolver: IdentifierResolver,
    wbi: WbiSigner,
    buvid: BuvidCache,
}

impl BiliClient {
    /// 凭据为空时立即返回 [`crate::BiliInfoError::MissingCredential`]
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = ApiClient::new(&config)?;
        Ok(Self {
            api,
            resolver: IdentifierResolver::new(config.short_link_hosts),
            wbi: WbiSigner::new(),
            buvid: BuvidCache::new(),
        })
    }

    pub async fn resolve_identifier(&self, url: &str) -> Result<VideoId> {
        self.resolver.resolve(&self.api, url).await
    }

    pub async fn video_view(&self, url: &str) -> Result<VideoView> {
        let bvid = self.resolve_identifier(url).await?;
        endpoints::get_video_view(&self.api, &bvid).await
    }

    pub async fn list_subtitle_tracks(&self, url: &str) -> Result<Vec<SubtitleTrack>> {
        let view = self.video_view(url).await?;
        subtitle::list_tracks(&self.api, &self.wbi, &view).await
    }

    /// `all_languages` 优先于 `lang`；两者都没有时按固定优先级选一条
    pub async fn get_subtitles(
        &self,
        url: &str,
        lang: Option<&str>,
        all_languages: bool,
    ) -> Result<BTreeMap<String, Vec<SubtitleCue>>> {
        let selection = SubtitleSelection::from_options(lang, all_languages)?;
        let view = self.video_view(url).await?;
        info!("获取视频 {} 的字幕", view.bvid);
        subtitle::get(&self.api, &self.wbi, &view, &selection).await
    }

    pub async fn get_danmaku(&self, url: &str) -> Result<Vec<DanmakuEntry>> {
        let view = self.video_view(url).await?;
        danmaku::get(&self.api, &view).await
    }

    pub async fn get_comments(&self, url: &str) -> Result<Vec<CommentEntry>> {
        let view = self.video_view(url).await?;
        comment::get(&self.api, &view).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        search::search(&self.api, &self.wbi, &self.buvid, query).await
    }
}
