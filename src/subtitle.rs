//! Subtitle track listing and language selection

use std::collections::BTreeMap;

use futures::future;
use log::{debug, info, warn};
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::{
    api::{client::ApiClient, endpoints},
    error::{BiliInfoError, Result},
    models::{SubtitleCue, SubtitleTrack, VideoView},
    utils,
    wbi::WbiSigner,
};

/// 未指定语言时的选择顺序，人工字幕优先于同语言的 AI 字幕
pub const LANGUAGE_PRIORITY: [&str; 6] = ["zh", "ai-zh", "en", "ai-en", "ja", "ai-ja"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubtitleSelection {
    /// 全部语言
    All,
    /// 指定语言
    Language(String),
    /// 按 [`LANGUAGE_PRIORITY`] 取第一个存在的
    Preferred,
}

impl SubtitleSelection {
    /// `all_languages` 时忽略 `lang`；否则空白的 `lang` 视为参数错误
    pub fn from_options(lang: Option<&str>, all_languages: bool) -> Result<Self> {
        match (all_languages, lang.map(str::trim)) {
            (true, _) => Ok(SubtitleSelection::All),
            (false, Some("")) => Err(BiliInfoError::InvalidParameter(
                "字幕语言不能为空".to_string(),
            )),
            (false, Some(lang)) => Ok(SubtitleSelection::Language(lang.to_string())),
            (false, None) => Ok(SubtitleSelection::Preferred),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayerInfo {
    #[serde(default)]
    subtitle: Option<SubtitleInfo>,
}

#[derive(Debug, Deserialize)]
struct SubtitleInfo {
    #[serde(default)]
    subtitles: Vec<SubtitleTrack>,
}

#[derive(Debug, Deserialize)]
struct SubtitleBody {
    #[serde(default)]
    body: Vec<SubtitleCue>,
}

// "zh" 匹配 zh 与 zh-CN、zh-Hans 等，但不匹配 ai-zh
fn lang_matches(code: &str, wanted: &str) -> bool {
    let code = code.to_ascii_lowercase();
    let wanted = wanted.to_ascii_lowercase();
    code == wanted || code.starts_with(&format!("{}-", wanted))
}

pub fn select_tracks<'a>(
    tracks: &'a [SubtitleTrack],
    selection: &SubtitleSelection,
) -> Result<Vec<&'a SubtitleTrack>> {
    match selection {
        SubtitleSelection::All => {
            if tracks.is_empty() {
                return Err(BiliInfoError::NoSubtitleAvailable);
            }
            // 结果按语言代码区分，同一代码只取第一条
            let mut selected: Vec<&SubtitleTrack> = Vec::with_capacity(tracks.len());
            for track in tracks {
                if selected.iter().any(|t| t.lang == track.lang) {
                    warn!("字幕语言 {} 重复出现，只保留第一条", track.lang);
                    continue;
                }
                selected.push(track);
            }
            Ok(selected)
        }
        SubtitleSelection::Language(lang) => tracks
            .iter()
            .find(|t| lang_matches(&t.lang, lang))
            .map(|t| vec![t])
            .ok_or_else(|| BiliInfoError::SubtitleNotFound(lang.clone())),
        SubtitleSelection::Preferred => LANGUAGE_PRIORITY
            .iter()
            .find_map(|wanted| tracks.iter().find(|t| lang_matches(&t.lang, wanted)))
            .map(|t| vec![t])
            .ok_or(BiliInfoError::NoSubtitleAvailable),
    }
}

pub async fn list_tracks(
    api: &ApiClient,
    wbi: &WbiSigner,
    view: &VideoView,
) -> Result<Vec<SubtitleTrack>> {
    let params = vec![
        ("aid".to_string(), view.aid.to_string()),
        ("cid".to_string(), view.cid.to_string()),
    ];
    let params = wbi.sign(api, params).await;
    let info: PlayerInfo = api
        .request(Method::GET, endpoints::PLAYER_V2, &params, true)
        .await?;
    let tracks = info.subtitle.map(|s| s.subtitles).unwrap_or_default();
    debug!(
        "视频 {} 的字幕: {:?}",
        view.bvid,
        tracks.iter().map(|t| t.lang.as_str()).collect::<Vec<_>>()
    );
    Ok(tracks)
}

/// 获取一条字幕的内容。空内容或请求被拒都视为该账号无法获取
pub async fn fetch_track(api: &ApiClient, track: &SubtitleTrack) -> Result<Vec<SubtitleCue>> {
    let unavailable = |reason: String| BiliInfoError::SubtitleContentUnavailable {
        lang: track.lang.clone(),
        reason,
    };

    if track.subtitle_url.trim().is_empty() {
        return Err(unavailable("字幕地址为空".to_string()));
    }
    let url = Url::parse(&utils::absolute_url(&track.subtitle_url))
        .map_err(|e| unavailable(format!("无效的字幕地址: {}", e)))?;

    let bytes = match api.fetch_bytes(url, &[], true).await {
        Ok(bytes) => bytes,
        Err(e @ BiliInfoError::Transport { .. }) => return Err(e),
        Err(e) => return Err(unavailable(e.to_string())),
    };
    let body: SubtitleBody =
        serde_json::from_slice(&bytes).map_err(|e| unavailable(format!("字幕内容无法解析: {}", e)))?;
    if body.body.is_empty() {
        return Err(unavailable("字幕内容为空".to_string()));
    }
    Ok(body.body)
}

pub async fn get(
    api: &ApiClient,
    wbi: &WbiSigner,
    view: &VideoView,
    selection: &SubtitleSelection,
) -> Result<BTreeMap<String, Vec<SubtitleCue>>> {
    let tracks = list_tracks(api, wbi, view).await?;
    let selected = select_tracks(&tracks, selection)?;
    info!(
        "视频 {} 选中字幕: {:?}",
        view.bvid,
        selected.iter().map(|t| t.lang.as_str()).collect::<Vec<_>>()
    );

    let tasks = selected.iter().map(|track| async move {
        let cues = fetch_track(api, track).await.inspect_err(|e| {
            warn!("获取字幕 {} 失败: {}", track.lang, e);
        })?;
        Ok::<_, BiliInfoError>((track.lang.clone(), cues))
    });
    let contents = future::try_join_all(tasks).await?;
    Ok(contents.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracks(codes: &[&str]) -> Vec<SubtitleTrack> {
        codes
            .iter()
            .map(|c| SubtitleTrack {
                lang: c.to_string(),
                label: String::new(),
                subtitle_url: format!("//aisubtitle.hdslb.com/{}.json", c),
            })
            .collect()
    }

    fn picked(tracks: &[SubtitleTrack], selection: &SubtitleSelection) -> Vec<String> {
        select_tracks(tracks, selection)
            .unwrap()
            .into_iter()
            .map(|t| t.lang.clone())
            .collect()
    }

    #[test]
    fn test_priority_prefers_human_track() {
        let t = tracks(&["ai-en", "en"]);
        assert_eq!(picked(&t, &SubtitleSelection::Preferred), vec!["en"]);
    }

    #[test]
    fn test_priority_order_across_languages() {
        let t = tracks(&["ja", "ai-zh", "en"]);
        assert_eq!(picked(&t, &SubtitleSelection::Preferred), vec!["ai-zh"]);
        let t = tracks(&["zh-CN", "ai-zh"]);
        assert_eq!(picked(&t, &SubtitleSelection::Preferred), vec!["zh-CN"]);
    }

    #[test]
    fn test_priority_lowest_fallback() {
        let t = tracks(&["ai-ja"]);
        assert_eq!(picked(&t, &SubtitleSelection::Preferred), vec!["ai-ja"]);
    }

    #[test]
    fn test_priority_ignores_other_languages() {
        let t = tracks(&["fr", "ko"]);
        assert!(matches!(
            select_tracks(&t, &SubtitleSelection::Preferred),
            Err(BiliInfoError::NoSubtitleAvailable)
        ));
        assert!(matches!(
            select_tracks(&[], &SubtitleSelection::Preferred),
            Err(BiliInfoError::NoSubtitleAvailable)
        ));
    }

    #[test]
    fn test_explicit_language() {
        let t = tracks(&["zh-CN", "ai-zh", "en-US"]);
        assert_eq!(
            picked(&t, &SubtitleSelection::Language("ai-zh".to_string())),
            vec!["ai-zh"]
        );
        assert_eq!(
            picked(&t, &SubtitleSelection::Language("en".to_string())),
            vec!["en-US"]
        );
        match select_tracks(&t, &SubtitleSelection::Language("fr".to_string())) {
            Err(BiliInfoError::SubtitleNotFound(lang)) => assert_eq!(lang, "fr"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_all_languages() {
        let t = tracks(&["zh-CN", "ai-zh", "fr"]);
        assert_eq!(
            picked(&t, &SubtitleSelection::All),
            vec!["zh-CN", "ai-zh", "fr"]
        );
        assert!(matches!(
            select_tracks(&[], &SubtitleSelection::All),
            Err(BiliInfoError::NoSubtitleAvailable)
        ));
    }

    #[test]
    fn test_selection_from_options() {
        assert_eq!(
            SubtitleSelection::from_options(Some("en"), true).unwrap(),
            SubtitleSelection::All
        );
        assert_eq!(
            SubtitleSelection::from_options(Some(" en "), false).unwrap(),
            SubtitleSelection::Language("en".to_string())
        );
        assert_eq!(
            SubtitleSelection::from_options(None, false).unwrap(),
            SubtitleSelection::Preferred
        );
        assert_eq!(
            SubtitleSelection::from_options(Some("  "), true).unwrap(),
            SubtitleSelection::All
        );
    }

    #[test]
    fn test_blank_language_is_invalid() {
        for lang in ["", "   "] {
            assert!(matches!(
                SubtitleSelection::from_options(Some(lang), false),
                Err(BiliInfoError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_all_languages_keeps_first_of_duplicate_codes() {
        let mut t = tracks(&["zh-CN", "en", "zh-CN"]);
        t[2].subtitle_url = "//aisubtitle.hdslb.com/other.json".to_string();
        let selected = select_tracks(&t, &SubtitleSelection::All).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].subtitle_url, "//aisubtitle.hdslb.com/zh-CN.json");
        assert_eq!(selected[1].lang, "en");
    }
}
