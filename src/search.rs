//! Typed search (`/x/web-interface/search/type`)

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    api::{client::ApiClient, endpoints},
    error::{BiliInfoError, Result},
    utils::{absolute_url, strip_html_tags, timestamp_to_utc},
    wbi::WbiSigner,
};

pub const MAX_PAGE: u32 = 50;
pub const MAX_DURATION_BUCKET: u8 = 4;
pub const DEFAULT_ORDER: &str = "click";
pub const BUVID_TTL: Duration = Duration::from_secs(86400);
pub const BUVID_RETRY_AFTER: Duration = Duration::from_secs(30);

const DAY_SECS: i64 = 24 * 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Video,
    MediaBangumi,
    MediaFt,
    Live,
    LiveRoom,
    LiveUser,
    Article,
    Topic,
    BiliUser,
    Photo,
}

impl SearchType {
    pub const ALL: [SearchType; 10] = [
        SearchType::Video,
        SearchType::MediaBangumi,
        SearchType::MediaFt,
        SearchType::Live,
        SearchType::LiveRoom,
        SearchType::LiveUser,
        SearchType::Article,
        SearchType::Topic,
        SearchType::BiliUser,
        SearchType::Photo,
    ];

    pub fn as_param(&self) -> &'static str {
        match self {
            SearchType::Video => "video",
            SearchType::MediaBangumi => "media_bangumi",
            SearchType::MediaFt => "media_ft",
            SearchType::Live => "live",
            SearchType::LiveRoom => "live_room",
            SearchType::LiveUser => "live_user",
            SearchType::Article => "article",
            SearchType::Topic => "topic",
            SearchType::BiliUser => "bili_user",
            SearchType::Photo => "photo",
        }
    }

    /// 该类型接受的排序方式，空表示不接受 order 参数
    pub fn orders(&self) -> &'static [&'static str] {
        match self {
            SearchType::Video => &["totalrank", "click", "pubdate", "dm", "stow", "scores"],
            SearchType::Article => &[
                "totalrank",
                "click",
                "pubdate",
                "stow",
                "scores",
                "attention",
            ],
            SearchType::Photo => &["totalrank", "click", "pubdate", "stow", "scores"],
            SearchType::LiveRoom => &["online", "live_time"],
            SearchType::BiliUser => &["0", "fans", "level"],
            _ => &[],
        }
    }

    fn default_order(&self) -> Option<&'static str> {
        let orders = self.orders();
        if orders.contains(&DEFAULT_ORDER) {
            Some(DEFAULT_ORDER)
        } else {
            orders.first().copied()
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

impl FromStr for SearchType {
    type Err = BiliInfoError;

    fn from_str(s: &str) -> Result<Self> {
        SearchType::ALL
            .into_iter()
            .find(|t| t.as_param() == s.trim())
            .ok_or_else(|| {
                BiliInfoError::InvalidParameter(format!(
                    "未知的搜索类型 {}，可选: {}",
                    s,
                    SearchType::ALL.map(|t| t.as_param()).join(", ")
                ))
            })
    }
}

/// 调用方给出的搜索条件，未校验
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub keyword: String,
    pub search_type: Option<String>,
    pub order: Option<String>,
    pub recent_days: Option<u32>,
    pub recent_weeks: Option<u32>,
    pub page: Option<u32>,
    /// 0 全部 1 十分钟以下 2 10-30分钟 3 30-60分钟 4 六十分钟以上
    pub duration: Option<u8>,
    /// 视频分区 id
    pub tids: Option<u32>,
    /// 0 全部 1 UP主 2 普通用户 3 认证用户
    pub user_type: Option<u8>,
    /// 0 由高到低 1 由低到高
    pub order_sort: Option<u8>,
    /// 专栏/相簿分区
    pub category_id: Option<u32>,
    pub pubtime_begin_s: Option<i64>,
    pub pubtime_end_s: Option<i64>,
}

impl SearchQuery {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }
}

fn invalid(msg: impl Into<String>) -> BiliInfoError {
    BiliInfoError::InvalidParameter(msg.into())
}

fn ignored(name: &str, search_type: SearchType) {
    debug!("{} 不适用于 {} 搜索，已忽略", name, search_type);
}

/// 校验并转换为接口参数（未签名）。不适用于所选类型的筛选条件会被忽略
pub fn build_params(query: &SearchQuery, now: i64) -> Result<(SearchType, Vec<(String, String)>)> {
    let keyword = query.keyword.trim();
    if keyword.is_empty() {
        return Err(invalid("keyword 不能为空"));
    }

    let search_type = match query.search_type.as_deref() {
        Some(t) => t.parse::<SearchType>()?,
        None => SearchType::Video,
    };

    let page = query.page.unwrap_or(1);
    if !(1..=MAX_PAGE).contains(&page) {
        return Err(invalid(format!("page 必须在 1-{} 之间: {}", MAX_PAGE, page)));
    }

    let recent_days = query.recent_days.filter(|&d| d > 0);
    let recent_weeks = query.recent_weeks.filter(|&w| w > 0);
    if recent_days.is_some() && recent_weeks.is_some() {
        return Err(invalid("recent_days 与 recent_weeks 只能设置一个"));
    }
    let explicit_range = query.pubtime_begin_s.is_some() || query.pubtime_end_s.is_some();
    if (recent_days.is_some() || recent_weeks.is_some()) && explicit_range {
        return Err(invalid("recent_days/recent_weeks 不能与 pubtime_begin_s/pubtime_end_s 同时使用"));
    }
    if let (Some(begin), Some(end)) = (query.pubtime_begin_s, query.pubtime_end_s) {
        if begin > end {
            return Err(invalid(format!("pubtime_begin_s({}) 晚于 pubtime_end_s({})", begin, end)));
        }
    }

    if let Some(duration) = query.duration {
        if duration > MAX_DURATION_BUCKET {
            return Err(invalid(format!("duration 必须在 0-{} 之间: {}", MAX_DURATION_BUCKET, duration)));
        }
    }
    if let Some(user_type) = query.user_type {
        if user_type > 3 {
            return Err(invalid(format!("user_type 必须在 0-3 之间: {}", user_type)));
        }
    }
    if let Some(order_sort) = query.order_sort {
        if order_sort > 1 {
            return Err(invalid(format!("order_sort 只能是 0 或 1: {}", order_sort)));
        }
    }

    let order = match query.order.as_deref().map(str::trim) {
        Some(order) => {
            if !search_type.orders().contains(&order) {
                return Err(invalid(format!(
                    "{} 搜索不支持排序方式 {}，可选: [{}]",
                    search_type,
                    order,
                    search_type.orders().join(", ")
                )));
            }
            Some(order)
        }
        None => search_type.default_order(),
    };

    let mut params = vec![
        ("keyword".to_string(), keyword.to_string()),
        ("search_type".to_string(), search_type.as_param().to_string()),
        ("page".to_string(), page.to_string()),
    ];
    if let Some(order) = order {
        params.push(("order".to_string(), order.to_string()));
    }

    let is_video = search_type == SearchType::Video;
    let mut push_if = |applies: bool, name: &str, value: Option<String>| {
        if let Some(value) = value {
            if applies {
                params.push((name.to_string(), value));
            } else {
                ignored(name, search_type);
            }
        }
    };

    push_if(is_video, "duration", query.duration.map(|d| d.to_string()));
    push_if(is_video, "tids", query.tids.map(|t| t.to_string()));
    push_if(
        search_type == SearchType::BiliUser,
        "user_type",
        query.user_type.map(|t| t.to_string()),
    );
    push_if(
        search_type == SearchType::BiliUser,
        "order_sort",
        query.order_sort.map(|s| s.to_string()),
    );
    push_if(
        matches!(search_type, SearchType::Article | SearchType::Photo),
        "category_id",
        query.category_id.map(|c| c.to_string()),
    );

    let window = recent_weeks
        .map(|w| i64::from(w) * 7 * DAY_SECS)
        .or(recent_days.map(|d| i64::from(d) * DAY_SECS));
    let (begin, end) = match window {
        Some(secs) => (Some(now - secs), Some(now)),
        None => (query.pubtime_begin_s, query.pubtime_end_s),
    };
    push_if(is_video, "pubtime_begin_s", begin.map(|b| b.to_string()));
    push_if(is_video, "pubtime_end_s", end.map(|e| e.to_string()));

    Ok((search_type, params))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoHit {
    pub title: String,
    pub link: String,
    pub bvid: String,
    pub aid: i64,
    pub author: String,
    pub mid: i64,
    pub play: i64,
    pub danmaku: i64,
    pub favorites: i64,
    pub duration: String,
    pub pubdate: DateTime<Utc>,
    pub description: String,
    pub pic: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaHit {
    pub title: String,
    pub link: String,
    pub media_id: i64,
    pub season_id: i64,
    pub org_title: String,
    pub cover: String,
    pub media_type: i64,
    pub areas: String,
    pub styles: String,
    pub cv: String,
    pub staff: String,
    pub pubtime: DateTime<Utc>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRoomHit {
    pub title: String,
    pub link: String,
    pub roomid: i64,
    pub uname: String,
    pub uid: i64,
    pub online: i64,
    pub cover: String,
    pub user_cover: String,
    pub area_name: String,
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveUserHit {
    pub title: String,
    pub link: String,
    pub uid: i64,
    pub uface: String,
    pub roomid: i64,
    pub is_live: bool,
    pub tags: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleHit {
    pub title: String,
    pub link: String,
    pub id: i64,
    pub mid: i64,
    pub category_name: String,
    pub view: i64,
    pub like: i64,
    pub reply: i64,
    pub pub_time: DateTime<Utc>,
    pub desc: String,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicHit {
    pub title: String,
    pub link: String,
    pub topic_id: i64,
    pub update_count: i64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserHit {
    pub title: String,
    pub link: String,
    pub mid: i64,
    pub usign: String,
    pub fans: i64,
    pub videos: i64,
    pub level: i64,
    pub upic: String,
    pub official_verify: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoHit {
    pub title: String,
    pub link: String,
    pub id: i64,
    pub mid: i64,
    pub uname: String,
    pub count: i64,
    pub like: i64,
    pub view: i64,
}

/// 一条搜索结果，按内容类型区分
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchResult {
    Video(VideoHit),
    Bangumi(MediaHit),
    Film(MediaHit),
    LiveRoom(LiveRoomHit),
    LiveUser(LiveUserHit),
    Article(ArticleHit),
    Topic(TopicHit),
    User(UserHit),
    PhotoAlbum(PhotoHit),
}

impl SearchResult {
    pub fn title(&self) -> &str {
        match self {
            SearchResult::Video(h) => &h.title,
            SearchResult::Bangumi(h) | SearchResult::Film(h) => &h.title,
            SearchResult::LiveRoom(h) => &h.title,
            SearchResult::LiveUser(h) => &h.title,
            SearchResult::Article(h) => &h.title,
            SearchResult::Topic(h) => &h.title,
            SearchResult::User(h) => &h.title,
            SearchResult::PhotoAlbum(h) => &h.title,
        }
    }

    pub fn link(&self) -> &str {
        match self {
            SearchResult::Video(h) => &h.link,
            SearchResult::Bangumi(h) | SearchResult::Film(h) => &h.link,
            SearchResult::LiveRoom(h) => &h.link,
            SearchResult::LiveUser(h) => &h.link,
            SearchResult::Article(h) => &h.link,
            SearchResult::Topic(h) => &h.link,
            SearchResult::User(h) => &h.link,
            SearchResult::PhotoAlbum(h) => &h.link,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            SearchResult::Video(_) => "video",
            SearchResult::Bangumi(_) => "bangumi",
            SearchResult::Film(_) => "film",
            SearchResult::LiveRoom(_) => "live_room",
            SearchResult::LiveUser(_) => "live_user",
            SearchResult::Article(_) => "article",
            SearchResult::Topic(_) => "topic",
            SearchResult::User(_) => "user",
            SearchResult::PhotoAlbum(_) => "photo_album",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPage {
    pub search_type: SearchType,
    pub page: u32,
    pub page_size: u32,
    pub num_results: u64,
    pub num_pages: u32,
    pub results: Vec<SearchResult>,
}

// 接口字段类型并不稳定，数字有时以字符串返回
fn text(item: &Value, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(","),
        _ => String::new(),
    }
}

fn num(item: &Value, key: &str) -> i64 {
    match item.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}

fn title(item: &Value, key: &str) -> String {
    strip_html_tags(&text(item, key))
}

fn time(item: &Value, key: &str) -> DateTime<Utc> {
    timestamp_to_utc(num(item, key))
}

fn parse_video(item: &Value) -> SearchResult {
    let bvid = text(item, "bvid");
    SearchResult::Video(VideoHit {
        title: title(item, "title"),
        link: format!("https://www.bilibili.com/video/{}", bvid),
        aid: num(item, "aid"),
        bvid,
        author: text(item, "author"),
        mid: num(item, "mid"),
        play: num(item, "play"),
        danmaku: num(item, "video_review"),
        favorites: num(item, "favorites"),
        duration: text(item, "duration"),
        pubdate: time(item, "pubdate"),
        description: text(item, "description"),
        pic: absolute_url(&text(item, "pic")),
        tag: text(item, "tag"),
    })
}

fn parse_media(item: &Value) -> MediaHit {
    let media_id = num(item, "media_id");
    MediaHit {
        title: title(item, "title"),
        link: format!("https://www.bilibili.com/bangumi/media/md{}", media_id),
        media_id,
        season_id: num(item, "season_id"),
        org_title: title(item, "org_title"),
        cover: absolute_url(&text(item, "cover")),
        media_type: num(item, "media_type"),
        areas: text(item, "areas"),
        styles: text(item, "styles"),
        cv: text(item, "cv"),
        staff: text(item, "staff"),
        pubtime: time(item, "pubtime"),
        score: item
            .get("media_score")
            .and_then(|s| s.get("score"))
            .and_then(Value::as_f64),
    }
}

fn parse_live_room(item: &Value) -> SearchResult {
    let roomid = num(item, "roomid");
    SearchResult::LiveRoom(LiveRoomHit {
        title: title(item, "title"),
        link: format!("https://live.bilibili.com/{}", roomid),
        roomid,
        uname: text(item, "uname"),
        uid: num(item, "uid"),
        online: num(item, "online"),
        cover: absolute_url(&text(item, "cover")),
        user_cover: absolute_url(&text(item, "user_cover")),
        area_name: text(item, "cate_name"),
        tags: text(item, "tags"),
    })
}

fn parse_live_user(item: &Value) -> SearchResult {
    let roomid = num(item, "roomid");
    SearchResult::LiveUser(LiveUserHit {
        title: title(item, "uname"),
        link: format!("https://live.bilibili.com/{}", roomid),
        uid: num(item, "uid"),
        uface: absolute_url(&text(item, "uface")),
        roomid,
        is_live: num(item, "live_status") == 1,
        tags: text(item, "tags"),
    })
}

fn parse_article(item: &Value) -> SearchResult {
    let id = num(item, "id");
    SearchResult::Article(ArticleHit {
        title: title(item, "title"),
        link: format!("https://www.bilibili.com/read/cv{}", id),
        id,
        mid: num(item, "mid"),
        category_name: text(item, "category_name"),
        view: num(item, "view"),
        like: num(item, "like"),
        reply: num(item, "reply"),
        pub_time: time(item, "pub_time"),
        desc: text(item, "desc"),
        image_urls: item
            .get("image_urls")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(Value::as_str)
                    .map(absolute_url)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

fn first_non_empty(a: String, b: String) -> String {
    if a.is_empty() {
        b
    } else {
        a
    }
}

fn parse_topic(item: &Value) -> SearchResult {
    let topic_id = match num(item, "tp_id") {
        0 => num(item, "topic_id"),
        id => id,
    };
    let arcurl = text(item, "arcurl");
    SearchResult::Topic(TopicHit {
        title: first_non_empty(title(item, "title"), title(item, "topic_name")),
        link: if arcurl.is_empty() {
            format!("https://www.bilibili.com/v/topic/detail/?topic_id={}", topic_id)
        } else {
            absolute_url(&arcurl)
        },
        topic_id,
        update_count: num(item, "update"),
        description: text(item, "description"),
    })
}

fn parse_user(item: &Value) -> SearchResult {
    let mid = num(item, "mid");
    SearchResult::User(UserHit {
        title: title(item, "uname"),
        link: format!("https://space.bilibili.com/{}", mid),
        mid,
        usign: text(item, "usign"),
        fans: num(item, "fans"),
        videos: num(item, "videos"),
        level: num(item, "level"),
        upic: absolute_url(&text(item, "upic")),
        official_verify: item
            .get("official_verify")
            .map(|v| text(v, "desc"))
            .unwrap_or_default(),
    })
}

fn parse_photo(item: &Value) -> SearchResult {
    let id = num(item, "id");
    SearchResult::PhotoAlbum(PhotoHit {
        title: title(item, "title"),
        link: format!("https://h.bilibili.com/{}", id),
        id,
        mid: num(item, "mid"),
        uname: text(item, "uname"),
        count: num(item, "count"),
        like: num(item, "like"),
        view: num(item, "view"),
    })
}

fn parse_items(search_type: SearchType, items: &[Value]) -> Vec<SearchResult> {
    items
        .iter()
        .map(|item| match search_type {
            SearchType::Video => parse_video(item),
            SearchType::MediaBangumi => SearchResult::Bangumi(parse_media(item)),
            SearchType::MediaFt => SearchResult::Film(parse_media(item)),
            SearchType::LiveRoom => parse_live_room(item),
            SearchType::LiveUser => parse_live_user(item),
            SearchType::Article => parse_article(item),
            SearchType::Topic => parse_topic(item),
            SearchType::BiliUser => parse_user(item),
            SearchType::Photo => parse_photo(item),
            // live 的结果是一个对象，不会走到这里
            SearchType::Live => parse_live_room(item),
        })
        .collect()
}

fn live_group<'a>(groups: &'a serde_json::Map<String, Value>, key: &str) -> &'a [Value] {
    groups
        .get(key)
        .and_then(Value::as_array)
        .map(|v| v.as_slice())
        .unwrap_or_default()
}

/// 解析 search/type 的 data 字段
pub fn parse_page(search_type: SearchType, data: &Value) -> Result<SearchPage> {
    let results = match (search_type, data.get("result")) {
        (_, None) | (_, Some(Value::Null)) => Vec::new(),
        (SearchType::Live, Some(Value::Object(groups))) => {
            let mut results = parse_items(SearchType::LiveRoom, live_group(groups, "live_room"));
            results.extend(parse_items(SearchType::LiveUser, live_group(groups, "live_user")));
            results
        }
        (_, Some(Value::Array(items))) => parse_items(search_type, items),
        (_, Some(other)) => {
            return Err(BiliInfoError::UnexpectedResponse(format!(
                "{} 搜索的 result 格式不符合预期: {}",
                search_type, other
            )));
        }
    };

    Ok(SearchPage {
        search_type,
        page: num(data, "page").max(1) as u32,
        page_size: match num(data, "pagesize") {
            0 => 20,
            n => n as u32,
        },
        num_results: num(data, "numResults").max(0) as u64,
        num_pages: num(data, "numPages").max(0) as u32,
        results,
    })
}

#[derive(Default)]
struct CookieCache {
    cookies: Vec<(String, String)>,
    fetched_at: Option<Instant>,
    failed_at: Option<Instant>,
}

/// 搜索接口需要的 buvid3/b_nut，从首页的 Set-Cookie 获取
#[derive(Default)]
pub struct BuvidCache {
    cache: Mutex<CookieCache>,
}

impl BuvidCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取失败时返回旧值或空列表，搜索照常进行
    pub async fn cookies(&self, api: &ApiClient) -> Vec<(String, String)> {
        {
            let cache = self.cache.lock().await;
            let fresh = cache.fetched_at.is_some_and(|at| at.elapsed() < BUVID_TTL);
            let backing_off = cache
                .failed_at
                .is_some_and(|at| at.elapsed() < BUVID_RETRY_AFTER);
            if fresh || backing_off {
                return cache.cookies.clone();
            }
        }

        // 首页请求不持有锁
        let fetched = api.homepage_cookies(&["buvid3", "b_nut"]).await;
        let mut cache = self.cache.lock().await;
        match fetched {
            Ok(cookies) if cookies.iter().any(|(name, _)| name == "buvid3") => {
                debug!("已获取 buvid3");
                cache.cookies = cookies;
                cache.fetched_at = Some(Instant::now());
                cache.failed_at = None;
            }
            Ok(_) => {
                warn!("首页没有下发 buvid3");
                cache.failed_at = Some(Instant::now());
            }
            Err(e) => {
                warn!("获取 buvid3 失败: {}", e);
                cache.failed_at = Some(Instant::now());
            }
        }
        cache.cookies.clone()
    }
}

pub async fn search(
    api: &ApiClient,
    wbi: &WbiSigner,
    buvid: &BuvidCache,
    query: &SearchQuery,
) -> Result<SearchPage> {
    let (search_type, params) = build_params(query, Utc::now().timestamp())?;
    info!("搜索 {:?} 类型={} 参数={:?}", query.keyword, search_type, params);

    let cookies = buvid.cookies(api).await;
    let params = wbi.sign(api, params).await;
    let data: Value = api
        .request_with_cookies(Method::GET, endpoints::SEARCH_TYPE, &params, true, &cookies)
        .await?;
    let page = parse_page(search_type, &data)?;
    info!(
        "搜索完成: 第 {}/{} 页，共 {} 条",
        page.page, page.num_pages, page.num_results
    );
    Ok(page)
}
