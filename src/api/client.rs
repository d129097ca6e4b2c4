//! API client for making requests to Bilibili API

use log::{debug, trace};
use reqwest::{Client, Method, RequestBuilder, Response, redirect::Policy};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    config::ClientConfig,
    error::{BiliInfoError, Result},
    models::ApiResponse,
    utils,
};

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const REFERER: &str = "https://www.bilibili.com/";

/// 已鉴权的请求网关。除了只读的 SESSDATA 之外不持有任何状态。
pub struct ApiClient {
    client: Client,
    // 解析短链接时只取 Location，不跟随跳转
    no_redirect: Client,
    sessdata: String,
    api_base: Url,
    homepage: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let sessdata = config.sessdata()?.to_string();
        let api_base = parse_base(&config.api_base)?;
        let homepage = parse_base(&config.homepage)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(BiliInfoError::from)?;
        let no_redirect = Client::builder()
            .timeout(config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(BiliInfoError::from)?;

        Ok(Self {
            client,
            no_redirect,
            sessdata,
            api_base,
            homepage,
        })
    }

    /// 拼出 API 域名下的完整地址
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_base
            .join(path)
            .map_err(|e| BiliInfoError::InvalidParameter(format!("无效的接口路径 {}: {}", path, e)))
    }

    /// 带上浏览器 UA、Referer 以及（可选的）Cookie
    pub fn get(&self, url: Url, auth: bool, extra_cookies: &[(String, String)]) -> RequestBuilder {
        self.build(&self.client, Method::GET, url, auth, extra_cookies)
    }

    fn build(
        &self,
        client: &Client,
        method: Method,
        url: Url,
        auth: bool,
        extra_cookies: &[(String, String)],
    ) -> RequestBuilder {
        let mut req = client
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Referer", REFERER);
        let mut cookies = Vec::new();
        if auth {
            cookies.push(format!("SESSDATA={}", self.sessdata));
        }
        cookies.extend(extra_cookies.iter().map(|(k, v)| format!("{}={}", k, v)));
        if !cookies.is_empty() {
            req = req.header("Cookie", cookies.join("; "));
        }
        req
    }

    /// 发出请求并取出 data 字段；code 非零时返回 [`BiliInfoError::Platform`]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        auth: bool,
    ) -> Result<T> {
        self.request_with_cookies(method, path, params, auth, &[])
            .await
    }

    pub async fn request_with_cookies<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        auth: bool,
        extra_cookies: &[(String, String)],
    ) -> Result<T> {
        let envelope = self
            .request_envelope(method, path, params, auth, extra_cookies)
            .await?;
        unwrap_envelope(envelope)
    }

    /// 原样返回外层结构，不检查 code（nav 接口未登录时 code=-101 但仍有数据）
    pub async fn request_envelope(
        &self,
        method: Method,
        path: &str,
        params: &[(String, String)],
        auth: bool,
        extra_cookies: &[(String, String)],
    ) -> Result<ApiResponse<serde_json::Value>> {
        let url = with_query(self.endpoint(path)?, params);
        debug!("{} {} auth={}", method, url, auth);
        let resp = self
            .build(&self.client, method, url, auth, extra_cookies)
            .send()
            .await?;
        let body = checked_body(resp).await?;
        parse_envelope(&body)
    }

    /// 获取不带外层结构的原始内容（弹幕 XML、字幕 JSON 等）
    pub async fn fetch_bytes(
        &self,
        url: Url,
        params: &[(String, String)],
        auth: bool,
    ) -> Result<Vec<u8>> {
        let url = with_query(url, params);
        debug!("GET {} auth={}", url, auth);
        let resp = self.get(url, auth, &[]).send().await?;
        checked_body(resp).await
    }

    /// 发出一次不跟随跳转的 GET，返回 Location 指向的地址
    pub async fn locate(&self, url: Url) -> Result<Option<Url>> {
        debug!("解析跳转: {}", url);
        let resp = self
            .build(&self.no_redirect, Method::GET, url.clone(), false, &[])
            .send()
            .await?;
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        trace!("{} -> status={} location={:?}", url, resp.status(), location);
        Ok(location.and_then(|loc| url.join(&loc).ok()))
    }

    /// 访问首页并收集 Set-Cookie 中的指定条目
    pub async fn homepage_cookies(&self, names: &[&str]) -> Result<Vec<(String, String)>> {
        let resp = self.get(self.homepage.clone(), false, &[]).send().await?;
        let cookies = resp
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(parse_set_cookie)
            .filter(|(name, _)| names.contains(&name.as_str()))
            .collect();
        Ok(cookies)
    }
}

// 自行编码查询串，WBI 签名针对的就是这里发出的字节
fn with_query(mut url: Url, params: &[(String, String)]) -> Url {
    if params.is_empty() {
        return url;
    }
    let encoded = utils::encode_query(params);
    let query = match url.query() {
        Some(existing) if !existing.is_empty() => format!("{}&{}", existing, encoded),
        _ => encoded,
    };
    url.set_query(Some(&query));
    url
}

fn parse_base(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| BiliInfoError::InvalidParameter(format!("无效的地址 {}: {}", raw, e)))
}

// HTTP 层面的拒绝（412 风控等）同样算作平台错误
async fn checked_body(resp: Response) -> Result<Vec<u8>> {
    let status = resp.status();
    if !status.is_success() {
        return Err(BiliInfoError::Platform {
            code: i64::from(status.as_u16()),
            message: format!("HTTP状态码: {}", status),
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

pub(crate) fn parse_envelope(body: &[u8]) -> Result<ApiResponse<serde_json::Value>> {
    serde_json::from_slice(body).map_err(BiliInfoError::unexpected)
}

pub(crate) fn unwrap_envelope<T: DeserializeOwned>(
    envelope: ApiResponse<serde_json::Value>,
) -> Result<T> {
    if envelope.code != 0 {
        return Err(BiliInfoError::Platform {
            code: envelope.code,
            message: envelope.message,
        });
    }
    let data = envelope
        .data
        .ok_or_else(|| BiliInfoError::UnexpectedResponse("API返回数据为空".to_string()))?;
    serde_json::from_value(data).map_err(BiliInfoError::unexpected)
}

fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
