use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::Mutex;

use crate::{
    api::{client::ApiClient, endpoints},
    utils,
};

const MIXIN_KEY_ENC_TAB: [usize; 64] = [
    46, 47, 18, 2, 53, 8, 23, 32, 15, 50, 10, 31, 58, 3, 45, 35, 27, 43, 5, 49, 33, 9, 42, 19, 29,
    28, 14, 39, 12, 38, 41, 13, 37, 48, 7, 16, 24, 55, 40, 61, 26, 17, 0, 1, 60, 51, 30, 4, 22, 25,
    54, 21, 56, 59, 6, 63, 57, 62, 11, 36, 20, 34, 44, 52,
];

pub const WBI_KEYS_TTL: Duration = Duration::from_secs(3600);
/// 刷新失败后在这段时间内不再请求 nav
pub const WBI_RETRY_AFTER: Duration = Duration::from_secs(30);

struct CachedKeys {
    img_key: String,
    sub_key: String,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyCache {
    keys: Option<CachedKeys>,
    failed_at: Option<Instant>,
}

impl KeyCache {
    fn current(&self) -> Option<(String, String)> {
        self.keys
            .as_ref()
            .map(|keys| (keys.img_key.clone(), keys.sub_key.clone()))
    }

    fn is_fresh(&self) -> bool {
        self.keys
            .as_ref()
            .is_some_and(|keys| keys.fetched_at.elapsed() < WBI_KEYS_TTL)
    }

    fn recently_failed(&self) -> bool {
        self.failed_at
            .is_some_and(|at| at.elapsed() < WBI_RETRY_AFTER)
    }
}

/// WBI 签名器，缓存 nav 接口下发的密钥
#[derive(Default)]
pub struct WbiSigner {
    cache: Mutex<KeyCache>,
}

impl WbiSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为请求参数签名；拿不到密钥时原样返回，由平台决定是否接受
    pub async fn sign(
        &self,
        api: &ApiClient,
        params: Vec<(String, String)>,
    ) -> Vec<(String, String)> {
        match self.keys(api).await {
            Some(keys) => encode_wbi(params, keys, chrono::Utc::now().timestamp()),
            None => {
                warn!("没有可用的WBI密钥，发送未签名的请求");
                params
            }
        }
    }

    async fn keys(&self, api: &ApiClient) -> Option<(String, String)> {
        {
            let cache = self.cache.lock().await;
            if cache.is_fresh() || cache.recently_failed() {
                return cache.current();
            }
        }

        // 请求 nav 时不持有锁，并发的调用各自等待自己的请求
        let fetched = endpoints::get_wbi_keys(api).await;
        let mut cache = self.cache.lock().await;
        match fetched {
            Ok((img_key, sub_key)) => {
                debug!("已刷新WBI密钥");
                cache.keys = Some(CachedKeys {
                    img_key,
                    sub_key,
                    fetched_at: Instant::now(),
                });
                cache.failed_at = None;
            }
            Err(e) => {
                warn!("获取WBI密钥失败: {}", e);
                cache.failed_at = Some(Instant::now());
            }
        }
        // 过期的密钥也比没有强
        cache.current()
    }
}

// 对 imgKey 和 subKey 进行字符顺序打乱编码
fn get_mixin_key(orig: &[u8]) -> String {
    MIXIN_KEY_ENC_TAB
        .iter()
        .take(32)
        .filter_map(|&i| orig.get(i).map(|&b| b as char))
        .collect::<String>()
}

// 为请求参数进行 wbi 签名，返回值即为实际发送的参数
fn encode_wbi(
    params: Vec<(String, String)>,
    (img_key, sub_key): (String, String),
    timestamp: i64,
) -> Vec<(String, String)> {
    let mixin_key = get_mixin_key((img_key + &sub_key).as_bytes());
    // 过滤 value 中的 "!'()*" 字符，发送的参数与签名保持一致
    let mut params: Vec<(String, String)> = params
        .into_iter()
        .map(|(k, v)| (k, v.chars().filter(|c| !"!'()*".contains(*c)).collect()))
        .collect();
    params.push(("wts".to_string(), timestamp.to_string()));
    params.sort_by(|a, b| a.0.cmp(&b.0));
    // 与 ApiClient 发送时的编码一致
    let query = utils::encode_query(&params);
    let web_sign = format!("{:x}", md5::compute(query + &mixin_key));
    params.push(("w_rid".to_string(), web_sign));
    params
}
