use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File, FileFormat, Map};
use serde::Deserialize;

use crate::error::{BiliInfoError, Result};
use crate::search::SearchQuery;

pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com";
pub const DEFAULT_HOMEPAGE: &str = "https://www.bilibili.com";
pub const DEFAULT_SHORT_LINK_HOSTS: [&str; 2] = ["b23.tv", "bili2233.cn"];
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const MAX_TIMEOUT_SECS: u64 = 120;

/// 构造 [`crate::BiliClient`] 所需的全部配置
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: String,
    pub timeout: Duration,
    pub api_base: String,
    pub homepage: String,
    pub short_link_hosts: Vec<String>,
}

impl ClientConfig {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
            timeout: DEFAULT_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            homepage: DEFAULT_HOMEPAGE.to_string(),
            short_link_hosts: DEFAULT_SHORT_LINK_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_homepage(mut self, homepage: impl Into<String>) -> Self {
        self.homepage = homepage.into();
        self
    }

    pub fn with_short_link_hosts(mut self, hosts: Vec<String>) -> Self {
        self.short_link_hosts = hosts;
        self
    }

    /// 取出 SESSDATA 的值，兼容 "SESSDATA=xxx" 的写法
    pub fn sessdata(&self) -> Result<&str> {
        let value = self.credential.trim();
        let value = value.strip_prefix("SESSDATA=").unwrap_or(value).trim();
        if value.is_empty() {
            return Err(BiliInfoError::MissingCredential);
        }
        Ok(value)
    }
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// 登录凭据 SESSDATA（也可用环境变量 SESSDATA / BILI_INFO_SESSDATA）
    #[arg(long, global = true)]
    pub sessdata: Option<String>,

    /// 配置文件路径 (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 单次请求超时(秒)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// 增加日志详细程度 (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// 安静模式，只显示错误
    #[arg(short = 's', long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 从链接中解析 BV 号
    Resolve { url: String },
    /// 获取视频字幕
    Subtitles {
        url: String,
        /// 指定语言，如 zh、ai-zh、en
        #[arg(long, conflicts_with = "all")]
        lang: Option<String>,
        /// 获取全部语言
        #[arg(long)]
        all: bool,
    },
    /// 获取视频弹幕
    Danmaku { url: String },
    /// 获取视频热门评论
    Comments { url: String },
    /// 分类搜索
    Search(SearchArgs),
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub keyword: String,

    /// video, media_bangumi, media_ft, live, live_room, live_user, article, topic, bili_user, photo
    #[arg(long = "type", default_value = "video")]
    pub search_type: String,

    #[arg(long)]
    pub order: Option<String>,

    #[arg(long)]
    pub recent_days: Option<u32>,

    #[arg(long)]
    pub recent_weeks: Option<u32>,

    #[arg(long)]
    pub page: Option<u32>,

    /// 0 全部 1 十分钟以下 2 10-30分钟 3 30-60分钟 4 六十分钟以上
    #[arg(long)]
    pub duration: Option<u8>,

    /// 视频分区 id
    #[arg(long)]
    pub tids: Option<u32>,

    #[arg(long)]
    pub user_type: Option<u8>,

    #[arg(long)]
    pub order_sort: Option<u8>,

    #[arg(long)]
    pub category_id: Option<u32>,

    #[arg(long)]
    pub pubtime_begin: Option<i64>,

    #[arg(long)]
    pub pubtime_end: Option<i64>,
}

impl From<SearchArgs> for SearchQuery {
    fn from(args: SearchArgs) -> Self {
        SearchQuery {
            keyword: args.keyword,
            search_type: Some(args.search_type),
            order: args.order,
            recent_days: args.recent_days,
            recent_weeks: args.recent_weeks,
            page: args.page,
            duration: args.duration,
            tids: args.tids,
            user_type: args.user_type,
            order_sort: args.order_sort,
            category_id: args.category_id,
            pubtime_begin_s: args.pubtime_begin,
            pubtime_end_s: args.pubtime_end,
        }
    }
}

// 配置文件与 BILI_INFO_* 环境变量共用的字段
#[derive(Debug, Default, Deserialize)]
struct Settings {
    sessdata: Option<String>,
    timeout_secs: Option<u64>,
    api_base: Option<String>,
}

#[derive(Debug)]
pub struct AppConfig {
    pub config_file: PathBuf,
    pub client: ClientConfig,
}

impl AppConfig {
    /// 优先级：命令行 > BILI_INFO_* 环境变量 > SESSDATA 环境变量 > 配置文件
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with(cli, std::env::var("SESSDATA").ok())
    }

    fn load_with(cli: &Cli, bare_sessdata: Option<String>) -> Result<Self> {
        let config_file = cli.config.clone().unwrap_or_else(default_config_file);

        // 不带前缀的 SESSDATA 只收这一个变量，其余环境变量不参与
        let mut bare = Map::new();
        if let Some(value) = bare_sessdata {
            bare.insert("SESSDATA".to_string(), value);
        }

        let settings: Settings = Config::builder()
            .add_source(
                File::from(config_file.clone())
                    .format(FileFormat::Toml)
                    .required(cli.config.is_some()),
            )
            .add_source(Environment::default().source(Some(bare)))
            .add_source(Environment::with_prefix("BILI_INFO"))
            .set_override_option("sessdata", cli.sessdata.clone())?
            .set_override_option("timeout_secs", cli.timeout)?
            .build()?
            .try_deserialize()?;

        let credential = settings
            .sessdata
            .ok_or(BiliInfoError::MissingCredential)?;

        let mut client = ClientConfig::new(credential);
        client.sessdata()?;

        if let Some(secs) = settings.timeout_secs {
            if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
                return Err(BiliInfoError::InvalidParameter(format!(
                    "timeout 必须在 1-{} 秒之间: {}",
                    MAX_TIMEOUT_SECS, secs
                )));
            }
            client = client.with_timeout(Duration::from_secs(secs));
        }
        if let Some(api_base) = settings.api_base {
            client = client.with_api_base(api_base);
        }

        Ok(Self {
            config_file,
            client,
        })
    }
}

fn default_config_file() -> PathBuf {
    let mut path = dirs::config_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_default();
    path.push("bili-info");
    path.push("config.toml");
    path
}
