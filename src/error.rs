use std::fmt;

use thiserror::Error;

/// 传输层失败的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Timeout,
    Connection,
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::Connection => write!(f, "connection"),
            TransportKind::Other => write!(f, "other"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BiliInfoError {
    #[error("缺少登录凭据 SESSDATA")]
    MissingCredential,

    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无效参数: {0}")]
    InvalidParameter(String),

    #[error("无法解析短链接: {0}")]
    UnresolvableLink(String),

    #[error("请求错误({kind}): {message}")]
    Transport { kind: TransportKind, message: String },

    #[error("API错误 code={code}: {message}")]
    Platform { code: i64, message: String },

    #[error("没有语言为 {0} 的字幕")]
    SubtitleNotFound(String),

    #[error("该视频没有可用的字幕")]
    NoSubtitleAvailable,

    #[error("字幕 {lang} 已列出但无法获取内容: {reason}")]
    SubtitleContentUnavailable { lang: String, reason: String },

    #[error("返回数据不符合预期: {0}")]
    UnexpectedResponse(String),

    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    ConfigError(#[from] config::ConfigError),
}

impl BiliInfoError {
    pub(crate) fn unexpected(e: impl fmt::Display) -> Self {
        BiliInfoError::UnexpectedResponse(e.to_string())
    }

    /// 平台拒绝了请求（非零 code 或 HTTP 错误状态）
    pub fn is_platform(&self) -> bool {
        matches!(self, BiliInfoError::Platform { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BiliInfoError::Transport { .. })
    }

    /// 调用方的输入有误，请求根本没有发出
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            BiliInfoError::InvalidInput(_) | BiliInfoError::InvalidParameter(_)
        )
    }
}

impl From<reqwest::Error> for BiliInfoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return BiliInfoError::UnexpectedResponse(e.to_string());
        }
        if let Some(status) = e.status() {
            return BiliInfoError::Platform {
                code: i64::from(status.as_u16()),
                message: status.to_string(),
            };
        }
        let kind = if e.is_timeout() {
            TransportKind::Timeout
        } else if e.is_connect() {
            TransportKind::Connection
        } else {
            TransportKind::Other
        };
        BiliInfoError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BiliInfoError>;
