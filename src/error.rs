//! 全局错误类型定义

use thiserror::Error;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum AdBlockError {
    // 探针相关错误
    #[error("当前环境不支持：{0}")]
    Unsupported(&'static str),
    #[error("资源被拦截：{0}")]
    ResourceBlocked(String),
    #[error("请求超时：{0}")]
    Timeout(String),

    // 网络相关错误
    #[error("网络请求失败：{0}")]
    HttpError(#[from] reqwest::Error),

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("IO操作失败：{0}")]
    IoError(#[from] IoError),
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

impl AdBlockError {
    /// 是否为环境能力缺失（探针应静默跳过，而非视为拦截信号）
    pub fn is_unsupported(&self) -> bool {
        matches!(self, AdBlockError::Unsupported(_))
    }

    /// 是否为超时（结论不确定，探针按未拦截处理）
    pub fn is_timeout(&self) -> bool {
        match self {
            AdBlockError::Timeout(_) => true,
            AdBlockError::HttpError(e) => e.is_timeout(),
            _ => false,
        }
    }
}

// 全局Result类型
pub type AdbResult<T> = Result<T, AdBlockError>;
