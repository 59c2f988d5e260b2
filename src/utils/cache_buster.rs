//! 缓存穿透参数工具
//! 为探针URL追加唯一查询参数，避免命中浏览器/代理缓存

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;
use url::Url;

use crate::error::AdbResult;

/// 缓存穿透参数名
pub const CACHE_BUST_PARAM: &str = "_cb";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// 当前毫秒级 Unix 时间戳
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// 缓存穿透工具
pub struct CacheBuster;

impl CacheBuster {
    /// 追加 `_cb=<时间戳>-<序号>` 查询参数，保留原有参数
    pub fn apply(raw_url: &str) -> AdbResult<String> {
        let mut url = Url::parse(raw_url)?;
        let token = format!("{}-{}", now_millis(), SEQUENCE.fetch_add(1, Ordering::Relaxed));
        url.query_pairs_mut().append_pair(CACHE_BUST_PARAM, &token);
        trace!("缓存穿透URL：{}", url);
        Ok(url.into())
    }
}
