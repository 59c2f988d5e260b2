//! 工具模块：置信度计算、缓存穿透
pub mod cache_buster;
pub mod confidence;

pub use self::cache_buster::{CacheBuster, now_millis};
pub use self::confidence::{ConfidenceScorer, DEFAULT_WEIGHT, MAX_CONFIDENCE};
