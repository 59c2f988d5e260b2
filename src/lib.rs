//! adblock-probe - 内容拦截（广告拦截插件、DNS 黑洞、外观过滤）检测引擎
//!
//! 检测器在宿主环境上执行一组相互独立的探针，累计拦截信号，
//! 按探针类型加权计算置信度，并同步通知订阅者。
//!
//! ```no_run
//! use std::sync::Arc;
//! use adblock_probe::{AdBlockDetector, ConfigManager, HttpEnvironment};
//!
//! # async fn demo() -> adblock_probe::AdbResult<()> {
//! let config = ConfigManager::get_default();
//! let env = Arc::new(HttpEnvironment::new(&config)?);
//! let detector = AdBlockDetector::new(env, config);
//! detector.on_detected(|notice| println!("拦截信号：{}", notice.method));
//! let summary = detector.run_all_detections().await;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

// 导出全局错误类型
pub use self::error::{AdBlockError, AdbResult};

// 导出配置模块
pub use self::config::{ConfigManager, CustomConfigBuilder, DetectorConfig};

// 导出数据模型
pub use self::model::{
    DetectionEvent, DetectionMethod, DetectionNotice, DetectionReport, DetectionSummary, Details,
};

// 导出宿主环境
pub use self::environment::{
    BaitElement, ComputedLayout, EnvironmentSnapshot, HttpEnvironment, NodeHandle,
    ProbeEnvironment, SnapshotEnvironment,
};

// 导出工具模块核心接口
pub use self::utils::{CacheBuster, ConfidenceScorer};

// 导出检测模块核心接口
pub use self::detector::{AdBlockDetector, DetectionCallback};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod model;
pub mod environment;
pub mod utils;
pub mod detector;
