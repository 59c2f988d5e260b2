//! 检测模块：检测器核心与探针实现
pub mod detector;
pub mod probes;

// 导出核心接口
pub use self::detector::{AdBlockDetector, DetectionCallback};
