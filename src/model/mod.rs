//! 数据模型：检测事件与检测结果
pub mod event;
pub mod report;

pub use self::event::{to_details, DetectionEvent, DetectionMethod, Details};
pub use self::report::{DetectionNotice, DetectionReport, DetectionSummary};
