//! 检测结果数据模型（通知载荷、汇总、诊断报告）

use std::fmt;
use serde::{Deserialize, Serialize};

use super::event::{DetectionEvent, DetectionMethod, Details};

/// 订阅回调收到的通知
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionNotice {
    pub method: DetectionMethod,
    pub details: Details,
    /// 截至本事件的全部累计事件（含本事件）
    pub all_events: Vec<DetectionEvent>,
}

/// 单次全量检测的汇总结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub is_detected: bool,
    pub methods: Vec<DetectionMethod>,
    pub confidence: u8,
}

// ======== 为 DetectionSummary 实现 Display trait（用于 CLI 输出） ========
impl fmt::Display for DetectionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_detected {
            return write!(f, "未检测到内容拦截 (confidence 0)");
        }
        let methods: Vec<&str> = self.methods.iter().map(DetectionMethod::as_str).collect();
        write!(
            f,
            "检测到内容拦截 (confidence {}): {}",
            self.confidence,
            methods.join(", ")
        )
    }
}

/// 诊断报告：当前状态快照 + 环境元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    pub is_detected: bool,
    pub methods: Vec<DetectionMethod>,
    pub events: Vec<DetectionEvent>,
    pub confidence: u8,
    pub timestamp: u64,
    pub user_agent: String,
    pub url: String,
}
