//! 置信度计算工具
//! 按探针类型加权累加，封顶 100（饱和累加，重复事件重复计分）

use crate::model::{DetectionEvent, DetectionMethod};

/// 置信度上限
pub const MAX_CONFIDENCE: u8 = 100;
/// 未登记探针类型的默认权重
pub const DEFAULT_WEIGHT: u8 = 10;

/// 置信度计算工具
pub struct ConfidenceScorer;

impl ConfidenceScorer {
    /// 单个探针类型的权重
    pub fn weight(method: &DetectionMethod) -> u8 {
        match method {
            DetectionMethod::ScriptBlocking => 30,
            DetectionMethod::ElementBlocking => 25,
            DetectionMethod::FetchBlocking => 20,
            DetectionMethod::GlobalVariable => 15,
            DetectionMethod::MissingAdsense => 20,
            DetectionMethod::ImageBlocking => 15,
            DetectionMethod::CssBlocking => 10,
            _ => DEFAULT_WEIGHT,
        }
    }

    /// 计算事件序列的总置信度
    pub fn score(events: &[DetectionEvent]) -> u8 {
        Self::score_methods(events.iter().map(|e| &e.method))
    }

    /// 按探针类型序列计算置信度
    pub fn score_methods<'a, I>(methods: I) -> u8
    where
        I: IntoIterator<Item = &'a DetectionMethod>,
    {
        let total: u32 = methods
            .into_iter()
            .map(|m| u32::from(Self::weight(m)))
            .sum();
        total.min(u32::from(MAX_CONFIDENCE)) as u8
    }
}
