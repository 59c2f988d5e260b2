//! 检测事件数据模型
//! 仅存储事件数据，无任何业务逻辑，支持序列化/反序列化

use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::now_millis;

/// 事件附加信息（被拦截的URL、类名等）
pub type Details = Map<String, Value>;

/// 将 JSON 对象转换为事件附加信息，非对象值返回空表
pub fn to_details(value: Value) -> Details {
    match value {
        Value::Object(map) => map,
        _ => Details::new(),
    }
}

/// 探针类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DetectionMethod {
    ScriptBlocking,
    ElementBlocking,
    FetchBlocking,
    GlobalVariable,
    MissingAdsense,
    ImageBlocking,
    CssBlocking,
    /// 手动注入的测试事件
    TestDetection,
    /// 外部上报的未知类型
    Other(String),
}

impl DetectionMethod {
    pub fn as_str(&self) -> &str {
        match self {
            DetectionMethod::ScriptBlocking => "script-blocking",
            DetectionMethod::ElementBlocking => "element-blocking",
            DetectionMethod::FetchBlocking => "fetch-blocking",
            DetectionMethod::GlobalVariable => "global-variable",
            DetectionMethod::MissingAdsense => "missing-adsense",
            DetectionMethod::ImageBlocking => "image-blocking",
            DetectionMethod::CssBlocking => "css-blocking",
            DetectionMethod::TestDetection => "test-detection",
            DetectionMethod::Other(name) => name,
        }
    }
}

impl From<&str> for DetectionMethod {
    fn from(value: &str) -> Self {
        match value {
            "script-blocking" => DetectionMethod::ScriptBlocking,
            "element-blocking" => DetectionMethod::ElementBlocking,
            "fetch-blocking" => DetectionMethod::FetchBlocking,
            "global-variable" => DetectionMethod::GlobalVariable,
            "missing-adsense" => DetectionMethod::MissingAdsense,
            "image-blocking" => DetectionMethod::ImageBlocking,
            "css-blocking" => DetectionMethod::CssBlocking,
            "test-detection" => DetectionMethod::TestDetection,
            other => DetectionMethod::Other(other.to_string()),
        }
    }
}

impl From<String> for DetectionMethod {
    fn from(value: String) -> Self {
        DetectionMethod::from(value.as_str())
    }
}

impl From<DetectionMethod> for String {
    fn from(value: DetectionMethod) -> Self {
        match value {
            DetectionMethod::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条检测信号，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionEvent {
    pub method: DetectionMethod,
    #[serde(default)]
    pub details: Details,
    /// 毫秒级 Unix 时间戳
    pub timestamp: u64,
}

impl DetectionEvent {
    pub fn new(method: DetectionMethod, details: Details) -> Self {
        Self {
            method,
            details,
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_method_serializes_as_kebab_string() {
        let value = serde_json::to_value(DetectionMethod::MissingAdsense).unwrap();
        assert_eq!(value, json!("missing-adsense"));

        let parsed: DetectionMethod = serde_json::from_value(json!("css-blocking")).unwrap();
        assert_eq!(parsed, DetectionMethod::CssBlocking);
    }

    #[test]
    fn test_unknown_method_is_preserved() {
        let parsed: DetectionMethod = serde_json::from_value(json!("mutation-observer")).unwrap();
        assert_eq!(parsed, DetectionMethod::Other("mutation-observer".to_string()));
        assert_eq!(parsed.to_string(), "mutation-observer");
    }

    #[test]
    fn test_event_details_default_to_empty() {
        let event: DetectionEvent =
            serde_json::from_value(json!({"method": "fetch-blocking", "timestamp": 1})).unwrap();
        assert!(event.details.is_empty());
        assert_eq!(event.method, DetectionMethod::FetchBlocking);
    }
}
