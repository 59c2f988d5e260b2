//! 探针宿主环境抽象
//! 探针只依赖以下能力：注入/读取文档节点、读取全局变量、发起网络请求

pub mod http;
pub mod snapshot;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AdbResult;

pub use self::http::HttpEnvironment;
pub use self::snapshot::{EnvironmentSnapshot, SnapshotEnvironment};

/// 已挂载节点句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub u64);

/// 诱饵元素（离屏放置，携带广告类名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaitElement {
    pub class_name: String,
    pub inner_html: String,
    /// 内联样式，默认离屏 1x1
    pub style: String,
}

impl BaitElement {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            inner_html: "&nbsp;".to_string(),
            style: "position:absolute;left:-10000px;top:-1000px;width:1px;height:1px;".to_string(),
        }
    }

    /// 类名列表（按空白分隔）
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.class_name.split_whitespace()
    }
}

/// 节点计算后的布局/样式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedLayout {
    pub width: f64,
    pub height: f64,
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
}

impl ComputedLayout {
    /// 正常渲染的 1x1 节点
    pub fn visible(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }

    /// 被 `display:none` 隐藏的节点
    pub fn hidden() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            display: "none".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }

    /// 隐藏原因；未隐藏返回 None
    pub fn hidden_reason(&self) -> Option<&'static str> {
        if self.display == "none" {
            Some("display-none")
        } else if self.visibility == "hidden" {
            Some("visibility-hidden")
        } else if self.opacity == 0.0 {
            Some("opacity-zero")
        } else if self.width == 0.0 || self.height == 0.0 {
            Some("zero-size")
        } else {
            None
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_reason().is_some()
    }
}

/// 宿主环境
///
/// 网络类方法返回 `Ok(())` 表示资源正常加载，返回错误表示加载失败（拦截信号）。
/// 环境不具备某项能力时返回 [`AdBlockError::Unsupported`](crate::AdBlockError::Unsupported)，
/// 对应探针将静默跳过。
#[async_trait]
pub trait ProbeEnvironment: Send + Sync {
    /// 注入脚本并等待 load / error
    async fn load_script(&self, url: &str) -> AdbResult<()>;

    /// 以图片方式加载URL
    async fn load_image(&self, url: &str) -> AdbResult<()>;

    /// no-cors HEAD 请求；仅网络层失败视为错误
    async fn fetch_head(&self, url: &str) -> AdbResult<()>;

    /// 挂载诱饵元素
    fn attach_bait(&self, bait: &BaitElement) -> AdbResult<NodeHandle>;

    /// 注入样式规则
    fn attach_style(&self, css: &str) -> AdbResult<NodeHandle>;

    /// 读取节点的计算布局
    fn computed_layout(&self, node: NodeHandle) -> AdbResult<ComputedLayout>;

    /// 移除节点（不存在时忽略）
    fn detach(&self, node: NodeHandle);

    /// 全局变量是否存在
    fn global_exists(&self, name: &str) -> AdbResult<bool>;

    fn user_agent(&self) -> String;

    fn current_url(&self) -> String;
}
