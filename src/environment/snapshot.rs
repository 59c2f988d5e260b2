//! 快照宿主环境
//! 由 JSON 快照描述的确定性环境：哪些域名被拦截、哪些类名被隐藏、存在哪些全局变量。
//! 适用于离线复现检测结果（例如由无头浏览器导出的观测数据）。

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};
use url::Url;

use super::{BaitElement, ComputedLayout, NodeHandle, ProbeEnvironment};
use crate::error::{AdBlockError, AdbResult};

/// 环境快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSnapshot {
    /// 请求失败的域名（含子域名）
    pub blocked_hosts: Vec<String>,
    /// 响应缓慢的域名
    pub slow_hosts: Vec<String>,
    pub slow_latency_ms: u64,
    /// 被外观过滤规则隐藏的类名
    pub hidden_classes: Vec<String>,
    /// 页面上存在的全局变量
    pub globals: Vec<String>,
    pub user_agent: String,
    pub url: String,
    /// 是否具备文档能力（节点注入、计算样式、全局变量）
    pub supports_dom: bool,
}

impl Default for EnvironmentSnapshot {
    fn default() -> Self {
        Self {
            blocked_hosts: Vec::new(),
            slow_hosts: Vec::new(),
            slow_latency_ms: 10_000,
            hidden_classes: Vec::new(),
            globals: Vec::new(),
            user_agent: "snapshot".to_string(),
            url: "about:blank".to_string(),
            supports_dom: true,
        }
    }
}

impl EnvironmentSnapshot {
    pub fn blocked_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.push(host.into());
        self
    }

    pub fn slow_host(mut self, host: impl Into<String>) -> Self {
        self.slow_hosts.push(host.into());
        self
    }

    pub fn hidden_class(mut self, class_name: impl Into<String>) -> Self {
        self.hidden_classes.push(class_name.into());
        self
    }

    pub fn global(mut self, name: impl Into<String>) -> Self {
        self.globals.push(name.into());
        self
    }

    pub fn without_dom(mut self) -> Self {
        self.supports_dom = false;
        self
    }
}

#[derive(Debug, Clone)]
enum SnapshotNode {
    Bait(Vec<String>),
    Style,
}

/// 快照环境
#[derive(Debug)]
pub struct SnapshotEnvironment {
    snapshot: EnvironmentSnapshot,
    nodes: Mutex<HashMap<u64, SnapshotNode>>,
    next_id: AtomicU64,
}

impl SnapshotEnvironment {
    pub fn new(snapshot: EnvironmentSnapshot) -> Self {
        Self {
            snapshot,
            nodes: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 从 JSON 字符串加载
    pub fn from_json(json: &str) -> AdbResult<Self> {
        let snapshot: EnvironmentSnapshot = serde_json::from_str(json)?;
        Ok(Self::new(snapshot))
    }

    /// 从 JSON 文件加载
    pub async fn from_file(path: impl AsRef<Path>) -> AdbResult<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        debug!("加载环境快照：{}", path.as_ref().display());
        Self::from_json(&content)
    }

    pub fn snapshot(&self) -> &EnvironmentSnapshot {
        &self.snapshot
    }

    /// 当前挂载的节点数
    pub fn attached_nodes(&self) -> usize {
        self.nodes().len()
    }

    fn nodes(&self) -> MutexGuard<'_, HashMap<u64, SnapshotNode>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert_node(&self, node: SnapshotNode) -> NodeHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.nodes().insert(id, node);
        NodeHandle(id)
    }

    fn ensure_dom(&self, capability: &'static str) -> AdbResult<()> {
        if self.snapshot.supports_dom {
            Ok(())
        } else {
            Err(AdBlockError::Unsupported(capability))
        }
    }

    fn host_listed(hosts: &[String], url: &str) -> bool {
        let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_lowercase)) else {
            return false;
        };
        hosts.iter().any(|h| {
            let h = h.to_lowercase();
            host == h || host.ends_with(&format!(".{}", h))
        })
    }

    /// 模拟一次网络请求
    async fn request(&self, url: &str) -> AdbResult<()> {
        if Self::host_listed(&self.snapshot.slow_hosts, url) {
            trace!("慢速域名，延迟{}ms：{}", self.snapshot.slow_latency_ms, url);
            tokio::time::sleep(Duration::from_millis(self.snapshot.slow_latency_ms)).await;
        }
        if Self::host_listed(&self.snapshot.blocked_hosts, url) {
            return Err(AdBlockError::ResourceBlocked(url.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProbeEnvironment for SnapshotEnvironment {
    async fn load_script(&self, url: &str) -> AdbResult<()> {
        self.request(url).await
    }

    async fn load_image(&self, url: &str) -> AdbResult<()> {
        self.request(url).await
    }

    async fn fetch_head(&self, url: &str) -> AdbResult<()> {
        self.request(url).await
    }

    fn attach_bait(&self, bait: &BaitElement) -> AdbResult<NodeHandle> {
        self.ensure_dom("文档节点")?;
        let classes = bait.classes().map(str::to_string).collect();
        Ok(self.insert_node(SnapshotNode::Bait(classes)))
    }

    fn attach_style(&self, _css: &str) -> AdbResult<NodeHandle> {
        self.ensure_dom("样式注入")?;
        Ok(self.insert_node(SnapshotNode::Style))
    }

    fn computed_layout(&self, node: NodeHandle) -> AdbResult<ComputedLayout> {
        self.ensure_dom("计算样式")?;
        match self.nodes().get(&node.0) {
            Some(SnapshotNode::Bait(classes)) => {
                let hidden = classes
                    .iter()
                    .any(|c| self.snapshot.hidden_classes.iter().any(|h| h == c));
                if hidden {
                    Ok(ComputedLayout::hidden())
                } else {
                    Ok(ComputedLayout::visible(1.0, 1.0))
                }
            }
            Some(SnapshotNode::Style) => Err(AdBlockError::InvalidInput(format!(
                "样式节点无布局：{}",
                node.0
            ))),
            None => Err(AdBlockError::InvalidInput(format!("节点不存在：{}", node.0))),
        }
    }

    fn detach(&self, node: NodeHandle) {
        self.nodes().remove(&node.0);
    }

    fn global_exists(&self, name: &str) -> AdbResult<bool> {
        self.ensure_dom("全局变量")?;
        Ok(self.snapshot.globals.iter().any(|g| g == name))
    }

    fn user_agent(&self) -> String {
        self.snapshot.user_agent.clone()
    }

    fn current_url(&self) -> String {
        self.snapshot.url.clone()
    }
}
