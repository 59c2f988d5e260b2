//! HTTP 宿主环境
//! 面向原生进程的网络层检测（DNS 黑洞、过滤代理、防火墙规则），无文档能力

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::debug;

use super::{BaitElement, ComputedLayout, NodeHandle, ProbeEnvironment};
use crate::config::DetectorConfig;
use crate::error::{AdBlockError, AdbResult};

/// 基于 reqwest 的宿主环境
#[derive(Debug, Clone)]
pub struct HttpEnvironment {
    client: Client,
    user_agent: String,
    page_url: String,
}

impl HttpEnvironment {
    /// 按配置创建 HTTP 客户端
    pub fn new(config: &DetectorConfig) -> AdbResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            page_url: config.page_url.clone(),
        })
    }

    /// GET 资源：状态码非 2xx 或响应体为空（黑洞特征）视为加载失败
    async fn get_resource(&self, url: &str) -> AdbResult<()> {
        let response = self.client.get(url).send().await.map_err(Self::transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdBlockError::ResourceBlocked(format!("{} 返回状态码 {}", url, status)));
        }

        let body = Self::read_body(response).await?;
        if body.is_empty() {
            return Err(AdBlockError::ResourceBlocked(format!("{} 响应体为空", url)));
        }
        debug!("资源加载成功：{}，{}字节", url, body.len());
        Ok(())
    }

    async fn read_body(response: Response) -> AdbResult<Vec<u8>> {
        Ok(response.bytes().await.map_err(Self::transport_error)?.to_vec())
    }

    /// 客户端超时单独归类，探针据此按未拦截处理
    fn transport_error(e: reqwest::Error) -> AdBlockError {
        if e.is_timeout() {
            AdBlockError::Timeout(e.to_string())
        } else {
            AdBlockError::HttpError(e)
        }
    }
}

#[async_trait]
impl ProbeEnvironment for HttpEnvironment {
    async fn load_script(&self, url: &str) -> AdbResult<()> {
        self.get_resource(url).await
    }

    async fn load_image(&self, url: &str) -> AdbResult<()> {
        self.get_resource(url).await
    }

    async fn fetch_head(&self, url: &str) -> AdbResult<()> {
        // no-cors 语义：任何响应都是不透明成功，只有网络层失败才算拦截
        let response = self.client.head(url).send().await.map_err(Self::transport_error)?;
        debug!("HEAD {} -> {}", url, response.status());
        Ok(())
    }

    fn attach_bait(&self, _bait: &BaitElement) -> AdbResult<NodeHandle> {
        Err(AdBlockError::Unsupported("文档节点"))
    }

    fn attach_style(&self, _css: &str) -> AdbResult<NodeHandle> {
        Err(AdBlockError::Unsupported("样式注入"))
    }

    fn computed_layout(&self, _node: NodeHandle) -> AdbResult<ComputedLayout> {
        Err(AdBlockError::Unsupported("计算样式"))
    }

    fn detach(&self, _node: NodeHandle) {}

    fn global_exists(&self, _name: &str) -> AdbResult<bool> {
        Err(AdBlockError::Unsupported("全局变量"))
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn current_url(&self) -> String {
        self.page_url.clone()
    }
}
