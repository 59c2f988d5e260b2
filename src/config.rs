//! 全局配置管理,存储探针目标、时序参数与HTTP参数

use std::time::Duration;
use once_cell::sync::Lazy;

/// 广告网络脚本（脚本拦截探针）
pub const DEFAULT_AD_SCRIPT_URL: &str =
    "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js";

/// 广告网络端点（HEAD 请求拦截探针）
pub static DEFAULT_FETCH_ENDPOINTS: Lazy<Vec<String>> = Lazy::new(|| {
    vec![
        "https://pagead2.googlesyndication.com/pagead/js/adsbygoogle.js".to_string(),
        "https://googleads.g.doubleclick.net/pagead/id".to_string(),
        "https://static.doubleclick.net/instream/ad_status.js".to_string(),
        "https://www.googletagservices.com/tag/js/gpt.js".to_string(),
    ]
});

/// 追踪像素（图片拦截探针）
pub static DEFAULT_PIXEL_URLS: Lazy<Vec<String>> = Lazy::new(|| {
    vec![
        "https://googleads.g.doubleclick.net/pagead/viewthroughconversion/0/?value=0&guid=ON&script=0".to_string(),
        "https://www.google-analytics.com/collect?v=1&t=pageview".to_string(),
        "https://pagead2.googlesyndication.com/pagead/imgad?id=0".to_string(),
    ]
});

/// 诱饵元素常见广告类名（元素拦截探针）
pub static DEFAULT_BAIT_CLASSES: Lazy<Vec<String>> = Lazy::new(|| {
    [
        "adsbox",
        "ad-banner",
        "adsbygoogle",
        "ad-placement",
        "pub_300x250",
        "text-ad",
        "sponsored-ad",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
});

/// 拦截插件注入的全局变量特征
pub static DEFAULT_BLOCKER_GLOBALS: Lazy<Vec<String>> = Lazy::new(|| {
    ["uBlock", "adblock", "AdBlock", "__adblockplus", "canRunAds_blocked", "adguard"]
        .iter()
        .map(|s| s.to_string())
        .collect()
});

/// 全局配置
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    // 探针目标
    pub ad_script_url: String,
    pub fetch_endpoints: Vec<String>,
    pub pixel_urls: Vec<String>,
    pub bait_classes: Vec<String>,
    pub blocker_globals: Vec<String>,
    // 正常加载广告脚本后应存在的全局变量
    pub expected_global: String,
    // 外观过滤探针的诱饵类名（空白分隔，可多个）
    pub css_bait_class: String,

    // 时序配置
    pub script_timeout: Duration,
    pub image_timeout: Duration,
    pub fetch_timeout: Duration,
    pub element_base_delay: Duration,
    pub element_stagger: Duration,
    pub css_check_delay: Duration,
    pub missing_global_delay: Duration,
    pub settle_window: Duration,

    // HTTP 环境配置（单位：秒）
    pub http_timeout: u64,
    pub user_agent: String,
    // 报告中使用的页面地址
    pub page_url: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            ad_script_url: DEFAULT_AD_SCRIPT_URL.to_string(),
            fetch_endpoints: DEFAULT_FETCH_ENDPOINTS.clone(),
            pixel_urls: DEFAULT_PIXEL_URLS.clone(),
            bait_classes: DEFAULT_BAIT_CLASSES.clone(),
            blocker_globals: DEFAULT_BLOCKER_GLOBALS.clone(),
            expected_global: "adsbygoogle".to_string(),
            css_bait_class: "textads banner-ads".to_string(),
            script_timeout: Duration::from_secs(5),
            image_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(5),
            element_base_delay: Duration::from_millis(100),
            element_stagger: Duration::from_millis(50),
            css_check_delay: Duration::from_millis(100),
            missing_global_delay: Duration::from_secs(2),
            settle_window: Duration::from_secs(3),
            http_timeout: 10,
            user_agent: concat!("adblock-probe/", env!("CARGO_PKG_VERSION")).to_string(),
            page_url: "about:blank".to_string(),
        }
    }
}

impl DetectorConfig {
    /// 第 index 个诱饵元素的检查延迟（基础延迟 + 阶梯间隔 × 序号）
    pub fn element_check_delay(&self, index: usize) -> Duration {
        self.element_base_delay + self.element_stagger * index as u32
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> DetectorConfig {
        DetectorConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: DetectorConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DetectorConfig::default(),
        }
    }

    pub fn ad_script_url(mut self, url: impl Into<String>) -> Self {
        self.config.ad_script_url = url.into();
        self
    }

    pub fn fetch_endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.config.fetch_endpoints = endpoints;
        self
    }

    pub fn pixel_urls(mut self, urls: Vec<String>) -> Self {
        self.config.pixel_urls = urls;
        self
    }

    pub fn bait_classes(mut self, classes: Vec<String>) -> Self {
        self.config.bait_classes = classes;
        self
    }

    pub fn blocker_globals(mut self, globals: Vec<String>) -> Self {
        self.config.blocker_globals = globals;
        self
    }

    pub fn expected_global(mut self, name: impl Into<String>) -> Self {
        self.config.expected_global = name.into();
        self
    }

    pub fn css_bait_class(mut self, class_name: impl Into<String>) -> Self {
        self.config.css_bait_class = class_name.into();
        self
    }

    pub fn script_timeout(mut self, timeout: Duration) -> Self {
        self.config.script_timeout = timeout;
        self
    }

    pub fn image_timeout(mut self, timeout: Duration) -> Self {
        self.config.image_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetch_timeout = timeout;
        self
    }

    pub fn settle_window(mut self, window: Duration) -> Self {
        self.config.settle_window = window;
        self
    }

    pub fn missing_global_delay(mut self, delay: Duration) -> Self {
        self.config.missing_global_delay = delay;
        self
    }

    pub fn http_timeout(mut self, timeout: u64) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn page_url(mut self, url: impl Into<String>) -> Self {
        self.config.page_url = url.into();
        self
    }

    pub fn build(self) -> DetectorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_check_delay_is_staggered() {
        let config = ConfigManager::get_default();
        assert_eq!(config.element_check_delay(0), Duration::from_millis(100));
        assert_eq!(config.element_check_delay(3), Duration::from_millis(250));
    }

    #[test]
    fn test_builder_overrides_defaults() {
        let config = ConfigManager::custom()
            .script_timeout(Duration::from_secs(1))
            .expected_global("googletag")
            .bait_classes(vec!["promo".to_string()])
            .build();

        assert_eq!(config.script_timeout, Duration::from_secs(1));
        assert_eq!(config.expected_global, "googletag");
        assert_eq!(config.bait_classes, vec!["promo".to_string()]);
        // 未覆盖项保持默认
        assert_eq!(config.settle_window, Duration::from_secs(3));
    }
}
