//! 探针实现：每个探针独立、尽力而为，失败只会导致不产生信号
use serde_json::json;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tracing::{debug, trace, warn};

use super::detector::AdBlockDetector;
use crate::environment::{BaitElement, NodeHandle};
use crate::model::{to_details, DetectionMethod};
use crate::utils::CacheBuster;

impl AdBlockDetector {
    /// 脚本拦截探针：注入广告脚本，加载失败即为拦截；超时按未拦截处理
    pub async fn detect_script_blocking(&self) {
        let url = match CacheBuster::apply(&self.config.ad_script_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("广告脚本URL无效，跳过脚本探针：{}", e);
                return;
            }
        };

        match timeout(self.config.script_timeout, self.env.load_script(&url)).await {
            Ok(Ok(())) => debug!("广告脚本加载成功：{}", url),
            Ok(Err(e)) if e.is_unsupported() => debug!("跳过脚本探针：{}", e),
            Ok(Err(e)) if e.is_timeout() => debug!("广告脚本请求超时，按未拦截处理：{}", e),
            Ok(Err(e)) => self.record_detection(
                DetectionMethod::ScriptBlocking,
                to_details(json!({ "url": url, "error": e.to_string() })),
            ),
            // 结论不确定，按未拦截处理
            Err(_) => debug!(
                "广告脚本加载超时（{:?}），按未拦截处理：{}",
                self.config.script_timeout, url
            ),
        }
    }

    /// 元素拦截探针：挂载离屏诱饵，按阶梯延迟检查是否被隐藏
    pub async fn detect_element_blocking(&self) {
        let start = Instant::now();
        let mut baits: Vec<(usize, &str, NodeHandle)> = Vec::new();

        for (index, class_name) in self.config.bait_classes.iter().enumerate() {
            match self.env.attach_bait(&BaitElement::new(class_name.as_str())) {
                Ok(node) => baits.push((index, class_name.as_str(), node)),
                Err(e) if e.is_unsupported() => {
                    debug!("跳过元素探针：{}", e);
                    for (_, _, node) in baits {
                        self.env.detach(node);
                    }
                    return;
                }
                Err(e) => debug!("诱饵元素挂载失败：{}，{}", class_name, e),
            }
        }

        for (index, class_name, node) in baits {
            sleep_until(start + self.config.element_check_delay(index)).await;

            match self.env.computed_layout(node) {
                Ok(layout) => {
                    if let Some(reason) = layout.hidden_reason() {
                        self.record_detection(
                            DetectionMethod::ElementBlocking,
                            to_details(json!({
                                "className": class_name,
                                "reason": reason,
                                "width": layout.width,
                                "height": layout.height,
                                "display": layout.display,
                            })),
                        );
                    } else {
                        trace!("诱饵元素正常渲染：{}", class_name);
                    }
                }
                Err(e) => debug!("读取诱饵布局失败：{}，{}", class_name, e),
            }

            self.env.detach(node);
        }
    }

    /// 请求拦截探针：依次对广告端点发起 no-cors HEAD 请求
    pub async fn detect_fetch_blocking(&self) {
        for endpoint in &self.config.fetch_endpoints {
            match timeout(self.config.fetch_timeout, self.env.fetch_head(endpoint)).await {
                Ok(Ok(())) => trace!("广告端点可达：{}", endpoint),
                Ok(Err(e)) if e.is_unsupported() => {
                    debug!("跳过请求探针：{}", e);
                    return;
                }
                Ok(Err(e)) if e.is_timeout() => debug!("广告端点请求超时，按未拦截处理：{}", e),
                Ok(Err(e)) => self.record_detection(
                    DetectionMethod::FetchBlocking,
                    to_details(json!({ "url": endpoint, "error": e.to_string() })),
                ),
                Err(_) => debug!("广告端点请求超时，按未拦截处理：{}", endpoint),
            }
        }
    }

    /// 全局变量探针：拦截插件注入的变量立即检查，期望变量延迟检查
    pub async fn detect_global_variables(&self) {
        for name in &self.config.blocker_globals {
            match self.env.global_exists(name) {
                Ok(true) => self.record_detection(
                    DetectionMethod::GlobalVariable,
                    to_details(json!({ "variable": name })),
                ),
                Ok(false) => {}
                Err(e) if e.is_unsupported() => {
                    debug!("跳过全局变量探针：{}", e);
                    return;
                }
                Err(e) => debug!("读取全局变量失败：{}，{}", name, e),
            }
        }

        self.detect_missing_global().await;
    }

    /// 延迟检查广告脚本应当定义的全局变量
    pub async fn detect_missing_global(&self) {
        sleep(self.config.missing_global_delay).await;

        let expected = &self.config.expected_global;
        match self.env.global_exists(expected) {
            Ok(true) => trace!("期望全局变量存在：{}", expected),
            Ok(false) => self.record_detection(
                DetectionMethod::MissingAdsense,
                to_details(json!({ "expected": expected })),
            ),
            Err(e) => debug!("跳过期望全局变量检查：{}", e),
        }
    }

    /// 图片拦截探针：并发加载追踪像素
    pub async fn detect_image_blocking(&self) {
        let mut handles = Vec::with_capacity(self.config.pixel_urls.len());

        for pixel in &self.config.pixel_urls {
            let url = match CacheBuster::apply(pixel) {
                Ok(url) => url,
                Err(e) => {
                    warn!("追踪像素URL无效：{}，{}", pixel, e);
                    continue;
                }
            };
            let detector = self.clone();
            handles.push(tokio::spawn(async move { detector.probe_image(url).await }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                debug!("图片探针任务异常：{}", e);
            }
        }
    }

    async fn probe_image(&self, url: String) {
        match timeout(self.config.image_timeout, self.env.load_image(&url)).await {
            Ok(Ok(())) => trace!("追踪像素加载成功：{}", url),
            Ok(Err(e)) if e.is_unsupported() => debug!("跳过图片探针：{}", e),
            Ok(Err(e)) if e.is_timeout() => debug!("追踪像素请求超时：{}", e),
            Ok(Err(e)) => self.record_detection(
                DetectionMethod::ImageBlocking,
                to_details(json!({ "url": url, "error": e.to_string() })),
            ),
            Err(_) => debug!("追踪像素加载超时：{}", url),
        }
    }

    /// 样式拦截探针：页面规则强制诱饵可见，若仍为 `display:none` 则存在外观过滤
    pub async fn detect_css_blocking(&self) {
        let class_name = self.config.css_bait_class.as_str();
        let selector: String = class_name
            .split_whitespace()
            .map(|c| format!(".{}", c))
            .collect();
        if selector.is_empty() {
            warn!("样式探针诱饵类名为空，跳过");
            return;
        }
        let css = format!("{} {{ display: block !important; }}", selector);

        let style = match self.env.attach_style(&css) {
            Ok(node) => node,
            Err(e) => {
                debug!("跳过样式探针：{}", e);
                return;
            }
        };
        let bait = match self.env.attach_bait(&BaitElement::new(class_name)) {
            Ok(node) => node,
            Err(e) => {
                debug!("跳过样式探针：{}", e);
                self.env.detach(style);
                return;
            }
        };

        sleep(self.config.css_check_delay).await;

        match self.env.computed_layout(bait) {
            Ok(layout) if layout.display == "none" => self.record_detection(
                DetectionMethod::CssBlocking,
                to_details(json!({ "className": class_name, "display": layout.display })),
            ),
            Ok(_) => trace!("样式诱饵正常显示"),
            Err(e) => debug!("读取样式诱饵布局失败：{}", e),
        }

        self.env.detach(bait);
        self.env.detach(style);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::ConfigManager;
    use crate::detector::AdBlockDetector;
    use crate::environment::{EnvironmentSnapshot, SnapshotEnvironment};
    use crate::model::DetectionMethod;

    fn detector_with(snapshot: EnvironmentSnapshot) -> (AdBlockDetector, Arc<SnapshotEnvironment>) {
        let env = Arc::new(SnapshotEnvironment::new(snapshot));
        let detector = AdBlockDetector::with_default_config(env.clone());
        (detector, env)
    }

    fn methods(detector: &AdBlockDetector) -> Vec<DetectionMethod> {
        detector.events().into_iter().map(|e| e.method).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_error_is_detected() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().blocked_host("googlesyndication.com"));
        detector.detect_script_blocking().await;

        let events = detector.events();
        assert_eq!(methods(&detector), vec![DetectionMethod::ScriptBlocking]);
        let url = events[0].details["url"].as_str().unwrap();
        assert!(url.contains("_cb="));
    }

    #[tokio::test(start_paused = true)]
    async fn test_script_timeout_is_not_detected() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().slow_host("googlesyndication.com"));
        detector.detect_script_blocking().await;
        assert!(!detector.is_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_baits_fire_once_each_and_are_detached() {
        let (detector, env) = detector_with(
            EnvironmentSnapshot::default().hidden_class("adsbox").hidden_class("text-ad"),
        );
        detector.detect_element_blocking().await;

        let events = detector.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].details["className"], "adsbox");
        assert_eq!(events[1].details["className"], "text-ad");
        assert_eq!(events[0].details["reason"], "display-none");
        assert_eq!(env.attached_nodes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_element_checks_are_staggered() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().hidden_class("ad-banner"));
        let start = tokio::time::Instant::now();
        detector.detect_element_blocking().await;

        // 7 个诱饵，最后一个在 100ms + 50ms × 6 时检查
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(400) && elapsed < Duration::from_millis(450));
        assert_eq!(methods(&detector), vec![DetectionMethod::ElementBlocking]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_errors_fire_per_endpoint() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().blocked_host("doubleclick.net"));
        detector.detect_fetch_blocking().await;
        // 默认端点中 2 个位于 doubleclick.net
        assert_eq!(methods(&detector), vec![DetectionMethod::FetchBlocking; 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocker_global_and_missing_expected_global() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().global("uBlock"));
        let start = tokio::time::Instant::now();
        detector.detect_global_variables().await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_millis(2050));
        assert_eq!(
            methods(&detector),
            vec![DetectionMethod::GlobalVariable, DetectionMethod::MissingAdsense]
        );
        assert_eq!(detector.events()[0].details["variable"], "uBlock");
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_expected_global_is_quiet() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().global("adsbygoogle"));
        detector.detect_global_variables().await;
        assert!(!detector.is_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_errors_fire_per_pixel() {
        let (detector, _) = detector_with(EnvironmentSnapshot::default().blocked_host("google-analytics.com"));
        detector.detect_image_blocking().await;
        assert_eq!(methods(&detector), vec![DetectionMethod::ImageBlocking]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_css_override_is_detected() {
        let (detector, env) = detector_with(EnvironmentSnapshot::default().hidden_class("banner-ads"));
        detector.detect_css_blocking().await;

        assert_eq!(methods(&detector), vec![DetectionMethod::CssBlocking]);
        assert_eq!(env.attached_nodes(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dom_probes_skip_without_dom() {
        let (detector, _) = detector_with(
            EnvironmentSnapshot::default().hidden_class("adsbox").without_dom(),
        );
        detector.detect_element_blocking().await;
        detector.detect_css_blocking().await;
        detector.detect_global_variables().await;
        assert!(!detector.is_detected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_css_bait_class_is_skipped() {
        let env = Arc::new(SnapshotEnvironment::new(EnvironmentSnapshot::default()));
        let config = ConfigManager::custom().css_bait_class("  ").build();
        let detector = AdBlockDetector::new(env.clone(), config);
        detector.detect_css_blocking().await;
        assert!(!detector.is_detected());
        assert_eq!(env.attached_nodes(), 0);
    }
}
