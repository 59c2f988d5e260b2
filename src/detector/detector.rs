//! 检测器核心：累计检测事件、计算置信度、通知订阅者
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ConfigManager, DetectorConfig};
use crate::environment::ProbeEnvironment;
use crate::model::{
    to_details, DetectionEvent, DetectionMethod, DetectionNotice, DetectionReport,
    DetectionSummary, Details,
};
use crate::utils::{now_millis, ConfidenceScorer};

/// 检测回调
pub type DetectionCallback = Arc<dyn Fn(&DetectionNotice) + Send + Sync>;

/// 检测器可变状态
#[derive(Default)]
struct DetectorState {
    events: Vec<DetectionEvent>,
    is_detected: bool,
    subscribers: Vec<DetectionCallback>,
}

/// 内容拦截检测器
///
/// 克隆开销很小，所有克隆共享同一份状态。探针在 tokio 运行时上执行，
/// `reset()` 不会取消已在执行的探针，之后到达的信号仍会被追加。
#[derive(Clone)]
pub struct AdBlockDetector {
    pub(super) env: Arc<dyn ProbeEnvironment>,
    pub(super) config: Arc<DetectorConfig>,
    state: Arc<Mutex<DetectorState>>,
}

impl fmt::Debug for AdBlockDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("AdBlockDetector")
            .field("config", &self.config)
            .field("events", &state.events.len())
            .field("is_detected", &state.is_detected)
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

impl AdBlockDetector {
    /// 创建检测器
    pub fn new(env: Arc<dyn ProbeEnvironment>, config: DetectorConfig) -> Self {
        Self {
            env,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(DetectorState::default())),
        }
    }

    /// 使用默认配置创建检测器
    pub fn with_default_config(env: Arc<dyn ProbeEnvironment>) -> Self {
        Self::new(env, ConfigManager::get_default())
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 后台启动一次全量检测
    pub fn start(&self) -> JoinHandle<DetectionSummary> {
        let detector = self.clone();
        tokio::spawn(async move { detector.run_all_detections().await })
    }

    fn state(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 注册检测回调，每条新事件触发一次
    pub fn on_detected<F>(&self, callback: F)
    where
        F: Fn(&DetectionNotice) + Send + Sync + 'static,
    {
        self.state().subscribers.push(Arc::new(callback));
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// 记录一条检测信号并按注册顺序同步通知订阅者
    pub fn record_detection(&self, method: DetectionMethod, details: Details) {
        let event = DetectionEvent::new(method, details);

        let (notice, subscribers) = {
            let mut state = self.state();
            state.events.push(event.clone());
            state.is_detected = true;
            let notice = DetectionNotice {
                method: event.method.clone(),
                details: event.details.clone(),
                all_events: state.events.clone(),
            };
            (notice, state.subscribers.clone())
        };

        info!(
            "检测到内容拦截：{}，累计{}条信号",
            notice.method,
            notice.all_events.len()
        );

        for (index, callback) in subscribers.iter().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(&notice)));
            if let Err(payload) = outcome {
                warn!("第{}个检测回调执行异常：{}", index, panic_message(payload.as_ref()));
            }
        }
    }

    pub fn is_detected(&self) -> bool {
        self.state().is_detected
    }

    /// 已累计事件（按检测顺序）
    pub fn events(&self) -> Vec<DetectionEvent> {
        self.state().events.clone()
    }

    pub fn confidence(&self) -> u8 {
        ConfidenceScorer::score(&self.state().events)
    }

    /// 当前状态汇总
    pub fn summary(&self) -> DetectionSummary {
        let state = self.state();
        DetectionSummary {
            is_detected: state.is_detected,
            methods: state.events.iter().map(|e| e.method.clone()).collect(),
            confidence: ConfidenceScorer::score(&state.events),
        }
    }

    /// 诊断报告：状态快照 + 环境元数据
    pub fn get_report(&self) -> DetectionReport {
        let (summary, events) = {
            let state = self.state();
            let summary = DetectionSummary {
                is_detected: state.is_detected,
                methods: state.events.iter().map(|e| e.method.clone()).collect(),
                confidence: ConfidenceScorer::score(&state.events),
            };
            (summary, state.events.clone())
        };

        DetectionReport {
            is_detected: summary.is_detected,
            methods: summary.methods,
            events,
            confidence: summary.confidence,
            timestamp: now_millis(),
            user_agent: self.env.user_agent(),
            url: self.env.current_url(),
        }
    }

    /// 清空事件、检测标记与订阅者
    pub fn reset(&self) {
        let mut state = self.state();
        state.events.clear();
        state.is_detected = false;
        state.subscribers.clear();
        debug!("检测器状态已重置");
    }

    /// 注入一条测试事件，用于手动验证订阅链路
    pub fn trigger_test_detection(&self) {
        let details = to_details(json!({
            "manual": true,
            "userAgent": self.env.user_agent(),
            "url": self.env.current_url(),
            "triggeredAt": now_millis(),
        }));
        self.record_detection(DetectionMethod::TestDetection, details);
    }

    /// 执行全部探针，等待稳定窗口后返回汇总
    ///
    /// 1. 无需等待的探针（元素、全局变量、图片、样式）后台并发执行；
    /// 2. 依次等待脚本探针与请求探针；
    /// 3. 等待稳定窗口，让阶梯延迟与全局变量延迟检查落地。
    ///
    /// 任何探针失败都不会传递给调用方。
    pub async fn run_all_detections(&self) -> DetectionSummary {
        info!("开始内容拦截检测，目标脚本：{}", self.config.ad_script_url);

        self.spawn_detached(|d| async move { d.detect_element_blocking().await });
        self.spawn_detached(|d| async move { d.detect_global_variables().await });
        self.spawn_detached(|d| async move { d.detect_image_blocking().await });
        self.spawn_detached(|d| async move { d.detect_css_blocking().await });

        self.detect_script_blocking().await;
        self.detect_fetch_blocking().await;

        tokio::time::sleep(self.config.settle_window).await;

        let summary = self.summary();
        info!(
            "内容拦截检测完成：detected={}，confidence={}，信号数={}",
            summary.is_detected,
            summary.confidence,
            summary.methods.len()
        );
        summary
    }

    fn spawn_detached<F, Fut>(&self, probe: F)
    where
        F: FnOnce(AdBlockDetector) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(probe(self.clone()));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知异常".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::environment::{EnvironmentSnapshot, SnapshotEnvironment};

    fn detector() -> AdBlockDetector {
        let env = SnapshotEnvironment::new(EnvironmentSnapshot::default());
        AdBlockDetector::with_default_config(Arc::new(env))
    }

    #[test]
    fn test_fresh_detector_is_empty() {
        let detector = detector();
        assert!(!detector.is_detected());
        assert!(detector.events().is_empty());
        assert_eq!(detector.confidence(), 0);
        assert_eq!(detector.subscriber_count(), 0);
    }

    #[test]
    fn test_record_sets_detected_and_keeps_order() {
        let detector = detector();
        detector.record_detection(DetectionMethod::ImageBlocking, Details::new());
        detector.record_detection(DetectionMethod::ScriptBlocking, Details::new());

        assert!(detector.is_detected());
        let methods: Vec<DetectionMethod> = detector.events().into_iter().map(|e| e.method).collect();
        assert_eq!(methods, vec![DetectionMethod::ImageBlocking, DetectionMethod::ScriptBlocking]);
        assert_eq!(detector.confidence(), 45);
    }

    #[test]
    fn test_notice_carries_all_events() {
        let detector = detector();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        detector.on_detected(move |notice| {
            sink.lock().unwrap().push((notice.method.clone(), notice.all_events.len()));
        });

        detector.record_detection(DetectionMethod::CssBlocking, Details::new());
        detector.record_detection(DetectionMethod::FetchBlocking, Details::new());

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(DetectionMethod::CssBlocking, 1), (DetectionMethod::FetchBlocking, 2)]
        );
    }

    #[test]
    fn test_duplicate_subscribers_are_all_called() {
        let detector = detector();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            detector.on_detected(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        detector.record_detection(DetectionMethod::ElementBlocking, Details::new());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_subscriber_can_read_detector_state() {
        // 回调执行时不持有状态锁
        let detector = detector();
        let observed = Arc::new(AtomicUsize::new(0));
        let inner = detector.clone();
        let sink = Arc::clone(&observed);
        detector.on_detected(move |_| {
            sink.store(inner.events().len(), Ordering::SeqCst);
        });
        detector.record_detection(DetectionMethod::GlobalVariable, Details::new());
        assert_eq!(observed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_clears_subscribers() {
        let detector = detector();
        detector.on_detected(|_| {});
        detector.record_detection(DetectionMethod::ScriptBlocking, Details::new());
        detector.reset();

        assert!(!detector.is_detected());
        assert!(detector.events().is_empty());
        assert_eq!(detector.subscriber_count(), 0);
        assert_eq!(detector.summary(), DetectionSummary { is_detected: false, methods: vec![], confidence: 0 });
    }

    #[test]
    fn test_trigger_test_detection_carries_metadata() {
        let detector = detector();
        detector.trigger_test_detection();

        let events = detector.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].method, DetectionMethod::TestDetection);
        assert_eq!(events[0].details["userAgent"], json!("snapshot"));
        assert_eq!(events[0].details["url"], json!("about:blank"));
        assert_eq!(events[0].details["manual"], json!(true));
        assert_eq!(detector.confidence(), 10);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "未知异常");
    }
}
