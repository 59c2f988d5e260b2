//! adblock-probe 命令行入口
//! 在本机网络环境（或 JSON 环境快照）上执行内容拦截检测并输出报告

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use adblock_probe::{
    AdBlockDetector, ConfigManager, HttpEnvironment, ProbeEnvironment, SnapshotEnvironment,
};

#[derive(Debug, Parser)]
#[command(name = "adblock-probe", version, about = "检测当前网络环境中的内容拦截")]
struct Cli {
    /// 使用 JSON 环境快照代替真实网络
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// HTTP 请求超时（秒）
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// 稳定窗口（毫秒）
    #[arg(long, default_value_t = 3000)]
    settle_ms: u64,

    /// 报告中使用的页面地址
    #[arg(long, default_value = "about:blank")]
    page_url: String,

    /// 输出完整 JSON 报告
    #[arg(long)]
    json: bool,

    /// 检测前注入一条测试事件
    #[arg(long)]
    test_event: bool,

    /// 输出调试日志
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "adblock_probe=debug" } else { "adblock_probe=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ConfigManager::custom()
        .http_timeout(cli.timeout)
        .settle_window(Duration::from_millis(cli.settle_ms))
        .page_url(cli.page_url.clone())
        .build();

    let env: Arc<dyn ProbeEnvironment> = match &cli.snapshot {
        Some(path) => Arc::new(
            SnapshotEnvironment::from_file(path)
                .await
                .with_context(|| format!("无法加载环境快照：{}", path.display()))?,
        ),
        None => Arc::new(HttpEnvironment::new(&config).context("无法创建 HTTP 客户端")?),
    };

    let detector = AdBlockDetector::new(env, config);
    detector.on_detected(|notice| {
        info!("信号 {}：{}", notice.method, serde_json::Value::Object(notice.details.clone()));
    });

    if cli.test_event {
        detector.trigger_test_detection();
    }

    let summary = detector.run_all_detections().await;

    if cli.json {
        let report = detector.get_report();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", summary);
    }

    Ok(())
}
