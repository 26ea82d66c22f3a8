//! 日志初始化模块
//!
//! 环境过滤器 + pretty/JSON 两种输出。JSON 模式下事件字段平铺到顶层，
//! 便于按 toast_id、notification_id 检索。

use anyhow::Result;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 未设置 RUST_LOG 且配置级别无法解析时使用
const FALLBACK_DIRECTIVE: &str = "info";

/// 订阅器已安装的凭证
///
/// 进程内只能安装一次全局订阅器。
pub struct TracingGuard {
    _private: (),
}

/// 构造过滤器：RUST_LOG 优先，其次是配置文件中的级别
fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(&config.log_level).unwrap_or_else(|e| {
        eprintln!(
            "日志级别 {:?} 无法解析（{e}），使用 {FALLBACK_DIRECTIVE}",
            config.log_level
        );
        EnvFilter::new(FALLBACK_DIRECTIVE)
    })
}

/// 安装全局 tracing 订阅器，重复安装返回错误
pub fn init(config: &ObservabilityConfig) -> Result<TracingGuard> {
    let output = if config.json_logs() {
        fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(output)
        .try_init()?;

    Ok(TracingGuard { _private: () })
}
