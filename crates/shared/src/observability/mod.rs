//! 统一可观测性模块
//!
//! 提供 logging 与 metrics 的统一初始化入口，所有二进制通过同一入口配置，
//! 确保一致的日志格式和指标命名。

pub mod metrics;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有日志订阅器的生命周期，drop 时输出关闭日志。
pub struct ObservabilityGuard {
    service_name: String,
    _tracing_guard: Option<tracing::TracingGuard>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            service_name: String::new(),
            _tracing_guard: None,
        }
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if self._tracing_guard.is_some() {
            info!(service = %self.service_name, "关闭可观测性组件");
        }
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（指标描述注册；recorder 由宿主进程安装）
///
/// # Example
///
/// ```ignore
/// use planner_shared::config::AppConfig;
/// use planner_shared::observability;
///
/// let config = AppConfig::load("planner-notify")?;
/// let _guard = observability::init(&config.service_name, &config.observability)?;
/// ```
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing_guard = tracing::init(config)?;

    metrics::describe_metrics(service_name);

    info!(
        service = %service_name,
        log_level = %config.log_level,
        log_format = %config.log_format,
        "可观测性初始化完成"
    );

    Ok(ObservabilityGuard {
        service_name: service_name.to_string(),
        _tracing_guard: Some(tracing_guard),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs());
    }

    #[test]
    fn test_json_format_detection() {
        let config = ObservabilityConfig {
            log_format: "JSON".to_string(),
            ..Default::default()
        };
        assert!(config.json_logs());
    }

    #[test]
    fn test_empty_guard_drops_quietly() {
        let guard = ObservabilityGuard::empty();
        drop(guard);
    }
}
