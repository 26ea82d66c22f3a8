//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::channels::{ChannelConfig, ChannelKind};
use crate::error::{PlannerError, Result};

/// toast 容器在屏幕上的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToastPosition {
    TopRight,
    TopLeft,
    #[default]
    BottomRight,
    BottomLeft,
}

impl ToastPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
        }
    }

    /// 位于底部时，最新的 toast 贴近屏幕边缘，列表需要倒序堆叠
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::BottomRight | Self::BottomLeft)
    }
}

/// toast 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToastConfig {
    /// 同时显示的 toast 上限，超出部分进入队列
    pub max_toasts: usize,
    /// 未指定时长时的默认展示时长（毫秒）
    pub default_duration_ms: u64,
    pub position: ToastPosition,
    /// 是否持久化 persistent toast
    pub persist_toasts: bool,
    pub storage_path: PathBuf,
    /// 持久化数据的序列化体积上限（字节）
    pub max_storage_bytes: usize,
    /// 进度条刷新间隔（毫秒）
    pub progress_tick_ms: u64,
    /// 分析事件日志容量，超出后丢弃最旧的事件
    pub analytics_capacity: usize,
    /// 默认动画预设名
    pub default_animation: String,
}

impl Default for ToastConfig {
    fn default() -> Self {
        Self {
            max_toasts: 5,
            default_duration_ms: 3000,
            position: ToastPosition::default(),
            persist_toasts: false,
            storage_path: PathBuf::from("data/toast-storage.json"),
            max_storage_bytes: 1024 * 1024,
            progress_tick_ms: 10,
            analytics_capacity: 1000,
            default_animation: "fadeIn".to_string(),
        }
    }
}

/// 通知服务配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub channels: Vec<ChannelConfig>,
    /// 生成日历事件时的默认时长（分钟）
    pub calendar_event_minutes: i64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelConfig::new(ChannelKind::InApp, true),
                ChannelConfig::disabled(ChannelKind::Push),
                ChannelConfig::disabled(ChannelKind::Calendar),
            ],
            calendar_event_minutes: 60,
        }
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub toast: ToastConfig,
    pub notification: NotificationConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（PLANNER_ 前缀，双下划线分隔层级，如 PLANNER_TOAST__MAX_TOASTS -> toast.max_toasts）
    pub fn load(service_name: &str) -> Result<Self> {
        let env = std::env::var("PLANNER_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let config = Self::load_from(Path::new(&config_dir), service_name, &env)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from(
        config_dir: &Path,
        service_name: &str,
        env: &str,
    ) -> std::result::Result<Self, ConfigError> {
        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", service_name))).required(false),
            )
            .add_source(
                Environment::with_prefix("PLANNER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 启动时校验，配置不合理时快速失败
    pub fn validate(&self) -> Result<()> {
        if self.toast.max_toasts == 0 {
            return Err(PlannerError::invalid_config("toast.max_toasts", "必须大于 0"));
        }
        if self.toast.max_storage_bytes == 0 {
            return Err(PlannerError::invalid_config(
                "toast.max_storage_bytes",
                "必须大于 0",
            ));
        }
        if self.toast.progress_tick_ms == 0 {
            return Err(PlannerError::invalid_config(
                "toast.progress_tick_ms",
                "必须大于 0",
            ));
        }
        if self.toast.analytics_capacity == 0 {
            return Err(PlannerError::invalid_config(
                "toast.analytics_capacity",
                "必须大于 0",
            ));
        }
        if self.notification.calendar_event_minutes <= 0 {
            return Err(PlannerError::invalid_config(
                "notification.calendar_event_minutes",
                "必须大于 0",
            ));
        }
        Ok(())
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.toast.max_toasts, 5);
        assert_eq!(config.toast.default_duration_ms, 3000);
        assert_eq!(config.toast.max_storage_bytes, 1024 * 1024);
        assert_eq!(config.toast.position, ToastPosition::BottomRight);
        assert_eq!(config.notification.channels.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let mut config = AppConfig::default();
        config.toast.max_toasts = 0;

        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
[toast]
max_toasts = 3
position = "top-left"
persist_toasts = true

[[notification.channels]]
id = "push"
kind = "push"
enabled = true

[notification.channels.settings]
sound = true
"#
        )
        .unwrap();

        let config = AppConfig::load_from(dir.path(), "planner-notify", "test").unwrap();

        assert_eq!(config.service_name, "planner-notify");
        assert_eq!(config.environment, "test");
        assert_eq!(config.toast.max_toasts, 3);
        assert_eq!(config.toast.position, ToastPosition::TopLeft);
        assert!(config.toast.persist_toasts);
        // 未出现在文件中的字段保持默认值
        assert_eq!(config.toast.default_duration_ms, 3000);
        assert_eq!(config.notification.channels.len(), 1);
        assert!(config.notification.channels[0].enabled);
        assert!(config.notification.channels[0].settings.sound);
    }

    #[test]
    fn test_missing_files_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path(), "planner-notify", "development").unwrap();

        assert_eq!(config.toast.max_toasts, 5);
        assert!(!config.is_production());
    }
}
