//! 通知渠道模型
//!
//! 渠道（站内、推送、日历）的类型与配置由外部下发，通知服务在投递前查询。
//! 这些类型同时被配置层反序列化，因此放在共享库中。

use serde::{Deserialize, Serialize};

/// 渠道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// 站内通知（toast）
    InApp,
    /// 系统推送
    Push,
    /// 日历事件
    Calendar,
}

impl ChannelKind {
    /// 渠道的默认标识，与配置中的 `id` 对应
    pub fn default_id(&self) -> &'static str {
        match self {
            Self::InApp => "in-app",
            Self::Push => "push",
            Self::Calendar => "calendar",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_id())
    }
}

/// 日历提供方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProvider {
    #[default]
    Local,
    Google,
    Apple,
    Outlook,
}

impl std::fmt::Display for CalendarProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Google => write!(f, "google"),
            Self::Apple => write!(f, "apple"),
            Self::Outlook => write!(f, "outlook"),
        }
    }
}

/// 通知优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    High,
    #[default]
    Normal,
    Low,
}

/// 渠道设置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// 是否播放提示音
    pub sound: bool,
    /// 是否振动
    pub vibration: bool,
    /// 是否同步到日历（仅日历渠道）
    pub calendar_sync: bool,
    /// 提前提醒的分钟数
    pub reminder_minutes: Option<u32>,
    /// 日历提供方，未设置时使用本地日历
    pub calendar_provider: Option<CalendarProvider>,
    pub priority: Option<NotificationPriority>,
}

/// 渠道配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub id: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub settings: ChannelSettings,
}

impl ChannelConfig {
    pub fn new(kind: ChannelKind, enabled: bool) -> Self {
        Self {
            id: kind.default_id().to_string(),
            kind,
            enabled,
            settings: ChannelSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ChannelSettings) -> Self {
        self.settings = settings;
        self
    }

    /// 缺省配置：渠道未配置时按禁用处理
    pub fn disabled(kind: ChannelKind) -> Self {
        Self::new(kind, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kind_serde() {
        let json = serde_json::to_string(&ChannelKind::InApp).unwrap();
        assert_eq!(json, "\"in-app\"");

        let kind: ChannelKind = serde_json::from_str("\"calendar\"").unwrap();
        assert_eq!(kind, ChannelKind::Calendar);
    }

    #[test]
    fn test_channel_config_defaults() {
        let config: ChannelConfig =
            serde_json::from_str(r#"{"id":"push","kind":"push"}"#).unwrap();

        assert!(!config.enabled);
        assert!(!config.settings.sound);
        assert_eq!(config.settings.calendar_provider, None);
    }

    #[test]
    fn test_priority_default_is_normal() {
        assert_eq!(NotificationPriority::default(), NotificationPriority::Normal);
        assert_eq!(CalendarProvider::default().to_string(), "local");
    }
}
