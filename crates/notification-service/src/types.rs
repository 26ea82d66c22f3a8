//! 通知类型定义

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use planner_shared::channels::{ChannelKind, NotificationPriority};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::RecurrenceRule;

/// 通知上的操作按钮
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

impl NotificationAction {
    pub fn new(action: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            title: title.into(),
        }
    }
}

/// 发送参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: Option<String>,
    pub tag: Option<String>,
    /// 为 true 时需要用户手动关闭
    pub require_interaction: bool,
    /// 新建分组时使用的优先级
    pub priority: Option<NotificationPriority>,
    pub group_id: Option<String>,
    pub actions: Vec<NotificationAction>,
    /// 写入日历时的重复规则
    pub recurrence: Option<RecurrenceRule>,
    pub data: HashMap<String, serde_json::Value>,
}

impl NotificationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn require_interaction(mut self) -> Self {
        self.require_interaction = true;
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceRule) -> Self {
        self.recurrence = Some(recurrence);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// 一条待投递的通知
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: String,
    pub title: String,
    #[serde(flatten)]
    pub options: NotificationOptions,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, options: NotificationOptions) -> Self {
        Self {
            notification_id: Uuid::now_v7().to_string(),
            title: title.into(),
            options,
            created_at: Utc::now(),
        }
    }

    pub fn body(&self) -> Option<&str> {
        self.options.body.as_deref()
    }
}

/// 通知分组
///
/// 同一 group id 的通知在此累积；高优先级分组以一条汇总通知展示。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    pub id: String,
    pub title: String,
    pub priority: NotificationPriority,
    pub notifications: Vec<Notification>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationGroup {
    pub fn new(id: impl Into<String>, priority: NotificationPriority) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            title: format!("分组 {id}"),
            id,
            priority,
            notifications: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, notification: Notification) {
        self.notifications.push(notification);
        self.updated_at = Utc::now();
    }

    pub fn is_high_priority(&self) -> bool {
        self.priority == NotificationPriority::High
    }

    /// 汇总通知：显示成员数量，需要用户手动关闭
    pub fn aggregate(&self) -> Notification {
        let options = NotificationOptions::new()
            .with_body(format!("{} 条新通知", self.notifications.len()))
            .with_icon("/icons/notification-group.png")
            .with_tag(self.id.clone())
            .require_interaction()
            .with_action(NotificationAction::new("view", "查看全部"))
            .with_action(NotificationAction::new("dismiss", "忽略"));
        Notification::new(self.title.clone(), options)
    }
}

/// 单渠道投递状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendStatus {
    Success,
    Failed,
    /// 渠道被禁用或不可用
    Skipped,
}

impl SendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// 单渠道投递结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    pub channel: ChannelKind,
    pub status: SendStatus,
    pub error: Option<String>,
    /// 外部系统返回的 ID（toast id、推送消息 id、日历事件 id）
    pub external_id: Option<String>,
    pub duration_ms: u64,
}

impl ChannelResult {
    pub fn success(channel: ChannelKind, external_id: Option<String>, duration_ms: u64) -> Self {
        Self {
            channel,
            status: SendStatus::Success,
            error: None,
            external_id,
            duration_ms,
        }
    }

    pub fn failed(channel: ChannelKind, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            channel,
            status: SendStatus::Failed,
            error: Some(error.into()),
            external_id: None,
            duration_ms,
        }
    }

    pub fn skipped(channel: ChannelKind, reason: impl Into<String>) -> Self {
        Self {
            channel,
            status: SendStatus::Skipped,
            error: Some(reason.into()),
            external_id: None,
            duration_ms: 0,
        }
    }
}

/// 一次发送的汇总结果
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationReport {
    pub notification_id: String,
    /// 分组已升级为汇总通知时为 true，此时投递的是汇总通知
    pub aggregated: bool,
    pub channel_results: Vec<ChannelResult>,
    pub duration_ms: u64,
    pub sent_at: DateTime<Utc>,
}

impl NotificationReport {
    pub fn new(
        notification_id: String,
        aggregated: bool,
        channel_results: Vec<ChannelResult>,
        duration_ms: u64,
    ) -> Self {
        Self {
            notification_id,
            aggregated,
            channel_results,
            duration_ms,
            sent_at: Utc::now(),
        }
    }

    pub fn result_for(&self, channel: ChannelKind) -> Option<&ChannelResult> {
        self.channel_results.iter().find(|r| r.channel == channel)
    }

    pub fn status_of(&self, channel: ChannelKind) -> Option<SendStatus> {
        self.result_for(channel).map(|r| r.status)
    }

    pub fn success_count(&self) -> usize {
        self.count(SendStatus::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(SendStatus::Failed)
    }

    fn count(&self, status: SendStatus) -> usize {
        self.channel_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }
}
