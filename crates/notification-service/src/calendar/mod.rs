//! 日历集成
//!
//! 同一个 [`CalendarEvent`] 由各提供方转换为自己的数据格式（[`ProviderEvent`]）后提交。
//! 提供方 SDK 被视为黑盒，藏在 [`CalendarBackend`] 之后。

mod providers;
mod recurrence;

pub use providers::{
    AppleCalendar, AppleEvent, GoogleAttendee, GoogleCalendar, GoogleCredentials,
    GoogleDateTime, GoogleEvent, GoogleReminder, GoogleReminders, LocalCalendar,
    OutlookCalendar, OutlookEvent,
};
pub use recurrence::{Frequency, RecurrenceRule};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use planner_shared::channels::CalendarProvider;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// 与提供方无关的日历事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// 提前提醒的分钟数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
    pub provider: CalendarProvider,
    #[serde(default)]
    pub is_all_day: bool,
}

impl CalendarEvent {
    /// 从 `start` 开始、持续 `minutes` 分钟的事件
    pub fn new(
        title: impl Into<String>,
        start: DateTime<Utc>,
        minutes: i64,
        provider: CalendarProvider,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            reminder_minutes: None,
            location: None,
            attendees: Vec::new(),
            recurrence: None,
            provider,
            is_all_day: false,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_reminder(mut self, minutes: Option<u32>) -> Self {
        self.reminder_minutes = minutes;
        self
    }

    pub fn with_recurrence(mut self, recurrence: Option<RecurrenceRule>) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_attendee(mut self, email: impl Into<String>) -> Self {
        self.attendees.push(email.into());
        self
    }
}

/// 各提供方的事件格式
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderEvent {
    Google(GoogleEvent),
    Apple(AppleEvent),
    Outlook(OutlookEvent),
    Local(CalendarEvent),
}

impl ProviderEvent {
    pub fn provider(&self) -> CalendarProvider {
        match self {
            Self::Google(_) => CalendarProvider::Google,
            Self::Apple(_) => CalendarProvider::Apple,
            Self::Outlook(_) => CalendarProvider::Outlook,
            Self::Local(_) => CalendarProvider::Local,
        }
    }
}

/// 日历提供方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    fn provider(&self) -> CalendarProvider;

    /// 建立连接、申请授权；失败时该提供方在本次会话中不可用
    async fn initialize(&self) -> Result<()>;

    /// 转换为提供方格式（只做字段翻译）
    fn to_provider_event(&self, event: &CalendarEvent) -> ProviderEvent;

    /// 提交事件，返回提供方生成的事件 ID
    async fn submit(&self, payload: ProviderEvent) -> Result<String>;
}
