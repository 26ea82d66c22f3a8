//! 日历提供方实现
//!
//! 当前为模拟实现：转换逻辑完整，提交时只记录日志并生成事件 ID，
//! 生产环境需要在 `submit` 中接入各自的 SDK。

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use planner_shared::channels::CalendarProvider;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CalendarBackend, CalendarEvent, ProviderEvent, RecurrenceRule};
use crate::error::{NotificationError, Result};

fn log_submission(payload: &ProviderEvent) -> Result<String> {
    let body = serde_json::to_string(payload)?;
    let provider = payload.provider();
    let event_id = format!("{provider}_{}", Uuid::now_v7());
    debug!(provider = %provider, payload = %body, "提交日历事件");
    info!(provider = %provider, event_id = %event_id, "日历事件已创建");
    Ok(event_id)
}

// ==================== Google ====================

/// Google 日历的时间字段，全天事件只填 `date`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleDateTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl GoogleDateTime {
    fn new(at: &DateTime<Utc>, all_day: bool) -> Self {
        if all_day {
            Self {
                date_time: None,
                date: Some(at.format("%Y-%m-%d").to_string()),
            }
        } else {
            Self {
                date_time: Some(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
                date: None,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleReminder {
    pub method: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleReminders {
    pub use_default: bool,
    pub overrides: Vec<GoogleReminder>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoogleAttendee {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleEvent {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: GoogleDateTime,
    pub end: GoogleDateTime,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attendees: Vec<GoogleAttendee>,
    pub reminders: GoogleReminders,
    /// iCalendar 行（RRULE / EXDATE）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
}

/// Google 日历凭据
#[derive(Debug, Clone)]
pub struct GoogleCredentials {
    pub api_key: String,
    pub client_id: String,
}

pub struct GoogleCalendar {
    credentials: Option<GoogleCredentials>,
    calendar_id: String,
}

impl GoogleCalendar {
    pub fn new(credentials: Option<GoogleCredentials>) -> Self {
        Self {
            credentials,
            calendar_id: "primary".to_string(),
        }
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    fn reminders(minutes: Option<u32>) -> GoogleReminders {
        let reminder = |method: &str, minutes: u32| GoogleReminder {
            method: method.to_string(),
            minutes,
        };
        let overrides = match minutes {
            Some(minutes) => vec![reminder("popup", minutes)],
            // 未设置时：提前一天邮件 + 提前半小时弹窗
            None => vec![reminder("email", 24 * 60), reminder("popup", 30)],
        };
        GoogleReminders {
            use_default: false,
            overrides,
        }
    }
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Google
    }

    async fn initialize(&self) -> Result<()> {
        match &self.credentials {
            Some(credentials) => {
                debug!(client_id = %credentials.client_id, calendar_id = %self.calendar_id, "Google 日历已授权");
                Ok(())
            }
            None => Err(NotificationError::ProviderInit {
                provider: CalendarProvider::Google,
                message: "缺少 API 凭据".to_string(),
            }),
        }
    }

    fn to_provider_event(&self, event: &CalendarEvent) -> ProviderEvent {
        ProviderEvent::Google(GoogleEvent {
            summary: event.title.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start: GoogleDateTime::new(&event.start_time, event.is_all_day),
            end: GoogleDateTime::new(&event.end_time, event.is_all_day),
            attendees: event
                .attendees
                .iter()
                .map(|email| GoogleAttendee {
                    email: email.clone(),
                })
                .collect(),
            reminders: Self::reminders(event.reminder_minutes),
            recurrence: event.recurrence.as_ref().map(RecurrenceRule::to_ical_lines),
        })
    }

    async fn submit(&self, payload: ProviderEvent) -> Result<String> {
        if !matches!(payload, ProviderEvent::Google(_)) {
            return Err(NotificationError::PayloadMismatch {
                expected: CalendarProvider::Google,
            });
        }
        log_submission(&payload)
    }
}

// ==================== Apple ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_all_day: bool,
    /// 提醒偏移（分钟，负数表示提前）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarm_offset_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
}

pub struct AppleCalendar {
    access_granted: bool,
}

impl AppleCalendar {
    pub fn new(access_granted: bool) -> Self {
        Self { access_granted }
    }
}

#[async_trait]
impl CalendarBackend for AppleCalendar {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Apple
    }

    async fn initialize(&self) -> Result<()> {
        if self.access_granted {
            Ok(())
        } else {
            Err(NotificationError::ProviderInit {
                provider: CalendarProvider::Apple,
                message: "用户未授予日历访问权限".to_string(),
            })
        }
    }

    fn to_provider_event(&self, event: &CalendarEvent) -> ProviderEvent {
        ProviderEvent::Apple(AppleEvent {
            title: event.title.clone(),
            notes: event.description.clone(),
            location: event.location.clone(),
            start_date: event.start_time,
            end_date: event.end_time,
            is_all_day: event.is_all_day,
            alarm_offset_minutes: event.reminder_minutes.map(|m| -i64::from(m)),
            recurrence: event.recurrence.clone(),
        })
    }

    async fn submit(&self, payload: ProviderEvent) -> Result<String> {
        if !matches!(payload, ProviderEvent::Apple(_)) {
            return Err(NotificationError::PayloadMismatch {
                expected: CalendarProvider::Apple,
            });
        }
        log_submission(&payload)
    }
}

// ==================== Outlook ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookEvent {
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_minutes_before_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceRule>,
}

pub struct OutlookCalendar {
    mailbox: Option<String>,
}

impl OutlookCalendar {
    pub fn new(mailbox: Option<String>) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl CalendarBackend for OutlookCalendar {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Outlook
    }

    async fn initialize(&self) -> Result<()> {
        match &self.mailbox {
            Some(mailbox) => {
                debug!(mailbox = %mailbox, "Outlook 邮箱已就绪");
                Ok(())
            }
            None => Err(NotificationError::ProviderInit {
                provider: CalendarProvider::Outlook,
                message: "未配置邮箱".to_string(),
            }),
        }
    }

    fn to_provider_event(&self, event: &CalendarEvent) -> ProviderEvent {
        ProviderEvent::Outlook(OutlookEvent {
            subject: event.title.clone(),
            body: event.description.clone(),
            location: event.location.clone(),
            start: event.start_time,
            end: event.end_time,
            is_all_day: event.is_all_day,
            reminder_minutes_before_start: event.reminder_minutes,
            recurrence: event.recurrence.clone(),
        })
    }

    async fn submit(&self, payload: ProviderEvent) -> Result<String> {
        if !matches!(payload, ProviderEvent::Outlook(_)) {
            return Err(NotificationError::PayloadMismatch {
                expected: CalendarProvider::Outlook,
            });
        }
        log_submission(&payload)
    }
}

// ==================== 本地 ====================

/// 本地日历，事件原样保存
#[derive(Default)]
pub struct LocalCalendar;

impl LocalCalendar {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CalendarBackend for LocalCalendar {
    fn provider(&self) -> CalendarProvider {
        CalendarProvider::Local
    }

    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn to_provider_event(&self, event: &CalendarEvent) -> ProviderEvent {
        ProviderEvent::Local(event.clone())
    }

    async fn submit(&self, payload: ProviderEvent) -> Result<String> {
        if !matches!(payload, ProviderEvent::Local(_)) {
            return Err(NotificationError::PayloadMismatch {
                expected: CalendarProvider::Local,
            });
        }
        log_submission(&payload)
    }
}
