//! 日历渠道
//!
//! 每个提供方对应一个 [`CalendarBackend`]，只有 `initialize` 成功的提供方可用。
//! 渠道设置中未指定提供方时使用本地日历。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use planner_shared::channels::{CalendarProvider, ChannelConfig, ChannelKind};
use tracing::{error, info, warn};

use super::NotificationChannel;
use crate::calendar::{CalendarBackend, CalendarEvent};
use crate::error::{NotificationError, Result};
use crate::types::{ChannelResult, Notification};

pub struct CalendarChannel {
    backends: HashMap<CalendarProvider, Arc<dyn CalendarBackend>>,
    ready: RwLock<HashSet<CalendarProvider>>,
    /// 事件时长（分钟）
    event_minutes: i64,
}

impl CalendarChannel {
    pub fn new(event_minutes: i64) -> Self {
        Self {
            backends: HashMap::new(),
            ready: RwLock::new(HashSet::new()),
            event_minutes,
        }
    }

    /// 注册提供方，同一提供方重复注册时后者生效
    pub fn with_backend(mut self, backend: Arc<dyn CalendarBackend>) -> Self {
        self.backends.insert(backend.provider(), backend);
        self
    }

    pub fn is_available(&self, provider: CalendarProvider) -> bool {
        self.ready.read().contains(&provider)
    }

    pub fn available_providers(&self) -> Vec<CalendarProvider> {
        let mut providers: Vec<_> = self.ready.read().iter().copied().collect();
        providers.sort_by_key(|p| p.to_string());
        providers
    }

    fn event_for(
        &self,
        notification: &Notification,
        provider: CalendarProvider,
        reminder: Option<u32>,
    ) -> CalendarEvent {
        CalendarEvent::new(
            notification.title.clone(),
            Utc::now(),
            self.event_minutes,
            provider,
        )
        .with_description(notification.options.body.clone())
        .with_reminder(reminder)
        .with_recurrence(notification.options.recurrence.clone())
    }
}

#[async_trait]
impl NotificationChannel for CalendarChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Calendar
    }

    fn name(&self) -> &str {
        "Calendar"
    }

    /// 逐个初始化提供方，单个失败不影响其他提供方
    async fn initialize(&self) -> Result<()> {
        for (provider, backend) in &self.backends {
            match backend.initialize().await {
                Ok(()) => {
                    self.ready.write().insert(*provider);
                    info!(provider = %provider, "日历提供方初始化完成");
                }
                Err(e) => {
                    self.ready.write().remove(provider);
                    error!(provider = %provider, error = %e, "日历提供方初始化失败");
                }
            }
        }
        Ok(())
    }

    async fn send(
        &self,
        notification: &Notification,
        config: &ChannelConfig,
    ) -> Result<ChannelResult> {
        let start = Instant::now();
        let settings = &config.settings;

        if !settings.calendar_sync {
            return Ok(ChannelResult::skipped(
                ChannelKind::Calendar,
                "未开启日历同步",
            ));
        }

        let provider = settings.calendar_provider.unwrap_or_default();
        let backend = match self.backends.get(&provider) {
            Some(backend) if self.is_available(provider) => backend.clone(),
            _ => {
                let err = NotificationError::ProviderUnavailable(provider);
                error!(
                    notification_id = %notification.notification_id,
                    provider = %provider,
                    "日历提供方不可用"
                );
                return Ok(ChannelResult::skipped(ChannelKind::Calendar, err.to_string()));
            }
        };

        let event = self.event_for(notification, provider, settings.reminder_minutes);
        let payload = backend.to_provider_event(&event);

        match backend.submit(payload).await {
            Ok(event_id) => {
                info!(
                    notification_id = %notification.notification_id,
                    provider = %provider,
                    event_id = %event_id,
                    "日历事件已创建"
                );
                Ok(ChannelResult::success(
                    ChannelKind::Calendar,
                    Some(event_id),
                    start.elapsed().as_millis() as u64,
                ))
            }
            Err(e) => {
                warn!(
                    notification_id = %notification.notification_id,
                    provider = %provider,
                    error = %e,
                    "日历事件创建失败"
                );
                Ok(ChannelResult::failed(
                    ChannelKind::Calendar,
                    e.to_string(),
                    start.elapsed().as_millis() as u64,
                ))
            }
        }
    }
}
