//! 通知服务
//!
//! 负责把一条通知分发到已启用的渠道。各渠道并行投递，
//! 单个渠道失败（包括 panic）只反映在该渠道的结果里，不影响其他渠道。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use planner_shared::channels::{ChannelConfig, ChannelKind, NotificationPriority};
use planner_shared::config::NotificationConfig;
use planner_shared::observability::metrics;
use toast_service::ToastProvider;
use tracing::{debug, error, info, instrument, warn};

use crate::calendar::{CalendarBackend, LocalCalendar};
use crate::channels::{
    CalendarChannel, InAppChannel, LogPushGateway, NotificationChannel, PushChannel,
};
use crate::types::{
    ChannelResult, Notification, NotificationGroup, NotificationOptions, NotificationReport,
};

/// 普通通知依次尝试的渠道
const DIRECT_CHANNELS: [ChannelKind; 3] =
    [ChannelKind::InApp, ChannelKind::Push, ChannelKind::Calendar];

/// 分组汇总通知只走站内与推送
const AGGREGATE_CHANNELS: [ChannelKind; 2] = [ChannelKind::InApp, ChannelKind::Push];

pub struct NotificationService {
    channels: HashMap<ChannelKind, Arc<dyn NotificationChannel>>,
    configs: RwLock<Vec<ChannelConfig>>,
    groups: Mutex<HashMap<String, NotificationGroup>>,
}

impl NotificationService {
    pub fn new(configs: Vec<ChannelConfig>) -> Self {
        Self {
            channels: HashMap::new(),
            configs: RwLock::new(configs),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// 按配置组装默认渠道：站内 toast、日志推送网关和给定的日历提供方
    ///
    /// 未提供日历提供方时只注册本地日历。
    pub fn from_config(
        config: &NotificationConfig,
        provider: Arc<ToastProvider>,
        calendars: Vec<Arc<dyn CalendarBackend>>,
    ) -> Self {
        let calendars = if calendars.is_empty() {
            vec![Arc::new(LocalCalendar::new()) as Arc<dyn CalendarBackend>]
        } else {
            calendars
        };
        let calendar = calendars
            .into_iter()
            .fold(CalendarChannel::new(config.calendar_event_minutes), |channel, backend| {
                channel.with_backend(backend)
            });

        let mut service = Self::new(config.channels.clone());
        service.register_channel(Arc::new(InAppChannel::new(provider)));
        service.register_channel(Arc::new(PushChannel::new(Arc::new(LogPushGateway))));
        service.register_channel(Arc::new(calendar));
        service
    }

    /// 注册渠道实现，同类渠道重复注册时后者生效
    pub fn register_channel(&mut self, channel: Arc<dyn NotificationChannel>) {
        info!(channel = channel.name(), "注册通知渠道");
        self.channels.insert(channel.kind(), channel);
    }

    /// 初始化所有渠道后端
    ///
    /// 初始化失败只记录日志，对应渠道（或日历提供方）保持不可用。
    pub async fn initialize(&self) {
        for channel in self.channels.values() {
            match channel.initialize().await {
                Ok(()) => debug!(channel = channel.name(), "渠道初始化完成"),
                Err(e) => error!(channel = channel.name(), error = %e, "渠道初始化失败"),
            }
        }
    }

    /// 替换全部渠道配置
    pub fn update_channels(&self, configs: Vec<ChannelConfig>) {
        info!(count = configs.len(), "更新渠道配置");
        *self.configs.write() = configs;
    }

    pub fn channels(&self) -> Vec<ChannelConfig> {
        self.configs.read().clone()
    }

    /// 查询渠道配置，未配置的渠道按禁用处理
    pub fn channel_config(&self, kind: ChannelKind) -> ChannelConfig {
        self.configs
            .read()
            .iter()
            .find(|c| c.kind == kind)
            .cloned()
            .unwrap_or_else(|| ChannelConfig::disabled(kind))
    }

    pub fn group(&self, group_id: &str) -> Option<NotificationGroup> {
        self.groups.lock().get(group_id).cloned()
    }

    pub fn groups(&self) -> Vec<NotificationGroup> {
        let mut groups: Vec<_> = self.groups.lock().values().cloned().collect();
        groups.sort_by_key(|g| g.created_at);
        groups
    }

    /// 移除分组及其累积的成员，返回被移除的分组
    ///
    /// 之后同 group id 的通知从新分组重新计数。
    pub fn clear_group(&self, group_id: &str) -> Option<NotificationGroup> {
        let removed = self.groups.lock().remove(group_id);
        if let Some(group) = &removed {
            info!(group_id = %group_id, members = group.notifications.len(), "清空通知分组");
        }
        removed
    }

    /// 移除全部分组，返回移除数量
    pub fn clear_groups(&self) -> usize {
        let mut groups = self.groups.lock();
        let count = groups.len();
        groups.clear();
        info!(count, "清空全部通知分组");
        count
    }

    /// 发送通知
    ///
    /// 带 group id 的通知先进入分组；分组为高优先级时改为投递分组汇总通知。
    #[instrument(skip(self, options), fields(group_id = ?options.group_id))]
    pub async fn send_notification(
        &self,
        title: &str,
        options: NotificationOptions,
    ) -> NotificationReport {
        let notification = Notification::new(title, options);

        if let Some(aggregate) = self.add_to_group(&notification) {
            info!(
                notification_id = %notification.notification_id,
                aggregate_id = %aggregate.notification_id,
                "高优先级分组，发送汇总通知"
            );
            return self.dispatch(&aggregate, &AGGREGATE_CHANNELS, true).await;
        }

        self.dispatch(&notification, &DIRECT_CHANNELS, false).await
    }

    /// 调整分组优先级
    ///
    /// 分组被提升为高优先级时立即投递汇总通知并返回结果；分组不存在时返回 None。
    pub async fn set_group_priority(
        &self,
        group_id: &str,
        priority: NotificationPriority,
    ) -> Option<NotificationReport> {
        let aggregate = {
            let mut groups = self.groups.lock();
            let group = groups.get_mut(group_id)?;
            let raised = priority == NotificationPriority::High && !group.is_high_priority();
            group.priority = priority;
            raised.then(|| group.aggregate())
        };

        match aggregate {
            Some(aggregate) => {
                info!(group_id = %group_id, "分组升级为高优先级");
                Some(self.dispatch(&aggregate, &AGGREGATE_CHANNELS, true).await)
            }
            None => None,
        }
    }

    /// 把通知加入分组；分组为高优先级时返回汇总通知
    fn add_to_group(&self, notification: &Notification) -> Option<Notification> {
        let group_id = notification.options.group_id.as_ref()?;
        let mut groups = self.groups.lock();
        let group = groups.entry(group_id.clone()).or_insert_with(|| {
            NotificationGroup::new(
                group_id.clone(),
                notification.options.priority.unwrap_or_default(),
            )
        });
        group.push(notification.clone());
        group.is_high_priority().then(|| group.aggregate())
    }

    async fn dispatch(
        &self,
        notification: &Notification,
        kinds: &[ChannelKind],
        aggregated: bool,
    ) -> NotificationReport {
        let start = Instant::now();
        let mut results = Vec::with_capacity(kinds.len());
        let mut pending = Vec::new();

        for &kind in kinds {
            let config = self.channel_config(kind);
            if !config.enabled {
                debug!(channel = %kind, "渠道已禁用");
                results.push(ChannelResult::skipped(kind, "渠道已禁用"));
                continue;
            }
            let Some(channel) = self.channels.get(&kind).cloned() else {
                warn!(channel = %kind, "渠道未注册");
                results.push(ChannelResult::skipped(kind, "渠道未注册"));
                continue;
            };
            pending.push(Self::send_isolated(channel, notification, config));
        }

        results.extend(join_all(pending).await);
        results.sort_by_key(|r| kinds.iter().position(|k| *k == r.channel));

        let report = NotificationReport::new(
            notification.notification_id.clone(),
            aggregated,
            results,
            start.elapsed().as_millis() as u64,
        );

        info!(
            notification_id = %report.notification_id,
            aggregated = report.aggregated,
            success = report.success_count(),
            failed = report.failure_count(),
            duration_ms = report.duration_ms,
            "通知发送完成"
        );

        report
    }

    /// 单渠道投递，错误与 panic 都转换为失败结果
    async fn send_isolated(
        channel: Arc<dyn NotificationChannel>,
        notification: &Notification,
        config: ChannelConfig,
    ) -> ChannelResult {
        let kind = channel.kind();
        let start = Instant::now();

        let outcome = AssertUnwindSafe(channel.send(notification, &config))
            .catch_unwind()
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!(channel = channel.name(), error = %e, "渠道发送失败");
                ChannelResult::failed(kind, e.to_string(), elapsed_ms)
            }
            Err(_) => {
                error!(channel = channel.name(), "渠道发送时发生 panic");
                ChannelResult::failed(kind, "渠道发送异常", elapsed_ms)
            }
        };

        metrics::record_channel_delivery(
            kind.default_id(),
            result.status.as_str(),
            start.elapsed().as_secs_f64(),
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::types::SendStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 记录调用次数的测试渠道
    struct CountingChannel {
        kind: ChannelKind,
        calls: AtomicUsize,
        behaviour: Behaviour,
    }

    enum Behaviour {
        Succeed,
        Error,
        Panic,
    }

    impl CountingChannel {
        fn new(kind: ChannelKind, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                kind,
                calls: AtomicUsize::new(0),
                behaviour,
            })
        }
    }

    #[async_trait]
    impl NotificationChannel for CountingChannel {
        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn name(&self) -> &str {
            "counting"
        }

        async fn send(
            &self,
            notification: &Notification,
            _config: &ChannelConfig,
        ) -> crate::error::Result<ChannelResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(ChannelResult::success(
                    self.kind,
                    Some(notification.title.clone()),
                    0,
                )),
                Behaviour::Error => Err(NotificationError::Push("连接被拒绝".to_string())),
                Behaviour::Panic => panic!("渠道崩溃"),
            }
        }
    }

    fn all_enabled() -> Vec<ChannelConfig> {
        vec![
            ChannelConfig::new(ChannelKind::InApp, true),
            ChannelConfig::new(ChannelKind::Push, true),
            ChannelConfig::new(ChannelKind::Calendar, true),
        ]
    }

    #[tokio::test]
    async fn test_disabled_channels_are_skipped() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let push = CountingChannel::new(ChannelKind::Push, Behaviour::Succeed);

        let mut service = NotificationService::new(vec![
            ChannelConfig::new(ChannelKind::InApp, true),
            ChannelConfig::disabled(ChannelKind::Push),
        ]);
        service.register_channel(in_app.clone());
        service.register_channel(push.clone());

        let report = service.send_notification("提醒", NotificationOptions::new()).await;

        assert_eq!(report.status_of(ChannelKind::InApp), Some(SendStatus::Success));
        assert_eq!(report.status_of(ChannelKind::Push), Some(SendStatus::Skipped));
        assert_eq!(report.status_of(ChannelKind::Calendar), Some(SendStatus::Skipped));
        assert_eq!(push.calls.load(Ordering::SeqCst), 0);
        assert!(!report.aggregated);
    }

    #[tokio::test]
    async fn test_channel_error_and_panic_are_isolated() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let push = CountingChannel::new(ChannelKind::Push, Behaviour::Error);
        let calendar = CountingChannel::new(ChannelKind::Calendar, Behaviour::Panic);

        let mut service = NotificationService::new(all_enabled());
        service.register_channel(in_app);
        service.register_channel(push);
        service.register_channel(calendar);

        let report = service.send_notification("提醒", NotificationOptions::new()).await;

        assert_eq!(report.status_of(ChannelKind::InApp), Some(SendStatus::Success));
        assert_eq!(report.status_of(ChannelKind::Push), Some(SendStatus::Failed));
        assert_eq!(report.status_of(ChannelKind::Calendar), Some(SendStatus::Failed));
        assert_eq!(
            report.channel_results.iter().map(|r| r.channel).collect::<Vec<_>>(),
            DIRECT_CHANNELS.to_vec()
        );
    }

    #[tokio::test]
    async fn test_high_priority_group_sends_aggregate() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let calendar = CountingChannel::new(ChannelKind::Calendar, Behaviour::Succeed);

        let mut service = NotificationService::new(all_enabled());
        service.register_channel(in_app.clone());
        service.register_channel(calendar.clone());

        let options = || {
            NotificationOptions::new()
                .with_group("pantry")
                .with_priority(NotificationPriority::High)
        };
        service.send_notification("牛奶快过期了", options()).await;
        let report = service.send_notification("鸡蛋快过期了", options()).await;

        assert!(report.aggregated);
        let in_app_result = report.result_for(ChannelKind::InApp).unwrap();
        assert_eq!(in_app_result.external_id.as_deref(), Some("分组 pantry"));
        assert!(report.result_for(ChannelKind::Calendar).is_none());
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.group("pantry").unwrap().notifications.len(), 2);
    }

    #[tokio::test]
    async fn test_normal_group_sends_individually() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let mut service = NotificationService::new(all_enabled());
        service.register_channel(in_app.clone());

        let report = service
            .send_notification("晚餐计划", NotificationOptions::new().with_group("dinner"))
            .await;

        assert!(!report.aggregated);
        assert_eq!(
            report.result_for(ChannelKind::InApp).unwrap().external_id.as_deref(),
            Some("晚餐计划")
        );
        assert_eq!(
            service.group("dinner").unwrap().priority,
            NotificationPriority::Normal
        );
    }

    #[tokio::test]
    async fn test_raising_group_priority_surfaces_aggregate() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let mut service = NotificationService::new(all_enabled());
        service.register_channel(in_app.clone());

        service
            .send_notification("a", NotificationOptions::new().with_group("g"))
            .await;
        assert!(service.set_group_priority("missing", NotificationPriority::High).await.is_none());
        assert!(service.set_group_priority("g", NotificationPriority::Low).await.is_none());

        let report = service
            .set_group_priority("g", NotificationPriority::High)
            .await
            .unwrap();
        assert!(report.aggregated);
        assert_eq!(in_app.calls.load(Ordering::SeqCst), 2);

        // 已是高优先级，不再重复汇总
        assert!(service.set_group_priority("g", NotificationPriority::High).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_group_restarts_count() {
        let in_app = CountingChannel::new(ChannelKind::InApp, Behaviour::Succeed);
        let mut service = NotificationService::new(all_enabled());
        service.register_channel(in_app.clone());

        let options = |group: &str| {
            NotificationOptions::new()
                .with_group(group)
                .with_priority(NotificationPriority::High)
        };
        for title in ["牛奶", "鸡蛋", "面包"] {
            service.send_notification(title, options("pantry")).await;
        }
        service.send_notification("晚餐", options("dinner")).await;

        let cleared = service.clear_group("pantry").unwrap();
        assert_eq!(cleared.notifications.len(), 3);
        assert!(service.group("pantry").is_none());
        assert!(service.clear_group("pantry").is_none());

        service.send_notification("黄油", options("pantry")).await;
        assert_eq!(service.group("pantry").unwrap().notifications.len(), 1);

        assert_eq!(service.clear_groups(), 2);
        assert!(service.groups().is_empty());
    }

    #[tokio::test]
    async fn test_update_channels() {
        let service = NotificationService::new(all_enabled());
        assert!(service.channel_config(ChannelKind::Push).enabled);

        service.update_channels(vec![ChannelConfig::new(ChannelKind::InApp, true)]);
        assert!(!service.channel_config(ChannelKind::Push).enabled);
        assert_eq!(service.channels().len(), 1);
    }
}
