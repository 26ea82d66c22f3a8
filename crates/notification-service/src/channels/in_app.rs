//! 站内通知渠道
//!
//! 把通知转换为 toast 交给 [`ToastProvider`]。通知的 group id 同时作为 toast 的分组，
//! 调用方可以用 `dismiss_group` 一次性收起同组的站内通知。
//!
//! 带 tag 的通知同一时刻只保留一条 toast：新通知到达时替换同 tag 的旧 toast，
//! 分组聚合通知靠这一点避免在屏幕上堆叠。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use planner_shared::channels::{ChannelConfig, ChannelKind};
use toast_service::{ActionAnalytics, ToastAction, ToastOptions, ToastProvider};
use tracing::debug;

use super::NotificationChannel;
use crate::error::Result;
use crate::types::{ChannelResult, Notification};

pub struct InAppChannel {
    provider: Arc<ToastProvider>,
    /// tag -> 当前展示该 tag 的 toast id
    tagged: Mutex<HashMap<String, String>>,
}

impl InAppChannel {
    pub fn new(provider: Arc<ToastProvider>) -> Self {
        Self {
            provider,
            tagged: Mutex::new(HashMap::new()),
        }
    }

    /// 投递 toast；带 tag 时先移除同 tag 的上一条
    fn show(&self, notification: &Notification) -> String {
        let options = Self::to_toast(notification);
        let Some(tag) = &notification.options.tag else {
            return self.provider.toast(options);
        };

        let mut tagged = self.tagged.lock();
        if let Some(previous) = tagged.remove(tag)
            && self.provider.dismiss(&previous)
        {
            debug!(tag = %tag, toast_id = %previous, "替换同 tag 的站内通知");
        }
        let toast_id = self.provider.toast(options);
        tagged.insert(tag.clone(), toast_id.clone());
        toast_id
    }

    fn to_toast(notification: &Notification) -> ToastOptions {
        let options = &notification.options;
        let mut toast = ToastOptions::info(notification.title.clone(), options.body.clone());

        if options.require_interaction {
            toast = toast.persistent();
        }
        if let Some(group_id) = &options.group_id {
            toast = toast.with_group(group_id.clone());
        }
        for action in &options.actions {
            toast = toast.with_action(ToastAction::new(action.title.clone()).with_analytics(
                ActionAnalytics {
                    category: Some("notification".to_string()),
                    action: Some(action.action.clone()),
                    label: Some(notification.notification_id.clone()),
                },
            ));
        }
        toast
    }
}

#[async_trait]
impl NotificationChannel for InAppChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::InApp
    }

    fn name(&self) -> &str {
        "In-App"
    }

    async fn send(
        &self,
        notification: &Notification,
        _config: &ChannelConfig,
    ) -> Result<ChannelResult> {
        let start = Instant::now();
        let toast_id = self.show(notification);

        debug!(
            notification_id = %notification.notification_id,
            toast_id = %toast_id,
            "站内通知已投递"
        );

        Ok(ChannelResult::success(
            ChannelKind::InApp,
            Some(toast_id),
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationAction, NotificationOptions, SendStatus};
    use planner_shared::config::ToastConfig;
    use toast_service::{TemplateRegistry, ToastVariant};

    #[tokio::test(start_paused = true)]
    async fn test_in_app_delivers_toast() {
        let provider = Arc::new(ToastProvider::new(
            &ToastConfig::default(),
            Arc::new(TemplateRegistry::with_defaults()),
        ));
        let channel = InAppChannel::new(provider.clone());
        let notification = Notification::new(
            "购物清单已更新",
            NotificationOptions::new()
                .with_body("新增 3 项")
                .with_group("shopping")
                .require_interaction()
                .with_action(NotificationAction::new("view", "查看")),
        );

        let result = channel
            .send(&notification, &ChannelConfig::new(ChannelKind::InApp, true))
            .await
            .unwrap();
        assert_eq!(result.status, SendStatus::Success);

        let toast_id = result.external_id.unwrap();
        let toast = provider.store().get(&toast_id).unwrap();
        assert_eq!(toast.title, "购物清单已更新");
        assert_eq!(toast.description.as_deref(), Some("新增 3 项"));
        assert_eq!(toast.variant, ToastVariant::Info);
        assert!(toast.persistent);
        assert_eq!(toast.group_id.as_deref(), Some("shopping"));
        assert_eq!(toast.actions[0].label, "查看");
    }

    #[tokio::test(start_paused = true)]
    async fn test_tagged_notification_replaces_previous_toast() {
        let provider = Arc::new(ToastProvider::new(
            &ToastConfig::default(),
            Arc::new(TemplateRegistry::new()),
        ));
        let channel = InAppChannel::new(provider.clone());
        let config = ChannelConfig::new(ChannelKind::InApp, true);

        let mut last = None;
        for n in 1..=4 {
            let notification = Notification::new(
                "分组 pantry",
                NotificationOptions::new()
                    .with_body(format!("{n} 条新通知"))
                    .with_tag("pantry")
                    .require_interaction(),
            );
            let result = channel.send(&notification, &config).await.unwrap();
            last = result.external_id;
        }
        let untagged = channel
            .send(&Notification::new("牛奶快过期", NotificationOptions::new()), &config)
            .await
            .unwrap()
            .external_id
            .unwrap();

        let last = last.unwrap();
        assert_eq!(provider.store().active_ids(), vec![last.clone(), untagged]);
        let toast = provider.store().get(&last).unwrap();
        assert_eq!(toast.description.as_deref(), Some("4 条新通知"));
    }
}
