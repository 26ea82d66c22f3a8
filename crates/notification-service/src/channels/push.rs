//! 推送通知渠道
//!
//! 推送服务（Service Worker、FCM、APNs 等）藏在 [`PushGateway`] 之后。
//! 网关初始化成功前渠道不可用。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use planner_shared::channels::{ChannelConfig, ChannelKind, ChannelSettings};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::NotificationChannel;
use crate::error::Result;
use crate::types::{ChannelResult, Notification, NotificationAction};

/// 开启振动时使用的振动模式（毫秒）
pub const VIBRATION_PATTERN: [u32; 3] = [200, 100, 200];

/// 推送内容
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
    pub silent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vibrate: Option<Vec<u32>>,
    pub data: HashMap<String, serde_json::Value>,
}

impl PushPayload {
    /// 按渠道设置生成推送内容：关闭声音即静默，开启振动附带振动模式
    pub fn build(notification: &Notification, settings: &ChannelSettings) -> Self {
        let options = &notification.options;
        Self {
            title: notification.title.clone(),
            body: options.body.clone(),
            icon: options.icon.clone(),
            tag: options.tag.clone(),
            require_interaction: options.require_interaction,
            actions: options.actions.clone(),
            silent: !settings.sound,
            vibrate: settings.vibration.then(|| VIBRATION_PATTERN.to_vec()),
            data: options.data.clone(),
        }
    }
}

/// 推送网关
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushGateway: Send + Sync {
    /// 申请权限、注册服务
    async fn initialize(&self) -> Result<()>;

    /// 展示推送，返回消息 ID
    async fn show(&self, payload: PushPayload) -> Result<String>;
}

/// 只记录日志的推送网关，用于本地运行
#[derive(Default)]
pub struct LogPushGateway;

#[async_trait]
impl PushGateway for LogPushGateway {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn show(&self, payload: PushPayload) -> Result<String> {
        let message_id = format!("push_{}", Uuid::now_v7());
        info!(
            message_id = %message_id,
            title = %payload.title,
            silent = payload.silent,
            "推送已发送"
        );
        Ok(message_id)
    }
}

pub struct PushChannel {
    gateway: Arc<dyn PushGateway>,
    ready: AtomicBool,
}

impl PushChannel {
    pub fn new(gateway: Arc<dyn PushGateway>) -> Self {
        Self {
            gateway,
            ready: AtomicBool::new(false),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[async_trait]
impl NotificationChannel for PushChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn name(&self) -> &str {
        "Push"
    }

    async fn initialize(&self) -> Result<()> {
        self.gateway.initialize().await?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn send(
        &self,
        notification: &Notification,
        config: &ChannelConfig,
    ) -> Result<ChannelResult> {
        let start = Instant::now();

        if !self.is_ready() {
            warn!(
                notification_id = %notification.notification_id,
                "推送网关未就绪，跳过推送"
            );
            return Ok(ChannelResult::skipped(ChannelKind::Push, "推送网关不可用"));
        }

        let payload = PushPayload::build(notification, &config.settings);
        debug!(
            notification_id = %notification.notification_id,
            silent = payload.silent,
            vibrate = payload.vibrate.is_some(),
            "推送发送中"
        );

        match self.gateway.show(payload).await {
            Ok(message_id) => Ok(ChannelResult::success(
                ChannelKind::Push,
                Some(message_id),
                start.elapsed().as_millis() as u64,
            )),
            Err(e) => Ok(ChannelResult::failed(
                ChannelKind::Push,
                e.to_string(),
                start.elapsed().as_millis() as u64,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotificationError;
    use crate::types::{NotificationOptions, SendStatus};

    fn push_config(sound: bool, vibration: bool) -> ChannelConfig {
        ChannelConfig::new(ChannelKind::Push, true).with_settings(ChannelSettings {
            sound,
            vibration,
            ..Default::default()
        })
    }

    fn notification() -> Notification {
        Notification::new("午餐提醒", NotificationOptions::new().with_body("12:00 开饭"))
    }

    #[test]
    fn test_payload_respects_settings() {
        let quiet = PushPayload::build(&notification(), &push_config(false, false).settings);
        assert!(quiet.silent);
        assert!(quiet.vibrate.is_none());

        let loud = PushPayload::build(&notification(), &push_config(true, true).settings);
        assert!(!loud.silent);
        assert_eq!(loud.vibrate, Some(vec![200, 100, 200]));
    }

    #[tokio::test]
    async fn test_send_before_initialize_is_skipped() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_show().never();

        let channel = PushChannel::new(Arc::new(gateway));
        let result = channel.send(&notification(), &push_config(true, false)).await.unwrap();
        assert_eq!(result.status, SendStatus::Skipped);
    }

    #[tokio::test]
    async fn test_send_success() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_initialize().times(1).returning(|| Ok(()));
        gateway
            .expect_show()
            .withf(|payload| payload.title == "午餐提醒" && payload.vibrate.is_some())
            .times(1)
            .returning(|_| Ok("msg-1".to_string()));

        let channel = PushChannel::new(Arc::new(gateway));
        channel.initialize().await.unwrap();
        let result = channel.send(&notification(), &push_config(true, true)).await.unwrap();

        assert_eq!(result.status, SendStatus::Success);
        assert_eq!(result.external_id.as_deref(), Some("msg-1"));
    }

    #[tokio::test]
    async fn test_gateway_failure_becomes_failed_result() {
        let mut gateway = MockPushGateway::new();
        gateway.expect_initialize().returning(|| Ok(()));
        gateway
            .expect_show()
            .returning(|_| Err(NotificationError::Push("网关超时".to_string())));

        let channel = PushChannel::new(Arc::new(gateway));
        channel.initialize().await.unwrap();
        let result = channel.send(&notification(), &push_config(true, false)).await.unwrap();

        assert_eq!(result.status, SendStatus::Failed);
        assert!(result.error.unwrap().contains("网关超时"));
    }

    #[tokio::test]
    async fn test_failed_initialize_keeps_channel_unavailable() {
        let mut gateway = MockPushGateway::new();
        gateway
            .expect_initialize()
            .returning(|| Err(NotificationError::PushInit("权限被拒绝".to_string())));

        let channel = PushChannel::new(Arc::new(gateway));
        assert!(channel.initialize().await.is_err());
        assert!(!channel.is_ready());
    }
}
