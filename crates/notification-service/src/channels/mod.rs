//! 通知渠道实现
//!
//! ## 支持的渠道
//!
//! - **InApp**: 站内通知，投递为 toast
//! - **Push**: 系统推送，经由 [`PushGateway`]
//! - **Calendar**: 日历事件，经由各 [`CalendarBackend`](crate::calendar::CalendarBackend)

mod calendar;
mod in_app;
mod push;

pub use calendar::CalendarChannel;
pub use in_app::InAppChannel;
pub use push::{LogPushGateway, PushChannel, PushGateway, PushPayload, VIBRATION_PATTERN};

#[cfg(test)]
pub use push::MockPushGateway;

use async_trait::async_trait;
use planner_shared::channels::{ChannelConfig, ChannelKind};

use crate::error::Result;
use crate::types::{ChannelResult, Notification};

/// 通知渠道 trait
///
/// 渠道配置（开关与设置）由服务在每次发送时传入，渠道本身只关心投递。
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// 渠道名称（用于日志）
    fn name(&self) -> &str;

    /// 初始化渠道后端，失败时渠道保持不可用
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// 发送通知
    ///
    /// 渠道不可用时返回 `ChannelResult::skipped`，投递失败返回 `ChannelResult::failed`；
    /// `Err` 只用于意料之外的错误。
    async fn send(&self, notification: &Notification, config: &ChannelConfig)
    -> Result<ChannelResult>;
}
