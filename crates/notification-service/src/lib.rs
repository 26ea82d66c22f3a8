//! 多渠道通知服务
//!
//! 把一条通知分发到站内（toast）、推送和日历三个渠道。
//!
//! ## 核心功能
//!
//! - **渠道分发**：按渠道配置并行投递，单渠道失败互不影响
//! - **通知分组**：同一 group id 的通知累积成组，高优先级分组以汇总通知展示
//! - **日历集成**：Google / Apple / Outlook / 本地日历，支持重复规则
//!
//! ## 模块结构
//!
//! - `calendar`: 日历事件与提供方
//! - `channels`: 渠道实现
//! - `service`: 分发服务
//! - `types`: 通知与投递结果类型
//! - `error`: 错误类型定义

pub mod calendar;
pub mod channels;
pub mod error;
pub mod service;
pub mod types;

pub use calendar::{CalendarBackend, CalendarEvent, Frequency, ProviderEvent, RecurrenceRule};
pub use channels::{
    CalendarChannel, InAppChannel, LogPushGateway, NotificationChannel, PushChannel, PushGateway,
    PushPayload,
};
pub use error::{NotificationError, Result};
pub use service::NotificationService;
pub use types::{
    ChannelResult, Notification, NotificationAction, NotificationGroup, NotificationOptions,
    NotificationReport, SendStatus,
};
