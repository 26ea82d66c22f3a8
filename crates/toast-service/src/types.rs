//! toast 类型定义
//!
//! 定义 toast 的创建参数、运行时实体、操作按钮与生命周期回调。

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use crate::theme::{ToastAnimation, ToastTheme};

/// toast 变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastVariant {
    #[default]
    Default,
    Destructive,
    Success,
    Info,
    Loading,
}

impl ToastVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Destructive => "destructive",
            Self::Success => "success",
            Self::Info => "info",
            Self::Loading => "loading",
        }
    }
}

/// toast 所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastPhase {
    /// 排队等待空位
    Queued,
    /// 正在显示
    Active,
    /// 退出动画中，动画结束后移除
    FadingOut,
}

/// 关闭原因（写入分析日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    /// 倒计时结束
    Auto,
    /// 用户点击关闭
    Manual,
    /// Esc 键
    Keyboard,
    /// 操作按钮执行后关闭
    Action,
    /// 按分组关闭
    Group,
    /// 全部清空
    Clear,
}

impl DismissReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Keyboard => "keyboard",
            Self::Action => "action",
            Self::Group => "group",
            Self::Clear => "clear",
        }
    }
}

/// 操作按钮样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVariant {
    #[default]
    Default,
    Primary,
    Secondary,
    Destructive,
}

/// 操作按钮的分析标签
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionAnalytics {
    pub category: Option<String>,
    pub action: Option<String>,
    pub label: Option<String>,
}

pub type ActionHandler = Arc<dyn Fn() + Send + Sync>;
pub type Callback = Arc<dyn Fn() + Send + Sync>;
pub type ActionCallback = Arc<dyn Fn(&ToastAction) + Send + Sync>;

/// toast 上的操作按钮
#[derive(Clone)]
pub struct ToastAction {
    pub label: String,
    pub handler: Option<ActionHandler>,
    pub variant: ActionVariant,
    /// 为 true 时第一次点击只展示确认提示，第二次点击才执行
    pub requires_confirmation: bool,
    pub confirmation_message: Option<String>,
    pub analytics: Option<ActionAnalytics>,
}

impl ToastAction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            handler: None,
            variant: ActionVariant::Default,
            requires_confirmation: false,
            confirmation_message: None,
            analytics: None,
        }
    }

    pub fn with_handler(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn with_variant(mut self, variant: ActionVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_confirmation(mut self, message: impl Into<String>) -> Self {
        self.requires_confirmation = true;
        self.confirmation_message = Some(message.into());
        self
    }

    pub fn with_analytics(mut self, analytics: ActionAnalytics) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// 按名称获取操作预设
    pub fn preset(name: &str) -> Option<Self> {
        let action = match name {
            "view" => Self::new("View"),
            "confirm" => Self::new("Confirm").with_variant(ActionVariant::Primary),
            "delete" => Self::new("Delete")
                .with_variant(ActionVariant::Destructive)
                .with_confirmation("确定要删除吗？"),
            "schedule" => Self::new("Schedule").with_variant(ActionVariant::Secondary),
            "favorite" => Self::new("Favorite").with_variant(ActionVariant::Secondary),
            _ => return None,
        };
        Some(action)
    }
}

impl std::fmt::Debug for ToastAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastAction")
            .field("label", &self.label)
            .field("has_handler", &self.handler.is_some())
            .field("variant", &self.variant)
            .field("requires_confirmation", &self.requires_confirmation)
            .field("confirmation_message", &self.confirmation_message)
            .finish()
    }
}

/// 生命周期回调
#[derive(Clone, Default)]
pub struct ToastCallbacks {
    pub on_show: Option<Callback>,
    pub on_dismiss: Option<Callback>,
    pub on_action: Option<ActionCallback>,
    pub on_hover: Option<Callback>,
    pub on_leave: Option<Callback>,
}

impl ToastCallbacks {
    pub fn is_empty(&self) -> bool {
        self.on_show.is_none()
            && self.on_dismiss.is_none()
            && self.on_action.is_none()
            && self.on_hover.is_none()
            && self.on_leave.is_none()
    }
}

impl std::fmt::Debug for ToastCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToastCallbacks")
            .field("on_show", &self.on_show.is_some())
            .field("on_dismiss", &self.on_dismiss.is_some())
            .field("on_action", &self.on_action.is_some())
            .field("on_hover", &self.on_hover.is_some())
            .field("on_leave", &self.on_leave.is_some())
            .finish()
    }
}

/// 在隔离环境中执行用户代码
///
/// 回调与操作按钮运行在定时任务或事件处理中，panic 只记录日志，不向外传播。
pub(crate) fn run_guarded(what: &str, toast_id: &str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(toast_id, callback = what, "toast 回调执行时发生 panic，已忽略");
    }
}

/// toast 创建参数
///
/// 只有 title 是必填项，其余字段都有默认值。
#[derive(Debug, Clone, Default)]
pub struct ToastOptions {
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    /// 展示时长（毫秒），None 表示使用服务默认值，Some(0) 表示不自动关闭
    pub duration_ms: Option<u64>,
    /// 是否显示进度条，默认显示
    pub show_progress: Option<bool>,
    pub priority: i32,
    pub group_id: Option<String>,
    pub persistent: bool,
    pub theme: Option<ToastTheme>,
    pub animation: Option<ToastAnimation>,
    pub actions: Vec<ToastAction>,
    pub callbacks: ToastCallbacks,
}

impl ToastOptions {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    fn with_variant_preset(
        title: impl Into<String>,
        description: Option<String>,
        variant: ToastVariant,
    ) -> Self {
        Self {
            title: title.into(),
            description,
            variant,
            ..Default::default()
        }
    }

    pub fn success(title: impl Into<String>, description: Option<String>) -> Self {
        Self::with_variant_preset(title, description, ToastVariant::Success)
    }

    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self::with_variant_preset(title, description, ToastVariant::Destructive)
    }

    pub fn info(title: impl Into<String>, description: Option<String>) -> Self {
        Self::with_variant_preset(title, description, ToastVariant::Info)
    }

    pub fn loading(title: impl Into<String>, description: Option<String>) -> Self {
        Self::with_variant_preset(title, description, ToastVariant::Loading)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variant(mut self, variant: ToastVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = Some(show_progress);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn with_theme(mut self, theme: ToastTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_animation(mut self, animation: ToastAnimation) -> Self {
        self.animation = Some(animation);
        self
    }

    pub fn with_action(mut self, action: ToastAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_callbacks(mut self, callbacks: ToastCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}

/// 已创建的 toast
#[derive(Debug, Clone)]
pub struct Toast {
    /// 唯一标识，创建时生成，不会复用
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub duration_ms: u64,
    pub show_progress: bool,
    pub priority: i32,
    pub group_id: Option<String>,
    pub persistent: bool,
    pub theme: Option<ToastTheme>,
    pub animation: ToastAnimation,
    pub actions: Vec<ToastAction>,
    pub callbacks: ToastCallbacks,
    /// 创建时间（毫秒时间戳）
    pub created_at: i64,
    /// 入库序号，由 store 分配，相同时间戳时用于稳定排序
    pub seq: u64,
}

impl Toast {
    /// 用创建参数生成 toast，未指定的字段取服务默认值
    pub fn from_options(
        options: ToastOptions,
        default_duration_ms: u64,
        default_animation: &ToastAnimation,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            title: options.title,
            description: options.description,
            variant: options.variant,
            duration_ms: options.duration_ms.unwrap_or(default_duration_ms),
            show_progress: options.show_progress.unwrap_or(true),
            priority: options.priority,
            group_id: options.group_id,
            persistent: options.persistent,
            theme: options.theme,
            animation: options
                .animation
                .unwrap_or_else(|| default_animation.clone()),
            actions: options.actions,
            callbacks: options.callbacks,
            created_at: Utc::now().timestamp_millis(),
            seq: 0,
        }
    }

    /// 是否需要倒计时自动关闭
    pub fn has_countdown(&self) -> bool {
        self.duration_ms > 0 && !self.persistent
    }

    pub fn in_group(&self, group_id: &str) -> bool {
        self.group_id.as_deref() == Some(group_id)
    }

    pub fn find_action(&self, label: &str) -> Option<&ToastAction> {
        self.actions.iter().find(|a| a.label == label)
    }
}
