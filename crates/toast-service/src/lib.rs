//! 应用内 toast 通知
//!
//! - [`ToastProvider`]：对外接口（创建、模板、交互、分析、渲染）
//! - [`ToastStore`]：活跃集合、等待队列与计时任务
//! - [`TemplateRegistry`]：命名模板
//! - [`ToastPersistence`]：persistent toast 的持久化
//! - [`renderer`]：渲染顺序、文本渲染与错误边界

pub mod analytics;
pub mod error;
pub mod persistence;
pub mod provider;
pub mod renderer;
pub mod store;
pub mod templates;
pub mod theme;
pub mod types;

pub use analytics::{AnalyticsEvent, AnalyticsKind, AnalyticsLog};
pub use error::{Result, ToastError};
pub use persistence::{FileStorage, MemoryStorage, PersistedToast, ToastPersistence, ToastStorage};
pub use provider::{ActionOutcome, ToastProvider};
pub use renderer::{ErrorBoundary, TextRenderer, ToastFrame, ToastRenderer, render_order};
pub use store::{ActionStep, ActionView, StoreSettings, ToastStore, ToastView};
pub use templates::{TemplateRegistry, ToastOverrides, ToastTemplate};
pub use theme::{ToastAnimation, ToastTheme};
pub use types::{
    ActionAnalytics, ActionVariant, DismissReason, Toast, ToastAction, ToastCallbacks,
    ToastOptions, ToastPhase, ToastVariant,
};
