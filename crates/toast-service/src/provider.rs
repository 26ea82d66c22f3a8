//! toast 对外接口
//!
//! [`ToastProvider`] 是应用代码唯一需要接触的入口：创建 toast、套用模板、
//! 处理用户交互（悬停、按键、按钮）、读取分析日志以及生成渲染帧。
//! 没有全局单例，调用方显式构造后通过 `Arc` 共享。

use std::sync::Arc;

use parking_lot::RwLock;
use planner_shared::config::{ToastConfig, ToastPosition};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsKind, AnalyticsLog};
use crate::persistence::{FileStorage, ToastPersistence, ToastStorage};
use crate::renderer::{ErrorBoundary, TextRenderer, ToastFrame};
use crate::store::{ActionStep, StoreSettings, ToastStore};
use crate::templates::{TemplateRegistry, ToastOverrides};
use crate::theme::{ToastAnimation, ToastTheme};
use crate::types::{DismissReason, Toast, ToastOptions, ToastPhase, run_guarded};

/// 点击按钮的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// toast 或按钮不存在
    Missing,
    /// 需要再次点击确认，附带确认提示
    NeedsConfirmation(String),
    /// 已执行
    Executed,
}

pub struct ToastProvider {
    config: ToastConfig,
    store: ToastStore,
    templates: Arc<TemplateRegistry>,
    analytics: Arc<AnalyticsLog>,
    default_theme: RwLock<Option<ToastTheme>>,
    default_animation: ToastAnimation,
    renderer: ErrorBoundary<TextRenderer>,
}

impl ToastProvider {
    /// 创建不带持久化的 provider
    pub fn new(config: &ToastConfig, templates: Arc<TemplateRegistry>) -> Self {
        Self::build(config, templates, None)
    }

    /// 创建带持久化的 provider，并立即恢复存储中的 toast
    pub fn with_storage(
        config: &ToastConfig,
        templates: Arc<TemplateRegistry>,
        storage: Arc<dyn ToastStorage>,
    ) -> Self {
        let persistence = ToastPersistence::new(storage, config.max_storage_bytes);
        let provider = Self::build(config, templates, Some(persistence));
        provider.store.restore();
        provider
    }

    /// 按配置决定是否启用文件持久化
    pub fn from_config(config: &ToastConfig, templates: Arc<TemplateRegistry>) -> Self {
        if config.persist_toasts {
            info!(path = %config.storage_path.display(), "已启用 toast 持久化");
            let storage = Arc::new(FileStorage::new(config.storage_path.clone()));
            Self::with_storage(config, templates, storage)
        } else {
            Self::new(config, templates)
        }
    }

    fn build(
        config: &ToastConfig,
        templates: Arc<TemplateRegistry>,
        persistence: Option<ToastPersistence>,
    ) -> Self {
        let default_animation = ToastAnimation::preset(&config.default_animation)
            .unwrap_or_else(|| {
                warn!(animation = %config.default_animation, "未知的默认动画，改用 fadeIn");
                ToastAnimation::default()
            });
        let analytics = Arc::new(AnalyticsLog::new(config.analytics_capacity));
        let store = ToastStore::new(
            StoreSettings::from(config),
            analytics.clone(),
            persistence,
        );

        Self {
            config: config.clone(),
            store,
            templates,
            analytics,
            default_theme: RwLock::new(None),
            default_animation,
            renderer: ErrorBoundary::new(TextRenderer::default()),
        }
    }

    pub fn store(&self) -> &ToastStore {
        &self.store
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn position(&self) -> ToastPosition {
        self.config.position
    }

    /// 创建 toast，立即返回 id
    #[instrument(skip(self, options), fields(title = %options.title))]
    pub fn toast(&self, options: ToastOptions) -> String {
        let toast = Toast::from_options(
            options,
            self.config.default_duration_ms,
            &self.default_animation,
        );
        let id = self.store.admit(toast);
        debug!(toast_id = %id, "toast 已创建");
        id
    }

    /// 按模板创建 toast，模板不存在时不创建并返回 None
    #[instrument(skip(self, overrides))]
    pub fn toast_template(&self, name: &str, overrides: ToastOverrides) -> Option<String> {
        match self.templates.apply(name, overrides) {
            Some(options) => Some(self.toast(options)),
            None => {
                warn!(template = name, "toast 模板不存在");
                None
            }
        }
    }

    /// 立即关闭
    pub fn dismiss(&self, id: &str) -> bool {
        self.store.dismiss(id)
    }

    /// 带退出动画的关闭（点击关闭按钮）
    pub fn fade_out(&self, id: &str) -> bool {
        self.store.fade_out(id, DismissReason::Manual)
    }

    pub fn dismiss_group(&self, group_id: &str) -> usize {
        self.store.dismiss_group(group_id)
    }

    pub fn clear_toasts(&self) -> usize {
        self.store.clear()
    }

    /// 正在屏幕上显示（活跃且未淡出）的 toast
    fn on_screen(&self, id: &str) -> Option<Toast> {
        if self.store.phase(id) != Some(ToastPhase::Active) {
            return None;
        }
        self.store.get(id)
    }

    /// 鼠标悬停：暂停倒计时
    ///
    /// 只对屏幕上的 toast 生效，排队中或正在淡出的 toast 不记录事件。
    pub fn hover(&self, id: &str) -> bool {
        let Some(toast) = self.on_screen(id) else {
            return false;
        };
        let paused = self.store.pause(id);
        self.analytics
            .record(AnalyticsEvent::new(id, AnalyticsKind::Hover).with_meta("paused", paused));
        if let Some(cb) = &toast.callbacks.on_hover {
            run_guarded("on_hover", id, || cb());
        }
        paused
    }

    /// 鼠标移开：以剩余时间恢复倒计时
    pub fn leave(&self, id: &str) -> bool {
        let Some(toast) = self.on_screen(id) else {
            return false;
        };
        let resumed = self.store.resume(id);
        if let Some(cb) = &toast.callbacks.on_leave {
            run_guarded("on_leave", id, || cb());
        }
        resumed
    }

    /// Esc 键关闭
    pub fn press_escape(&self, id: &str) -> bool {
        self.store.fade_out(id, DismissReason::Keyboard)
    }

    /// 点击操作按钮
    ///
    /// 需要确认的按钮第一次点击返回确认提示；确认后执行处理函数、记录分析事件，
    /// 非 persistent 的 toast 随后关闭。
    #[instrument(skip(self))]
    pub fn invoke_action(&self, id: &str, label: &str) -> ActionOutcome {
        let (action, toast) = match self.store.prepare_action(id, label) {
            ActionStep::Missing => return ActionOutcome::Missing,
            ActionStep::NeedsConfirmation(message) => {
                debug!(toast_id = id, action = label, "操作需要确认");
                return ActionOutcome::NeedsConfirmation(message);
            }
            ActionStep::Ready { action, toast } => (action, toast),
        };

        if let Some(handler) = &action.handler {
            run_guarded("action_handler", id, || handler());
        }

        let mut event = AnalyticsEvent::new(id, AnalyticsKind::Action).with_meta("label", label);
        if let Some(tags) = &action.analytics {
            let tags = [
                ("category", &tags.category),
                ("action", &tags.action),
                ("analyticsLabel", &tags.label),
            ];
            for (key, value) in tags {
                if let Some(value) = value {
                    event = event.with_meta(key, Value::from(value.as_str()));
                }
            }
        }
        self.analytics.record(event);

        if let Some(cb) = &toast.callbacks.on_action {
            run_guarded("on_action", id, || cb(&action));
        }

        if !toast.persistent {
            self.store.dismiss_with_reason(id, DismissReason::Action);
        }
        ActionOutcome::Executed
    }

    pub fn cancel_confirmation(&self, id: &str) -> bool {
        self.store.cancel_confirmation(id)
    }

    pub fn set_default_theme(&self, theme: Option<ToastTheme>) {
        *self.default_theme.write() = theme;
    }

    pub fn default_theme(&self) -> Option<ToastTheme> {
        self.default_theme.read().clone()
    }

    pub fn analytics(&self) -> Vec<AnalyticsEvent> {
        self.analytics.snapshot()
    }

    pub fn clear_analytics(&self) {
        self.analytics.clear();
    }

    /// 注册分析事件转发回调
    pub fn on_analytics(&self, sink: impl Fn(&AnalyticsEvent) + Send + Sync + 'static) {
        self.analytics.set_sink(Arc::new(sink));
    }

    /// 当前渲染帧
    pub fn frame(&self) -> ToastFrame {
        ToastFrame::new(
            self.config.position,
            self.default_theme(),
            self.store.snapshot(),
        )
    }

    /// 渲染为文本，渲染失败时返回兜底横幅
    pub fn render(&self) -> String {
        self.renderer.render(&self.frame())
    }
}
