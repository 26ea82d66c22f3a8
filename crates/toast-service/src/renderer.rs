//! toast 渲染
//!
//! 渲染层只消费 store 的只读快照，不会修改任何状态。
//! [`ErrorBoundary`] 包裹实际渲染器，渲染出错或 panic 时输出兜底横幅。

use std::cmp::Ordering;
use std::panic::{AssertUnwindSafe, catch_unwind};

use chrono::Utc;
use planner_shared::config::ToastPosition;
use tracing::error;

use crate::error::Result;
use crate::store::ToastView;
use crate::theme::ToastTheme;
use crate::types::{ToastPhase, ToastVariant};

/// 渲染顺序：优先级降序，同优先级新的在前
pub fn render_order(a: &ToastView, b: &ToastView) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| b.seq.cmp(&a.seq))
}

/// 一帧待渲染的内容
#[derive(Debug, Clone)]
pub struct ToastFrame {
    pub position: ToastPosition,
    pub default_theme: Option<ToastTheme>,
    /// 已按渲染顺序排好
    pub toasts: Vec<ToastView>,
}

impl ToastFrame {
    pub fn new(
        position: ToastPosition,
        default_theme: Option<ToastTheme>,
        mut toasts: Vec<ToastView>,
    ) -> Self {
        toasts.sort_by(render_order);
        Self {
            position,
            default_theme,
            toasts,
        }
    }

    /// 主题取值顺序：toast 自身 > 实例默认 > 变体兜底
    pub fn theme_for(&self, toast: &ToastView) -> ToastTheme {
        toast
            .theme
            .clone()
            .or_else(|| self.default_theme.clone())
            .unwrap_or_else(|| ToastTheme::for_variant(toast.variant))
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

/// 渲染器
pub trait ToastRenderer {
    fn render(&self, frame: &ToastFrame) -> Result<String>;
}

/// 纯文本渲染器，用于终端与日志
#[derive(Debug, Clone)]
pub struct TextRenderer {
    /// 进度条宽度（字符数）
    pub progress_width: usize,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self { progress_width: 10 }
    }
}

impl TextRenderer {
    fn icon(variant: ToastVariant) -> &'static str {
        match variant {
            ToastVariant::Default => "•",
            ToastVariant::Destructive => "✕",
            ToastVariant::Success => "✓",
            ToastVariant::Info => "ℹ",
            ToastVariant::Loading => "…",
        }
    }

    fn progress_bar(&self, percent: f64) -> String {
        let filled = ((percent / 100.0) * self.progress_width as f64).round() as usize;
        let filled = filled.min(self.progress_width);
        format!(
            "{}{} {:>3.0}%",
            "█".repeat(filled),
            "░".repeat(self.progress_width - filled),
            percent
        )
    }

    fn render_toast(&self, toast: &ToastView, now_ms: i64, out: &mut Vec<String>) {
        let mut header = format!("{} {}", Self::icon(toast.variant), toast.title);
        match toast.phase {
            ToastPhase::FadingOut => header.push_str(" (正在关闭)"),
            _ if toast.paused => header.push_str(" (已暂停)"),
            _ => {}
        }
        header.push_str(&format!(
            " · {}",
            format_relative_time(toast.created_at, now_ms)
        ));
        out.push(header);

        if let Some(description) = &toast.description {
            out.push(format!("  {description}"));
        }

        if !toast.actions.is_empty() {
            let buttons: Vec<String> = toast
                .actions
                .iter()
                .map(|a| match &a.awaiting_confirmation {
                    Some(message) => format!("[{}? {}]", a.label, message),
                    None => format!("[{}]", a.label),
                })
                .collect();
            out.push(format!("  {}", buttons.join(" ")));
        }

        if toast.show_progress {
            if let Some(progress) = toast.progress {
                out.push(format!("  {}", self.progress_bar(progress)));
            }
        }
    }
}

impl ToastRenderer for TextRenderer {
    fn render(&self, frame: &ToastFrame) -> Result<String> {
        let now_ms = Utc::now().timestamp_millis();
        let mut blocks: Vec<Vec<String>> = frame
            .toasts
            .iter()
            .map(|toast| {
                let mut lines = Vec::new();
                self.render_toast(toast, now_ms, &mut lines);
                lines
            })
            .collect();

        // 底部容器从下往上堆叠，渲染顺序最靠前的 toast 出现在最下方
        if frame.position.is_bottom() {
            blocks.reverse();
        }

        let mut out = vec![format!("[{}]", frame.position.as_str())];
        out.extend(blocks.into_iter().flatten());
        Ok(out.join("\n"))
    }
}

/// 渲染错误边界
pub struct ErrorBoundary<R> {
    inner: R,
    fallback: String,
}

impl<R: ToastRenderer> ErrorBoundary<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            fallback: "通知暂时无法显示".to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// 渲染一帧，失败时返回兜底横幅，永不出错
    pub fn render(&self, frame: &ToastFrame) -> String {
        match catch_unwind(AssertUnwindSafe(|| self.inner.render(frame))) {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                error!(error = %e, toasts = frame.toasts.len(), "toast 渲染失败，显示兜底内容");
                self.fallback.clone()
            }
            Err(_) => {
                error!(toasts = frame.toasts.len(), "toast 渲染时发生 panic，显示兜底内容");
                self.fallback.clone()
            }
        }
    }
}

/// 相对时间描述
pub fn format_relative_time(created_at_ms: i64, now_ms: i64) -> String {
    let seconds = (now_ms - created_at_ms).max(0) / 1000;
    match seconds {
        0..=4 => "刚刚".to_string(),
        5..=59 => format!("{seconds} 秒前"),
        60..=3599 => format!("{} 分钟前", seconds / 60),
        3600..=86_399 => format!("{} 小时前", seconds / 3600),
        _ => format!("{} 天前", seconds / 86_400),
    }
}
