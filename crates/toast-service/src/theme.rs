//! 主题与动画描述
//!
//! 纯声明式的样式数据，只影响渲染层，不参与 store 的任何逻辑判断。
//! 唯一的例外是动画的退出时长，它决定了淡出阶段持续多久。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ToastVariant;

/// toast 主题（各部位的样式类名）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastTheme {
    pub background: String,
    pub text: String,
    pub border: String,
    pub icon: String,
    pub progress: String,
    pub hover: String,
    pub active: String,
}

impl ToastTheme {
    fn palette(color: &str) -> Self {
        Self {
            background: format!("bg-{color}-50 dark:bg-{color}-900/20"),
            text: format!("text-{color}-900 dark:text-{color}-100"),
            border: format!("border-{color}-200 dark:border-{color}-800"),
            icon: format!("text-{color}-500 dark:text-{color}-400"),
            progress: format!("bg-{color}-200 dark:bg-{color}-800"),
            hover: format!("hover:bg-{color}-100 dark:hover:bg-{color}-900/30"),
            active: format!("active:bg-{color}-200 dark:active:bg-{color}-900/40"),
        }
    }

    /// 中性主题
    pub fn neutral() -> Self {
        Self {
            background: "bg-white dark:bg-gray-800".to_string(),
            text: "text-gray-900 dark:text-gray-100".to_string(),
            border: "border-gray-200 dark:border-gray-700".to_string(),
            icon: "text-gray-500 dark:text-gray-400".to_string(),
            progress: "bg-gray-200 dark:bg-gray-700".to_string(),
            hover: "hover:bg-gray-50 dark:hover:bg-gray-700".to_string(),
            active: "active:bg-gray-100 dark:active:bg-gray-600".to_string(),
        }
    }

    /// 按名称获取主题预设
    pub fn preset(name: &str) -> Option<Self> {
        let theme = match name {
            "default" => Self::neutral(),
            "success" => Self::palette("green"),
            "error" => Self::palette("red"),
            "warning" => Self::palette("yellow"),
            "info" => Self::palette("blue"),
            "premium" => Self::palette("purple"),
            _ => return None,
        };
        Some(theme)
    }

    /// 变体对应的兜底主题
    pub fn for_variant(variant: ToastVariant) -> Self {
        match variant {
            ToastVariant::Default => Self::neutral(),
            ToastVariant::Destructive => Self::palette("red"),
            ToastVariant::Success => Self::palette("green"),
            ToastVariant::Info => Self::palette("blue"),
            ToastVariant::Loading => Self::palette("gray"),
        }
    }
}

/// 进入/退出动画
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastAnimation {
    pub enter: String,
    pub exit: String,
    /// 动画时长（毫秒），退出阶段按此时长等待后才真正移除
    pub duration_ms: u64,
}

impl ToastAnimation {
    fn new(enter: &str, exit: &str, duration_ms: u64) -> Self {
        Self {
            enter: enter.to_string(),
            exit: exit.to_string(),
            duration_ms,
        }
    }

    pub fn slide_in() -> Self {
        Self::new("animate-slide-in", "animate-slide-out", 300)
    }

    pub fn fade_in() -> Self {
        Self::new("animate-fade-in", "animate-fade-out", 200)
    }

    pub fn scale_in() -> Self {
        Self::new("animate-scale-in", "animate-scale-out", 250)
    }

    pub fn bounce_in() -> Self {
        Self::new("animate-bounce-in", "animate-bounce-out", 400)
    }

    /// 按名称获取动画预设（名称与配置文件中的写法一致）
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "slideIn" => Some(Self::slide_in()),
            "fadeIn" => Some(Self::fade_in()),
            "scaleIn" => Some(Self::scale_in()),
            "bounceIn" => Some(Self::bounce_in()),
            _ => None,
        }
    }

    pub fn exit_duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

impl Default for ToastAnimation {
    fn default() -> Self {
        Self::fade_in()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_presets() {
        let success = ToastTheme::preset("success").unwrap();
        assert!(success.background.contains("green"));

        let premium = ToastTheme::preset("premium").unwrap();
        assert!(premium.border.contains("purple"));

        assert!(ToastTheme::preset("neon").is_none());
    }

    #[test]
    fn test_variant_theme() {
        let theme = ToastTheme::for_variant(ToastVariant::Destructive);
        assert!(theme.text.contains("red"));
        assert_eq!(ToastTheme::for_variant(ToastVariant::Default), ToastTheme::neutral());
    }

    #[test]
    fn test_animation_presets() {
        assert_eq!(ToastAnimation::preset("bounceIn").unwrap().duration_ms, 400);
        assert_eq!(ToastAnimation::default().exit_duration(), Duration::from_millis(200));
        assert!(ToastAnimation::preset("spin").is_none());
    }
}
