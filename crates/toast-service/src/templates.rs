//! toast 模板
//!
//! 模板是一组预设的 toast 参数（时长、主题、动画、按钮等），调用方按名称取用，
//! 再用 [`ToastOverrides`] 覆盖个别字段。标题和描述支持 `{{variable}}` 占位符。
//!
//! ```ignore
//! let registry = TemplateRegistry::with_defaults();
//! let overrides = ToastOverrides::default()
//!     .with_title("已添加「{{recipe}}」")
//!     .with_variable("recipe", "番茄炒蛋");
//! let options = registry.apply("success", overrides);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::theme::{ToastAnimation, ToastTheme};
use crate::types::{ToastAction, ToastCallbacks, ToastOptions, ToastVariant};

// 匹配 {{variable_name}}，变量名支持字母、数字、下划线
static VARIABLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{(\w+)\}\}").expect("模板变量正则非法"));

/// 模板定义
#[derive(Debug, Clone)]
pub struct ToastTemplate {
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub duration_ms: u64,
    pub persistent: bool,
    pub theme: ToastTheme,
    pub animation: ToastAnimation,
    pub actions: Vec<ToastAction>,
}

impl ToastTemplate {
    fn preset(title: &str, duration_ms: u64, theme: &str, animation: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            variant: ToastVariant::Default,
            duration_ms,
            persistent: false,
            theme: ToastTheme::preset(theme).unwrap_or_else(ToastTheme::neutral),
            animation: ToastAnimation::preset(animation).unwrap_or_default(),
            actions: Vec::new(),
        }
    }
}

/// 调用方对模板的覆盖项
#[derive(Debug, Clone, Default)]
pub struct ToastOverrides {
    pub title: Option<String>,
    pub description: Option<String>,
    pub variant: Option<ToastVariant>,
    pub duration_ms: Option<u64>,
    pub priority: Option<i32>,
    pub group_id: Option<String>,
    pub persistent: Option<bool>,
    /// 非空时替换模板自带的按钮
    pub actions: Option<Vec<ToastAction>>,
    pub callbacks: Option<ToastCallbacks>,
    /// 标题与描述中的占位符取值
    pub variables: HashMap<String, String>,
}

impl ToastOverrides {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_variant(mut self, variant: ToastVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }

    pub fn with_actions(mut self, actions: Vec<ToastAction>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_callbacks(mut self, callbacks: ToastCallbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// 模板注册表
pub struct TemplateRegistry {
    templates: HashMap<String, ToastTemplate>,
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TemplateRegistry {
    /// 创建空的注册表
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// 创建带内置模板的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_default_templates();
        registry
    }

    fn register_default_templates(&mut self) {
        self.register("success", ToastTemplate::preset("成功", 3000, "success", "fadeIn"));

        let mut error = ToastTemplate::preset("出错了", 5000, "error", "slideIn");
        error.variant = ToastVariant::Destructive;
        self.register("error", error);

        self.register("warning", ToastTemplate::preset("注意", 4000, "warning", "bounceIn"));
        self.register("info", ToastTemplate::preset("提示", 3000, "info", "fadeIn"));

        // 加载中的提示不会自动消失，由调用方在任务完成后关闭
        let mut loading = ToastTemplate::preset("加载中", 0, "default", "scaleIn");
        loading.persistent = true;
        self.register("loading", loading);

        let mut notification = ToastTemplate::preset("新通知", 4000, "premium", "slideIn");
        notification.actions = ToastAction::preset("view").into_iter().collect();
        self.register("notification", notification);
    }

    /// 注册或替换模板
    pub fn register(&mut self, name: impl Into<String>, template: ToastTemplate) {
        self.templates.insert(name.into(), template);
    }

    pub fn get(&self, name: &str) -> Option<&ToastTemplate> {
        self.templates.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// 替换 `{{variable}}` 占位符
    ///
    /// 未提供的变量保留原样并记录警告日志。
    pub fn render(&self, template: &str, variables: &HashMap<String, String>) -> String {
        VARIABLE_REGEX
            .replace_all(template, |caps: &regex::Captures| {
                let name = &caps[1];
                match variables.get(name) {
                    Some(value) => value.clone(),
                    None => {
                        warn!(variable = name, "toast 模板变量未提供，保留原样");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    /// 合并模板与覆盖项，模板不存在时返回 None
    pub fn apply(&self, name: &str, overrides: ToastOverrides) -> Option<ToastOptions> {
        let template = self.get(name)?;

        let title = overrides.title.unwrap_or_else(|| template.title.clone());
        let description = overrides
            .description
            .or_else(|| template.description.clone())
            .map(|d| self.render(&d, &overrides.variables));

        Some(ToastOptions {
            title: self.render(&title, &overrides.variables),
            description,
            variant: overrides.variant.unwrap_or(template.variant),
            duration_ms: Some(overrides.duration_ms.unwrap_or(template.duration_ms)),
            show_progress: None,
            priority: overrides.priority.unwrap_or_default(),
            group_id: overrides.group_id,
            persistent: overrides.persistent.unwrap_or(template.persistent),
            theme: Some(template.theme.clone()),
            animation: Some(template.animation.clone()),
            actions: overrides
                .actions
                .unwrap_or_else(|| template.actions.clone()),
            callbacks: overrides.callbacks.unwrap_or_default(),
        })
    }
}
