//! 统一错误处理模块
//!
//! 定义系统中所有共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 系统错误类型
#[derive(Debug, Error)]
pub enum PlannerError {
    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("配置无效: {field} - {message}")]
    InvalidConfig { field: String, message: String },

    // ==================== 存储错误 ====================
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("外部服务不可用: {service}")]
    ServiceUnavailable { service: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, PlannerError>;

impl PlannerError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ExternalService { .. } | Self::ServiceUnavailable { .. }
        )
    }

    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}
