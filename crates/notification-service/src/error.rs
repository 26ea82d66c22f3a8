//! 通知服务错误类型

use planner_shared::channels::CalendarProvider;
use planner_shared::error::PlannerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("日历提供方不可用: {0}")]
    ProviderUnavailable(CalendarProvider),

    #[error("日历提供方 {provider} 初始化失败: {message}")]
    ProviderInit {
        provider: CalendarProvider,
        message: String,
    },

    #[error("日历事件提交失败 ({provider}): {message}")]
    CalendarSubmit {
        provider: CalendarProvider,
        message: String,
    },

    #[error("日历事件格式与提供方不匹配: 期望 {expected}")]
    PayloadMismatch { expected: CalendarProvider },

    #[error("推送网关初始化失败: {0}")]
    PushInit(String),

    #[error("推送发送失败: {0}")]
    Push(String),

    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Shared(#[from] PlannerError),
}

impl NotificationError {
    /// 错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::ProviderInit { .. } => "PROVIDER_INIT_FAILED",
            Self::CalendarSubmit { .. } => "CALENDAR_SUBMIT_FAILED",
            Self::PayloadMismatch { .. } => "PAYLOAD_MISMATCH",
            Self::PushInit(_) => "PUSH_INIT_FAILED",
            Self::Push(_) => "PUSH_FAILED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Shared(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NotificationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_code() {
        let err = NotificationError::ProviderUnavailable(CalendarProvider::Google);
        assert_eq!(err.to_string(), "日历提供方不可用: google");
        assert_eq!(err.code(), "PROVIDER_UNAVAILABLE");

        let shared = NotificationError::from(PlannerError::Internal("boom".to_string()));
        assert_eq!(shared.code(), "INTERNAL_ERROR");
    }
}
