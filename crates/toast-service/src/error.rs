//! toast 服务错误类型
//!
//! 仅用于存储与渲染等边界操作；toast 的增删本身不会失败。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToastError {
    #[error("toast 存储读写失败: {0}")]
    Storage(#[from] std::io::Error),

    #[error("toast 序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("toast 渲染失败: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ToastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ToastError::Render("主题缺失".to_string());
        assert_eq!(err.to_string(), "toast 渲染失败: 主题缺失");

        let io = ToastError::from(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert!(io.to_string().starts_with("toast 存储读写失败"));
    }
}
