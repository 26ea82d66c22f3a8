//! 共享库
//!
//! 包含 toast 服务与通知服务共用的配置、错误处理、渠道模型和可观测性基础设施代码。

pub mod channels;
pub mod config;
pub mod error;
pub mod observability;
