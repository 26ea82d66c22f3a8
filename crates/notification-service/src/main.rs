//! 通知服务入口
//!
//! 加载配置、组装 toast 与通知渠道，发送一条启动通知后等待退出信号。

use std::sync::Arc;

use anyhow::Result;
use notification_service::calendar::{
    AppleCalendar, GoogleCalendar, GoogleCredentials, LocalCalendar, OutlookCalendar,
};
use notification_service::{CalendarBackend, NotificationOptions, NotificationService};
use planner_shared::{config::AppConfig, observability};
use tokio::signal;
use toast_service::{TemplateRegistry, ToastProvider};
use tracing::{info, warn};

/// 从环境变量读取第三方日历凭据，缺失的提供方在初始化时会失败并保持不可用
fn calendar_backends() -> Vec<Arc<dyn CalendarBackend>> {
    let google_credentials = match (
        std::env::var("GOOGLE_API_KEY"),
        std::env::var("GOOGLE_CLIENT_ID"),
    ) {
        (Ok(api_key), Ok(client_id)) => Some(GoogleCredentials { api_key, client_id }),
        _ => None,
    };

    let google: Arc<dyn CalendarBackend> = Arc::new(GoogleCalendar::new(google_credentials));
    let apple: Arc<dyn CalendarBackend> = Arc::new(AppleCalendar::new(false));
    let outlook: Arc<dyn CalendarBackend> =
        Arc::new(OutlookCalendar::new(std::env::var("OUTLOOK_MAILBOX").ok()));
    let local: Arc<dyn CalendarBackend> = Arc::new(LocalCalendar::new());

    vec![google, apple, outlook, local]
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置，失败时使用默认配置
    let config = AppConfig::load("planner-notify").unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig::default()
    });

    // 2. 初始化可观测性
    let _guard = observability::init(&config.service_name, &config.observability)?;
    info!(environment = %config.environment, "配置加载完成");

    // 3. toast
    let templates = Arc::new(TemplateRegistry::with_defaults());
    let toasts = Arc::new(ToastProvider::from_config(&config.toast, templates));
    info!(position = config.toast.position.as_str(), "Toast 服务初始化完成");

    // 4. 通知渠道
    let service = NotificationService::from_config(
        &config.notification,
        toasts.clone(),
        calendar_backends(),
    );
    service.initialize().await;
    info!("通知服务初始化完成");

    let report = service
        .send_notification(
            "通知服务已启动",
            NotificationOptions::new().with_body(format!("环境: {}", config.environment)),
        )
        .await;
    info!(
        notification_id = %report.notification_id,
        success = report.success_count(),
        failed = report.failure_count(),
        "启动通知已发送"
    );
    println!("{}", toasts.render());

    shutdown_signal().await;

    let cleared = toasts.clear_toasts();
    info!(cleared, "服务已关闭");
    Ok(())
}

/// 等待 Ctrl+C
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("收到 Ctrl+C，开始关闭..."),
        Err(e) => warn!(error = %e, "无法监听退出信号，立即关闭"),
    }
}
