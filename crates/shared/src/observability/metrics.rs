//! 指标模块
//!
//! 基于 metrics crate 记录 toast 生命周期与通知投递指标。
//! 未安装 recorder 时所有记录均为空操作，导出方式由宿主进程决定。

/// 注册指标描述
pub fn describe_metrics(service_name: &str) {
    metrics::describe_counter!("toast_events_total", "Total number of toast lifecycle events");
    metrics::describe_gauge!("toast_queue_length", "Number of toasts waiting for a slot");

    metrics::describe_counter!(
        "notification_deliveries_total",
        "Total number of notification channel deliveries"
    );
    metrics::describe_histogram!(
        "notification_delivery_duration_seconds",
        "Notification delivery duration in seconds"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 记录 toast 生命周期事件
#[inline]
pub fn record_toast_event(event: &str) {
    metrics::counter!("toast_events_total", "event" => event.to_string()).increment(1);
}

/// 记录当前排队的 toast 数量
#[inline]
pub fn record_queue_length(len: usize) {
    metrics::gauge!("toast_queue_length").set(len as f64);
}

/// 记录渠道投递结果
#[inline]
pub fn record_channel_delivery(channel: &str, status: &str, duration_secs: f64) {
    metrics::counter!(
        "notification_deliveries_total",
        "channel" => channel.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "notification_delivery_duration_seconds",
        "channel" => channel.to_string()
    )
    .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        describe_metrics("test-service");
        record_toast_event("show");
        record_queue_length(2);
        record_channel_delivery("push", "success", 0.01);
    }
}
