//! toast 分析事件日志
//!
//! 记录 show / dismiss / hover / action 事件。日志是定长环形缓冲区，
//! 写满后丢弃最旧的事件；如需长期留存，通过 sink 回调转发到外部。

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use planner_shared::observability::metrics;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::run_guarded;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsKind {
    Show,
    Dismiss,
    Hover,
    Action,
}

impl AnalyticsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Show => "show",
            Self::Dismiss => "dismiss",
            Self::Hover => "hover",
            Self::Action => "action",
        }
    }
}

/// 单条分析事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub toast_id: String,
    pub event: AnalyticsKind,
    /// 毫秒时间戳
    pub timestamp: i64,
    pub metadata: Map<String, Value>,
}

impl AnalyticsEvent {
    pub fn new(toast_id: impl Into<String>, event: AnalyticsKind) -> Self {
        Self {
            toast_id: toast_id.into(),
            event,
            timestamp: Utc::now().timestamp_millis(),
            metadata: Map::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub type AnalyticsSink = Arc<dyn Fn(&AnalyticsEvent) + Send + Sync>;

/// 定长分析事件日志
pub struct AnalyticsLog {
    capacity: usize,
    events: Mutex<VecDeque<AnalyticsEvent>>,
    sink: RwLock<Option<AnalyticsSink>>,
}

impl AnalyticsLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            sink: RwLock::new(None),
        }
    }

    /// 设置外部转发回调
    pub fn set_sink(&self, sink: AnalyticsSink) {
        *self.sink.write() = Some(sink);
    }

    pub fn record(&self, event: AnalyticsEvent) {
        metrics::record_toast_event(event.event.as_str());

        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            run_guarded("analytics_sink", &event.toast_id, || sink(&event));
        }

        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub fn snapshot(&self) -> Vec<AnalyticsEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
