//! toast 状态存储
//!
//! 维护活跃集合与等待队列，并为每个活跃 toast 管理两个后台任务：
//!
//! - 倒计时任务：剩余时间耗尽后进入淡出阶段，退出动画结束后移除
//! - 进度任务：按固定间隔刷新剩余时间百分比
//!
//! 所有状态都在一把 `parking_lot::Mutex` 内修改，锁从不跨越 `.await`。
//! 后台任务只持有 `Weak` 引用，store 被释放后任务自然结束。
//! 用户回调、分析事件与持久化写入统一在释放锁之后执行，回调里可以安全地再次调用 store。

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use planner_shared::config::ToastConfig;
use planner_shared::observability::metrics;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::analytics::{AnalyticsEvent, AnalyticsKind, AnalyticsLog};
use crate::persistence::{PersistedToast, ToastPersistence};
use crate::theme::{ToastAnimation, ToastTheme};
use crate::types::{
    ActionVariant, DismissReason, Toast, ToastAction, ToastPhase, ToastVariant, run_guarded,
};

/// store 运行参数
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// 同时显示的最大数量
    pub max_active: usize,
    /// 进度刷新间隔
    pub progress_tick: Duration,
    /// 从持久化恢复的 toast 使用的动画
    pub default_animation: ToastAnimation,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self::from(&ToastConfig::default())
    }
}

impl From<&ToastConfig> for StoreSettings {
    fn from(config: &ToastConfig) -> Self {
        Self {
            max_active: config.max_toasts,
            progress_tick: Duration::from_millis(config.progress_tick_ms),
            default_animation: ToastAnimation::preset(&config.default_animation)
                .unwrap_or_default(),
        }
    }
}

/// 倒计时状态
///
/// 运行中时 `started_at` 为本轮开始计时的时刻，`remaining` 为本轮开始时的剩余时间；
/// 暂停时 `started_at` 为 None，`remaining` 即精确的剩余时间。
#[derive(Debug, Clone, Copy)]
struct Countdown {
    duration: Duration,
    remaining: Duration,
    started_at: Option<Instant>,
}

impl Countdown {
    fn start(duration: Duration, now: Instant) -> Self {
        Self {
            duration,
            remaining: duration,
            started_at: Some(now),
        }
    }

    fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(started) => self
                .remaining
                .saturating_sub(now.saturating_duration_since(started)),
            None => self.remaining,
        }
    }

    fn progress_at(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        let ratio = self.remaining_at(now).as_secs_f64() / self.duration.as_secs_f64();
        (ratio * 100.0).clamp(0.0, 100.0)
    }

    fn pause(&mut self, now: Instant) {
        self.remaining = self.remaining_at(now);
        self.started_at = None;
    }

    fn resume(&mut self, now: Instant) {
        self.started_at = Some(now);
    }
}

struct ActiveEntry {
    toast: Toast,
    phase: ToastPhase,
    countdown: Option<Countdown>,
    /// 倒计时任务，淡出阶段复用为退出动画任务
    timer: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    progress: watch::Sender<f64>,
    /// 等待二次确认的按钮
    pending_confirmation: Option<String>,
}

impl ActiveEntry {
    fn new(toast: Toast) -> Self {
        let (progress, _) = watch::channel(100.0);
        Self {
            toast,
            phase: ToastPhase::Active,
            countdown: None,
            timer: None,
            ticker: None,
            progress,
            pending_confirmation: None,
        }
    }

    fn stop_tasks(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
        self.stop_ticker();
    }

    fn stop_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    fn is_paused(&self) -> bool {
        self.phase == ToastPhase::Active
            && self.countdown.as_ref().is_some_and(|c| !c.is_running())
    }

    fn progress_at(&self, now: Instant) -> Option<f64> {
        match self.phase {
            ToastPhase::FadingOut => Some(0.0),
            _ => self.countdown.as_ref().map(|c| c.progress_at(now)),
        }
    }
}

impl Drop for ActiveEntry {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

#[derive(Default)]
struct StoreState {
    active: Vec<ActiveEntry>,
    queue: VecDeque<Toast>,
    next_seq: u64,
}

impl StoreState {
    fn find_active(&mut self, id: &str) -> Option<&mut ActiveEntry> {
        self.active.iter_mut().find(|e| e.toast.id == id)
    }

    fn assign_seq(&mut self, toast: &mut Toast) {
        toast.seq = self.next_seq;
        self.next_seq += 1;
    }
}

/// 需要在释放锁之后处理的事件
enum Notice {
    Shown(Toast),
    Dismissed(Toast, DismissReason),
}

/// 一次变更的后续工作
struct Aftermath {
    notices: Vec<Notice>,
    /// 带代次的持久化快照
    persisted: Option<(u64, Vec<PersistedToast>)>,
    queue_len: usize,
}

struct StoreInner {
    settings: StoreSettings,
    state: Mutex<StoreState>,
    analytics: Arc<AnalyticsLog>,
    persistence: Option<ToastPersistence>,
}

/// 按钮在快照中的视图
#[derive(Debug, Clone, PartialEq)]
pub struct ActionView {
    pub label: String,
    pub variant: ActionVariant,
    /// 该按钮正在等待二次确认时为确认提示
    pub awaiting_confirmation: Option<String>,
}

/// 活跃 toast 的只读视图，供渲染层使用
#[derive(Debug, Clone, PartialEq)]
pub struct ToastView {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub variant: ToastVariant,
    pub priority: i32,
    pub group_id: Option<String>,
    pub persistent: bool,
    pub created_at: i64,
    pub seq: u64,
    pub phase: ToastPhase,
    pub paused: bool,
    pub show_progress: bool,
    /// 剩余时间百分比，没有倒计时的 toast 为 None
    pub progress: Option<f64>,
    pub theme: Option<ToastTheme>,
    pub animation: ToastAnimation,
    pub actions: Vec<ActionView>,
}

/// 执行按钮前的检查结果
pub enum ActionStep {
    /// toast 或按钮不存在
    Missing,
    /// 已进入确认状态，返回确认提示
    NeedsConfirmation(String),
    /// 可以执行
    Ready { action: ToastAction, toast: Toast },
}

/// toast 状态存储
///
/// 可廉价克隆，所有克隆共享同一份状态。
#[derive(Clone)]
pub struct ToastStore {
    inner: Arc<StoreInner>,
}

impl ToastStore {
    pub fn new(
        settings: StoreSettings,
        analytics: Arc<AnalyticsLog>,
        persistence: Option<ToastPersistence>,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                settings: StoreSettings {
                    max_active: settings.max_active.max(1),
                    ..settings
                },
                state: Mutex::new(StoreState::default()),
                analytics,
                persistence,
            }),
        }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.inner.settings
    }

    pub fn analytics(&self) -> &Arc<AnalyticsLog> {
        &self.inner.analytics
    }

    /// 加入一个 toast：有空位时立即显示，否则排到队尾
    pub fn admit(&self, mut toast: Toast) -> String {
        let id = toast.id.clone();
        let aftermath = {
            let mut state = self.inner.state.lock();
            state.assign_seq(&mut toast);
            let mut notices = Vec::new();
            if state.active.len() < self.inner.settings.max_active {
                self.activate(&mut state, toast, &mut notices);
            } else {
                debug!(toast_id = %id, queued = state.queue.len() + 1, "活跃 toast 已满，进入等待队列");
                state.queue.push_back(toast);
            }
            self.aftermath(&state, notices)
        };
        self.settle(aftermath);
        id
    }

    /// 立即移除，返回是否找到该 toast
    pub fn dismiss(&self, id: &str) -> bool {
        self.remove(id, DismissReason::Manual)
    }

    /// 按指定原因立即移除
    pub fn dismiss_with_reason(&self, id: &str, reason: DismissReason) -> bool {
        self.remove(id, reason)
    }

    /// 移除分组内所有活跃与排队中的 toast，返回移除数量
    pub fn dismiss_group(&self, group_id: &str) -> usize {
        let (removed, aftermath) = {
            let mut state = self.inner.state.lock();
            let mut notices = Vec::new();

            let mut kept = Vec::with_capacity(state.active.len());
            for entry in state.active.drain(..) {
                if entry.toast.in_group(group_id) {
                    notices.push(Notice::Dismissed(entry.toast.clone(), DismissReason::Group));
                } else {
                    kept.push(entry);
                }
            }
            let removed_active = notices.len();
            state.active = kept;

            let queued_before = state.queue.len();
            state.queue.retain(|t| !t.in_group(group_id));
            let removed = removed_active + (queued_before - state.queue.len());

            self.promote(&mut state, &mut notices);
            (removed, self.aftermath(&state, notices))
        };

        if removed > 0 {
            info!(group_id, removed, "已关闭分组内的 toast");
            self.settle(aftermath);
        }
        removed
    }

    /// 清空全部 toast，返回移除数量
    pub fn clear(&self) -> usize {
        let (removed, aftermath) = {
            let mut state = self.inner.state.lock();
            let notices: Vec<Notice> = state
                .active
                .drain(..)
                .map(|entry| Notice::Dismissed(entry.toast.clone(), DismissReason::Clear))
                .collect();
            let removed = notices.len() + state.queue.len();
            state.queue.clear();
            (removed, self.aftermath(&state, notices))
        };

        if removed > 0 {
            info!(removed, "已清空全部 toast");
            self.settle(aftermath);
        }
        removed
    }

    /// 带退出动画的关闭：先进入淡出阶段，动画结束后再移除
    ///
    /// 排队中的 toast 没有动画，直接移除。
    pub fn fade_out(&self, id: &str, reason: DismissReason) -> bool {
        let in_active = self.inner.state.lock().find_active(id).is_some();
        if in_active {
            self.begin_exit(id, reason, false);
            true
        } else {
            self.remove(id, reason)
        }
    }

    /// 有空位时按 FIFO 提升排队中的 toast，返回提升数量
    pub fn process_queue(&self) -> usize {
        let (promoted, aftermath) = {
            let mut state = self.inner.state.lock();
            let mut notices = Vec::new();
            self.promote(&mut state, &mut notices);
            (notices.len(), self.aftermath(&state, notices))
        };
        if promoted > 0 {
            self.settle(aftermath);
        }
        promoted
    }

    /// 暂停倒计时，记录精确的剩余时间
    pub fn pause(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let Some(entry) = state.find_active(id) else {
            return false;
        };
        if entry.phase != ToastPhase::Active {
            return false;
        }
        let progress = match entry.countdown.as_mut() {
            Some(countdown) if countdown.is_running() => {
                countdown.pause(now);
                countdown.progress_at(now)
            }
            _ => return false,
        };
        entry.stop_tasks();
        entry.progress.send_replace(progress);
        debug!(toast_id = id, "toast 倒计时已暂停");
        true
    }

    /// 以暂停时记录的剩余时间恢复倒计时
    pub fn resume(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let Some(entry) = state.find_active(id) else {
            return false;
        };
        if !entry.is_paused() {
            return false;
        }
        if let Some(countdown) = entry.countdown.as_mut() {
            countdown.resume(now);
        }
        self.arm(entry, now);
        debug!(toast_id = id, "toast 倒计时已恢复");
        true
    }

    pub fn is_paused(&self, id: &str) -> bool {
        self.inner
            .state
            .lock()
            .find_active(id)
            .is_some_and(|e| e.is_paused())
    }

    /// 剩余时间，没有倒计时或不在活跃集合中时为 None
    pub fn remaining(&self, id: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let entry = state.find_active(id)?;
        if entry.phase == ToastPhase::FadingOut {
            return Some(Duration::ZERO);
        }
        entry.countdown.as_ref().map(|c| c.remaining_at(now))
    }

    /// 按需计算的剩余时间百分比
    pub fn progress(&self, id: &str) -> Option<f64> {
        let now = Instant::now();
        self.inner
            .state
            .lock()
            .find_active(id)
            .and_then(|e| e.progress_at(now))
    }

    /// 订阅进度推送，值随进度任务刷新
    pub fn subscribe_progress(&self, id: &str) -> Option<watch::Receiver<f64>> {
        self.inner
            .state
            .lock()
            .find_active(id)
            .map(|e| e.progress.subscribe())
    }

    pub fn phase(&self, id: &str) -> Option<ToastPhase> {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.find_active(id) {
            return Some(entry.phase);
        }
        state
            .queue
            .iter()
            .any(|t| t.id == id)
            .then_some(ToastPhase::Queued)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.phase(id).is_some()
    }

    /// 取 toast 副本（活跃或排队中）
    pub fn get(&self, id: &str) -> Option<Toast> {
        let mut state = self.inner.state.lock();
        if let Some(entry) = state.find_active(id) {
            return Some(entry.toast.clone());
        }
        state.queue.iter().find(|t| t.id == id).cloned()
    }

    /// 活跃 toast id（按进入活跃集合的顺序）
    pub fn active_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        state.active.iter().map(|e| e.toast.id.clone()).collect()
    }

    /// 排队中的 toast id（按入队顺序）
    pub fn queued_ids(&self) -> Vec<String> {
        let state = self.inner.state.lock();
        state.queue.iter().map(|t| t.id.clone()).collect()
    }

    pub fn active_len(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// 活跃 toast 的只读快照
    pub fn snapshot(&self) -> Vec<ToastView> {
        let now = Instant::now();
        let state = self.inner.state.lock();
        state
            .active
            .iter()
            .map(|entry| {
                let toast = &entry.toast;
                ToastView {
                    id: toast.id.clone(),
                    title: toast.title.clone(),
                    description: toast.description.clone(),
                    variant: toast.variant,
                    priority: toast.priority,
                    group_id: toast.group_id.clone(),
                    persistent: toast.persistent,
                    created_at: toast.created_at,
                    seq: toast.seq,
                    phase: entry.phase,
                    paused: entry.is_paused(),
                    show_progress: toast.show_progress,
                    progress: entry.progress_at(now),
                    theme: toast.theme.clone(),
                    animation: toast.animation.clone(),
                    actions: toast
                        .actions
                        .iter()
                        .map(|a| ActionView {
                            label: a.label.clone(),
                            variant: a.variant,
                            awaiting_confirmation: (entry.pending_confirmation.as_deref()
                                == Some(a.label.as_str()))
                            .then(|| a.confirmation_message.clone().unwrap_or_default()),
                        })
                        .collect(),
                }
            })
            .collect()
    }

    /// 点击按钮前的检查
    ///
    /// 需要确认的按钮第一次点击只进入确认状态；再次点击同一按钮才返回 Ready。
    pub fn prepare_action(&self, id: &str, label: &str) -> ActionStep {
        let mut state = self.inner.state.lock();
        let Some(entry) = state.find_active(id) else {
            return ActionStep::Missing;
        };
        if entry.phase != ToastPhase::Active {
            return ActionStep::Missing;
        }
        let Some(action) = entry.toast.find_action(label).cloned() else {
            return ActionStep::Missing;
        };

        if action.requires_confirmation && entry.pending_confirmation.as_deref() != Some(label) {
            entry.pending_confirmation = Some(label.to_string());
            let message = action
                .confirmation_message
                .clone()
                .unwrap_or_else(|| format!("确定要执行「{label}」吗？"));
            return ActionStep::NeedsConfirmation(message);
        }

        entry.pending_confirmation = None;
        ActionStep::Ready {
            action,
            toast: entry.toast.clone(),
        }
    }

    /// 取消等待中的确认
    pub fn cancel_confirmation(&self, id: &str) -> bool {
        self.inner
            .state
            .lock()
            .find_active(id)
            .and_then(|e| e.pending_confirmation.take())
            .is_some()
    }

    /// 从持久化存储恢复 toast，按正常规则入场，返回恢复数量
    pub fn restore(&self) -> usize {
        let Some(persistence) = &self.inner.persistence else {
            return 0;
        };
        let records = persistence.load();
        if records.is_empty() {
            return 0;
        }

        let animation = &self.inner.settings.default_animation;
        let (restored, aftermath) = {
            let mut state = self.inner.state.lock();
            let mut notices = Vec::new();
            let mut restored = 0;
            for record in records {
                if state.find_active(&record.id).is_some()
                    || state.queue.iter().any(|t| t.id == record.id)
                {
                    debug!(toast_id = %record.id, "toast 已存在，跳过恢复");
                    continue;
                }
                restored += 1;
                let mut toast = record.into_toast(animation);
                state.assign_seq(&mut toast);
                if state.active.len() < self.inner.settings.max_active {
                    self.activate(&mut state, toast, &mut notices);
                } else {
                    state.queue.push_back(toast);
                }
            }
            (restored, self.aftermath(&state, notices))
        };

        if restored > 0 {
            info!(restored, "已从存储恢复 persistent toast");
            self.settle(aftermath);
        }
        restored
    }

    // ---- 内部实现 ----

    fn remove(&self, id: &str, reason: DismissReason) -> bool {
        let aftermath = {
            let mut state = self.inner.state.lock();
            let mut notices = Vec::new();

            if let Some(pos) = state.active.iter().position(|e| e.toast.id == id) {
                let entry = state.active.remove(pos);
                notices.push(Notice::Dismissed(entry.toast.clone(), reason));
                drop(entry);
                self.promote(&mut state, &mut notices);
            } else if let Some(pos) = state.queue.iter().position(|t| t.id == id) {
                state.queue.remove(pos);
            } else {
                return false;
            }
            self.aftermath(&state, notices)
        };

        debug!(toast_id = id, reason = reason.as_str(), "toast 已移除");
        self.settle(aftermath);
        true
    }

    /// 进入淡出阶段
    ///
    /// 由倒计时任务触发时，只有倒计时确实耗尽才生效，避免与暂停竞争。
    fn begin_exit(&self, id: &str, reason: DismissReason, from_timer: bool) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let Some(entry) = state.find_active(id) else {
            return;
        };
        if entry.phase == ToastPhase::FadingOut {
            return;
        }
        if from_timer
            && entry
                .countdown
                .as_ref()
                .is_none_or(|c| !c.is_running() || !c.remaining_at(now).is_zero())
        {
            return;
        }

        entry.stop_tasks();
        entry.phase = ToastPhase::FadingOut;
        entry.pending_confirmation = None;
        entry.progress.send_replace(0.0);

        let delay = entry.toast.animation.exit_duration();
        let weak = Arc::downgrade(&self.inner);
        match spawn_task(exit_task(weak, id.to_string(), delay, reason)) {
            Some(handle) => {
                entry.timer = Some(handle);
                debug!(toast_id = id, delay_ms = delay.as_millis() as u64, "toast 开始淡出");
            }
            None => {
                drop(state);
                self.remove(id, reason);
            }
        }
    }

    /// 淡出动画结束后的移除
    fn finish_exit(&self, id: &str, reason: DismissReason) {
        let fading = self
            .inner
            .state
            .lock()
            .find_active(id)
            .is_some_and(|e| e.phase == ToastPhase::FadingOut);
        if fading {
            self.remove(id, reason);
        }
    }

    /// 进度任务回调，返回 false 表示任务应当结束
    fn refresh_progress(&self, id: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let Some(entry) = state.find_active(id) else {
            return false;
        };
        if entry.phase != ToastPhase::Active {
            return false;
        }
        match entry.countdown.as_ref() {
            Some(countdown) if countdown.is_running() => {
                entry.progress.send_replace(countdown.progress_at(now));
                true
            }
            _ => false,
        }
    }

    fn activate(&self, state: &mut StoreState, toast: Toast, notices: &mut Vec<Notice>) {
        let now = Instant::now();
        let mut entry = ActiveEntry::new(toast.clone());
        if toast.has_countdown() {
            entry.countdown = Some(Countdown::start(
                Duration::from_millis(toast.duration_ms),
                now,
            ));
            self.arm(&mut entry, now);
        }
        state.active.push(entry);
        notices.push(Notice::Shown(toast));
    }

    /// 按当前剩余时间启动倒计时与进度任务
    fn arm(&self, entry: &mut ActiveEntry, now: Instant) {
        let Some(countdown) = entry.countdown else {
            return;
        };
        entry.stop_tasks();

        let id = entry.toast.id.clone();
        let weak = Arc::downgrade(&self.inner);
        entry.timer = spawn_task(countdown_task(
            weak.clone(),
            id.clone(),
            now + countdown.remaining_at(now),
        ));
        if entry.toast.show_progress {
            entry.ticker = spawn_task(ticker_task(weak, id, self.inner.settings.progress_tick));
        }
        entry.progress.send_replace(countdown.progress_at(now));
    }

    fn promote(&self, state: &mut StoreState, notices: &mut Vec<Notice>) {
        while state.active.len() < self.inner.settings.max_active {
            let Some(next) = state.queue.pop_front() else {
                break;
            };
            debug!(toast_id = %next.id, "排队中的 toast 已进入活跃集合");
            self.activate(state, next, notices);
        }
    }

    fn aftermath(&self, state: &StoreState, notices: Vec<Notice>) -> Aftermath {
        let persisted = self.inner.persistence.as_ref().map(|persistence| {
            let records = state
                .active
                .iter()
                .map(|e| &e.toast)
                .chain(state.queue.iter())
                .filter(|t| t.persistent)
                .map(PersistedToast::from)
                .collect();
            (persistence.stamp(), records)
        });
        Aftermath {
            notices,
            persisted,
            queue_len: state.queue.len(),
        }
    }

    /// 释放锁之后执行：分析事件、用户回调、持久化
    fn settle(&self, aftermath: Aftermath) {
        metrics::record_queue_length(aftermath.queue_len);

        for notice in aftermath.notices {
            match notice {
                Notice::Shown(toast) => {
                    self.inner.analytics.record(
                        AnalyticsEvent::new(&toast.id, AnalyticsKind::Show)
                            .with_meta("variant", toast.variant.as_str())
                            .with_meta("priority", toast.priority),
                    );
                    if let Some(cb) = &toast.callbacks.on_show {
                        run_guarded("on_show", &toast.id, || cb());
                    }
                }
                Notice::Dismissed(toast, reason) => {
                    self.inner.analytics.record(
                        AnalyticsEvent::new(&toast.id, AnalyticsKind::Dismiss)
                            .with_meta("reason", reason.as_str()),
                    );
                    if let Some(cb) = &toast.callbacks.on_dismiss {
                        run_guarded("on_dismiss", &toast.id, || cb());
                    }
                }
            }
        }

        if let (Some(persistence), Some((generation, records))) =
            (&self.inner.persistence, aftermath.persisted)
        {
            if let Err(e) = persistence.save_stamped(generation, records) {
                error!(error = %e, "写入持久化 toast 失败");
            }
        }
    }
}

fn spawn_task<F>(future: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle.spawn(future)),
        Err(_) => {
            warn!("当前不在 tokio 运行时中，toast 计时任务未启动");
            None
        }
    }
}

async fn countdown_task(store: Weak<StoreInner>, id: String, deadline: Instant) {
    tokio::time::sleep_until(deadline).await;
    if let Some(inner) = store.upgrade() {
        ToastStore { inner }.begin_exit(&id, DismissReason::Auto, true);
    }
}

async fn exit_task(store: Weak<StoreInner>, id: String, delay: Duration, reason: DismissReason) {
    tokio::time::sleep(delay).await;
    if let Some(inner) = store.upgrade() {
        ToastStore { inner }.finish_exit(&id, reason);
    }
}

async fn ticker_task(store: Weak<StoreInner>, id: String, tick: Duration) {
    let mut interval = tokio::time::interval(tick.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let Some(inner) = store.upgrade() else {
            break;
        };
        if !(ToastStore { inner }).refresh_progress(&id) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStorage, ToastStorage};
    use crate::types::ToastOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(max_active: usize) -> StoreSettings {
        StoreSettings {
            max_active,
            progress_tick: Duration::from_millis(10),
            default_animation: ToastAnimation::fade_in(),
        }
    }

    fn store(max_active: usize) -> ToastStore {
        ToastStore::new(settings(max_active), Arc::new(AnalyticsLog::new(100)), None)
    }

    fn toast(title: &str, duration_ms: u64) -> Toast {
        Toast::from_options(
            ToastOptions::new(title).with_duration(duration_ms),
            3000,
            &ToastAnimation::fade_in(),
        )
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_admit_respects_cap() {
        let store = store(2);
        let a = store.admit(toast("a", 1000));
        let b = store.admit(toast("b", 1000));
        let c = store.admit(toast("c", 1000));

        assert_eq!(store.active_ids(), vec![a, b]);
        assert_eq!(store.queued_ids(), vec![c.clone()]);
        assert_eq!(store.phase(&c), Some(ToastPhase::Queued));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_promotes_fifo_and_is_idempotent() {
        let store = store(1);
        let a = store.admit(toast("a", 0));
        let b = store.admit(toast("b", 0));
        let c = store.admit(toast("c", 0));

        assert!(store.dismiss(&a));
        assert_eq!(store.active_ids(), vec![b.clone()]);
        assert_eq!(store.queued_ids(), vec![c]);

        assert!(!store.dismiss(&a));
        assert!(!store.dismiss("no-such-id"));
        assert_eq!(store.active_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_fades_then_removes() {
        let store = store(3);
        let id = store.admit(toast("a", 1000));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(store.phase(&id), Some(ToastPhase::FadingOut));
        assert_eq!(store.progress(&id), Some(0.0));

        // fade_in 的退出动画为 200ms
        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert!(!store.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_never_expires() {
        let store = store(3);
        let id = store.admit(toast("sticky", 0));

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(store.phase(&id), Some(ToastPhase::Active));
        assert_eq!(store.progress(&id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_keeps_exact_remaining() {
        let store = store(3);
        let id = store.admit(toast("a", 1000));

        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(store.pause(&id));
        assert!(store.is_paused(&id));
        assert_eq!(store.remaining(&id), Some(Duration::from_millis(600)));

        // 暂停期间不计时
        tokio::time::advance(Duration::from_secs(5)).await;
        settle().await;
        assert_eq!(store.remaining(&id), Some(Duration::from_millis(600)));
        assert_eq!(store.phase(&id), Some(ToastPhase::Active));

        assert!(store.resume(&id));
        assert!(!store.resume(&id));
        tokio::time::sleep(Duration::from_millis(599)).await;
        settle().await;
        assert_eq!(store.phase(&id), Some(ToastPhase::Active));

        tokio::time::sleep(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(store.phase(&id), Some(ToastPhase::FadingOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticker_publishes() {
        let store = store(3);
        let id = store.admit(toast("a", 1000));
        let rx = store.subscribe_progress(&id).unwrap();

        tokio::time::sleep(Duration::from_millis(250)).await;
        settle().await;
        let value = *rx.borrow();
        assert!((value - 75.0).abs() < 1.5, "progress = {value}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dismiss_group_removes_active_and_queued() {
        let store = store(2);
        let g = |title: &str| {
            Toast::from_options(
                ToastOptions::new(title).with_group("meal-plan"),
                0,
                &ToastAnimation::fade_in(),
            )
        };
        store.admit(g("a"));
        let other = store.admit(toast("other", 0));
        store.admit(g("b"));

        assert_eq!(store.dismiss_group("meal-plan"), 2);
        assert_eq!(store.active_ids(), vec![other]);
        assert_eq!(store.queue_len(), 0);
        assert_eq!(store.dismiss_group("meal-plan"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_everything() {
        let store = store(1);
        let dismissed = Arc::new(AtomicUsize::new(0));
        let d = dismissed.clone();
        let mut t = toast("a", 1000);
        t.callbacks.on_dismiss = Some(Arc::new(move || {
            d.fetch_add(1, Ordering::SeqCst);
        }));
        store.admit(t);
        store.admit(toast("b", 1000));

        assert_eq!(store.clear(), 2);
        assert_eq!(store.active_len(), 0);
        assert_eq!(store.queue_len(), 0);
        assert_eq!(dismissed.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(store.clear(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_reenter_store() {
        let store = store(3);
        let handle = store.clone();
        let mut t = toast("a", 0);
        t.callbacks.on_show = Some(Arc::new(move || {
            handle.admit(Toast::from_options(
                ToastOptions::new("from callback").with_duration(0),
                0,
                &ToastAnimation::fade_in(),
            ));
        }));

        store.admit(t);
        assert_eq!(store.active_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_flow() {
        let store = store(3);
        let mut t = toast("a", 0);
        t.actions.push(ToastAction::new("删除").with_confirmation("确定删除这份菜单？"));
        t.actions.push(ToastAction::new("查看"));
        let id = store.admit(t);

        match store.prepare_action(&id, "删除") {
            ActionStep::NeedsConfirmation(msg) => assert_eq!(msg, "确定删除这份菜单？"),
            _ => panic!("expected confirmation"),
        }
        let view = &store.snapshot()[0];
        assert!(view.actions[0].awaiting_confirmation.is_some());

        assert!(matches!(store.prepare_action(&id, "删除"), ActionStep::Ready { .. }));
        assert!(matches!(store.prepare_action(&id, "查看"), ActionStep::Ready { .. }));
        assert!(matches!(store.prepare_action(&id, "不存在"), ActionStep::Missing));

        store.prepare_action(&id, "删除");
        assert!(store.cancel_confirmation(&id));
        assert!(!store.cancel_confirmation(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_is_animated() {
        let store = store(3);
        let id = store.admit(toast("a", 0));

        assert!(store.fade_out(&id, DismissReason::Manual));
        assert_eq!(store.phase(&id), Some(ToastPhase::FadingOut));

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert!(!store.contains(&id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_toasts_are_saved_and_restored() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = ToastPersistence::new(storage.clone(), 1024 * 1024);
        let store = ToastStore::new(
            settings(3),
            Arc::new(AnalyticsLog::new(100)),
            Some(persistence.clone()),
        );

        let kept = store.admit(Toast::from_options(
            ToastOptions::new("本周菜单已保存").persistent(),
            3000,
            &ToastAnimation::fade_in(),
        ));
        store.admit(toast("transient", 1000));
        assert!(storage.contents().unwrap().contains(&kept));

        let restored = ToastStore::new(
            settings(3),
            Arc::new(AnalyticsLog::new(100)),
            Some(persistence),
        );
        assert_eq!(restored.restore(), 1);
        assert_eq!(restored.active_ids(), vec![kept.clone()]);
        assert!(restored.get(&kept).unwrap().persistent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_counts_only_admitted() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = ToastPersistence::new(storage, 1024 * 1024);
        let store = ToastStore::new(
            settings(3),
            Arc::new(AnalyticsLog::new(100)),
            Some(persistence),
        );
        store.admit(Toast::from_options(
            ToastOptions::new("冰箱库存").persistent(),
            3000,
            &ToastAnimation::fade_in(),
        ));

        // 存储里的记录都已在 store 中
        assert_eq!(store.restore(), 0);
        assert_eq!(store.active_len(), 1);
    }

    /// 第一次 save 在闸门处等待，直到测试放行
    struct GatedStorage {
        data: MemoryStorage,
        entered: Mutex<Option<std::sync::mpsc::Sender<()>>>,
        release: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    }

    impl GatedStorage {
        fn new() -> Self {
            Self {
                data: MemoryStorage::new(),
                entered: Mutex::new(None),
                release: Mutex::new(None),
            }
        }

        fn close_gate(
            &self,
        ) -> (std::sync::mpsc::Receiver<()>, std::sync::mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = std::sync::mpsc::channel();
            let (release_tx, release_rx) = std::sync::mpsc::channel();
            *self.entered.lock() = Some(entered_tx);
            *self.release.lock() = Some(release_rx);
            (entered_rx, release_tx)
        }
    }

    impl ToastStorage for GatedStorage {
        fn load(&self) -> crate::error::Result<Option<String>> {
            self.data.load()
        }

        fn save(&self, data: &str) -> crate::error::Result<()> {
            let gate = self.release.lock().take();
            if let Some(release) = gate {
                if let Some(entered) = self.entered.lock().take() {
                    entered.send(()).unwrap();
                }
                release.recv().unwrap();
            }
            self.data.save(data)
        }

        fn clear(&self) -> crate::error::Result<()> {
            self.data.clear()
        }
    }

    #[test]
    fn test_concurrent_saves_keep_latest_snapshot() {
        let storage = Arc::new(GatedStorage::new());
        let store = ToastStore::new(
            settings(3),
            Arc::new(AnalyticsLog::new(100)),
            Some(ToastPersistence::new(storage.clone(), 1024 * 1024)),
        );
        let transient = store.admit(toast("临时提示", 0));
        let (entered, release) = storage.close_gate();

        // 线程 A 的快照（空列表）卡在写入中
        let dismisser = {
            let store = store.clone();
            std::thread::spawn(move || store.dismiss(&transient))
        };
        entered.recv().unwrap();

        // 更新的快照在 A 写完之前生成
        let kept = store.admit(Toast::from_options(
            ToastOptions::new("购物清单").persistent(),
            3000,
            &ToastAnimation::fade_in(),
        ));

        release.send(()).unwrap();
        assert!(dismisser.join().unwrap());

        let stored = storage.data.contents().unwrap();
        assert!(stored.contains(&kept), "stored = {stored}");
    }

    #[test]
    fn test_admit_without_runtime_does_not_panic() {
        let store = store(3);
        let id = store.admit(toast("a", 1000));
        assert_eq!(store.phase(&id), Some(ToastPhase::Active));
    }
}
