//! persistent toast 的持久化
//!
//! 每次 store 变更后把所有 persistent toast 序列化为 JSON 写入受限大小的存储区；
//! 启动时逐条校验读回。存储损坏只会丢弃数据并记录日志，绝不阻止启动。

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::Result;
use crate::theme::ToastAnimation;
use crate::types::{Toast, ToastCallbacks, ToastVariant};

/// 存储后端
#[cfg_attr(test, mockall::automock)]
pub trait ToastStorage: Send + Sync {
    /// 读取整块数据，不存在时返回 None
    fn load(&self) -> Result<Option<String>>;
    fn save(&self, data: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// 基于单个 JSON 文件的存储
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ToastStorage for FileStorage {
    fn load(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, data: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// 内存存储，用于测试和无磁盘环境
#[derive(Default)]
pub struct MemoryStorage {
    data: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(data: impl Into<String>) -> Self {
        Self {
            data: Mutex::new(Some(data.into())),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.data.lock().clone()
    }
}

impl ToastStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.data.lock().clone())
    }

    fn save(&self, data: &str) -> Result<()> {
        *self.data.lock() = Some(data.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.data.lock() = None;
        Ok(())
    }
}

/// 持久化记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedToast {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub variant: ToastVariant,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    pub created_at: i64,
}

impl From<&Toast> for PersistedToast {
    fn from(toast: &Toast) -> Self {
        Self {
            id: toast.id.clone(),
            title: toast.title.clone(),
            description: toast.description.clone(),
            variant: toast.variant,
            priority: toast.priority,
            group_id: toast.group_id.clone(),
            created_at: toast.created_at,
        }
    }
}

impl PersistedToast {
    /// 还原为 persistent toast，保留原 id 与创建时间
    pub fn into_toast(self, animation: &ToastAnimation) -> Toast {
        Toast {
            id: self.id,
            title: self.title,
            description: self.description,
            variant: self.variant,
            duration_ms: 0,
            show_progress: false,
            priority: self.priority,
            group_id: self.group_id,
            persistent: true,
            theme: None,
            animation: animation.clone(),
            actions: Vec::new(),
            callbacks: ToastCallbacks::default(),
            created_at: self.created_at,
            seq: 0,
        }
    }

    /// 结构校验：必须有字符串 id、字符串 title、数值 createdAt
    fn is_valid_record(value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        obj.get("id").is_some_and(Value::is_string)
            && obj.get("title").is_some_and(Value::is_string)
            && obj.get("createdAt").is_some_and(Value::is_number)
    }

    fn from_record(mut value: Value) -> Option<Self> {
        if !Self::is_valid_record(&value) {
            return None;
        }
        // createdAt 可能以浮点数存储，统一截断为毫秒整数
        let created_at = value.get("createdAt").and_then(Value::as_f64)? as i64;
        value["createdAt"] = Value::from(created_at);
        serde_json::from_value(value).ok()
    }
}

/// 编码结果
#[derive(Debug)]
pub struct EncodedSnapshot {
    pub data: String,
    /// 因超出体积上限被淘汰的 toast id（最旧的在前）
    pub evicted: Vec<String>,
}

/// 按代次排队的写入
///
/// 同一时刻只有一个线程在写存储；其他线程只替换待写快照后立即返回，
/// 由正在写的线程接着写入。代次不大于 `latest` 的快照已过期，直接丢弃。
#[derive(Default)]
struct WriteQueue {
    latest: u64,
    pending: Option<(u64, Vec<PersistedToast>)>,
    writing: bool,
}

/// 持久化协调器：负责校验、编码与体积控制
#[derive(Clone)]
pub struct ToastPersistence {
    storage: Arc<dyn ToastStorage>,
    max_bytes: usize,
    generation: Arc<AtomicU64>,
    writes: Arc<Mutex<WriteQueue>>,
}

impl ToastPersistence {
    pub fn new(storage: Arc<dyn ToastStorage>, max_bytes: usize) -> Self {
        Self {
            storage,
            max_bytes,
            generation: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(Mutex::new(WriteQueue::default())),
        }
    }

    /// 为一份快照分配代次
    ///
    /// 必须在生成快照的同一把状态锁内调用，代次顺序即状态变更顺序。
    pub fn stamp(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 按代次顺序写入快照
    ///
    /// 比已接受的快照更旧的会被丢弃；有其他线程正在写入时，
    /// 本快照交给该线程写，调用立即返回。
    pub fn save_stamped(&self, generation: u64, toasts: Vec<PersistedToast>) -> Result<()> {
        {
            let mut queue = self.writes.lock();
            if generation <= queue.latest {
                debug!(generation, latest = queue.latest, "丢弃过期的持久化快照");
                return Ok(());
            }
            queue.latest = generation;
            queue.pending = Some((generation, toasts));
            if queue.writing {
                return Ok(());
            }
            queue.writing = true;
        }

        let mut result = Ok(());
        loop {
            let next = {
                let mut queue = self.writes.lock();
                match queue.pending.take() {
                    Some(next) => next,
                    None => {
                        queue.writing = false;
                        break;
                    }
                }
            };
            let (generation, toasts) = next;
            debug!(generation, count = toasts.len(), "写入持久化快照");
            if let Err(e) = self.save(toasts) {
                result = Err(e);
            }
        }
        result
    }

    /// 读取并校验已持久化的 toast
    ///
    /// 非法记录逐条丢弃；整块数据超限或无法解析时清空存储。
    pub fn load(&self) -> Vec<PersistedToast> {
        let blob = match self.storage.load() {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(error = %e, "读取持久化 toast 失败");
                return Vec::new();
            }
        };

        if blob.len() > self.max_bytes {
            warn!(
                size = blob.len(),
                max_bytes = self.max_bytes,
                "持久化 toast 超出体积上限，清空存储"
            );
            self.clear_storage();
            return Vec::new();
        }

        let records: Vec<Value> = match serde_json::from_str(&blob) {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "持久化 toast 数据损坏，清空存储");
                self.clear_storage();
                return Vec::new();
            }
        };

        let total = records.len();
        let toasts: Vec<PersistedToast> = records
            .into_iter()
            .filter_map(|record| {
                let parsed = PersistedToast::from_record(record.clone());
                if parsed.is_none() {
                    warn!(record = %record, "存储中发现非法 toast 记录，已丢弃");
                }
                parsed
            })
            .collect();

        debug!(total, accepted = toasts.len(), "已加载持久化 toast");
        toasts
    }

    /// 编码快照，超出上限时按创建时间从旧到新淘汰
    pub fn encode(&self, mut toasts: Vec<PersistedToast>) -> Result<EncodedSnapshot> {
        // 稳定排序：创建时间相同的保持入库顺序
        toasts.sort_by_key(|t| t.created_at);

        let mut evicted = Vec::new();
        let mut data = serde_json::to_string(&toasts)?;
        while data.len() > self.max_bytes && !toasts.is_empty() {
            evicted.push(toasts.remove(0).id);
            data = serde_json::to_string(&toasts)?;
        }

        Ok(EncodedSnapshot { data, evicted })
    }

    /// 直接写入快照，返回被淘汰的 toast id
    ///
    /// 不参与代次排序；store 的变更通过 [`save_stamped`](Self::save_stamped) 写入。
    pub fn save(&self, toasts: Vec<PersistedToast>) -> Result<Vec<String>> {
        let snapshot = self.encode(toasts)?;
        if !snapshot.evicted.is_empty() {
            warn!(
                evicted = snapshot.evicted.len(),
                max_bytes = self.max_bytes,
                "持久化 toast 超出体积上限，已淘汰最旧的记录"
            );
        }
        self.storage.save(&snapshot.data)?;
        Ok(snapshot.evicted)
    }

    fn clear_storage(&self) {
        if let Err(e) = self.storage.clear() {
            error!(error = %e, "清空 toast 存储失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, created_at: i64) -> PersistedToast {
        PersistedToast {
            id: id.to_string(),
            title: format!("标题 {id}"),
            description: None,
            variant: ToastVariant::Info,
            priority: 0,
            group_id: None,
            created_at,
        }
    }

    #[test]
    fn test_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let persistence = ToastPersistence::new(storage.clone(), 1024 * 1024);

        let evicted = persistence
            .save(vec![record("a", 2), record("b", 1)])
            .unwrap();
        assert!(evicted.is_empty());

        let loaded = persistence.load();
        let ids: Vec<_> = loaded.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(loaded[0].created_at, 1);
    }

    #[test]
    fn test_invalid_records_are_dropped() {
        let blob = r#"[
            {"id":"ok","title":"有效","createdAt":1700000000000},
            {"id":42,"title":"id 不是字符串","createdAt":1},
            {"id":"no-title","createdAt":1},
            {"id":"bad-ts","title":"时间戳非法","createdAt":"yesterday"},
            "not-an-object",
            {"id":"float","title":"浮点时间戳","createdAt":1700000000123.7}
        ]"#;
        let storage = Arc::new(MemoryStorage::with_data(blob));
        let persistence = ToastPersistence::new(storage, 1024 * 1024);

        let loaded = persistence.load();
        let ids: Vec<_> = loaded.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "float"]);
        assert_eq!(loaded[1].created_at, 1_700_000_000_123);
    }

    #[test]
    fn test_corrupted_blob_clears_storage() {
        let storage = Arc::new(MemoryStorage::with_data("{not json"));
        let persistence = ToastPersistence::new(storage.clone(), 1024);

        assert!(persistence.load().is_empty());
        assert!(storage.contents().is_none());
    }

    #[test]
    fn test_oversized_blob_clears_storage() {
        let storage = Arc::new(MemoryStorage::with_data("x".repeat(64)));
        let persistence = ToastPersistence::new(storage.clone(), 16);

        assert!(persistence.load().is_empty());
        assert!(storage.contents().is_none());
    }

    #[test]
    fn test_encode_evicts_oldest_first() {
        let storage = Arc::new(MemoryStorage::new());
        let one = serde_json::to_string(&vec![record("new", 3)]).unwrap().len();
        // 上限只容得下一条记录
        let persistence = ToastPersistence::new(storage, one + 2);

        let snapshot = persistence
            .encode(vec![record("new", 3), record("old", 1), record("mid", 2)])
            .unwrap();

        assert_eq!(snapshot.evicted, vec!["old", "mid"]);
        let kept: Vec<PersistedToast> = serde_json::from_str(&snapshot.data).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "new");
    }

    #[test]
    fn test_storage_read_error_is_not_fatal() {
        let mut storage = MockToastStorage::new();
        storage.expect_load().returning(|| {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into())
        });

        let persistence = ToastPersistence::new(Arc::new(storage), 1024);
        assert!(persistence.load().is_empty());
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested/toasts.json"));

        assert!(storage.load().unwrap().is_none());
        storage.save("[]").unwrap();
        assert_eq!(storage.load().unwrap().as_deref(), Some("[]"));
        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
        // 重复清空不是错误
        storage.clear().unwrap();
    }
}
