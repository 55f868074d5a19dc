use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::migrations::run_migrations;
use crate::models::{
    Document, Settings, Task, Timestamp, KEY_LAST_BACKUP, KEY_SCHEMA_VERSION, KEY_SETTINGS,
    KEY_TASKS,
};
use crate::storage::{Storage, StorageError};

pub const DEFAULT_CONFIG_NAME: &str = "user-preferences";
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub type BackupCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug)]
pub enum StoreError {
    /// The data file exists but could not be read.
    Read(StorageError),
    /// The data file is not a valid document.
    Parse(StorageError),
    Write(StorageError),
    Backup(StorageError),
    InvalidValue {
        key: String,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Read(err) => write!(f, "read failure: {err}"),
            StoreError::Parse(err) => write!(f, "parse failure: {err}"),
            StoreError::Write(err) => write!(f, "write failure: {err}"),
            StoreError::Backup(err) => write!(f, "backup failure: {err}"),
            StoreError::InvalidValue { key, source } => {
                write!(f, "invalid value for key {key:?}: {source}")
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Read(err)
            | StoreError::Parse(err)
            | StoreError::Write(err)
            | StoreError::Backup(err) => Some(err),
            StoreError::InvalidValue { source, .. } => Some(source),
        }
    }
}

pub struct StoreOptions {
    pub dir: PathBuf,
    pub config_name: String,
    pub defaults: Document,
    pub debounce: Duration,
    pub backup_interval: Duration,
    /// Runs the scheduled flushes.
    pub runtime: Handle,
    on_backup: Option<BackupCallback>,
}

impl StoreOptions {
    pub fn new(dir: PathBuf, runtime: Handle) -> Self {
        Self {
            dir,
            config_name: DEFAULT_CONFIG_NAME.to_string(),
            defaults: Document::default(),
            debounce: DEFAULT_DEBOUNCE,
            backup_interval: DEFAULT_BACKUP_INTERVAL,
            runtime,
            on_backup: None,
        }
    }

    pub fn with_config_name(mut self, config_name: impl Into<String>) -> Self {
        self.config_name = config_name.into();
        self
    }

    pub fn with_defaults(mut self, defaults: Document) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_backup_interval(mut self, interval: Duration) -> Self {
        self.backup_interval = interval;
        self
    }

    /// Called at most once, from `Store::open`, when a backup snapshot was written.
    pub fn on_backup(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_backup = Some(Box::new(callback));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadOutcome {
    Loaded,
    Missing,
    Recovered,
}

/// Key-value document persisted as one JSON file.
///
/// Reads and writes hit the in-memory document; every mutation (re)schedules a single flush
/// `debounce` after the last one. Cloning is cheap and shares the same document.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    storage: Storage,
    data: Mutex<Document>,
    dirty: AtomicBool,
    pending: Mutex<Option<JoinHandle<()>>>,
    write_lock: Mutex<()>,
    flushes: AtomicU64,
    debounce: Duration,
    runtime: Handle,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Store {
    /// Opens (or creates) the document. Never fails: unreadable or corrupted files fall back to
    /// the configured defaults, and corrupted ones are copied aside first.
    pub fn open(options: StoreOptions) -> Self {
        Self::open_at(options, Utc::now().timestamp_millis())
    }

    pub(crate) fn open_at(options: StoreOptions, now: Timestamp) -> Self {
        let StoreOptions {
            dir,
            config_name,
            defaults,
            debounce,
            backup_interval,
            runtime,
            on_backup,
        } = options;

        let storage = Storage::new(dir, config_name);
        if let Err(error) = storage.ensure_dirs() {
            log::error!("store: cannot create data dir error={error}");
        }
        let (document, outcome) = load_or_recover(&storage, &defaults, now);

        let store = Self {
            inner: Arc::new(StoreInner {
                storage,
                data: Mutex::new(document),
                dirty: AtomicBool::new(false),
                pending: Mutex::new(None),
                write_lock: Mutex::new(()),
                flushes: AtomicU64::new(0),
                debounce,
                runtime,
            }),
        };

        // A recovered document is only defaults; keep the last good snapshot instead of
        // overwriting it.
        if outcome != LoadOutcome::Recovered && store.rotate_backup(now, backup_interval) {
            if let Some(callback) = on_backup {
                callback();
            }
        }

        let report = {
            let mut doc = store.lock_data();
            run_migrations(&mut doc)
        };
        if report.changed {
            store.schedule_flush();
        }

        store
    }

    pub fn path(&self) -> PathBuf {
        self.inner.storage.primary_path()
    }

    pub fn backup_path(&self) -> PathBuf {
        self.inner.storage.backup_path()
    }

    /// Current value for a top-level key, or `None` if it was never set.
    pub fn get(&self, key: &str) -> Option<Value> {
        let doc = self.lock_data();
        match key {
            KEY_TASKS => serde_json::to_value(&doc.tasks).ok(),
            KEY_SETTINGS => serde_json::to_value(&doc.settings).ok(),
            KEY_LAST_BACKUP => doc.last_backup.map(Value::from),
            KEY_SCHEMA_VERSION => doc.schema_version.map(Value::from),
            _ => doc.extra.get(key).cloned(),
        }
    }

    /// Replaces a top-level key. Known keys must match their schema; on mismatch nothing changes.
    pub fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        let invalid = |source| StoreError::InvalidValue {
            key: key.to_string(),
            source,
        };
        {
            let mut doc = self.lock_data();
            match key {
                KEY_TASKS => doc.tasks = serde_json::from_value(value).map_err(invalid)?,
                KEY_SETTINGS => doc.settings = serde_json::from_value(value).map_err(invalid)?,
                KEY_LAST_BACKUP => {
                    doc.last_backup = serde_json::from_value(value).map_err(invalid)?
                }
                KEY_SCHEMA_VERSION => {
                    doc.schema_version = serde_json::from_value(value).map_err(invalid)?
                }
                _ => {
                    doc.extra.insert(key.to_string(), value);
                }
            }
        }
        self.schedule_flush();
        Ok(())
    }

    pub fn document(&self) -> Document {
        self.lock_data().clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock_data().tasks.clone()
    }

    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.update(|doc| doc.tasks = tasks);
    }

    pub fn settings(&self) -> Settings {
        self.lock_data().settings.clone()
    }

    pub fn set_settings(&self, settings: Settings) {
        self.update(|doc| doc.settings = settings);
    }

    /// Read-modify-write under one lock, then schedules a flush.
    pub fn update<R>(&self, f: impl FnOnce(&mut Document) -> R) -> R {
        let result = {
            let mut doc = self.lock_data();
            f(&mut doc)
        };
        self.schedule_flush();
        result
    }

    /// Like [`Store::update`], but only schedules a flush when `f` succeeds.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut Document) -> Result<R, E>) -> Result<R, E> {
        let result = {
            let mut doc = self.lock_data();
            f(&mut doc)
        };
        if result.is_ok() {
            self.schedule_flush();
        }
        result
    }

    /// Writes the document now, regardless of pending changes.
    pub fn flush_now(&self) -> Result<(), StoreError> {
        self.inner.dirty.store(true, Ordering::SeqCst);
        self.inner.flush_if_dirty()
    }

    /// Cancels the scheduled flush and writes any change it would have written.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        if let Some(pending) = lock(&self.inner.pending).take() {
            pending.abort();
        }
        let result = self.inner.flush_if_dirty();
        log::info!(
            "store: shutdown flushes={} ok={}",
            self.flush_count(),
            result.is_ok()
        );
        result
    }

    pub fn has_pending_changes(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    /// Number of successful writes of the primary file since open.
    pub fn flush_count(&self) -> u64 {
        self.inner.flushes.load(Ordering::SeqCst)
    }

    fn lock_data(&self) -> MutexGuard<'_, Document> {
        lock(&self.inner.data)
    }

    fn schedule_flush(&self) {
        self.inner.dirty.store(true, Ordering::SeqCst);

        let mut pending = lock(&self.inner.pending);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        // The timer must not keep the store alive; dropping the last handle flushes instead.
        let inner = Arc::downgrade(&self.inner);
        let delay = self.inner.debounce;
        *pending = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            match tokio::task::spawn_blocking(move || inner.flush_if_dirty()).await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => log::error!("store: scheduled flush failed error={error}"),
                Err(error) => log::error!("store: flush task did not finish error={error}"),
            }
        }));
    }

    // Returns true when a snapshot was written and the new timestamp reached disk.
    fn rotate_backup(&self, now: Timestamp, interval: Duration) -> bool {
        let snapshot = self.document();
        let last_backup = snapshot.last_backup.unwrap_or(0);
        let interval_ms = i64::try_from(interval.as_millis()).unwrap_or(i64::MAX);
        if now.saturating_sub(last_backup) <= interval_ms {
            log::debug!("store: backup not due last_backup={last_backup}");
            return false;
        }

        if let Err(error) = self.inner.storage.save_backup(&snapshot) {
            log::error!("store: {}", StoreError::Backup(error));
            return false;
        }
        self.lock_data().last_backup = Some(now);

        match self.flush_now() {
            Ok(()) => {
                log::info!(
                    "store: backup created path={}",
                    self.inner.storage.backup_path().display()
                );
                true
            }
            Err(error) => {
                log::error!("store: backup timestamp not saved error={error}");
                false
            }
        }
    }
}

impl StoreInner {
    fn flush_if_dirty(&self) -> Result<(), StoreError> {
        let _writer = lock(&self.write_lock);
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let snapshot = lock(&self.data).clone();
        match self.storage.save_document(&snapshot) {
            Ok(bytes) => {
                self.flushes.fetch_add(1, Ordering::SeqCst);
                log::debug!("store: flushed bytes={bytes}");
                Ok(())
            }
            Err(error) => {
                // In-memory state stays authoritative; the next flush retries.
                self.dirty.store(true, Ordering::SeqCst);
                Err(StoreError::Write(error))
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(pending) = self
            .pending
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            pending.abort();
        }
        if let Err(error) = self.flush_if_dirty() {
            log::error!("store: final flush failed error={error}");
        }
    }
}

fn load_or_recover(
    storage: &Storage,
    defaults: &Document,
    now: Timestamp,
) -> (Document, LoadOutcome) {
    let path = storage.primary_path();
    let error = match storage.load_document() {
        Ok(doc) => {
            log::info!("store: loaded path={}", path.display());
            return (doc, LoadOutcome::Loaded);
        }
        Err(error) if error.is_not_found() => {
            log::info!("store: no data file, using defaults path={}", path.display());
            return (defaults.clone(), LoadOutcome::Missing);
        }
        Err(error @ StorageError::Json(_)) => StoreError::Parse(error),
        Err(error) => StoreError::Read(error),
    };

    log::warn!("store: {error} path={}", path.display());
    match storage.quarantine_primary(now) {
        Ok(target) => log::warn!(
            "store: corrupted data file backed up to={}",
            target.display()
        ),
        Err(copy_error) => {
            log::error!("store: failed to back up corrupted file error={copy_error}")
        }
    }
    (defaults.clone(), LoadOutcome::Recovered)
}
