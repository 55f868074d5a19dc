use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::store::Store;

/// One-shot flag raised by the store's backup callback and consumed by the first window
/// that asks for it.
#[derive(Clone, Default)]
pub struct BackupNotice {
    created: Arc<AtomicBool>,
}

impl BackupNotice {
    pub fn mark(&self) {
        self.created.store(true, Ordering::SeqCst);
    }

    pub fn take(&self) -> bool {
        self.created.swap(false, Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct AppState {
    store: Store,
    backup_notice: BackupNotice,
}

impl AppState {
    pub fn new(store: Store, backup_notice: BackupNotice) -> Self {
        Self {
            store,
            backup_notice,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn take_backup_notice(&self) -> bool {
        self.backup_notice.take()
    }

    /// Writes anything still waiting for the debounce timer.
    pub fn shutdown(&self) {
        if let Err(error) = self.store.shutdown() {
            log::error!("state: store shutdown failed error={error}");
        }
    }
}
