//! Periodic saving of the open board.

use crate::storage::{BoardDocument, Storage, StorageResult};
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key under which the most recently saved board is mirrored.
pub const LAST_BOARD_KEY: &str = "__last_board__";

/// Tracks unsaved changes and writes the board when the interval has passed.
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    dirty: bool,
    board_id: Option<String>,
}

impl<S: Storage> AutoSaveManager<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            dirty: false,
            board_id: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Save under this id instead of the document's own.
    pub fn set_board_id(&mut self, id: Option<String>) {
        self.board_id = id;
    }

    pub fn board_id(&self) -> Option<&str> {
        self.board_id.as_deref()
    }

    /// Dirty and the interval has elapsed (or nothing was saved yet).
    pub fn should_save(&self) -> bool {
        if !self.dirty {
            return false;
        }
        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Save if [`should_save`](Self::should_save). Returns true if a save happened.
    pub async fn maybe_save(&mut self, document: &BoardDocument) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }
        self.save(document).await?;
        Ok(true)
    }

    /// Save now, also mirroring the board under [`LAST_BOARD_KEY`].
    ///
    /// A failed save stays dirty and is retried after the interval.
    pub async fn save(&mut self, document: &BoardDocument) -> StorageResult<()> {
        let id = self.board_id.clone().unwrap_or_else(|| document.id.clone());
        self.last_save = Some(Instant::now());

        self.storage.save(&id, document).await?;
        self.storage.save(LAST_BOARD_KEY, document).await?;

        log::debug!("Auto-saved board '{}'", id);
        self.dirty = false;
        Ok(())
    }

    pub async fn load(&mut self, id: &str) -> StorageResult<BoardDocument> {
        let doc = self.storage.load(id).await?;
        self.board_id = Some(id.to_string());
        self.dirty = false;
        self.last_save = Some(Instant::now());
        Ok(doc)
    }

    /// The most recently saved board, if any.
    pub async fn load_last(&mut self) -> Option<BoardDocument> {
        match self.storage.load(LAST_BOARD_KEY).await {
            Ok(doc) => {
                self.board_id = Some(doc.id.clone());
                self.dirty = false;
                self.last_save = Some(Instant::now());
                Some(doc)
            }
            Err(e) => {
                log::debug!("No last board to restore: {}", e);
                None
            }
        }
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// Saved board ids, excluding [`LAST_BOARD_KEY`].
    pub async fn list_boards(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list().await?;
        ids.retain(|id| id != LAST_BOARD_KEY);
        Ok(ids)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

/// Storage in the platform data directory.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_default_storage() -> StorageResult<Arc<crate::storage::FileStorage>> {
    Ok(Arc::new(crate::storage::FileStorage::default_location()?))
}

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformStorage = crate::storage::FileStorage;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformAutoSaveManager = AutoSaveManager<PlatformStorage>;

#[cfg(not(target_arch = "wasm32"))]
pub fn create_autosave_manager() -> StorageResult<PlatformAutoSaveManager> {
    Ok(AutoSaveManager::new(create_default_storage()?))
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::storage::{block_on, MemoryStorage};

    fn doc(id: &str) -> BoardDocument {
        BoardDocument {
            id: id.to_string(),
            snapshot: "data:image/png;base64,".to_string(),
            width: 4,
            height: 4,
            updated_at: 1,
            updated_by: None,
        }
    }

    #[test]
    fn test_new_manager_is_clean() {
        let manager = AutoSaveManager::new(Arc::new(MemoryStorage::new()));
        assert!(!manager.is_dirty());
        assert!(!manager.should_save());
    }

    #[test]
    fn test_dirty_triggers_first_save() {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStorage::new()));
        manager.mark_dirty();
        assert!(manager.should_save());

        assert!(block_on(manager.maybe_save(&doc("main"))).unwrap());
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_interval_throttles_saves() {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStorage::new()));
        manager.mark_dirty();
        block_on(manager.save(&doc("main"))).unwrap();

        manager.mark_dirty();
        assert!(!manager.should_save());
        assert!(!block_on(manager.maybe_save(&doc("main"))).unwrap());

        manager.set_interval(Duration::ZERO);
        assert!(manager.should_save());
    }

    #[test]
    fn test_board_id_overrides_document_id() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = AutoSaveManager::new(storage.clone());
        manager.set_board_id(Some("team".to_string()));
        block_on(manager.save(&doc("main"))).unwrap();

        assert!(block_on(storage.exists("team")).unwrap());
        assert!(!block_on(storage.exists("main")).unwrap());
    }

    #[test]
    fn test_load_last() {
        let storage = Arc::new(MemoryStorage::new());
        let mut manager = AutoSaveManager::new(storage);
        block_on(manager.save(&doc("sketch"))).unwrap();

        let mut fresh = AutoSaveManager::new(manager.storage().clone());
        let loaded = block_on(fresh.load_last()).expect("last board");
        assert_eq!(loaded.id, "sketch");
        assert_eq!(fresh.board_id(), Some("sketch"));
    }

    #[test]
    fn test_load_last_empty() {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStorage::new()));
        assert!(block_on(manager.load_last()).is_none());
    }

    #[test]
    fn test_list_excludes_last_key() {
        let mut manager = AutoSaveManager::new(Arc::new(MemoryStorage::new()));
        block_on(manager.save(&doc("main"))).unwrap();
        let list = block_on(manager.list_boards()).unwrap();
        assert_eq!(list, vec!["main".to_string()]);
    }
}
