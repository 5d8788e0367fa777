//! Board state shared by all connections.
//!
//! Each board keeps its latest document, the set of subscribed peers and a
//! broadcast channel. Documents outlive their subscribers and are written
//! through to a [`Storage`] backend.
//!
//! Writes to one board are serialized. A document becomes visible in memory
//! only after storage has accepted it, so a restart never reloads an older
//! board than the one clients last saw. Storage backends may block, so they
//! run on tokio's blocking pool, as does the full PNG decode of each write.

use dashmap::DashMap;
use inkboard_core::snapshot::{Snapshot, SnapshotError};
use inkboard_core::storage::{now_millis, BoardDocument, MemoryStorage, Storage, StorageError, StorageResult};
use inkboard_core::sync::ServerMessage;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinError;
use tracing::{debug, info};

/// Messages a board's channel holds for a slow receiver. Each may carry a full snapshot.
pub const BROADCAST_CAPACITY: usize = 16;

/// Largest accepted snapshot data URL, in bytes.
pub const MAX_SNAPSHOT_BYTES: usize = 16 * 1024 * 1024;

/// A fanned-out message and the peer that caused it.
pub type Broadcast = (String, ServerMessage);

/// Why a write was refused.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("Snapshot is {0} bytes, the limit is {MAX_SNAPSHOT_BYTES}")]
    TooLarge(usize),
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
    #[error("Snapshot is {actual:?} but the write claims {claimed:?}")]
    SizeMismatch { claimed: (u32, u32), actual: (u32, u32) },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Snapshot check did not finish: {0}")]
    Check(#[from] JoinError),
}

/// One write request.
#[derive(Debug, Clone)]
pub struct Write {
    pub snapshot: String,
    pub width: u32,
    pub height: u32,
    /// Recorded as `updated_by`.
    pub author: Option<String>,
}

struct Board {
    tx: broadcast::Sender<Broadcast>,
    subscribers: HashSet<String>,
    document: Option<BoardDocument>,
    /// Held for the whole of a write, from stamping to broadcast.
    write_lock: Arc<Mutex<()>>,
}

impl Board {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            tx,
            subscribers: HashSet::new(),
            document: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Nobody subscribed, nothing stored and no write in progress.
    fn is_idle(&self) -> bool {
        self.subscribers.is_empty() && self.document.is_none() && Arc::strong_count(&self.write_lock) == 1
    }
}

/// What a new subscriber receives.
pub struct Subscription {
    pub rx: broadcast::Receiver<Broadcast>,
    pub document: Option<BoardDocument>,
    pub subscriber_count: usize,
}

/// All boards known to the server.
pub struct BoardHub {
    boards: DashMap<String, Board>,
    storage: Arc<dyn Storage>,
}

impl BoardHub {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            boards: DashMap::new(),
            storage,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Latest document of `board`, loading it from storage on first access.
    pub async fn document(&self, board: &str) -> StorageResult<Option<BoardDocument>> {
        let cached = self.boards.get(board).and_then(|b| b.document.clone());
        if cached.is_some() {
            return Ok(cached);
        }

        match self.load(board).await {
            Ok(doc) => {
                debug!("Loaded board {} from storage", board);
                let mut entry = self.boards.entry(board.to_string()).or_insert_with(Board::new);
                // A write may have landed while we were loading.
                let doc = entry.document.get_or_insert(doc).clone();
                Ok(Some(doc))
            }
            Err(StorageError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn subscribe(&self, board: &str, peer_id: &str) -> StorageResult<Subscription> {
        self.document(board).await?;

        let mut entry = self.boards.entry(board.to_string()).or_insert_with(Board::new);
        entry.subscribers.insert(peer_id.to_string());
        info!("Peer {} subscribed to {} ({} subscribers)", peer_id, board, entry.subscribers.len());
        Ok(Subscription {
            rx: entry.tx.subscribe(),
            document: entry.document.clone(),
            subscriber_count: entry.subscribers.len(),
        })
    }

    /// Returns whether the peer was subscribed.
    pub fn unsubscribe(&self, board: &str, peer_id: &str) -> bool {
        let Some(mut entry) = self.boards.get_mut(board) else {
            return false;
        };
        let removed = entry.subscribers.remove(peer_id);
        drop(entry);
        self.boards.remove_if(board, |_, b| b.is_idle());
        if removed {
            info!("Peer {} unsubscribed from {}", peer_id, board);
        }
        removed
    }

    pub fn subscriber_count(&self, board: &str) -> usize {
        self.boards.get(board).map_or(0, |b| b.subscribers.len())
    }

    /// Send `msg` to every subscriber of `board`.
    pub fn broadcast(&self, board: &str, from: &str, msg: ServerMessage) {
        if let Some(entry) = self.boards.get(board) {
            // No receivers is not an error.
            let _ = entry.tx.send((from.to_string(), msg));
        }
    }

    /// Validate, stamp, store and fan out a new snapshot of `board`.
    pub async fn write(&self, board: &str, peer_id: &str, write: Write) -> Result<BoardDocument, WriteError> {
        if write.snapshot.len() > MAX_SNAPSHOT_BYTES {
            return Err(WriteError::TooLarge(write.snapshot.len()));
        }
        let snapshot = Snapshot::from_data_url(&write.snapshot)?;
        let actual = (snapshot.width(), snapshot.height());
        let claimed = (write.width, write.height);
        if actual != claimed {
            return Err(WriteError::SizeMismatch { claimed, actual });
        }
        // The header alone does not prove the image data decodes.
        tokio::task::spawn_blocking(move || snapshot.decode().map(drop)).await??;

        let lock = self
            .boards
            .entry(board.to_string())
            .or_insert_with(Board::new)
            .write_lock
            .clone();
        let _guard = lock.lock().await;

        // Pull any stored document in so timestamps keep increasing across restarts.
        let last = self.document(board).await?.map_or(0, |d| d.updated_at);
        let document = BoardDocument {
            id: board.to_string(),
            snapshot: write.snapshot,
            width: write.width,
            height: write.height,
            updated_at: now_millis().max(last + 1),
            updated_by: write.author,
        };

        self.save(board, &document).await?;
        self.boards
            .entry(board.to_string())
            .or_insert_with(Board::new)
            .document = Some(document.clone());
        debug!(
            "Board {} written by {} ({}x{}, {} bytes)",
            board,
            peer_id,
            document.width,
            document.height,
            document.snapshot.len()
        );

        self.broadcast(
            board,
            peer_id,
            ServerMessage::Updated {
                from: peer_id.to_string(),
                document: document.clone(),
            },
        );
        Ok(document)
    }

    async fn load(&self, board: &str) -> StorageResult<BoardDocument> {
        let storage = self.storage.clone();
        let id = board.to_string();
        let runtime = tokio::runtime::Handle::current();
        tokio::task::spawn_blocking(move || runtime.block_on(storage.load(&id)))
            .await
            .map_err(storage_task_failed)?
    }

    async fn save(&self, board: &str, document: &BoardDocument) -> StorageResult<()> {
        let storage = self.storage.clone();
        let id = board.to_string();
        let document = document.clone();
        let runtime = tokio::runtime::Handle::current();
        tokio::task::spawn_blocking(move || runtime.block_on(storage.save(&id, &document)))
            .await
            .map_err(storage_task_failed)?
    }
}

fn storage_task_failed(e: JoinError) -> StorageError {
    StorageError::Other(format!("Storage task failed: {}", e))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use inkboard_core::color::Rgba;
    use inkboard_core::storage::BoxFuture;
    use inkboard_core::surface::Surface;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use tokio::sync::broadcast::error::{RecvError, TryRecvError};

    pub(crate) fn data_url(width: u32, height: u32) -> String {
        let mut surface = Surface::new(width, height);
        surface.fill(Rgba::opaque(200, 10, 10));
        Snapshot::capture(&surface)
            .expect("capture")
            .to_data_url()
    }

    /// PNG of a gradient, so the compressed image data is not trivially small.
    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let pixels = (0..width * height)
            .flat_map(|i| [(i % 251) as u8, (i * 7 % 253) as u8, (i / width) as u8, 255])
            .collect();
        let surface = Surface::from_rgba(width, height, pixels).unwrap();
        Snapshot::capture(&surface).unwrap().into_png_bytes()
    }

    /// Flip the compressed bytes of the first IDAT chunk, keeping the zlib header.
    fn scramble_image_data(png: &mut [u8]) {
        let mut at = 8;
        while at + 8 <= png.len() {
            let len = u32::from_be_bytes([png[at], png[at + 1], png[at + 2], png[at + 3]]) as usize;
            let data = at + 8;
            if &png[at + 4..at + 8] == b"IDAT" {
                for byte in &mut png[data + 2..data + len] {
                    *byte ^= 0xa5;
                }
                return;
            }
            at = data + len + 4;
        }
        panic!("no IDAT chunk");
    }

    /// Memory storage with a slow first save, or saves that always fail.
    #[derive(Default)]
    struct ScriptedStorage {
        inner: MemoryStorage,
        first_save_delay: Option<Duration>,
        fail_saves: bool,
        saves: AtomicUsize,
    }

    impl Storage for ScriptedStorage {
        fn save(&self, id: &str, document: &BoardDocument) -> BoxFuture<'_, StorageResult<()>> {
            let first = self.saves.fetch_add(1, Ordering::SeqCst) == 0;
            let delay = self.first_save_delay.filter(|_| first);
            let fail = self.fail_saves;
            let save = self.inner.save(id, document);
            Box::pin(async move {
                if let Some(delay) = delay {
                    // Stands in for a slow disk.
                    std::thread::sleep(delay);
                }
                if fail {
                    return Err(StorageError::Io("disk full".to_string()));
                }
                save.await
            })
        }

        fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<BoardDocument>> {
            self.inner.load(id)
        }

        fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
            self.inner.delete(id)
        }

        fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
            self.inner.list()
        }

        fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
            self.inner.exists(id)
        }
    }

    pub(crate) fn write_of(width: u32, height: u32) -> Write {
        Write {
            snapshot: data_url(width, height),
            width,
            height,
            author: Some("ada".to_string()),
        }
    }

    #[tokio::test]
    async fn test_subscribe_empty_board() {
        let hub = BoardHub::in_memory();
        let sub = hub.subscribe("main", "p1").await.unwrap();
        assert!(sub.document.is_none());
        assert_eq!(sub.subscriber_count, 1);

        let sub = hub.subscribe("main", "p2").await.unwrap();
        assert_eq!(sub.subscriber_count, 2);
        assert_eq!(hub.subscriber_count("main"), 2);
    }

    #[tokio::test]
    async fn test_write_fans_out_updated() {
        let hub = BoardHub::in_memory();
        let _writer = hub.subscribe("main", "p1").await.unwrap();
        let mut reader = hub.subscribe("main", "p2").await.unwrap();

        let doc = hub.write("main", "p1", write_of(4, 3)).await.unwrap();
        assert_eq!(doc.id, "main");
        assert_eq!(doc.updated_by.as_deref(), Some("ada"));

        let (from, msg) = reader.rx.recv().await.unwrap();
        assert_eq!(from, "p1");
        match msg {
            ServerMessage::Updated { from, document } => {
                assert_eq!(from, "p1");
                assert_eq!(document, doc);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_new_subscriber_gets_latest_document() {
        let hub = BoardHub::in_memory();
        let doc = hub.write("main", "p1", write_of(2, 2)).await.unwrap();

        let sub = hub.subscribe("main", "p2").await.unwrap();
        assert_eq!(sub.document, Some(doc));
    }

    #[tokio::test]
    async fn test_updated_at_strictly_increases() {
        let hub = BoardHub::in_memory();
        let mut last = 0;
        for _ in 0..5 {
            let doc = hub.write("main", "p1", write_of(2, 2)).await.unwrap();
            assert!(doc.updated_at > last);
            last = doc.updated_at;
        }
    }

    #[tokio::test]
    async fn test_documents_outlive_subscribers() {
        let hub = BoardHub::in_memory();
        hub.subscribe("main", "p1").await.unwrap();
        hub.write("main", "p1", write_of(2, 2)).await.unwrap();
        assert!(hub.unsubscribe("main", "p1"));
        assert_eq!(hub.subscriber_count("main"), 0);
        assert!(hub.document("main").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_empty_board_is_dropped_on_unsubscribe() {
        let hub = BoardHub::in_memory();
        hub.subscribe("scratch", "p1").await.unwrap();
        assert!(hub.unsubscribe("scratch", "p1"));
        assert!(!hub.unsubscribe("scratch", "p1"));
        assert!(hub.boards.get("scratch").is_none());
    }

    #[tokio::test]
    async fn test_documents_load_lazily_from_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let first = BoardHub::new(storage.clone());
        let doc = first.write("main", "p1", write_of(3, 3)).await.unwrap();

        let second = BoardHub::new(storage);
        assert_eq!(second.document("main").await.unwrap(), Some(doc.clone()));

        // Timestamps continue from the stored document.
        let next = second.write("main", "p2", write_of(3, 3)).await.unwrap();
        assert!(next.updated_at > doc.updated_at);
    }

    #[tokio::test]
    async fn test_file_storage_backend() {
        let dir = tempfile::tempdir().unwrap();
        let storage = inkboard_core::storage::FileStorage::new(dir.path().to_path_buf()).unwrap();
        let hub = BoardHub::new(Arc::new(storage));
        hub.write("team", "p1", write_of(2, 2)).await.unwrap();
        assert!(dir.path().join("team.json").exists());
    }

    #[tokio::test]
    async fn test_rejects_invalid_snapshot() {
        let hub = BoardHub::in_memory();
        let write = Write {
            snapshot: "data:image/png;base64,AAAA".to_string(),
            width: 1,
            height: 1,
            author: None,
        };
        let err = hub.write("main", "p1", write).await.unwrap_err();
        assert!(matches!(err, WriteError::InvalidSnapshot(_)));
        assert!(hub.document("main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_corrupt_image_data() {
        let hub = BoardHub::in_memory();
        let mut reader = hub.subscribe("main", "p2").await.unwrap();

        let mut png = gradient_png(64, 64);
        scramble_image_data(&mut png);
        // The header still parses, only the pixels are broken.
        let snapshot = Snapshot::from_png(png).unwrap();
        assert!(snapshot.decode().is_err());

        let write = Write {
            snapshot: snapshot.to_data_url(),
            width: 64,
            height: 64,
            author: None,
        };
        let err = hub.write("main", "p1", write).await.unwrap_err();
        assert!(matches!(err, WriteError::InvalidSnapshot(_)));
        assert!(hub.document("main").await.unwrap().is_none());
        assert!(matches!(reader.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_concurrent_writes_persist_in_order() {
        let storage = Arc::new(ScriptedStorage {
            first_save_delay: Some(Duration::from_millis(200)),
            ..ScriptedStorage::default()
        });
        let hub = BoardHub::new(storage.clone());
        let slow = Write {
            author: Some("slow".to_string()),
            ..write_of(2, 2)
        };
        let fast = Write {
            author: Some("fast".to_string()),
            ..write_of(3, 3)
        };

        let (a, b) = tokio::join!(hub.write("main", "p1", slow), hub.write("main", "p2", fast));
        let (a, b) = (a.unwrap(), b.unwrap());
        let newest = if a.updated_at > b.updated_at { a } else { b };

        let stored = storage.inner.load("main").await.unwrap();
        assert_eq!(stored, newest);
        assert_eq!(hub.document("main").await.unwrap(), Some(newest));
    }

    #[tokio::test]
    async fn test_failed_save_changes_nothing() {
        let storage = Arc::new(ScriptedStorage {
            fail_saves: true,
            ..ScriptedStorage::default()
        });
        let hub = BoardHub::new(storage);
        let mut reader = hub.subscribe("main", "p2").await.unwrap();

        let err = hub.write("main", "p1", write_of(2, 2)).await.unwrap_err();
        assert!(matches!(err, WriteError::Storage(StorageError::Io(_))));
        assert!(hub.document("main").await.unwrap().is_none());
        assert!(matches!(reader.rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_slow_storage_does_not_stall_the_runtime() {
        let storage = Arc::new(ScriptedStorage {
            first_save_delay: Some(Duration::from_millis(300)),
            ..ScriptedStorage::default()
        });
        let hub = BoardHub::new(storage);

        let ticker = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Instant::now()
        };
        let (written, ticked_at) = tokio::join!(hub.write("main", "p1", write_of(2, 2)), ticker);
        written.unwrap();
        // The timer fired long before the save returned.
        assert!(ticked_at.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_lagging_receiver_is_bounded() {
        let hub = BoardHub::in_memory();
        let mut reader = hub.subscribe("main", "p2").await.unwrap();
        for _ in 0..=BROADCAST_CAPACITY {
            hub.write("main", "p1", write_of(2, 2)).await.unwrap();
        }
        assert!(matches!(reader.rx.recv().await, Err(RecvError::Lagged(1))));
    }

    #[tokio::test]
    async fn test_board_with_write_in_progress_is_kept() {
        let hub = BoardHub::in_memory();
        hub.subscribe("main", "p1").await.unwrap();
        let lock = hub.boards.get("main").unwrap().write_lock.clone();
        assert!(hub.unsubscribe("main", "p1"));
        assert!(hub.boards.get("main").is_some());
        drop(lock);
        hub.subscribe("main", "p1").await.unwrap();
        assert!(hub.unsubscribe("main", "p1"));
        assert!(hub.boards.get("main").is_none());
    }

    #[tokio::test]
    async fn test_rejects_size_mismatch() {
        let hub = BoardHub::in_memory();
        let write = Write {
            width: 10,
            ..write_of(4, 4)
        };
        let err = hub.write("main", "p1", write).await.unwrap_err();
        assert!(matches!(err, WriteError::SizeMismatch { claimed: (10, 4), actual: (4, 4) }));
    }

    #[tokio::test]
    async fn test_rejects_oversized_snapshot() {
        let hub = BoardHub::in_memory();
        let write = Write {
            snapshot: "x".repeat(MAX_SNAPSHOT_BYTES + 1),
            width: 1,
            height: 1,
            author: None,
        };
        let err = hub.write("main", "p1", write).await.unwrap_err();
        assert!(matches!(err, WriteError::TooLarge(_)));
    }
}
