//! Inkboard Core Library
//!
//! Platform-agnostic model of the Inkboard whiteboard: the pixel surface and
//! its stroke rasterizer, snapshot-based undo/redo, PNG export, board
//! persistence, and the client side of the remote board store protocol.

pub mod brush;
pub mod color;
pub mod config;
pub mod export;
pub mod history;
pub mod input;
pub mod remote;
pub mod snapshot;
pub mod storage;
pub mod surface;
pub mod sync;
pub mod whiteboard;

pub use brush::{BrushSettings, LineCap, DEFAULT_LINE_WIDTH, MAX_LINE_WIDTH, MIN_LINE_WIDTH};
pub use color::{ColorError, Rgba};
pub use config::BoardConfig;
pub use export::{export_png, ExportError, ExportOptions, DEFAULT_EXPORT_FILE_NAME};
pub use history::{History, MAX_UNDO_HISTORY};
pub use input::{KeyAction, Modifiers, MouseButton, PointerEvent, StrokeInput};
pub use remote::{RemoteBoard, RemoteChange};
pub use snapshot::{Snapshot, SnapshotError};
pub use storage::{BoardDocument, Storage, StorageError, StorageResult};
pub use surface::{Surface, SurfaceError};
pub use sync::{ClientMessage, ConnectionState, PlatformWebSocket, ServerMessage, SyncEvent};
pub use whiteboard::{StrokeOutcome, Whiteboard};
