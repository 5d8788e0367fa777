//! The persisted form of a board.

use crate::snapshot::{Snapshot, SnapshotError};
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use std::time::{SystemTime, UNIX_EPOCH};
#[cfg(target_arch = "wasm32")]
use web_time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One board: the latest snapshot and who wrote it when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub id: String,
    /// PNG data URL.
    pub snapshot: String,
    pub width: u32,
    pub height: u32,
    /// Unix milliseconds of the last write.
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl BoardDocument {
    /// Build a document from a snapshot, stamped with the current time.
    pub fn from_snapshot(id: impl Into<String>, snapshot: &Snapshot, updated_by: Option<String>) -> Self {
        Self {
            id: id.into(),
            snapshot: snapshot.to_data_url(),
            width: snapshot.width(),
            height: snapshot.height(),
            updated_at: now_millis(),
            updated_by,
        }
    }

    /// Parse the stored data URL.
    pub fn to_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Snapshot::from_data_url(&self.snapshot)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::Surface;

    #[test]
    fn test_from_snapshot() {
        let snapshot = Snapshot::capture(&Surface::new(8, 6)).unwrap();
        let doc = BoardDocument::from_snapshot("main", &snapshot, Some("ada".to_string()));
        assert_eq!(doc.id, "main");
        assert_eq!((doc.width, doc.height), (8, 6));
        assert!(doc.updated_at > 0);
        assert_eq!(doc.to_snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_json_shape() {
        let snapshot = Snapshot::capture(&Surface::new(2, 2)).unwrap();
        let mut doc = BoardDocument::from_snapshot("main", &snapshot, None);
        doc.updated_at = 42;

        let json = doc.to_json().unwrap();
        assert!(json.contains("\"updated_at\": 42"));
        assert!(!json.contains("updated_by"));
        assert_eq!(BoardDocument::from_json(&json).unwrap(), doc);
    }

    #[test]
    fn test_bad_snapshot_is_error() {
        let doc = BoardDocument {
            id: "x".to_string(),
            snapshot: "not a data url".to_string(),
            width: 1,
            height: 1,
            updated_at: 0,
            updated_by: None,
        };
        assert!(doc.to_snapshot().is_err());
    }
}
