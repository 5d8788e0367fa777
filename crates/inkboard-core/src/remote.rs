//! Bridge between the local whiteboard and the remote board store.
//!
//! [`RemoteBoard`] owns no socket. It queues outgoing JSON frames for the
//! caller to send and interprets [`SyncEvent`]s coming back, applying remote
//! snapshots to the [`Whiteboard`]. The store keeps one full snapshot per
//! board and the last writer wins.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::storage::{now_millis, BoardDocument};
use crate::sync::{ClientMessage, SyncEvent};
use crate::whiteboard::Whiteboard;
use std::collections::VecDeque;

/// What an incoming event did to the local board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    /// A remote snapshot replaced the board.
    Applied { from: Option<String>, updated_at: u64 },
    /// On subscribe, local work won and was published instead.
    PublishedLocal,
    /// A remote snapshot could not be decoded or applied.
    Rejected { reason: String },
    /// Reply to [`RemoteBoard::read`] of a board other than the subscribed one.
    /// The local board is left untouched.
    Read { document: BoardDocument },
}

/// A snapshot waiting for the subscription to be confirmed.
#[derive(Debug, Clone)]
struct Pending {
    snapshot: Snapshot,
    revision: Option<u64>,
    created_at: u64,
}

/// Remote persistence state for one board.
#[derive(Debug, Default)]
pub struct RemoteBoard {
    /// Display name sent with the subscription.
    user: Option<String>,
    /// Board we want to be subscribed to.
    board: Option<String>,
    connected: bool,
    subscribed: bool,
    subscriber_count: usize,
    /// Newest `updated_at` applied or acknowledged.
    last_seen: u64,
    /// Revisions of in-flight writes, oldest first. One is popped per acknowledgement.
    in_flight: VecDeque<Option<u64>>,
    pending: Option<Pending>,
    /// Remote update that arrived mid-stroke.
    deferred: Option<(String, BoardDocument)>,
    last_error: Option<String>,
    outgoing: Vec<String>,
}

impl RemoteBoard {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    // --- Status ---

    pub fn board(&self) -> Option<&str> {
        self.board.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Subscribers on the board, including us.
    pub fn subscriber_count(&self) -> usize {
        self.subscriber_count
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Newest store timestamp seen for this board.
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    // --- Outgoing ---

    /// Drain queued frames.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("Failed to serialize {:?}: {}", msg, e),
        }
    }

    /// Subscribe to `board`. Sent now if connected, otherwise on connect.
    pub fn subscribe(&mut self, board: &str) {
        if self.board.as_deref() == Some(board) && (self.subscribed || !self.connected) {
            self.board = Some(board.to_string());
            return;
        }
        if self.subscribed {
            self.queue(&ClientMessage::Unsubscribe);
        }
        self.board = Some(board.to_string());
        self.subscribed = false;
        self.subscriber_count = 0;
        self.last_seen = 0;
        self.deferred = None;
        self.in_flight.clear();
        if self.connected {
            self.send_subscribe();
        }
    }

    pub fn unsubscribe(&mut self) {
        if self.board.take().is_some() && self.subscribed {
            self.queue(&ClientMessage::Unsubscribe);
        }
        self.subscribed = false;
        self.subscriber_count = 0;
        self.deferred = None;
        self.in_flight.clear();
    }

    /// One-shot read of another board; answered with [`SyncEvent::Document`].
    pub fn read(&mut self, board: &str) {
        self.queue(&ClientMessage::Read {
            board: board.to_string(),
        });
    }

    fn send_subscribe(&mut self) {
        if let Some(board) = self.board.clone() {
            log::info!("Subscribing to board '{}'", board);
            self.queue(&ClientMessage::Subscribe {
                board,
                user: self.user.clone(),
            });
        }
    }

    /// Write a snapshot to the store. Held back until subscribed.
    pub fn publish(&mut self, snapshot: &Snapshot) {
        self.publish_inner(snapshot, None);
    }

    /// Snapshot the board and publish it. The board is marked clean once the store acknowledges.
    pub fn publish_board(&mut self, board: &Whiteboard) -> Result<(), SnapshotError> {
        let snapshot = board.snapshot()?;
        self.publish_inner(&snapshot, Some(board.revision()));
        Ok(())
    }

    fn publish_inner(&mut self, snapshot: &Snapshot, revision: Option<u64>) {
        // The store orders this write after the held-back update and never
        // echoes it back, so applying that update now would diverge from it.
        self.deferred = None;

        if !self.subscribed {
            self.pending = Some(Pending {
                snapshot: snapshot.clone(),
                revision,
                created_at: now_millis(),
            });
            return;
        }
        self.in_flight.push_back(revision);
        self.queue(&ClientMessage::Write {
            snapshot: snapshot.to_data_url(),
            width: snapshot.width(),
            height: snapshot.height(),
        });
    }

    // --- Incoming ---

    /// React to one socket event.
    pub fn handle_event(&mut self, event: SyncEvent, board: &mut Whiteboard) -> Option<RemoteChange> {
        match event {
            SyncEvent::Connected => {
                self.connected = true;
                self.last_error = None;
                self.send_subscribe();
                None
            }
            SyncEvent::Disconnected => {
                self.connected = false;
                self.subscribed = false;
                self.subscriber_count = 0;
                // Unacknowledged writes are lost with the connection; the board stays dirty.
                self.in_flight.clear();
                None
            }
            SyncEvent::Error { message } => {
                log::warn!("Remote board error: {}", message);
                self.last_error = Some(message);
                None
            }
            SyncEvent::Subscribed {
                board: id,
                subscriber_count,
                document,
            } => {
                if self.board.as_deref() != Some(id.as_str()) {
                    log::debug!("Ignoring subscription to stale board '{}'", id);
                    return None;
                }
                self.subscribed = true;
                self.subscriber_count = subscriber_count;
                self.on_subscribed(document, board)
            }
            SyncEvent::Document { board: id, document } => match document {
                Some(doc) if self.board.as_deref() == Some(id.as_str()) => {
                    if doc.updated_at <= self.last_seen {
                        return None;
                    }
                    Some(self.apply(None, doc, board))
                }
                Some(doc) => Some(RemoteChange::Read { document: doc }),
                None => {
                    log::info!("Board '{}' has no document yet", id);
                    None
                }
            },
            SyncEvent::Updated { from, document } => {
                if !self.subscribed || self.board.as_deref() != Some(document.id.as_str()) {
                    return None;
                }
                if document.updated_at <= self.last_seen {
                    log::debug!("Ignoring stale update from {}", from);
                    return None;
                }
                if board.is_drawing() {
                    self.deferred = Some((from, document));
                    return None;
                }
                Some(self.apply(Some(from), document, board))
            }
            SyncEvent::Written {
                board: id,
                updated_at,
            } => {
                if self.board.as_deref() == Some(id.as_str()) {
                    self.last_seen = self.last_seen.max(updated_at);
                    let acked = self.in_flight.pop_front().flatten();
                    if self.in_flight.is_empty() && acked == Some(board.revision()) {
                        board.mark_clean();
                    }
                }
                None
            }
            SyncEvent::SubscriberJoined { peer_id } => {
                log::info!("Subscriber joined: {}", peer_id);
                self.subscriber_count += 1;
                None
            }
            SyncEvent::SubscriberLeft { peer_id } => {
                log::info!("Subscriber left: {}", peer_id);
                self.subscriber_count = self.subscriber_count.saturating_sub(1).max(1);
                None
            }
        }
    }

    /// Apply an update held back while the user was drawing.
    pub fn apply_deferred(&mut self, board: &mut Whiteboard) -> Option<RemoteChange> {
        if board.is_drawing() {
            return None;
        }
        let (from, document) = self.deferred.take()?;
        if document.updated_at <= self.last_seen {
            return None;
        }
        Some(self.apply(Some(from), document, board))
    }

    fn on_subscribed(&mut self, document: Option<BoardDocument>, board: &mut Whiteboard) -> Option<RemoteChange> {
        let pending = self.pending.take();
        let remote_newer = match (&document, &pending) {
            (Some(doc), Some(p)) => doc.updated_at > p.created_at,
            (Some(_), None) => !board.is_dirty(),
            (None, _) => false,
        };

        if remote_newer {
            let doc = document?;
            return Some(self.apply(None, doc, board));
        }

        if pending.is_some() || board.is_dirty() {
            // Publish the board as it is now; it includes whatever was pending.
            match self.publish_board(board) {
                Ok(()) => return Some(RemoteChange::PublishedLocal),
                Err(e) => {
                    log::error!("Failed to snapshot board: {}", e);
                    if let Some(p) = pending {
                        self.publish_inner(&p.snapshot, p.revision);
                        return Some(RemoteChange::PublishedLocal);
                    }
                }
            }
        }
        None
    }

    fn apply(&mut self, from: Option<String>, document: BoardDocument, board: &mut Whiteboard) -> RemoteChange {
        let result = document
            .to_snapshot()
            .and_then(|snapshot| board.apply_remote(&snapshot));
        match result {
            Ok(()) => {
                self.last_seen = self.last_seen.max(document.updated_at);
                log::info!(
                    "Applied remote board '{}' ({}x{}, by {})",
                    document.id,
                    document.width,
                    document.height,
                    document.updated_by.as_deref().unwrap_or("unknown")
                );
                RemoteChange::Applied {
                    from,
                    updated_at: document.updated_at,
                }
            }
            Err(e) => {
                log::warn!("Rejected remote board '{}': {}", document.id, e);
                RemoteChange::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}
