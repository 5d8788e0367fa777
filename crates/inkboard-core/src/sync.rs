//! Wire protocol and WebSocket clients for the remote board store.
//!
//! Frames are JSON text, internally tagged by `type`.

use crate::storage::BoardDocument;
use serde::{Deserialize, Serialize};

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Listen to a board and receive its current document.
    Subscribe {
        board: String,
        /// Display name recorded as `updated_by` on writes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user: Option<String>,
    },
    /// Stop listening to the current board.
    Unsubscribe,
    /// Replace the board's snapshot (PNG data URL).
    Write {
        snapshot: String,
        width: u32,
        height: u32,
    },
    /// One-shot read without subscribing.
    Read { board: String },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed, with the board's document if it has one.
    Subscribed {
        board: String,
        subscriber_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document: Option<BoardDocument>,
    },
    /// Reply to `read`.
    Document {
        board: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        document: Option<BoardDocument>,
    },
    /// Another subscriber wrote the board.
    Updated { from: String, document: BoardDocument },
    /// Our write was stored.
    Written { board: String, updated_at: u64 },
    SubscriberJoined { peer_id: String },
    SubscriberLeft { peer_id: String },
    Error { message: String },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    Subscribed {
        board: String,
        subscriber_count: usize,
        document: Option<BoardDocument>,
    },
    Document {
        board: String,
        document: Option<BoardDocument>,
    },
    Updated { from: String, document: BoardDocument },
    Written { board: String, updated_at: u64 },
    SubscriberJoined { peer_id: String },
    SubscriberLeft { peer_id: String },
    Error { message: String },
}

impl From<ServerMessage> for SyncEvent {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Subscribed { board, subscriber_count, document } => {
                SyncEvent::Subscribed { board, subscriber_count, document }
            }
            ServerMessage::Document { board, document } => SyncEvent::Document { board, document },
            ServerMessage::Updated { from, document } => SyncEvent::Updated { from, document },
            ServerMessage::Written { board, updated_at } => SyncEvent::Written { board, updated_at },
            ServerMessage::SubscriberJoined { peer_id } => SyncEvent::SubscriberJoined { peer_id },
            ServerMessage::SubscriberLeft { peer_id } => SyncEvent::SubscriberLeft { peer_id },
            ServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

/// Decode one text frame. Unparseable frames are logged and dropped.
pub fn parse_server_frame(text: &str) -> Option<SyncEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(msg) => Some(msg.into()),
        Err(e) => {
            log::warn!("Failed to parse server message ({}): {}", e, preview(text));
            None
        }
    }
}

/// First 100 bytes of a frame for logs. Snapshots are large.
fn preview(text: &str) -> &str {
    let mut end = text.len().min(100);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl ConnectionState {
    /// State after the client has seen `event`.
    pub fn after(self, event: &SyncEvent) -> Self {
        match event {
            SyncEvent::Connected => ConnectionState::Connected,
            SyncEvent::Disconnected => ConnectionState::Disconnected,
            SyncEvent::Error { .. } if self != ConnectionState::Connected => ConnectionState::Error,
            _ => self,
        }
    }
}

// ============================================================================
// WASM WebSocket Client
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen::JsCast;
    use web_sys::{CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    type EventQueue = Rc<RefCell<Vec<SyncEvent>>>;

    /// Browser callbacks; dropping them detaches the handlers.
    struct Handlers {
        _on_open: Closure<dyn FnMut()>,
        _on_message: Closure<dyn FnMut(MessageEvent)>,
        _on_close: Closure<dyn FnMut(CloseEvent)>,
        _on_error: Closure<dyn FnMut(ErrorEvent)>,
    }

    /// WebSocket client for WASM.
    ///
    /// Callbacks queue events; drain them with `poll_events()` once per frame.
    pub struct WasmWebSocket {
        ws: Option<WebSocket>,
        state: ConnectionState,
        events: EventQueue,
        handlers: Option<Handlers>,
    }

    impl WasmWebSocket {
        pub fn new() -> Self {
            Self {
                ws: None,
                state: ConnectionState::Disconnected,
                events: Rc::new(RefCell::new(Vec::new())),
                handlers: None,
            }
        }

        pub fn connect(&mut self, url: &str) -> Result<(), String> {
            if self.ws.is_some() {
                return Err("Already connected".to_string());
            }

            let ws = WebSocket::new(url).map_err(|e| format!("Failed to create WebSocket: {:?}", e))?;
            ws.set_binary_type(web_sys::BinaryType::Arraybuffer);

            let queue = self.events.clone();
            let on_open = Closure::<dyn FnMut()>::new(move || {
                queue.borrow_mut().push(SyncEvent::Connected);
            });

            let queue = self.events.clone();
            let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |e: MessageEvent| {
                let Some(text) = e.data().as_string() else {
                    log::debug!("Ignoring non-text frame");
                    return;
                };
                if let Some(event) = parse_server_frame(&text) {
                    queue.borrow_mut().push(event);
                }
            });

            let queue = self.events.clone();
            let on_close = Closure::<dyn FnMut(CloseEvent)>::new(move |e: CloseEvent| {
                log::info!("WebSocket closed (code {})", e.code());
                queue.borrow_mut().push(SyncEvent::Disconnected);
            });

            let queue = self.events.clone();
            let on_error = Closure::<dyn FnMut(ErrorEvent)>::new(move |_e: ErrorEvent| {
                queue.borrow_mut().push(SyncEvent::Error {
                    message: "WebSocket error".to_string(),
                });
            });

            ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
            ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
            ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
            ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));

            self.ws = Some(ws);
            self.handlers = Some(Handlers {
                _on_open: on_open,
                _on_message: on_message,
                _on_close: on_close,
                _on_error: on_error,
            });
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(ws) = self.ws.take() {
                ws.set_onopen(None);
                ws.set_onmessage(None);
                ws.set_onclose(None);
                ws.set_onerror(None);
                let _ = ws.close();
            }
            self.handlers = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Send a text frame.
        pub fn send(&self, msg: &str) -> Result<(), String> {
            match &self.ws {
                Some(ws) if ws.ready_state() == WebSocket::OPEN => {
                    ws.send_with_str(msg).map_err(|e| format!("Send failed: {:?}", e))
                }
                Some(_) => Err("Socket is not open".to_string()),
                None => Err("Not connected".to_string()),
            }
        }

        /// Drain queued events (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events = std::mem::take(&mut *self.events.borrow_mut());
            for event in &events {
                self.state = self.state.after(event);
            }
            if self.state == ConnectionState::Disconnected {
                self.ws = None;
                self.handlers = None;
            }
            events
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for WasmWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{connect, Message, WebSocket};
    use url::Url;

    /// Read timeout of the socket thread; also the latency of outgoing frames.
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Commands sent to the socket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// WebSocket client for native platforms.
    ///
    /// A background thread owns the blocking tungstenite socket; the UI thread
    /// talks to it over channels.
    pub struct NativeWebSocket {
        state: ConnectionState,
        cmd_tx: Option<Sender<WsCommand>>,
        event_rx: Option<Receiver<SyncEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                cmd_tx: None,
                event_rx: None,
                _thread: None,
            }
        }

        /// Start connecting to `url` (`ws://` or `wss://`).
        pub fn connect(&mut self, url: &str) -> Result<(), String> {
            if self.cmd_tx.is_some() {
                return Err("Already connected".to_string());
            }

            let parsed = Url::parse(url).map_err(|e| format!("Invalid URL: {}", e))?;
            if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
                return Err(format!("Invalid WebSocket URL scheme: {}", parsed.scheme()));
            }

            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<SyncEvent>();
            let url = url.to_string();

            let handle = thread::Builder::new()
                .name("inkboard-ws".to_string())
                .spawn(move || run_socket(&url, cmd_rx, event_tx))
                .map_err(|e| format!("Failed to spawn socket thread: {}", e))?;

            self.cmd_tx = Some(cmd_tx);
            self.event_rx = Some(event_rx);
            self._thread = Some(handle);
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            self.event_rx = None;
            self._thread = None;
            self.state = ConnectionState::Disconnected;
        }

        /// Queue a text frame for the socket thread.
        pub fn send(&self, msg: &str) -> Result<(), String> {
            match &self.cmd_tx {
                Some(tx) => tx
                    .send(WsCommand::Send(msg.to_string()))
                    .map_err(|e| format!("Send failed: {}", e)),
                None => Err("Not connected".to_string()),
            }
        }

        /// Drain events from the socket thread (non-blocking).
        pub fn poll_events(&mut self) -> Vec<SyncEvent> {
            let Some(rx) = &self.event_rx else {
                return Vec::new();
            };
            let events: Vec<SyncEvent> = rx.try_iter().collect();
            for event in &events {
                self.state = self.state.after(event);
            }

            // The thread has exited; allow a fresh connect.
            if matches!(events.last(), Some(SyncEvent::Disconnected))
                || (self.state == ConnectionState::Error && !events.is_empty())
            {
                self.cmd_tx = None;
                self.event_rx = None;
                self._thread = None;
            }
            events
        }

        pub fn state(&self) -> ConnectionState {
            self.state
        }

        pub fn is_connected(&self) -> bool {
            self.state == ConnectionState::Connected
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Body of the socket thread.
    fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, event_tx: Sender<SyncEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let mut socket = match connect(url) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                socket
            }
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };

        // Short read timeout so outgoing frames are not starved by a quiet server.
        if let MaybeTlsStream::Plain(tcp) = socket.get_mut() {
            let _ = tcp.set_read_timeout(Some(POLL_INTERVAL));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        let _ = event_tx.send(SyncEvent::Connected);

        pump(&mut socket, &cmd_rx, &event_tx);

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(SyncEvent::Disconnected);
    }

    /// Shuttle frames until either side closes.
    fn pump(
        socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
        cmd_rx: &Receiver<WsCommand>,
        event_tx: &Sender<SyncEvent>,
    ) {
        loop {
            loop {
                match cmd_rx.try_recv() {
                    Ok(WsCommand::Send(msg)) => {
                        log::debug!("WebSocket sending: {}", preview(&msg));
                        if let Err(e) = socket.send(Message::Text(msg)) {
                            log::error!("WebSocket send error: {}", e);
                            return;
                        }
                    }
                    Ok(WsCommand::Close) => {
                        log::info!("WebSocket close requested");
                        let _ = socket.close(None);
                        let _ = socket.flush();
                        return;
                    }
                    Err(TryRecvError::Disconnected) => {
                        log::info!("WebSocket command channel disconnected");
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match socket.read() {
                Ok(Message::Text(text)) => {
                    log::debug!("WebSocket received: {}", preview(&text));
                    if let Some(event) = parse_server_frame(&text) {
                        if event_tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    return;
                }
                // Pings are answered by tungstenite on the next write/flush.
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    return;
                }
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::NativeWebSocket;

// ============================================================================
// Platform type alias
// ============================================================================

/// Platform-specific WebSocket client type.
#[cfg(target_arch = "wasm32")]
pub type PlatformWebSocket = WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformWebSocket = NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;

    fn document() -> BoardDocument {
        BoardDocument {
            id: "main".to_string(),
            snapshot: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            width: 800,
            height: 600,
            updated_at: 1_700_000_000_123,
            updated_by: Some("ada".to_string()),
        }
    }

    #[test]
    fn test_client_message_tags() {
        let json = serde_json::to_string(&ClientMessage::Subscribe {
            board: "main".to_string(),
            user: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"subscribe","board":"main"}"#);

        let json = serde_json::to_string(&ClientMessage::Unsubscribe).unwrap();
        assert_eq!(json, r#"{"type":"unsubscribe"}"#);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"write","snapshot":"data:","width":3,"height":4}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Write {
                snapshot: "data:".to_string(),
                width: 3,
                height: 4
            }
        );
    }

    #[test]
    fn test_subscribed_without_document() {
        let json = r#"{"type":"subscribed","board":"main","subscriber_count":2}"#;
        let event = parse_server_frame(json).unwrap();
        assert_eq!(
            event,
            SyncEvent::Subscribed {
                board: "main".to_string(),
                subscriber_count: 2,
                document: None
            }
        );
    }

    #[test]
    fn test_updated_carries_document() {
        let msg = ServerMessage::Updated {
            from: "peer-1".to_string(),
            document: document(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"updated""#));
        match parse_server_frame(&json) {
            Some(SyncEvent::Updated { from, document: doc }) => {
                assert_eq!(from, "peer-1");
                assert_eq!(doc, document());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_written_and_error() {
        assert_eq!(
            parse_server_frame(r#"{"type":"written","board":"b","updated_at":9}"#),
            Some(SyncEvent::Written {
                board: "b".to_string(),
                updated_at: 9
            })
        );
        assert_eq!(
            parse_server_frame(r#"{"type":"error","message":"too large"}"#),
            Some(SyncEvent::Error {
                message: "too large".to_string()
            })
        );
    }

    #[test]
    fn test_garbage_frame_is_skipped() {
        assert_eq!(parse_server_frame("not json"), None);
        assert_eq!(parse_server_frame(r#"{"type":"joined","room":"x"}"#), None);
    }

    #[test]
    fn test_connection_state_transitions() {
        let state = ConnectionState::Connecting.after(&SyncEvent::Connected);
        assert_eq!(state, ConnectionState::Connected);
        // Server-side errors do not drop a live connection.
        let error = SyncEvent::Error {
            message: "bad write".to_string(),
        };
        assert_eq!(state.after(&error), ConnectionState::Connected);
        assert_eq!(ConnectionState::Connecting.after(&error), ConnectionState::Error);
        assert_eq!(state.after(&SyncEvent::Disconnected), ConnectionState::Disconnected);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_native_rejects_bad_urls() {
        let mut ws = NativeWebSocket::new();
        assert!(ws.connect("http://localhost:3030/ws").is_err());
        assert!(ws.connect("not a url").is_err());
        assert_eq!(ws.state(), ConnectionState::Disconnected);
        assert!(ws.send("{}").is_err());
        assert!(ws.poll_events().is_empty());
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = "é".repeat(80);
        assert!(preview(&text).len() <= 100);
        assert_eq!(preview("short"), "short");
    }
}
