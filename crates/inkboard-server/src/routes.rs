//! HTTP routes and the per-connection WebSocket loop.

use crate::hub::{Broadcast, BoardHub, Write, MAX_SNAPSHOT_BYTES};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use inkboard_core::storage::BoardDocument;
use inkboard_core::sync::{ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Room for the JSON envelope around a maximal snapshot.
const MAX_FRAME_BYTES: usize = MAX_SNAPSHOT_BYTES + 64 * 1024;

pub fn router(hub: Arc<BoardHub>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/boards/{id}", get(get_board))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(hub)
}

async fn index() -> &'static str {
    "Inkboard Server - Connect via WebSocket at /ws"
}

async fn health() -> &'static str {
    "ok"
}

async fn get_board(
    State(hub): State<Arc<BoardHub>>,
    Path(id): Path<String>,
) -> Result<Json<BoardDocument>, StatusCode> {
    match hub.document(&id).await {
        Ok(Some(document)) => Ok(Json(document)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!("Failed to read board {}: {}", id, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<BoardHub>>) -> impl IntoResponse {
    ws.max_frame_size(MAX_FRAME_BYTES)
        .max_message_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| handle_socket(socket, hub))
}

/// One connected client.
pub struct Session {
    peer_id: String,
    user: Option<String>,
    board: Option<String>,
    rx: Option<broadcast::Receiver<Broadcast>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            user: None,
            board: None,
            rx: None,
        }
    }

    pub fn board(&self) -> Option<&str> {
        self.board.as_deref()
    }

    /// Drop the current subscription, if any, and tell the remaining subscribers.
    fn leave(&mut self, hub: &BoardHub) {
        self.rx = None;
        let Some(board) = self.board.take() else {
            return;
        };
        if hub.unsubscribe(&board, &self.peer_id) {
            debug!("{} subscribers left on {}", hub.subscriber_count(&board), board);
            hub.broadcast(
                &board,
                &self.peer_id,
                ServerMessage::SubscriberLeft {
                    peer_id: self.peer_id.clone(),
                },
            );
        }
    }
}

/// Apply one client message and return the direct reply, if any.
pub async fn handle_client_message(
    hub: &BoardHub,
    session: &mut Session,
    msg: ClientMessage,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::Subscribe { board, user } => {
            session.leave(hub);
            session.user = user;

            let subscription = match hub.subscribe(&board, &session.peer_id).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!("Failed to open board {}: {}", board, e);
                    return Some(ServerMessage::Error {
                        message: format!("Failed to open board {}: {}", board, e),
                    });
                }
            };
            session.rx = Some(subscription.rx);
            session.board = Some(board.clone());

            hub.broadcast(
                &board,
                &session.peer_id,
                ServerMessage::SubscriberJoined {
                    peer_id: session.peer_id.clone(),
                },
            );
            Some(ServerMessage::Subscribed {
                board,
                subscriber_count: subscription.subscriber_count,
                document: subscription.document,
            })
        }
        ClientMessage::Unsubscribe => {
            session.leave(hub);
            None
        }
        ClientMessage::Write { snapshot, width, height } => {
            let Some(board) = session.board.clone() else {
                return Some(ServerMessage::Error {
                    message: "Subscribe to a board before writing".to_string(),
                });
            };
            let write = Write {
                snapshot,
                width,
                height,
                author: session.user.clone(),
            };
            match hub.write(&board, &session.peer_id, write).await {
                Ok(document) => Some(ServerMessage::Written {
                    board,
                    updated_at: document.updated_at,
                }),
                Err(e) => {
                    warn!("Rejected write to {} from {}: {}", board, session.peer_id, e);
                    Some(ServerMessage::Error {
                        message: e.to_string(),
                    })
                }
            }
        }
        ClientMessage::Read { board } => match hub.document(&board).await {
            Ok(document) => Some(ServerMessage::Document { board, document }),
            Err(e) => Some(ServerMessage::Error {
                message: format!("Failed to read board {}: {}", board, e),
            }),
        },
    }
}

async fn recv_broadcast(rx: &mut Option<broadcast::Receiver<Broadcast>>) -> Result<Broadcast, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Returns false once the client is gone.
async fn send_message(sender: &mut SplitSink<WebSocket, Message>, msg: &ServerMessage) -> bool {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_socket(socket: WebSocket, hub: Arc<BoardHub>) {
    let mut session = Session::new();
    info!("New connection: {}", session.peer_id);

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(text.as_str()) {
                            Ok(client_msg) => handle_client_message(&hub, &mut session, client_msg).await,
                            Err(e) => {
                                warn!("Invalid message from {}: {}", session.peer_id, e);
                                Some(ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                })
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => Some(ServerMessage::Error {
                        message: "Binary frames are not supported".to_string(),
                    }),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", session.peer_id, e);
                        break;
                    }
                };
                if let Some(reply) = reply {
                    if !send_message(&mut sender, &reply).await {
                        break;
                    }
                }
            }

            event = recv_broadcast(&mut session.rx) => {
                match event {
                    // Writers already got `written`.
                    Ok((from, _)) if from == session.peer_id => {}
                    Ok((_, msg)) => {
                        if !send_message(&mut sender, &msg).await {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Peer {} lagged, skipped {} messages", session.peer_id, skipped);
                    }
                    Err(RecvError::Closed) => session.rx = None,
                }
            }
        }
    }

    info!("Connection closed: {} (board {:?})", session.peer_id, session.board());
    session.leave(&hub);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::tests::{data_url, write_of};
    use axum::body::Body;
    use axum::http::Request;
    use inkboard_core::remote::{RemoteBoard, RemoteChange};
    use inkboard_core::sync::NativeWebSocket;
    use inkboard_core::whiteboard::Whiteboard;
    use kurbo::Point;
    use std::time::{Duration, Instant};
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tower::ServiceExt;

    async fn get_request(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn subscribe(board: &str, user: &str) -> ClientMessage {
        ClientMessage::Subscribe {
            board: board.to_string(),
            user: Some(user.to_string()),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(BoardHub::in_memory()));
        let (status, body) = get_request(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_get_board() {
        let hub = Arc::new(BoardHub::in_memory());
        let (status, _) = get_request(router(hub.clone()), "/boards/main").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let doc = hub.write("main", "p1", write_of(3, 2)).await.unwrap();
        let (status, body) = get_request(router(hub), "/boards/main").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(BoardDocument::from_json(&body).unwrap(), doc);
    }

    #[tokio::test]
    async fn test_write_requires_subscription() {
        let hub = BoardHub::in_memory();
        let mut session = Session::new();
        let reply = handle_client_message(
            &hub,
            &mut session,
            ClientMessage::Write {
                snapshot: data_url(2, 2),
                width: 2,
                height: 2,
            },
        )
        .await;
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
        assert!(hub.document("main").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_write_read() {
        let hub = BoardHub::in_memory();
        let mut session = Session::new();

        let reply = handle_client_message(&hub, &mut session, subscribe("main", "ada")).await;
        assert_eq!(
            reply,
            Some(ServerMessage::Subscribed {
                board: "main".to_string(),
                subscriber_count: 1,
                document: None,
            })
        );
        assert_eq!(session.board(), Some("main"));

        let reply = handle_client_message(
            &hub,
            &mut session,
            ClientMessage::Write {
                snapshot: data_url(2, 2),
                width: 2,
                height: 2,
            },
        )
        .await;
        let Some(ServerMessage::Written { board, updated_at }) = reply else {
            panic!("expected written, got {:?}", reply);
        };
        assert_eq!(board, "main");

        let mut reader = Session::new();
        let reply = handle_client_message(
            &hub,
            &mut reader,
            ClientMessage::Read {
                board: "main".to_string(),
            },
        )
        .await;
        let Some(ServerMessage::Document { document: Some(document), .. }) = reply else {
            panic!("expected document, got {:?}", reply);
        };
        assert_eq!(document.updated_at, updated_at);
        assert_eq!(document.updated_by.as_deref(), Some("ada"));
        // Reads do not subscribe.
        assert_eq!(reader.board(), None);
        assert_eq!(hub.subscriber_count("main"), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_leaves_previous_board() {
        let hub = BoardHub::in_memory();
        let mut session = Session::new();
        handle_client_message(&hub, &mut session, subscribe("a", "ada")).await;
        handle_client_message(&hub, &mut session, subscribe("b", "ada")).await;
        assert_eq!(hub.subscriber_count("a"), 0);
        assert_eq!(hub.subscriber_count("b"), 1);

        assert_eq!(handle_client_message(&hub, &mut session, ClientMessage::Unsubscribe).await, None);
        assert_eq!(hub.subscriber_count("b"), 0);
        assert_eq!(session.board(), None);
    }

    type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

    async fn send(client: &mut Client, msg: &ClientMessage) {
        let json = serde_json::to_string(msg).unwrap();
        client.send(WsMessage::text(json)).await.unwrap();
    }

    async fn next(client: &mut Client) -> ServerMessage {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("stream ended")
                .expect("websocket error");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(text.as_str()).unwrap();
            }
        }
    }

    #[tokio::test]
    async fn test_two_clients_share_a_board() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = Arc::new(BoardHub::in_memory());
        let app = router(hub.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let url = format!("ws://{}/ws", addr);
        let (mut alice, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let (mut bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

        send(&mut alice, &subscribe("e2e", "alice")).await;
        assert!(matches!(
            next(&mut alice).await,
            ServerMessage::Subscribed { subscriber_count: 1, document: None, .. }
        ));

        send(&mut bob, &subscribe("e2e", "bob")).await;
        assert!(matches!(
            next(&mut bob).await,
            ServerMessage::Subscribed { subscriber_count: 2, .. }
        ));
        assert!(matches!(next(&mut alice).await, ServerMessage::SubscriberJoined { .. }));

        send(
            &mut alice,
            &ClientMessage::Write {
                snapshot: data_url(4, 4),
                width: 4,
                height: 4,
            },
        )
        .await;
        let ServerMessage::Written { updated_at, .. } = next(&mut alice).await else {
            panic!("expected written");
        };

        let ServerMessage::Updated { document, .. } = next(&mut bob).await else {
            panic!("expected updated");
        };
        assert_eq!(document.updated_at, updated_at);
        assert_eq!(document.updated_by.as_deref(), Some("alice"));
        assert_eq!((document.width, document.height), (4, 4));

        bob.close(None).await.unwrap();
        assert!(matches!(next(&mut alice).await, ServerMessage::SubscriberLeft { .. }));
        assert_eq!(hub.subscriber_count("e2e"), 1);
    }

    #[tokio::test]
    async fn test_invalid_frame_gets_error_reply() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(Arc::new(BoardHub::in_memory()));
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .unwrap();
        client.send(WsMessage::text("{\"type\":\"shout\"}")).await.unwrap();
        let ServerMessage::Error { message } = next(&mut client).await else {
            panic!("expected error");
        };
        assert!(message.starts_with("Invalid message"));
    }

    /// Run the desktop client loop until `done` holds: feed socket events to
    /// the remote board and send whatever it queued.
    async fn pump_until(
        socket: &mut NativeWebSocket,
        remote: &mut RemoteBoard,
        board: &mut Whiteboard,
        done: impl Fn(&RemoteBoard, &Whiteboard) -> bool,
    ) -> Vec<RemoteChange> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut changes = Vec::new();
        loop {
            for event in socket.poll_events() {
                changes.extend(remote.handle_event(event, board));
            }
            for frame in remote.take_outgoing() {
                socket.send(&frame).unwrap();
            }
            if done(remote, board) {
                return changes;
            }
            assert!(Instant::now() < deadline, "timed out waiting for the desktop client");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_desktop_client_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hub = Arc::new(BoardHub::in_memory());
        let app = router(hub.clone());
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        let url = format!("ws://{}/ws", addr);

        let (mut bob, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        send(&mut bob, &subscribe("desk", "bob")).await;
        assert!(matches!(next(&mut bob).await, ServerMessage::Subscribed { .. }));

        let mut socket = NativeWebSocket::new();
        socket.connect(&url).unwrap();
        let mut remote = RemoteBoard::new(Some("ada".to_string()));
        let mut board = Whiteboard::new(40, 30);
        remote.subscribe("desk");

        let changes = pump_until(&mut socket, &mut remote, &mut board, |remote, _| remote.is_subscribed()).await;
        assert!(changes.is_empty());
        assert!(socket.is_connected());
        assert_eq!(remote.subscriber_count(), 2);
        assert!(matches!(next(&mut bob).await, ServerMessage::SubscriberJoined { .. }));

        board.begin_stroke(Point::new(5.0, 5.0)).unwrap();
        board.extend_stroke(Point::new(35.0, 25.0));
        board.end_stroke();
        assert!(board.is_dirty());
        remote.publish_board(&board).unwrap();
        pump_until(&mut socket, &mut remote, &mut board, |_, board| !board.is_dirty()).await;

        let ServerMessage::Updated { document, .. } = next(&mut bob).await else {
            panic!("expected updated");
        };
        assert_eq!(document.updated_by.as_deref(), Some("ada"));
        assert_eq!(document.updated_at, remote.last_seen());
        let received = document.to_snapshot().unwrap().decode().unwrap();
        assert_eq!(&received, board.surface());
        assert_eq!(hub.document("desk").await.unwrap(), Some(document));

        socket.disconnect();
        assert!(matches!(next(&mut bob).await, ServerMessage::SubscriberLeft { .. }));
    }
}
