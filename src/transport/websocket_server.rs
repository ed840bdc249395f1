use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use crate::server::AppState;

/// How often the snapshot stream pushes, matching the pace clients poll at
/// during a round.
const SNAPSHOT_INTERVAL_MS: u64 = 1000;

/// Push-only room snapshot stream: one `roomState` JSON frame per second
/// until the client hangs up or the room disappears.
pub async fn websocket_handler(
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, code))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, code: String) {
    info!("snapshot stream opened for room {}", code);
    let (tx, rx) = flume::bounded::<Message>(8);

    let snapshot_state = state.clone();
    let snapshot_code = code.clone();
    let producer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(SNAPSHOT_INTERVAL_MS));
        loop {
            ticker.tick().await;
            let frame = match snapshot_state.store.room_state(&snapshot_code).await {
                Ok(view) => match serde_json::to_string(&view) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        warn!("snapshot serialization failed: {}", e);
                        continue;
                    }
                },
                // Room gone: tell the client and stop producing.
                Err(_) => Message::Close(None),
            };
            let closing = matches!(frame, Message::Close(_));
            if tx.send_async(frame).await.is_err() || closing {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = rx.recv_async() => {
                let Ok(frame) = frame else { break };
                let closing = matches!(frame, Message::Close(_));
                if socket.send(frame).await.is_err() || closing {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // push-only; ignore client frames
                    Some(Err(e)) => {
                        debug!("snapshot stream error for {}: {}", code, e);
                        break;
                    }
                }
            }
        }
    }

    producer.abort();
    info!("snapshot stream closed for room {}", code);
}
