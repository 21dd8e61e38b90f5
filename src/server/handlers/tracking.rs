use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::response::IntoResponse;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::auth::User;
use crate::server::DynAPI;
use crate::tracking::OutboundEvent;

pub async fn track(
    ws: WebSocketUpgrade,
    Extension(api): Extension<DynAPI>,
    user: User,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, api, user, id))
}

async fn send_event(sink: &mut SplitSink<WebSocket, Message>, event: &OutboundEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(text) => sink.send(Message::Text(text)).await,
        Err(err) => {
            tracing::error!("failed to serialize tracking event: {}", err);
            Ok(())
        }
    }
}

async fn handle_socket(socket: WebSocket, api: DynAPI, user: User, id: Uuid) {
    let (mut sink, mut stream) = socket.split();

    let (trip, mut events) = match api.join_trip_tracking(user.clone(), id).await {
        Ok(joined) => joined,
        Err(err) => {
            tracing::info!(trip_id = %id, user_id = %user.id, "tracking refused: {}", err);
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    let initial = match OutboundEvent::initial(&trip) {
        Ok(event) => event,
        Err(err) => OutboundEvent::error(id, &err),
    };

    if send_event(&mut sink, &initial).await.is_ok() {
        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(err) = api.handle_tracking_message(user.clone(), id, text).await {
                            if send_event(&mut sink, &OutboundEvent::error(id, &err)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        tracing::debug!(trip_id = %id, "websocket receive error: {}", err);
                        break;
                    }
                },
                outbound = events.recv() => match outbound {
                    Ok(event) => {
                        if send_event(&mut sink, &event).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(trip_id = %id, "tracking subscriber lagged, {} events skipped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    drop(events);
    api.leave_trip_tracking(id).await;

    tracing::info!(trip_id = %id, user_id = %user.id, "left trip tracking");
}
