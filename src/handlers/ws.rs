//! WebSocket endpoint for the real-time event feed. The token travels in
//! the query string because browser WebSocket clients cannot set headers;
//! it is verified before the upgrade, so a bad token gets a plain 401.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use crate::dispatch;
use crate::entities::user::UserRole;
use crate::error::{AppError, AppResult};
use crate::notify::Notifier;
use crate::utils::jwt::verify_token;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    // A missing token takes the same 401 path as an invalid one.
    let token = query
        .token
        .ok_or_else(|| AppError::Unauthorized("Missing token".to_string()))?;
    let claims = verify_token(&token, &state.config.jwt_secret)?;

    // Drivers subscribe under their driver profile id; that is the id the
    // event names carry.
    let principal = match claims.role {
        UserRole::Driver => dispatch::driver_for_user(&state.db, claims.sub).await?.id,
        UserRole::User | UserRole::Admin => claims.sub,
    };

    let notifier = state.notifier.clone();
    let role = claims.role;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, notifier, role, principal)))
}

async fn handle_socket(socket: WebSocket, notifier: Notifier, role: UserRole, principal: Uuid) {
    let mut sub = notifier.subscribe(role, principal);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = sub.rx.recv() => {
                let Some(event) = event else { break };
                let Ok(frame) = serde_json::to_string(&event) else {
                    tracing::warn!(event = %event.event, "failed to serialize event frame");
                    continue;
                };
                if sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only listen; anything they send is ignored.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(role = role.as_str(), principal = %principal, "websocket session ended");
}
