//! WebSocket hub at `/hubs/lottery`.
//!
//! Every connection starts in the `global`, `user_{id}` and (for pool-bound
//! users) `bettingpool_{id}` groups, and may join draw or zone groups at
//! runtime. Notifications from the bus are forwarded when their audience
//! intersects the connection's groups.

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use banca_core::notify::{Audience, Event, Notification, Pong};
use banca_core::{Claims, CoreError};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Deserialize)]
pub struct HubQuery {
    access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum ClientAction {
    #[serde(rename_all = "camelCase")]
    JoinDraw { draw_id: i64 },
    #[serde(rename_all = "camelCase")]
    LeaveDraw { draw_id: i64 },
    #[serde(rename_all = "camelCase")]
    JoinZone { zone_id: i64 },
    #[serde(rename_all = "camelCase")]
    LeaveZone { zone_id: i64 },
    #[serde(rename_all = "camelCase")]
    JoinDraws { draw_ids: Vec<i64> },
    Ping,
}

fn initial_groups(claims: &Claims) -> HashSet<Audience> {
    let mut groups = HashSet::from([Audience::Global, Audience::User(claims.user_id())]);
    if let Some(pool_id) = claims.pool {
        groups.insert(Audience::BettingPool(pool_id));
    }
    groups
}

/// Apply a client message to the connection's groups. Returns the reply to
/// send back, if any.
fn handle_action(text: &str, groups: &mut HashSet<Audience>) -> Option<String> {
    let action = match serde_json::from_str::<ClientAction>(text) {
        Ok(action) => action,
        Err(e) => {
            return Some(json!({ "type": "Error", "message": format!("unrecognized message: {}", e) }).to_string());
        }
    };

    match action {
        ClientAction::JoinDraw { draw_id } => {
            groups.insert(Audience::Draw(draw_id));
        }
        ClientAction::LeaveDraw { draw_id } => {
            groups.remove(&Audience::Draw(draw_id));
        }
        ClientAction::JoinZone { zone_id } => {
            groups.insert(Audience::Zone(zone_id));
        }
        ClientAction::LeaveZone { zone_id } => {
            groups.remove(&Audience::Zone(zone_id));
        }
        ClientAction::JoinDraws { draw_ids } => {
            groups.extend(draw_ids.into_iter().map(Audience::Draw));
        }
        ClientAction::Ping => {
            let pong = Notification::new(Event::Pong(Pong { server_time: Utc::now() }));
            return serde_json::to_string(&pong).ok();
        }
    }
    None
}

pub async fn lottery_hub(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HubQuery>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let token = query
        .access_token
        .ok_or_else(|| ApiError::from(CoreError::unauthorized("missing access_token")))?;
    let claims = state.office.verify_token(&token).await?;
    Ok(ws.on_upgrade(move |socket| run_connection(socket, state, claims)))
}

async fn run_connection(socket: WebSocket, state: AppState, claims: Claims) {
    let mut groups = initial_groups(&claims);
    let mut events = state.office.notifier().subscribe();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!("Hub connection opened for user {}", claims.user_id());

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_action(&text, &mut groups) {
                        if sender.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Hub receive error for user {}: {}", claims.user_id(), e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(envelope) => {
                    if !envelope.is_for(&groups) {
                        continue;
                    }
                    let payload = match serde_json::to_string(&envelope.notification) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!("Failed to serialize notification: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Hub client {} lagged, skipped {} notifications", claims.user_id(), skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    tracing::info!("Hub connection closed for user {}", claims.user_id());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(pool: Option<i64>) -> Claims {
        Claims {
            sub: 7,
            name: "cajero".to_string(),
            pool,
            admin: false,
            perms: vec![],
            iss: "banca-api".to_string(),
            aud: "banca-clients".to_string(),
            iat: 0,
            exp: i64::MAX,
        }
    }

    #[test]
    fn test_initial_groups() {
        let groups = initial_groups(&claims(Some(3)));
        assert!(groups.contains(&Audience::Global));
        assert!(groups.contains(&Audience::User(7)));
        assert!(groups.contains(&Audience::BettingPool(3)));
        assert_eq!(initial_groups(&claims(None)).len(), 2);
    }

    #[test]
    fn test_join_and_leave() {
        let mut groups = initial_groups(&claims(None));
        assert!(handle_action(r#"{"action":"joinDraw","drawId":4}"#, &mut groups).is_none());
        assert!(groups.contains(&Audience::Draw(4)));

        handle_action(r#"{"action":"joinDraws","drawIds":[5,6]}"#, &mut groups);
        handle_action(r#"{"action":"leaveDraw","drawId":4}"#, &mut groups);
        assert!(!groups.contains(&Audience::Draw(4)));
        assert!(groups.contains(&Audience::Draw(6)));

        handle_action(r#"{"action":"joinZone","zoneId":2}"#, &mut groups);
        assert!(groups.contains(&Audience::Zone(2)));
        handle_action(r#"{"action":"leaveZone","zoneId":2}"#, &mut groups);
        assert!(!groups.contains(&Audience::Zone(2)));
    }

    #[test]
    fn test_ping_and_garbage() {
        let mut groups = HashSet::new();
        let pong: serde_json::Value =
            serde_json::from_str(&handle_action(r#"{"action":"ping"}"#, &mut groups).unwrap()).unwrap();
        assert_eq!(pong["type"], "Pong");
        assert!(pong["serverTime"].is_string());

        let error: serde_json::Value =
            serde_json::from_str(&handle_action("hola", &mut groups).unwrap()).unwrap();
        assert_eq!(error["type"], "Error");
    }
}
