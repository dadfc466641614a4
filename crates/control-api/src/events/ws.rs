//! WebSocket event stream.
//!
//! `GET /v1/events/ws?token=…&tenant_id=…&replay=N&after_event_id=K`
//!
//! Authenticates the access token from the query (browsers cannot set
//! headers on WebSocket connects), enforces tenant ownership, replays up to
//! N stored events with id > K in ascending order, then streams live bus
//! events. One JSON envelope per message; ids never regress, and the replay
//! window and the live stream are deduplicated by id.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use salvo::{
    prelude::*,
    websocket::{Message, WebSocket, WebSocketUpgrade},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;
use trellis_app::domain::{
    events::{MAX_RECENT_LIMIT, RecentQuery, records::EventEnvelope},
    tenants::{TenantsServiceError, records::TenantId},
};

use crate::state::State;
use trellis_app::bus::EventStream as _;
use trellis_app::domain::events::EventsService as _;
use trellis_app::domain::tenants::TenantsService as _;

/// Default replay window on attach.
const DEFAULT_REPLAY: i64 = 80;

/// Keepalive cadence over idle connections.
const KEEPALIVE: Duration = Duration::from_secs(20);

/// Close code for lagging consumers (RFC 6455 "try again later").
const CLOSE_LAGGING: u16 = 1013;

#[handler]
pub(crate) async fn handler(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
) -> Result<(), StatusError> {
    let state = depot
        .obtain::<Arc<State>>()
        .map_err(|_| StatusError::internal_server_error())?
        .clone();

    let Some(token) = req.query::<String>("token") else {
        return Err(StatusError::unauthorized().brief("Missing token"));
    };

    let claims = state
        .sessions
        .verify_access(&token)
        .map_err(|_| StatusError::unauthorized().brief("Invalid or expired access token"))?;

    let tenant = resolve_tenant(&state, req.query::<String>("tenant_id"), claims.sub).await?;

    let replay = req
        .query::<i64>("replay")
        .unwrap_or(DEFAULT_REPLAY)
        .clamp(0, MAX_RECENT_LIMIT);

    let after_event_id = req.query::<i64>("after_event_id");

    // Subscribe before replaying so nothing published in between is lost;
    // the id watermark drops the overlap.
    let live = state.stream.subscribe(&tenant).await;

    WebSocketUpgrade::new()
        .upgrade(req, res, move |ws| {
            stream_events(ws, state, tenant, replay, after_event_id, live)
        })
        .await
}

/// Resolve the tenant to follow: the explicit query parameter (ownership
/// enforced) or the caller's own tenant.
async fn resolve_tenant(
    state: &State,
    requested: Option<String>,
    user_id: i64,
) -> Result<TenantId, StatusError> {
    match requested {
        Some(raw) => {
            let tenant = TenantId::parse(&raw)
                .map_err(|_| StatusError::bad_request().brief("Malformed tenant id"))?;

            state
                .app
                .tenants
                .tenant_for_owner(&tenant, user_id)
                .await
                .map(|record| record.id)
                .map_err(|error| match error {
                    TenantsServiceError::NotOwned | TenantsServiceError::NotFound => {
                        StatusError::forbidden()
                    }
                    _ => StatusError::internal_server_error(),
                })
        }
        None => state
            .app
            .tenants
            .tenant_by_owner(user_id)
            .await
            .map_err(|_| StatusError::internal_server_error())?
            .map(|record| record.id)
            .ok_or_else(StatusError::forbidden),
    }
}

async fn stream_events(
    ws: WebSocket,
    state: Arc<State>,
    tenant: TenantId,
    replay: i64,
    after_event_id: Option<i64>,
    mut live: broadcast::Receiver<EventEnvelope>,
) {
    let (mut sender, mut receiver) = ws.split();

    let ready = serde_json::json!({
        "type": "ws.ready",
        "tenant_id": tenant.as_str(),
        "payload": { "status": "ok" },
    });

    if sender.send(Message::text(ready.to_string())).await.is_err() {
        return;
    }

    // Highest id already delivered; live events at or below it are replay
    // overlap and are dropped.
    let mut last_sent = after_event_id.unwrap_or(0);

    if replay > 0 {
        match state
            .app
            .events
            .recent(
                &tenant,
                RecentQuery {
                    limit: Some(replay),
                    after_event_id,
                    types: None,
                },
            )
            .await
        {
            Ok(events) => {
                for record in events {
                    last_sent = record.event_id;

                    let Ok(frame) = serde_json::to_string(&record.envelope()) else {
                        continue;
                    };

                    if sender.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
            }
            Err(error) => {
                warn!(tenant_id = %tenant, "event replay failed: {error}");
            }
        }
    }

    let mut keepalive = tokio::time::interval(KEEPALIVE);

    // The first tick fires immediately; consume it.
    keepalive.tick().await;

    loop {
        tokio::select! {
            event = live.recv() => match event {
                Ok(envelope) => {
                    if envelope.event_id <= last_sent {
                        continue;
                    }

                    last_sent = envelope.event_id;

                    let Ok(frame) = serde_json::to_string(&envelope) else {
                        continue;
                    };

                    if sender.send(Message::text(frame)).await.is_err() {
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tenant_id = %tenant, skipped, "closing lagging events subscriber");

                    let _ = sender
                        .send(Message::close_with(CLOSE_LAGGING, "lagging"))
                        .await;

                    return;
                }
                Err(RecvError::Closed) => {
                    let _ = sender.send(Message::close()).await;

                    return;
                }
            },
            incoming = receiver.next() => match incoming {
                None | Some(Err(_)) => return,
                Some(Ok(message)) if message.is_close() => return,
                Some(Ok(_)) => {}
            },
            _ = keepalive.tick() => {
                let frame = serde_json::json!({
                    "type": "ws.keepalive",
                    "tenant_id": tenant.as_str(),
                    "payload": {},
                });

                if sender.send(Message::text(frame.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }
}
