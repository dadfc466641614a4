//! Bridge ingress monitors.
//!
//! One task per tenant holds a WebSocket to the runtime's bridge channel and
//! forwards its typed events onto the bus verbatim, annotated with the
//! tenant id. Connection loss backs off exponentially; a restarted runtime
//! is picked up on the next attempt or the next reconcile pass.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use futures_util::StreamExt;
use mockall::automock;
use serde_json::Value;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};
use trellis_app::{
    bus::EventSink,
    domain::{events::types::EventKind, tenants::records::{TenantId, TenantState}},
};

use crate::driver::RuntimeDriver;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Monitor lifecycle, abstracted so handler tests can run without sockets.
#[automock]
#[async_trait]
pub(crate) trait BridgeMonitors: Send + Sync {
    /// Attach a monitor for the tenant; a live one is left alone.
    async fn start(&self, tenant: &TenantId);

    async fn stop(&self, tenant: &TenantId);

    async fn active_count(&self) -> usize;

    async fn shutdown(&self);
}

pub(crate) struct MonitorSet {
    driver: Arc<dyn RuntimeDriver>,
    sink: Arc<dyn EventSink>,
    tasks: Mutex<HashMap<TenantId, JoinHandle<()>>>,
}

impl MonitorSet {
    #[must_use]
    pub(crate) fn new(driver: Arc<dyn RuntimeDriver>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            driver,
            sink,
            tasks: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl BridgeMonitors for MonitorSet {
    async fn start(&self, tenant: &TenantId) {
        let mut tasks = self.tasks.lock().await;

        if let Some(task) = tasks.get(tenant)
            && !task.is_finished()
        {
            return;
        }

        let url = self.driver.bridge_ws_url(tenant);
        let sink = Arc::clone(&self.sink);
        let tenant_id = tenant.clone();

        tasks.insert(
            tenant.clone(),
            tokio::spawn(async move { run_monitor(tenant_id, url, sink).await }),
        );
    }

    async fn stop(&self, tenant: &TenantId) {
        let mut tasks = self.tasks.lock().await;

        if let Some(task) = tasks.remove(tenant) {
            task.abort();
        }
    }

    async fn active_count(&self) -> usize {
        let tasks = self.tasks.lock().await;

        tasks.values().filter(|task| !task.is_finished()).count()
    }

    async fn shutdown(&self) {
        let mut tasks = self.tasks.lock().await;

        for (_, task) in tasks.drain() {
            task.abort();
        }
    }
}

async fn run_monitor(tenant: TenantId, url: String, sink: Arc<dyn EventSink>) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match connect_async(url.as_str()).await {
            Ok((mut stream, _response)) => {
                backoff = INITIAL_BACKOFF;

                debug!(tenant_id = %tenant, url = %url, "bridge monitor attached");

                publish(
                    &sink,
                    &tenant,
                    EventKind::RuntimeStatus {
                        state: TenantState::PendingPairing,
                        status: None,
                    },
                )
                .await;

                while let Some(message) = stream.next().await {
                    match message {
                        Ok(Message::Text(raw)) => handle_message(&sink, &tenant, &raw).await,
                        Ok(Message::Close(_)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
            Err(error) => {
                publish(
                    &sink,
                    &tenant,
                    EventKind::RuntimeError {
                        error: Some("bridge_monitor_error".to_string()),
                        message: format!("bridge connect failed: {error}"),
                    },
                )
                .await;
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

/// Translate one bridge frame into bus events.
async fn handle_message(sink: &Arc<dyn EventSink>, tenant: &TenantId, raw: &str) {
    let Ok(envelope) = serde_json::from_str::<Value>(raw) else {
        publish(
            sink,
            tenant,
            EventKind::RuntimeLog {
                payload: serde_json::json!({ "raw": raw }),
            },
        )
        .await;

        return;
    };

    let event = envelope.get("event").and_then(Value::as_str).unwrap_or("");
    let payload = envelope
        .get("payload")
        .filter(|payload| payload.is_object())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));

    for kind in translate(event, payload) {
        publish(sink, tenant, kind).await;
    }
}

fn translate(event: &str, payload: Value) -> Vec<EventKind> {
    match event {
        "bridge.qr" => match EventKind::from_parts("whatsapp.qr", payload.clone()) {
            qr @ EventKind::WhatsappQr { .. } => vec![qr],
            _ => vec![EventKind::RuntimeLog {
                payload: serde_json::json!({ "bridge_event": event, "payload": payload }),
            }],
        },
        "bridge.connected" => vec![
            EventKind::WhatsappConnected,
            EventKind::RuntimeStatus {
                state: TenantState::Running,
                status: None,
            },
        ],
        "bridge.disconnected" => vec![
            EventKind::WhatsappDisconnected {
                reason: payload
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
            },
            EventKind::RuntimeStatus {
                state: TenantState::PendingPairing,
                status: None,
            },
        ],
        // Runtimes that never emit bridge.connected still prove liveness by
        // relaying traffic.
        "bridge.inbound_message" | "bridge.delivery_receipt" => vec![
            EventKind::WhatsappConnected,
            EventKind::RuntimeStatus {
                state: TenantState::Running,
                status: None,
            },
        ],
        "bridge.error" => vec![EventKind::RuntimeError {
            error: payload
                .get("error")
                .and_then(Value::as_str)
                .map(ToString::to_string),
            message: payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("bridge error")
                .to_string(),
        }],
        "bridge.ready" => vec![EventKind::RuntimeStatus {
            state: TenantState::PendingPairing,
            status: None,
        }],
        _ => vec![EventKind::RuntimeLog {
            payload: serde_json::json!({ "bridge_event": event, "payload": payload }),
        }],
    }
}

async fn publish(sink: &Arc<dyn EventSink>, tenant: &TenantId, kind: EventKind) {
    if let Err(error) = sink.publish(tenant, kind).await {
        warn!(tenant_id = %tenant, "failed to publish bridge event: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qr_frames_become_whatsapp_qr() {
        let kinds = translate("bridge.qr", serde_json::json!({ "qr_code": "tok" }));

        assert_eq!(
            kinds,
            vec![EventKind::WhatsappQr {
                qr: "tok".to_string()
            }]
        );
    }

    #[test]
    fn connected_frames_mark_runtime_running() {
        let kinds = translate("bridge.connected", serde_json::json!({}));

        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0], EventKind::WhatsappConnected);
        assert!(matches!(
            kinds[1],
            EventKind::RuntimeStatus {
                state: TenantState::Running,
                ..
            }
        ));
    }

    #[test]
    fn disconnected_frames_return_to_pending_pairing() {
        let kinds = translate(
            "bridge.disconnected",
            serde_json::json!({ "reason": "logged out" }),
        );

        assert_eq!(
            kinds[0],
            EventKind::WhatsappDisconnected {
                reason: Some("logged out".to_string())
            }
        );
        assert!(matches!(
            kinds[1],
            EventKind::RuntimeStatus {
                state: TenantState::PendingPairing,
                ..
            }
        ));
    }

    #[test]
    fn inbound_traffic_counts_as_connected() {
        let kinds = translate("bridge.inbound_message", serde_json::json!({}));

        assert_eq!(kinds[0], EventKind::WhatsappConnected);
    }

    #[test]
    fn unknown_frames_fall_through_to_logs() {
        let kinds = translate("bridge.debug", serde_json::json!({ "detail": 1 }));

        assert!(matches!(kinds[0], EventKind::RuntimeLog { .. }));
    }
}
