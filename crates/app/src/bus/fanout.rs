//! In-process fanout of committed events.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use mockall::automock;
use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use crate::domain::{
    events::{EVENTS_CHANNEL, PgEventsRepository, records::EventEnvelope},
    tenants::records::TenantId,
};

/// Per-subscriber buffer. A consumer that falls further behind than this is
/// lagged out rather than allowed to stall the publisher.
pub const SUBSCRIBER_BUFFER: usize = 256;

/// Batch size when draining the log after a wakeup.
const DISPATCH_BATCH: i64 = 500;

/// Backoff ceiling for the listener supervisor.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Subscribe-side handle to the bus, abstracted for handler tests.
#[automock]
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Subscribe to live events for one tenant, in ascending id order.
    async fn subscribe(&self, tenant: &TenantId) -> broadcast::Receiver<EventEnvelope>;
}

struct FanoutInner {
    pool: PgPool,
    repository: PgEventsRepository,
    subscribers: RwLock<HashMap<TenantId, broadcast::Sender<EventEnvelope>>>,
}

/// Subscribe-side handle to the bus.
///
/// `run` must be driven by a background task; `subscribe` can be called from
/// any number of connections.
#[derive(Clone)]
pub struct EventFanout {
    inner: Arc<FanoutInner>,
}

impl EventFanout {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: Arc::new(FanoutInner {
                repository: PgEventsRepository::new(pool.clone()),
                pool,
                subscribers: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Drive the listener until the process shuts down.
    ///
    /// Reconnects with exponential backoff on connection loss; dispatch
    /// resumes from the last id handed out, so a dropped notification only
    /// delays delivery, it never skips an event.
    pub async fn run(&self) {
        let mut backoff = Duration::from_secs(1);

        loop {
            match self.listen_once().await {
                Ok(()) => backoff = Duration::from_secs(1),
                Err(error) => {
                    warn!("event fanout listener error: {error}");

                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn listen_once(&self) -> Result<(), sqlx::Error> {
        let mut listener = PgListener::connect_with(&self.inner.pool).await?;

        listener.listen(EVENTS_CHANNEL).await?;

        debug!(channel = EVENTS_CHANNEL, "event fanout listening");

        // Only events appended after attach are streamed; replay is served
        // from the store by the gateway.
        let mut last_dispatched = self.inner.repository.max_event_id().await?;

        loop {
            let _wakeup = listener.recv().await?;

            loop {
                let batch = self
                    .inner
                    .repository
                    .events_since(last_dispatched, DISPATCH_BATCH)
                    .await?;

                if batch.is_empty() {
                    break;
                }

                for record in batch {
                    last_dispatched = record.event_id;

                    self.dispatch(record.envelope()).await;
                }
            }
        }
    }

    async fn dispatch(&self, envelope: EventEnvelope) {
        let subscribers = self.inner.subscribers.read().await;

        if let Some(sender) = subscribers.get(&envelope.tenant_id) {
            // send only fails when every receiver is gone; idle channels are
            // reaped lazily on the next subscribe.
            let _receiver_count = sender.send(envelope);
        }
    }
}

#[async_trait]
impl EventStream for EventFanout {
    /// When the subscriber falls more than [`SUBSCRIBER_BUFFER`] events
    /// behind it observes [`broadcast::error::RecvError::Lagged`] and should
    /// be closed.
    async fn subscribe(&self, tenant: &TenantId) -> broadcast::Receiver<EventEnvelope> {
        let mut subscribers = self.inner.subscribers.write().await;

        match subscribers.get(tenant) {
            Some(sender) => sender.subscribe(),
            None => {
                let (sender, receiver) = broadcast::channel(SUBSCRIBER_BUFFER);

                subscribers.insert(tenant.clone(), sender);

                receiver
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;
    use tokio::time::{Duration, timeout};

    use crate::{
        domain::{events::types::EventKind, tenants::records::TenantState},
        test::TestContext,
    };

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_committed_events_in_order() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant = ctx.setup_tenant("owner@example.com").await?;

        let fanout = EventFanout::new(ctx.db.pool().clone());
        let runner = fanout.clone();

        let task = tokio::spawn(async move { runner.run().await });

        // Give the listener a moment to attach before publishing.
        tokio::time::sleep(Duration::from_millis(250)).await;

        let mut receiver = fanout.subscribe(&tenant.id).await;

        let first = ctx
            .publish(
                &tenant.id,
                EventKind::RuntimeStatus {
                    state: TenantState::PendingPairing,
                    status: None,
                },
            )
            .await?;

        let second = ctx
            .publish(
                &tenant.id,
                EventKind::WhatsappQr {
                    qr: "fresh".to_string(),
                },
            )
            .await?;

        let received_first = timeout(Duration::from_secs(5), receiver.recv()).await??;
        let received_second = timeout(Duration::from_secs(5), receiver.recv()).await??;

        assert_eq!(received_first.event_id, first);
        assert_eq!(received_second.event_id, second);
        assert_eq!(received_second.event_type, "whatsapp.qr");

        task.abort();

        Ok(())
    }

    #[tokio::test]
    async fn other_tenants_events_are_not_delivered() -> TestResult {
        let ctx = TestContext::new().await;
        let tenant_a = ctx.setup_tenant("a@example.com").await?;
        let tenant_b = ctx.setup_tenant("b@example.com").await?;

        let fanout = EventFanout::new(ctx.db.pool().clone());
        let runner = fanout.clone();

        let task = tokio::spawn(async move { runner.run().await });

        tokio::time::sleep(Duration::from_millis(250)).await;

        let mut receiver = fanout.subscribe(&tenant_a.id).await;

        ctx.publish(&tenant_b.id, EventKind::WhatsappConnected).await?;

        let own = ctx.publish(&tenant_a.id, EventKind::WhatsappConnected).await?;

        let received = timeout(Duration::from_secs(5), receiver.recv()).await??;

        assert_eq!(received.event_id, own);
        assert_eq!(received.tenant_id, tenant_a.id);

        task.abort();

        Ok(())
    }
}
