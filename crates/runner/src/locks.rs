//! Per-tenant operation locks.
//!
//! Lifecycle operations for one tenant are serialised; different tenants
//! proceed in parallel. Locks are plain keyed mutexes, never held across a
//! request boundary.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OwnedMutexGuard};
use trellis_app::domain::tenants::records::TenantId;

#[derive(Debug, Default, Clone)]
pub(crate) struct TenantLocks {
    locks: Arc<Mutex<HashMap<TenantId, Arc<Mutex<()>>>>>,
}

impl TenantLocks {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Acquire the tenant's lock, creating it on first use.
    pub(crate) async fn acquire(&self, tenant: &TenantId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;

            locks
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).expect("valid tenant id")
    }

    #[tokio::test]
    async fn same_tenant_operations_serialise() {
        let locks = TenantLocks::new();

        let guard = locks.acquire(&tenant("aaaa000000000001")).await;

        let contended = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&tenant("aaaa000000000001")),
        )
        .await;

        assert!(contended.is_err(), "second acquire must block");

        drop(guard);

        let unblocked = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&tenant("aaaa000000000001")),
        )
        .await;

        assert!(unblocked.is_ok());
    }

    #[tokio::test]
    async fn different_tenants_do_not_contend() {
        let locks = TenantLocks::new();

        let _guard = locks.acquire(&tenant("aaaa000000000001")).await;

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&tenant("bbbb000000000002")),
        )
        .await;

        assert!(other.is_ok(), "unrelated tenant must not block");
    }
}
