//! Delete Handler

use salvo::prelude::*;

use crate::{
    auth::guarded_tenant,
    errors::WorkerApiError,
    handlers::{GenericResponse, fail_driver, worker_state},
};
use crate::monitor::BridgeMonitors as _;
use crate::driver::RuntimeDriver as _;

/// Delete Handler
///
/// Terminal: container and both volumes removed, tenant directory deleted.
#[handler]
pub(crate) async fn handler(depot: &mut Depot) -> Result<Json<GenericResponse>, WorkerApiError> {
    let state = worker_state(depot)?;
    let tenant = guarded_tenant(depot)?;

    let _lock = state.locks.acquire(&tenant).await;

    state.monitors.stop(&tenant).await;

    if let Err(error) = state.driver.delete(&tenant).await {
        return Err(fail_driver(&state.sink, &tenant, &error).await);
    }

    Ok(GenericResponse::json(&tenant, "deleted"))
}
