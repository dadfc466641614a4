//! Recent Events Handler

use std::sync::Arc;

use salvo::{
    oapi::extract::{PathParam, QueryParam},
    prelude::*,
};
use trellis_app::domain::events::{RecentQuery, records::EventEnvelope};

use crate::{
    errors::ApiError,
    extensions::*,
    state::State,
    tenants::{errors::events_error, owned_tenant, parse_tenant_id},
};
use trellis_app::domain::events::EventsService as _;

/// Recent Events Handler
///
/// Incremental poll over the event log: events with id greater than
/// `after_event_id` (or the most recent window), ascending, optionally
/// filtered by a comma-separated type list. Responses carry the same JSON
/// envelope as the WebSocket stream and are consistent with it by
/// construction since both read the same log.
#[handler]
pub(crate) async fn handler(
    tenant_id: PathParam<String>,
    limit: QueryParam<i64, false>,
    after_event_id: QueryParam<i64, false>,
    types: QueryParam<String, false>,
    depot: &mut Depot,
) -> Result<Json<Vec<EventEnvelope>>, ApiError> {
    let state = depot.obtain_or_500::<Arc<State>>()?;
    let user = depot.current_user_or_401()?;

    let tenant_id = parse_tenant_id(&tenant_id.into_inner())?;

    owned_tenant(&state, &tenant_id, user.id).await?;

    let types = types.into_inner().map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
    });

    let events = state
        .app
        .events
        .recent(
            &tenant_id,
            RecentQuery {
                limit: limit.into_inner(),
                after_event_id: after_event_id.into_inner(),
                types,
            },
        )
        .await
        .map_err(|error| events_error(&error))?;

    Ok(Json(events.iter().map(|record| record.envelope()).collect()))
}
