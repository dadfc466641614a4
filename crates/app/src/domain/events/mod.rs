//! Event log

pub mod errors;
pub mod records;
mod repository;
mod service;
pub mod types;

pub use errors::EventsServiceError;
pub use service::{
    DEFAULT_RECENT_LIMIT, EventsService, MAX_RECENT_LIMIT, MockEventsService, PgEventsService,
    RecentQuery,
};

pub(crate) use repository::{EVENTS_CHANNEL, PgEventsRepository};
