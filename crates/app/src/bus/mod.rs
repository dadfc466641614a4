//! Event bus: durable log plus in-process fanout.
//!
//! Publishing appends to the `events` table, projects runtime state onto the
//! tenant row, and queues a `pg_notify` wakeup, all in one transaction. The
//! fanout side listens for wakeups and dispatches committed rows in event-id
//! order to per-tenant broadcast channels, so every subscriber in every
//! process observes the same order the store does.

mod fanout;
mod publisher;

pub use fanout::{EventFanout, EventStream, MockEventStream, SUBSCRIBER_BUFFER};
pub use publisher::{EventSink, MockEventSink, PgEventPublisher};
