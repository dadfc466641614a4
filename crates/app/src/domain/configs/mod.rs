//! Config revisions

pub mod errors;
pub mod keys;
pub mod records;
mod repository;
mod service;

pub use errors::ConfigsServiceError;
pub use service::{ConfigPatch, ConfigsService, MockConfigsService, PatchOutcome, PgConfigsService};
