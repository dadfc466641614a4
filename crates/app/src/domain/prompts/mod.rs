//! Prompt revisions

pub mod errors;
pub mod records;
mod repository;
mod service;

pub use errors::PromptsServiceError;
pub use service::{MockPromptsService, PgPromptsService, PromptsService};
