//! Skill revisions

pub mod errors;
pub mod records;
mod repository;
mod service;

pub use errors::SkillsServiceError;
pub use service::{MockSkillsService, PgSkillsService, SkillsService};
