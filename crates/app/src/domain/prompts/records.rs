//! Prompt revision records.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::tenants::records::TenantId;

/// Artifact names end up as file names inside the tenant's config volume, so
/// they share the runner's safe-name pattern.
static ARTIFACT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("pattern is valid"));

#[derive(Debug, Error)]
#[error("invalid artifact name")]
pub struct InvalidArtifactName;

/// Validated prompt/skill identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// # Errors
    ///
    /// Returns [`InvalidArtifactName`] when the value does not match the
    /// allowed pattern.
    pub fn parse(value: &str) -> Result<Self, InvalidArtifactName> {
        if ARTIFACT_NAME_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidArtifactName)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactName {
    type Err = InvalidArtifactName;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = InvalidArtifactName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ArtifactName> for String {
    fn from(value: ArtifactName) -> Self {
        value.0
    }
}

/// Prompt Revision Record
#[derive(Debug, Clone)]
pub struct PromptRevisionRecord {
    pub tenant_id: TenantId,
    pub name: ArtifactName,
    pub revision: i64,
    pub content: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
