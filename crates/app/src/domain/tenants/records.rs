//! Tenant Records

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use once_cell::sync::Lazy;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tenant identifiers are lowercase, dns-safe and bounded so they can be
/// embedded in container, volume and directory names.
static TENANT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{2,63}$").expect("pattern is valid"));

/// Number of random bytes in a generated tenant id (hex-encoded).
const TENANT_ID_BYTES: usize = 8;

#[derive(Debug, Error)]
#[error("invalid tenant id")]
pub struct InvalidTenantId;

/// Opaque stable tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0_u8; TENANT_ID_BYTES];

        OsRng.fill_bytes(&mut bytes);

        let mut encoded = String::with_capacity(TENANT_ID_BYTES * 2);

        for byte in bytes {
            use std::fmt::Write;

            let _ = write!(encoded, "{byte:02x}");
        }

        Self(encoded)
    }

    /// Validate and wrap an identifier received from the outside.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTenantId`] when the value does not match the allowed
    /// pattern.
    pub fn parse(value: &str) -> Result<Self, InvalidTenantId> {
        if TENANT_ID_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(InvalidTenantId)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = InvalidTenantId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl TryFrom<String> for TenantId {
    type Error = InvalidTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

/// Lifecycle states shared by desired and actual state columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantState {
    Provisioning,
    Running,
    Paused,
    PendingPairing,
    Error,
    Deleted,
    /// Desired-state only: the runtime has never been asked to run.
    Stopped,
}

impl TenantState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::PendingPairing => "pending_pairing",
            Self::Error => "error",
            Self::Deleted => "deleted",
            Self::Stopped => "stopped",
        }
    }

    /// Terminal states accept no further lifecycle operations.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for TenantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown tenant state")]
pub struct UnknownTenantState;

impl FromStr for TenantState {
    type Err = UnknownTenantState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "provisioning" => Ok(Self::Provisioning),
            "running" => Ok(Self::Running),
            "paused" => Ok(Self::Paused),
            "pending_pairing" => Ok(Self::PendingPairing),
            "error" => Ok(Self::Error),
            "deleted" => Ok(Self::Deleted),
            "stopped" => Ok(Self::Stopped),
            _ => Err(UnknownTenantState),
        }
    }
}

/// Tenant Record
#[derive(Debug, Clone)]
pub struct TenantRecord {
    /// Unique tenant identifier.
    pub id: TenantId,

    /// Owning user id. A user owns at most one tenant.
    pub owner_user_id: i64,

    /// State the owner asked for.
    pub desired_state: TenantState,

    /// State last observed or projected from events.
    pub actual_state: TenantState,

    /// Last time the runner reported on this tenant.
    pub last_heartbeat: Option<Timestamp>,

    /// Last fatal error message, cleared on recovery.
    pub last_error: Option<String>,

    /// Version of the managed assistant defaults last applied.
    pub assistant_defaults_version: Option<String>,

    /// Tenant creation timestamp.
    pub created_at: Timestamp,

    /// Last update timestamp.
    pub updated_at: Timestamp,
}
