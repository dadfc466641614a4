//! Session tokens.
//!
//! Access and refresh tokens bind a user id to an expiry and are signed with
//! the session key. They are never persisted; revocation is time-based, with
//! a process-scoped ledger retiring refresh nonces on use.

use std::collections::HashMap;

use jiff::{Timestamp, ToSpan};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

use crate::signer::{SignerError, SigningKey};

/// Default access-token lifetime.
pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;

/// Default refresh-token lifetime.
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: i64,
    pub email: Option<String>,
    pub kind: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub nonce: String,
}

/// Token pair returned by signup, login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in_seconds: i64,
}

/// Mints and verifies session tokens.
#[derive(Debug, Clone)]
pub struct SessionSigner {
    key: SigningKey,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl SessionSigner {
    #[must_use]
    pub fn new(key: SigningKey, access_ttl_seconds: i64, refresh_ttl_seconds: i64) -> Self {
        Self {
            key,
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    /// Issue a fresh access/refresh pair for a user.
    #[must_use]
    pub fn issue(&self, user_id: i64, email: &str) -> SessionTokens {
        let access = self.mint(user_id, Some(email), TokenKind::Access, self.access_ttl_seconds);
        let refresh = self.mint(user_id, None, TokenKind::Refresh, self.refresh_ttl_seconds);

        SessionTokens {
            access_token: access,
            refresh_token: refresh,
            token_type: "bearer".to_string(),
            expires_in_seconds: self.access_ttl_seconds,
        }
    }

    /// Verify an access token.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::ScopeMismatch`] when a refresh token is
    /// presented where an access token is required.
    pub fn verify_access(&self, token: &str) -> Result<SessionClaims, SignerError> {
        self.verify(token, TokenKind::Access)
    }

    /// Verify a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<SessionClaims, SignerError> {
        self.verify(token, TokenKind::Refresh)
    }

    fn mint(&self, user_id: i64, email: Option<&str>, kind: TokenKind, ttl: i64) -> String {
        let now = Timestamp::now();

        let claims = SessionClaims {
            sub: user_id,
            email: email.map(ToString::to_string),
            kind,
            iat: now.as_second(),
            exp: now.checked_add(ttl.seconds()).unwrap_or(now).as_second(),
            nonce: Uuid::new_v4().simple().to_string(),
        };

        let bytes = serde_json::to_vec(&claims).expect("claims are serialisable");

        self.key.seal(&bytes)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<SessionClaims, SignerError> {
        let bytes = self.key.unseal(token)?;

        let claims: SessionClaims =
            serde_json::from_slice(&bytes).map_err(|_| SignerError::Malformed)?;

        if Timestamp::now().as_second() > claims.exp {
            return Err(SignerError::Expired);
        }

        if claims.kind != expected {
            return Err(SignerError::ScopeMismatch);
        }

        Ok(claims)
    }
}

/// Process-scoped rotate-on-use ledger for refresh tokens.
///
/// A nonce can be spent exactly once; entries are pruned as they expire.
/// Session-token lifecycle stays independent of tenant lifecycle.
#[derive(Debug, Default)]
pub struct RefreshLedger {
    spent: Mutex<HashMap<String, i64>>,
}

impl RefreshLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to spend a refresh nonce. Returns false when it was already
    /// used.
    pub fn spend(&self, claims: &SessionClaims) -> bool {
        let now = Timestamp::now().as_second();

        let mut spent = self.spent.lock().expect("ledger mutex is never poisoned");

        spent.retain(|_, exp| *exp > now);

        spent.insert(claims.nonce.clone(), claims.exp).is_none()
    }
}
