//! Signed capability and session token primitives.
//!
//! Tokens are `base64url(claims JSON) . base64url(HMAC-SHA256)`, signed with
//! a shared key loaded from the environment. A previous key may be configured
//! so the two services can rotate without a simultaneous deploy; verification
//! accepts either key for the grace period.

mod action;

pub use action::{Action, ActionClaims, mint_action_token, verify_action_token};

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted key length in bytes.
pub const MIN_KEY_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing key must be at least {MIN_KEY_BYTES} bytes")]
    KeyTooShort,

    #[error("token format is invalid")]
    Malformed,

    #[error("token signature mismatch")]
    BadSignature,

    #[error("token is expired or not yet valid")]
    Expired,

    #[error("token scope mismatch")]
    ScopeMismatch,
}

/// HMAC signing key with an optional previous key for rotation.
#[derive(Clone)]
pub struct SigningKey {
    current: SecretString,
    previous: Option<SecretString>,
}

impl SigningKey {
    /// Build a key from raw secret material.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::KeyTooShort`] when either key is below the
    /// minimum length.
    pub fn new(current: String, previous: Option<String>) -> Result<Self, SignerError> {
        if current.len() < MIN_KEY_BYTES {
            return Err(SignerError::KeyTooShort);
        }

        if previous.as_ref().is_some_and(|p| p.len() < MIN_KEY_BYTES) {
            return Err(SignerError::KeyTooShort);
        }

        Ok(Self {
            current: SecretString::from(current),
            previous: previous.map(SecretString::from),
        })
    }

    /// Sign `claims` bytes into a compact token.
    #[must_use]
    pub fn seal(&self, claims: &[u8]) -> String {
        let tag = sign(self.current.expose_secret(), claims);

        format!("{}.{}", B64.encode(claims), B64.encode(tag))
    }

    /// Verify a compact token and return the claims bytes.
    ///
    /// The current key is tried first, then the previous key if configured.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Malformed`] on encoding problems and
    /// [`SignerError::BadSignature`] when neither key matches.
    pub fn unseal(&self, token: &str) -> Result<Vec<u8>, SignerError> {
        let (claims_b64, tag_b64) = token.split_once('.').ok_or(SignerError::Malformed)?;

        let claims = B64.decode(claims_b64).map_err(|_| SignerError::Malformed)?;
        let tag = B64.decode(tag_b64).map_err(|_| SignerError::Malformed)?;

        let candidate = sign(self.current.expose_secret(), &claims);

        if candidate.ct_eq(&tag).into() {
            return Ok(claims);
        }

        if let Some(previous) = &self.previous {
            let candidate = sign(previous.expose_secret(), &claims);

            if candidate.ct_eq(&tag).into() {
                return Ok(claims);
            }
        }

        Err(SignerError::BadSignature)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey(**redacted**)")
    }
}

fn sign(key: &str, payload: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .expect("HMAC accepts keys of any length");

    mac.update(payload);

    mac.finalize().into_bytes().to_vec()
}
