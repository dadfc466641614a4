//! Action capability tokens exchanged between the control plane and runner.
//!
//! Each token names exactly one tenant and one action, expires within sixty
//! seconds, and is verified by the runner before any driver operation runs.
//! Nonces are not single-use: replay inside the window is accepted because
//! every driver operation is idempotent.

use std::{fmt, str::FromStr};

use jiff::{Timestamp, ToSpan};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::tenants::records::TenantId,
    signer::{SignerError, SigningKey},
};

/// Maximum token lifetime in seconds.
pub const MAX_ACTION_TTL_SECONDS: i64 = 60;

/// Operations the runner accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Provision,
    Start,
    Stop,
    Restart,
    PairStart,
    ApplyConfig,
    WhatsappDisconnect,
    Health,
    Delete,
}

impl Action {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provision => "provision",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::PairStart => "pair_start",
            Self::ApplyConfig => "apply_config",
            Self::WhatsappDisconnect => "whatsapp_disconnect",
            Self::Health => "health",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = SignerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "provision" => Ok(Self::Provision),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "restart" => Ok(Self::Restart),
            "pair_start" => Ok(Self::PairStart),
            "apply_config" => Ok(Self::ApplyConfig),
            "whatsapp_disconnect" => Ok(Self::WhatsappDisconnect),
            "health" => Ok(Self::Health),
            "delete" => Ok(Self::Delete),
            _ => Err(SignerError::Malformed),
        }
    }
}

/// Signed claims carried by an action token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionClaims {
    pub tenant_id: String,
    pub action: Action,
    pub nbf: i64,
    pub exp: i64,
    pub nonce: String,
}

/// Mint a token scoped to one tenant and one action.
///
/// `ttl_seconds` is clamped to [`MAX_ACTION_TTL_SECONDS`].
#[must_use]
pub fn mint_action_token(
    key: &SigningKey,
    tenant: &TenantId,
    action: Action,
    ttl_seconds: i64,
) -> String {
    let now = Timestamp::now();
    let ttl = ttl_seconds.clamp(1, MAX_ACTION_TTL_SECONDS);

    let claims = ActionClaims {
        tenant_id: tenant.to_string(),
        action,
        nbf: now.as_second(),
        exp: now
            .checked_add(ttl.seconds())
            .unwrap_or(now)
            .as_second(),
        nonce: Uuid::new_v4().simple().to_string(),
    };

    let bytes = serde_json::to_vec(&claims).expect("claims are serialisable");

    key.seal(&bytes)
}

/// Verify a token against the expected tenant and action.
///
/// # Errors
///
/// Returns [`SignerError::BadSignature`] on a key mismatch,
/// [`SignerError::Expired`] outside the validity window, and
/// [`SignerError::ScopeMismatch`] when the tenant or action differs from the
/// request path.
pub fn verify_action_token(
    key: &SigningKey,
    token: &str,
    tenant: &TenantId,
    action: Action,
) -> Result<ActionClaims, SignerError> {
    let bytes = key.unseal(token)?;

    let claims: ActionClaims =
        serde_json::from_slice(&bytes).map_err(|_| SignerError::Malformed)?;

    let now = Timestamp::now().as_second();

    if now < claims.nbf || now > claims.exp {
        return Err(SignerError::Expired);
    }

    if claims.tenant_id != tenant.as_str() || claims.action != action {
        return Err(SignerError::ScopeMismatch);
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SigningKey {
        SigningKey::new("an-action-key-of-sufficient-length".to_string(), None)
            .expect("key should build")
    }

    fn tenant() -> TenantId {
        TenantId::parse("abc123def4567890").expect("valid tenant id")
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let token = mint_action_token(&key(), &tenant(), Action::PairStart, 60);
        let claims = verify_action_token(&key(), &token, &tenant(), Action::PairStart)
            .expect("token should verify");

        assert_eq!(claims.tenant_id, tenant().as_str());
        assert_eq!(claims.action, Action::PairStart);
        assert!(claims.exp - claims.nbf <= MAX_ACTION_TTL_SECONDS);
    }

    #[test]
    fn ttl_is_clamped_to_sixty_seconds() {
        let token = mint_action_token(&key(), &tenant(), Action::Start, 3600);
        let claims = verify_action_token(&key(), &token, &tenant(), Action::Start)
            .expect("token should verify");

        assert!(claims.exp - claims.nbf <= MAX_ACTION_TTL_SECONDS);
    }

    #[test]
    fn action_mismatch_is_rejected() {
        let token = mint_action_token(&key(), &tenant(), Action::Start, 60);

        assert!(matches!(
            verify_action_token(&key(), &token, &tenant(), Action::Stop),
            Err(SignerError::ScopeMismatch)
        ));
    }

    #[test]
    fn tenant_mismatch_is_rejected() {
        let token = mint_action_token(&key(), &tenant(), Action::Start, 60);
        let other = TenantId::parse("0000000000000001").expect("valid tenant id");

        assert!(matches!(
            verify_action_token(&key(), &token, &other, Action::Start),
            Err(SignerError::ScopeMismatch)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = ActionClaims {
            tenant_id: tenant().to_string(),
            action: Action::Start,
            nbf: 0,
            exp: 1,
            nonce: "n".to_string(),
        };

        let token = key().seal(&serde_json::to_vec(&claims).expect("serialisable"));

        assert!(matches!(
            verify_action_token(&key(), &token, &tenant(), Action::Start),
            Err(SignerError::Expired)
        ));
    }

    #[test]
    fn action_strings_round_trip() {
        for action in [
            Action::Provision,
            Action::Start,
            Action::Stop,
            Action::Restart,
            Action::PairStart,
            Action::ApplyConfig,
            Action::WhatsappDisconnect,
            Action::Health,
            Action::Delete,
        ] {
            assert_eq!(action.as_str().parse::<Action>().expect("parses"), action);
        }
    }
}
