//! Env key validation and sensitive-value redaction.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::configs::records::EnvMap;

static ENV_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("pattern is valid"));

static SENSITIVE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"KEY|SECRET|TOKEN|PASSWORD").expect("pattern is valid"));

/// Placeholder shown wherever a sensitive value would otherwise leak.
pub const REDACTED: &str = "***";

/// The config key that must hold a model-provider credential before the
/// runtime may start.
pub const OPENROUTER_API_KEY: &str = "NEXUS_OPENROUTER_API_KEY";

#[must_use]
pub fn is_valid_key(key: &str) -> bool {
    ENV_KEY_RE.is_match(key)
}

/// Sensitive keys must never appear in logs or event payloads.
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEY_RE.is_match(key)
}

/// Copy of `env` with every sensitive value replaced by [`REDACTED`].
#[must_use]
pub fn redact_env(env: &EnvMap) -> EnvMap {
    env.iter()
        .map(|(key, value)| {
            let value = if is_sensitive_key(key) {
                REDACTED.to_string()
            } else {
                value.clone()
            };

            (key.clone(), value)
        })
        .collect()
}

/// Whether the env map carries a non-blank model-provider key.
#[must_use]
pub fn has_openrouter_api_key(env: &EnvMap) -> bool {
    env.get(OPENROUTER_API_KEY)
        .is_some_and(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_accepts_env_style_names() {
        assert!(is_valid_key("NEXUS_CONFIG_DIR"));
        assert!(is_valid_key("_private"));
        assert!(is_valid_key("lower_case_1"));
    }

    #[test]
    fn key_pattern_rejects_hostile_names() {
        for bad in ["", "1STARTS_WITH_DIGIT", "HAS-DASH", "HAS SPACE", "a=b"] {
            assert!(!is_valid_key(bad), "expected rejection for {bad:?}");
        }
    }

    #[test]
    fn sensitive_classification_matches_spec_patterns() {
        assert!(is_sensitive_key("NEXUS_OPENROUTER_API_KEY"));
        assert!(is_sensitive_key("BRIDGE_SHARED_SECRET"));
        assert!(is_sensitive_key("REFRESH_TOKEN"));
        assert!(is_sensitive_key("DB_PASSWORD"));
        assert!(!is_sensitive_key("NEXUS_DATA_DIR"));
    }

    #[test]
    fn redact_env_masks_only_sensitive_values() {
        let env: EnvMap = [
            ("NEXUS_DATA_DIR".to_string(), "/data/state".to_string()),
            ("NEXUS_OPENROUTER_API_KEY".to_string(), "sk-test".to_string()),
        ]
        .into_iter()
        .collect();

        let redacted = redact_env(&env);

        assert_eq!(redacted["NEXUS_DATA_DIR"], "/data/state");
        assert_eq!(redacted["NEXUS_OPENROUTER_API_KEY"], REDACTED);
    }

    #[test]
    fn blank_openrouter_key_does_not_count() {
        let mut env = EnvMap::new();

        assert!(!has_openrouter_api_key(&env));

        env.insert(OPENROUTER_API_KEY.to_string(), "   ".to_string());

        assert!(!has_openrouter_api_key(&env));

        env.insert(OPENROUTER_API_KEY.to_string(), "sk-test".to_string());

        assert!(has_openrouter_api_key(&env));
    }
}
