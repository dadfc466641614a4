//! Typed event kinds.
//!
//! The bus carries a closed set of known event types with strongly typed
//! payloads, plus an `Unknown` fallthrough that preserves the raw object for
//! forward compatibility with newer runtimes.

use serde_json::{Map, Value, json};

use crate::domain::tenants::records::TenantState;

/// Accepted spellings for the QR token inside a `whatsapp.qr` payload.
const QR_FIELDS: [&str; 4] = ["qr", "qr_code", "qrcode", "code"];

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    RuntimeStatus {
        state: TenantState,
        status: Option<String>,
    },
    RuntimeError {
        error: Option<String>,
        message: String,
    },
    RuntimeLog {
        payload: Value,
    },
    WhatsappQr {
        qr: String,
    },
    WhatsappConnected,
    WhatsappDisconnected {
        reason: Option<String>,
    },
    GoogleConnected {
        scopes: Vec<String>,
    },
    GoogleDisconnected {
        reason: Option<String>,
    },
    GoogleError {
        message: String,
    },
    ConfigApplied {
        revision: Option<i64>,
        prompt: Option<String>,
        skill_id: Option<String>,
    },
    BootstrapApplied {
        version: String,
        restarted_runtime: bool,
        prompts: Vec<String>,
        skills: Vec<String>,
    },
    Unknown {
        event_type: String,
        payload: Value,
    },
}

impl EventKind {
    /// The dotted type string used on the wire and in the store.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::RuntimeStatus { .. } => "runtime.status",
            Self::RuntimeError { .. } => "runtime.error",
            Self::RuntimeLog { .. } => "runtime.log",
            Self::WhatsappQr { .. } => "whatsapp.qr",
            Self::WhatsappConnected => "whatsapp.connected",
            Self::WhatsappDisconnected { .. } => "whatsapp.disconnected",
            Self::GoogleConnected { .. } => "google.connected",
            Self::GoogleDisconnected { .. } => "google.disconnected",
            Self::GoogleError { .. } => "google.error",
            Self::ConfigApplied { .. } => "config.applied",
            Self::BootstrapApplied { .. } => "assistant.bootstrap.applied",
            Self::Unknown { event_type, .. } => event_type,
        }
    }

    /// The JSON payload for the store and the wire envelope.
    #[must_use]
    pub fn payload(&self) -> Value {
        match self {
            Self::RuntimeStatus { state, status } => {
                let mut map = Map::new();

                map.insert("state".to_string(), json!(state.as_str()));

                if let Some(status) = status {
                    map.insert("status".to_string(), json!(status));
                }

                Value::Object(map)
            }
            Self::RuntimeError { error, message } => {
                let mut map = Map::new();

                if let Some(error) = error {
                    map.insert("error".to_string(), json!(error));
                }

                map.insert("message".to_string(), json!(message));

                Value::Object(map)
            }
            Self::RuntimeLog { payload } | Self::Unknown { payload, .. } => payload.clone(),
            Self::WhatsappQr { qr } => json!({ "qr": qr }),
            Self::WhatsappConnected => json!({}),
            Self::WhatsappDisconnected { reason } | Self::GoogleDisconnected { reason } => {
                reason
                    .as_ref()
                    .map_or_else(|| json!({}), |reason| json!({ "reason": reason }))
            }
            Self::GoogleConnected { scopes } => json!({ "scopes": scopes }),
            Self::GoogleError { message } => json!({ "message": message }),
            Self::ConfigApplied {
                revision,
                prompt,
                skill_id,
            } => {
                let mut map = Map::new();

                if let Some(revision) = revision {
                    map.insert("revision".to_string(), json!(revision));
                }

                if let Some(prompt) = prompt {
                    map.insert("prompt".to_string(), json!(prompt));
                }

                if let Some(skill_id) = skill_id {
                    map.insert("skill_id".to_string(), json!(skill_id));
                }

                Value::Object(map)
            }
            Self::BootstrapApplied {
                version,
                restarted_runtime,
                prompts,
                skills,
            } => json!({
                "version": version,
                "restarted_runtime": restarted_runtime,
                "prompts": prompts,
                "skills": skills,
            }),
        }
    }

    /// Reconstruct a typed event from a stored (type, payload) pair.
    #[must_use]
    pub fn from_parts(event_type: &str, payload: Value) -> Self {
        match event_type {
            "runtime.status" => {
                let state = payload
                    .get("state")
                    .and_then(Value::as_str)
                    .and_then(|raw| raw.parse().ok());

                match state {
                    Some(state) => Self::RuntimeStatus {
                        state,
                        status: payload
                            .get("status")
                            .and_then(Value::as_str)
                            .map(ToString::to_string),
                    },
                    None => Self::Unknown {
                        event_type: event_type.to_string(),
                        payload,
                    },
                }
            }
            "runtime.error" => Self::RuntimeError {
                error: payload
                    .get("error")
                    .and_then(Value::as_str)
                    .map(ToString::to_string),
                message: text_field(&payload, &["message", "error"])
                    .unwrap_or_else(|| "runtime_error".to_string()),
            },
            "runtime.log" => Self::RuntimeLog { payload },
            "whatsapp.qr" => match text_field(&payload, &QR_FIELDS) {
                Some(qr) => Self::WhatsappQr { qr },
                None => Self::Unknown {
                    event_type: event_type.to_string(),
                    payload,
                },
            },
            "whatsapp.connected" => Self::WhatsappConnected,
            "whatsapp.disconnected" => Self::WhatsappDisconnected {
                reason: text_field(&payload, &["reason"]),
            },
            "google.connected" => Self::GoogleConnected {
                scopes: payload
                    .get("scopes")
                    .and_then(Value::as_array)
                    .map(|scopes| {
                        scopes
                            .iter()
                            .filter_map(Value::as_str)
                            .map(ToString::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "google.disconnected" => Self::GoogleDisconnected {
                reason: text_field(&payload, &["reason"]),
            },
            "google.error" => Self::GoogleError {
                message: text_field(&payload, &["message", "error"])
                    .unwrap_or_else(|| "google_error".to_string()),
            },
            "config.applied" => Self::ConfigApplied {
                revision: payload
                    .get("revision")
                    .or_else(|| payload.get("config_revision"))
                    .and_then(Value::as_i64),
                prompt: text_field(&payload, &["prompt"]),
                skill_id: text_field(&payload, &["skill_id"]),
            },
            _ => Self::Unknown {
                event_type: event_type.to_string(),
                payload,
            },
        }
    }

    /// The actual-state projection an event implies, if any.
    ///
    /// Mirrors the control plane's view of the runtime: connected means
    /// running, a dropped pairing returns to pending, errors stick until a
    /// restart.
    #[must_use]
    pub fn projected_state(&self) -> Option<(TenantState, Option<&str>)> {
        match self {
            Self::RuntimeStatus { state, .. } => Some((*state, None)),
            Self::RuntimeError { message, .. } => Some((TenantState::Error, Some(message))),
            Self::WhatsappConnected => Some((TenantState::Running, None)),
            Self::WhatsappDisconnected { .. } => Some((TenantState::PendingPairing, None)),
            _ => None,
        }
    }
}

fn text_field(payload: &Value, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        payload
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
            .map(ToString::to_string)
    })
}
