//! Container driver.
//!
//! Materialises per-tenant topologies on the local engine: one directory per
//! tenant holding the rendered compose file and env file, two named volumes
//! for session and state, one runtime container. All operations are
//! idempotent against the engine's observed state; nothing is derived from
//! in-memory caches.

mod engine;
mod layout;

pub(crate) use engine::Engine;
pub(crate) use layout::TenantLayout;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;
use trellis_app::domain::{configs::records::EnvMap, tenants::records::TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriverErrorKind {
    InvalidTenantId,
    InvalidArtifactName,
    TenantNotFound,
    ComposeMissing,
    EngineUnavailable,
    EngineFailed,
    Timeout,
    Io,
}

impl DriverErrorKind {
    /// Stable code surfaced over the wire.
    #[must_use]
    pub(crate) const fn code(self) -> &'static str {
        match self {
            Self::InvalidTenantId => "invalid_tenant_id",
            Self::InvalidArtifactName => "invalid_config_item",
            Self::TenantNotFound => "tenant_not_found",
            Self::ComposeMissing => "compose_missing",
            Self::EngineUnavailable => "docker_unavailable",
            Self::EngineFailed => "docker_command_failed",
            Self::Timeout => "engine_timeout",
            Self::Io => "io_error",
        }
    }
}

#[derive(Debug, Error)]
#[error("{}: {message}", kind.code())]
pub(crate) struct DriverError {
    pub kind: DriverErrorKind,
    pub message: String,
}

impl DriverError {
    pub(crate) fn new(kind: DriverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything the provision endpoint materialises.
#[derive(Debug, Clone)]
pub(crate) struct ProvisionSpec {
    pub nexus_image: Option<String>,
    pub runtime_env: EnvMap,
    pub bridge_shared_secret: String,
    pub prompts: Vec<(String, String)>,
    pub skills: Vec<(String, String)>,
}

/// The artifact set written on apply-config.
#[derive(Debug, Clone)]
pub(crate) struct ApplySpec {
    pub env: EnvMap,
    pub prompts: Vec<(String, String)>,
    pub skills: Vec<(String, String)>,
}

/// Per-tenant health as observed from the engine.
#[derive(Debug, Clone)]
pub(crate) struct TenantHealth {
    pub exists: bool,
    pub container_running: bool,
    pub status_text: String,
    pub engine_available: bool,
    pub engine_status: String,
}

#[automock]
#[async_trait]
pub(crate) trait RuntimeDriver: Send + Sync {
    async fn provision(&self, tenant: &TenantId, spec: ProvisionSpec) -> Result<(), DriverError>;

    /// Ensure the container runs, optionally re-rendering the compose file
    /// with an image override first.
    async fn start(&self, tenant: &TenantId, image: Option<String>) -> Result<(), DriverError>;

    async fn stop(&self, tenant: &TenantId) -> Result<(), DriverError>;

    async fn restart(&self, tenant: &TenantId, image: Option<String>) -> Result<(), DriverError>;

    /// Atomically rewrite env and artifact files, then restart.
    async fn apply_config(&self, tenant: &TenantId, spec: ApplySpec) -> Result<(), DriverError>;

    /// Fresh runtime in pending-pairing mode: stop, wipe the session volume,
    /// start. The discarded session forces the runtime to publish a new QR.
    async fn pair_start(&self, tenant: &TenantId, image: Option<String>)
    -> Result<(), DriverError>;

    /// Drop the pairing session and restart into pending-pairing.
    async fn whatsapp_disconnect(&self, tenant: &TenantId) -> Result<(), DriverError>;

    /// Remove the container, both volumes and the tenant directory.
    async fn delete(&self, tenant: &TenantId) -> Result<(), DriverError>;

    async fn health(&self, tenant: &TenantId) -> Result<TenantHealth, DriverError>;

    /// Tenants with a directory under the tenant root.
    async fn known_tenants(&self) -> Result<Vec<TenantId>, DriverError>;

    /// Tenants whose runtime container the engine reports as running.
    async fn list_running(&self) -> Result<Vec<TenantId>, DriverError>;

    /// Bridge ingress URL for a tenant's runtime.
    fn bridge_ws_url(&self, tenant: &TenantId) -> String;
}

/// Driver backed by `docker compose` on the local engine socket.
#[derive(Debug)]
pub(crate) struct ComposeDriver {
    layout: TenantLayout,
    engine: Engine,
    default_image: String,
}

impl ComposeDriver {
    #[must_use]
    pub(crate) fn new(layout: TenantLayout, engine: Engine, default_image: String) -> Self {
        Self {
            layout,
            engine,
            default_image,
        }
    }

    fn image_for(&self, image: Option<String>) -> String {
        image
            .filter(|image| !image.trim().is_empty())
            .unwrap_or_else(|| self.default_image.clone())
    }

    /// Defaults every runtime env starts from; values from the control plane
    /// win on conflict.
    fn default_runtime_env(&self, bridge_shared_secret: &str) -> EnvMap {
        let mut env: EnvMap = [
            ("NEXUS_CLI_ENABLED", "false"),
            ("NEXUS_CONFIG_DIR", "/data/config"),
            ("NEXUS_DATA_DIR", "/data/state"),
            ("NEXUS_PROMPTS_DIR", "/data/config/prompts"),
            ("NEXUS_SKILLS_DIR", "/data/config/skills"),
            ("NEXUS_BRIDGE_BIND_HOST", "0.0.0.0"),
            ("BRIDGE_HOST", "0.0.0.0"),
            ("BRIDGE_QR_MODE", "terminal"),
            ("BRIDGE_EXIT_ON_CONNECT", "0"),
            ("BRIDGE_SESSION_DIR", "/data/session"),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();

        env.insert(
            "BRIDGE_PORT".to_string(),
            self.layout.bridge_port().to_string(),
        );
        env.insert(
            "NEXUS_BRIDGE_WS_URL".to_string(),
            format!("ws://0.0.0.0:{}", self.layout.bridge_port()),
        );
        env.insert(
            "BRIDGE_SHARED_SECRET".to_string(),
            bridge_shared_secret.to_string(),
        );

        env
    }

    fn merged_env(&self, bridge_shared_secret: &str, overrides: &EnvMap) -> EnvMap {
        let mut env = self.default_runtime_env(bridge_shared_secret);

        env.extend(overrides.clone());

        env
    }
}

#[async_trait]
impl RuntimeDriver for ComposeDriver {
    async fn provision(&self, tenant: &TenantId, spec: ProvisionSpec) -> Result<(), DriverError> {
        self.layout.ensure_layout(tenant).await?;

        let image = self.image_for(spec.nexus_image);

        self.layout.write_compose(tenant, &image).await?;

        let env = self.merged_env(&spec.bridge_shared_secret, &spec.runtime_env);

        self.layout.write_runtime_env(tenant, &env).await?;
        self.layout
            .write_config_files(tenant, &env, &spec.prompts, &spec.skills)
            .await?;

        self.engine
            .compose_up(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn start(&self, tenant: &TenantId, image: Option<String>) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        if let Some(image) = image {
            self.layout
                .write_compose(tenant, &self.image_for(Some(image)))
                .await?;
        }

        self.engine
            .compose_up(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn stop(&self, tenant: &TenantId) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        self.engine
            .compose_stop(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn restart(&self, tenant: &TenantId, image: Option<String>) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        if let Some(image) = image {
            self.layout
                .write_compose(tenant, &self.image_for(Some(image)))
                .await?;
        }

        self.engine
            .compose_restart(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn apply_config(&self, tenant: &TenantId, spec: ApplySpec) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        // The control plane resends the bridge secret inside env; keep
        // whatever it sent and only fill defaults underneath.
        let secret = spec
            .env
            .get("BRIDGE_SHARED_SECRET")
            .cloned()
            .unwrap_or_default();

        let env = self.merged_env(&secret, &spec.env);

        self.layout.write_runtime_env(tenant, &env).await?;
        self.layout
            .write_config_files(tenant, &env, &spec.prompts, &spec.skills)
            .await?;

        self.engine
            .compose_restart(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn pair_start(
        &self,
        tenant: &TenantId,
        image: Option<String>,
    ) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        if let Some(image) = image {
            self.layout
                .write_compose(tenant, &self.image_for(Some(image)))
                .await?;
        }

        let compose = self.layout.compose_file(tenant)?;

        // A fresh QR requires a fresh session: stop, wipe, start.
        self.engine.compose_stop(&compose).await?;
        self.engine
            .clear_volume(&self.layout.session_volume(tenant))
            .await?;
        self.engine.compose_up(&compose).await?;

        Ok(())
    }

    async fn whatsapp_disconnect(&self, tenant: &TenantId) -> Result<(), DriverError> {
        self.layout.require_provisioned(tenant).await?;

        self.engine
            .clear_volume(&self.layout.session_volume(tenant))
            .await?;
        self.engine
            .compose_restart(&self.layout.compose_file(tenant)?)
            .await?;

        Ok(())
    }

    async fn delete(&self, tenant: &TenantId) -> Result<(), DriverError> {
        if self.layout.is_provisioned(tenant).await? {
            self.engine
                .compose_down(&self.layout.compose_file(tenant)?, true)
                .await?;
        }

        self.layout.delete_tenant_files(tenant).await?;

        Ok(())
    }

    async fn health(&self, tenant: &TenantId) -> Result<TenantHealth, DriverError> {
        let exists = self.layout.is_provisioned(tenant).await?;

        let status = self
            .engine
            .container_status(&self.layout.container_name(tenant))
            .await?;

        let (engine_available, engine_status) = match self.engine.server_version().await {
            Ok(version) => (true, version),
            Err(error) => (false, error.to_string()),
        };

        Ok(TenantHealth {
            exists,
            container_running: status.is_some(),
            status_text: status.unwrap_or_else(|| "not running".to_string()),
            engine_available,
            engine_status,
        })
    }

    async fn known_tenants(&self) -> Result<Vec<TenantId>, DriverError> {
        self.layout.known_tenants().await
    }

    async fn list_running(&self) -> Result<Vec<TenantId>, DriverError> {
        let names = self.engine.running_container_names().await?;

        let mut tenants: Vec<TenantId> = names
            .iter()
            .filter_map(|name| TenantLayout::tenant_from_container_name(name))
            .collect();

        tenants.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        tenants.dedup();

        Ok(tenants)
    }

    fn bridge_ws_url(&self, tenant: &TenantId) -> String {
        format!(
            "ws://{}:{}",
            self.layout.container_name(tenant),
            self.layout.bridge_port()
        )
    }
}
