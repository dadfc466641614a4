//! Per-tenant filesystem layout.
//!
//! ```text
//! <root>/<tenant_id>/
//!   docker-compose.yml
//!   env/runtime.env
//!   config/env.json
//!   config/prompts/<name>.md
//!   config/skills/<skill_id>.md
//! ```
//!
//! The env file, session volume and state volume are owned exclusively by
//! the runner; no other component reads or writes them.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use trellis_app::domain::{configs::records::EnvMap, tenants::records::TenantId};

use super::{DriverError, DriverErrorKind};

/// Compose topology template; placeholders are substituted per tenant.
const COMPOSE_TEMPLATE: &str = include_str!("templates/tenant-compose.yml");

static ARTIFACT_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,127}$").expect("pattern is valid"));

static CONTAINER_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^tenant_([a-z0-9][a-z0-9_-]{2,63})_runtime$").expect("pattern is valid"));

#[derive(Debug, Clone)]
pub(crate) struct TenantLayout {
    root: PathBuf,
    bridge_port: u16,
    network: String,
}

impl TenantLayout {
    #[must_use]
    pub(crate) fn new(root: PathBuf, bridge_port: u16, network: String) -> Self {
        Self {
            root,
            bridge_port,
            network,
        }
    }

    #[must_use]
    pub(crate) fn bridge_port(&self) -> u16 {
        self.bridge_port
    }

    #[must_use]
    pub(crate) fn container_name(&self, tenant: &TenantId) -> String {
        format!("tenant_{tenant}_runtime")
    }

    #[must_use]
    pub(crate) fn session_volume(&self, tenant: &TenantId) -> String {
        format!("tenant_{tenant}_session")
    }

    /// Recover the tenant id from an engine-reported container name.
    pub(crate) fn tenant_from_container_name(name: &str) -> Option<TenantId> {
        CONTAINER_NAME_RE
            .captures(name.trim())
            .and_then(|captures| TenantId::parse(&captures[1]).ok())
    }

    /// The tenant's directory. The resolved path must stay under the root;
    /// `TenantId` validation makes traversal impossible, this guards against
    /// regressions.
    pub(crate) fn tenant_dir(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        let dir = self.root.join(tenant.as_str());

        if !dir.starts_with(&self.root) {
            return Err(DriverError::new(
                DriverErrorKind::InvalidTenantId,
                format!("tenant path escaped root: {}", dir.display()),
            ));
        }

        Ok(dir)
    }

    pub(crate) fn compose_file(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.tenant_dir(tenant)?.join("docker-compose.yml"))
    }

    fn env_dir(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.tenant_dir(tenant)?.join("env"))
    }

    fn config_dir(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.tenant_dir(tenant)?.join("config"))
    }

    fn prompts_dir(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.config_dir(tenant)?.join("prompts"))
    }

    fn skills_dir(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.config_dir(tenant)?.join("skills"))
    }

    fn runtime_env_file(&self, tenant: &TenantId) -> Result<PathBuf, DriverError> {
        Ok(self.env_dir(tenant)?.join("runtime.env"))
    }

    pub(crate) async fn ensure_layout(&self, tenant: &TenantId) -> Result<(), DriverError> {
        for dir in [
            self.env_dir(tenant)?,
            self.prompts_dir(tenant)?,
            self.skills_dir(tenant)?,
        ] {
            fs::create_dir_all(&dir).await.map_err(io_error)?;
        }

        Ok(())
    }

    pub(crate) async fn is_provisioned(&self, tenant: &TenantId) -> Result<bool, DriverError> {
        Ok(fs::try_exists(self.compose_file(tenant)?)
            .await
            .map_err(io_error)?)
    }

    pub(crate) async fn require_provisioned(&self, tenant: &TenantId) -> Result<(), DriverError> {
        let dir = self.tenant_dir(tenant)?;

        if !fs::try_exists(&dir).await.map_err(io_error)? {
            return Err(DriverError::new(
                DriverErrorKind::TenantNotFound,
                format!("tenant directory not found: {}", dir.display()),
            ));
        }

        if !self.is_provisioned(tenant).await? {
            return Err(DriverError::new(
                DriverErrorKind::ComposeMissing,
                format!("compose file not found for tenant {tenant}"),
            ));
        }

        Ok(())
    }

    /// Render and write the compose file for the given image.
    pub(crate) async fn write_compose(
        &self,
        tenant: &TenantId,
        image: &str,
    ) -> Result<PathBuf, DriverError> {
        self.ensure_layout(tenant).await?;

        let rendered = render_template(
            COMPOSE_TEMPLATE,
            &[
                ("TENANT_ID", tenant.as_str()),
                ("NEXUS_IMAGE", image),
                ("BRIDGE_PORT", &self.bridge_port.to_string()),
                ("TENANT_NETWORK", &self.network),
            ],
        );

        let path = self.compose_file(tenant)?;

        fs::write(&path, rendered).await.map_err(io_error)?;

        Ok(path)
    }

    /// Write the env file, sorted, with newlines escaped so values stay on
    /// one line.
    pub(crate) async fn write_runtime_env(
        &self,
        tenant: &TenantId,
        env: &EnvMap,
    ) -> Result<PathBuf, DriverError> {
        self.ensure_layout(tenant).await?;

        let mut rendered = String::new();

        for (key, value) in env {
            rendered.push_str(key);
            rendered.push('=');
            rendered.push_str(&value.replace('\n', "\\n"));
            rendered.push('\n');
        }

        let path = self.runtime_env_file(tenant)?;

        fs::write(&path, rendered).await.map_err(io_error)?;

        Ok(path)
    }

    /// Materialise `env.json` plus one markdown file per prompt and skill,
    /// removing files whose artifact no longer exists.
    pub(crate) async fn write_config_files(
        &self,
        tenant: &TenantId,
        env: &EnvMap,
        prompts: &[(String, String)],
        skills: &[(String, String)],
    ) -> Result<(), DriverError> {
        self.ensure_layout(tenant).await?;

        let env_json = serde_json::to_string_pretty(env)
            .map_err(|source| DriverError::new(DriverErrorKind::Io, source.to_string()))?;

        fs::write(self.config_dir(tenant)?.join("env.json"), env_json)
            .await
            .map_err(io_error)?;

        write_artifacts(self.prompts_dir(tenant)?, prompts, "prompt").await?;
        write_artifacts(self.skills_dir(tenant)?, skills, "skill").await?;

        Ok(())
    }

    pub(crate) async fn delete_tenant_files(&self, tenant: &TenantId) -> Result<(), DriverError> {
        let dir = self.tenant_dir(tenant)?;

        if !fs::try_exists(&dir).await.map_err(io_error)? {
            return Ok(());
        }

        fs::remove_dir_all(&dir).await.map_err(io_error)?;

        Ok(())
    }
}

/// Write one markdown file per artifact, removing files whose artifact no
/// longer exists.
async fn write_artifacts(
    dir: PathBuf,
    artifacts: &[(String, String)],
    field: &str,
) -> Result<(), DriverError> {
    let mut expected = Vec::with_capacity(artifacts.len());

    for (name, content) in artifacts {
        if !ARTIFACT_NAME_RE.is_match(name) {
            return Err(DriverError::new(
                DriverErrorKind::InvalidArtifactName,
                format!("invalid {field} identifier: {name:?}"),
            ));
        }

        let file = format!("{name}.md");

        fs::write(dir.join(&file), content).await.map_err(io_error)?;

        expected.push(file);
    }

    let mut entries = fs::read_dir(&dir).await.map_err(io_error)?;

    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        if name.ends_with(".md") && !expected.iter().any(|kept| kept == name) {
            let _ = fs::remove_file(entry.path()).await;
        }
    }

    Ok(())
}

impl TenantLayout {
    /// Tenants with a directory under the root.
    pub(crate) async fn known_tenants(&self) -> Result<Vec<TenantId>, DriverError> {
        if !fs::try_exists(&self.root).await.map_err(io_error)? {
            return Ok(vec![]);
        }

        let mut tenants = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(io_error)?;

        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            if !entry.file_type().await.map_err(io_error)?.is_dir() {
                continue;
            }

            if let Some(name) = entry.file_name().to_str()
                && let Ok(tenant) = TenantId::parse(name)
            {
                tenants.push(tenant);
            }
        }

        tenants.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        Ok(tenants)
    }
}

fn render_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();

    for (key, value) in values {
        rendered = rendered.replace(&format!("${{{key}}}"), value);
    }

    rendered
}

fn io_error(source: std::io::Error) -> DriverError {
    DriverError::new(DriverErrorKind::Io, source.to_string())
}
