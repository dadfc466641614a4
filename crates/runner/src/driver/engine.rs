//! Container engine access.
//!
//! Shells out to the `docker` CLI. Every invocation runs under the outer
//! engine deadline; on expiry the operation is aborted and the caller sees a
//! timeout, leaving the tenant recoverable via restart.

use std::{path::Path, time::Duration};

use tokio::{process::Command, time::timeout};
use tracing::debug;

use super::{DriverError, DriverErrorKind};

#[derive(Debug, Clone)]
pub(crate) struct Engine {
    docker_bin: String,
    deadline: Duration,
}

impl Engine {
    #[must_use]
    pub(crate) fn new(docker_bin: String, deadline: Duration) -> Self {
        Self {
            docker_bin,
            deadline,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, DriverError> {
        debug!(command = %format!("{} {}", self.docker_bin, args.join(" ")), "engine call");

        let result = timeout(
            self.deadline,
            Command::new(&self.docker_bin).args(args).output(),
        )
        .await
        .map_err(|_| {
            DriverError::new(
                DriverErrorKind::Timeout,
                format!("engine call exceeded {:?}: {args:?}", self.deadline),
            )
        })?;

        let output = result.map_err(|source| {
            DriverError::new(
                DriverErrorKind::EngineUnavailable,
                format!("failed to execute engine binary: {source}"),
            )
        })?;

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
        .trim()
        .to_string();

        if !output.status.success() {
            return Err(DriverError::new(
                DriverErrorKind::EngineFailed,
                format!("command failed args={args:?} output={combined}"),
            ));
        }

        Ok(combined)
    }

    pub(crate) async fn server_version(&self) -> Result<String, DriverError> {
        self.run(&["info", "--format", "{{.ServerVersion}}"]).await
    }

    pub(crate) async fn compose_up(&self, compose_file: &Path) -> Result<(), DriverError> {
        self.run(&[
            "compose",
            "-f",
            &compose_file.display().to_string(),
            "up",
            "-d",
        ])
        .await
        .map(|_| ())
    }

    pub(crate) async fn compose_stop(&self, compose_file: &Path) -> Result<(), DriverError> {
        self.run(&["compose", "-f", &compose_file.display().to_string(), "stop"])
            .await
            .map(|_| ())
    }

    pub(crate) async fn compose_restart(&self, compose_file: &Path) -> Result<(), DriverError> {
        self.run(&[
            "compose",
            "-f",
            &compose_file.display().to_string(),
            "restart",
        ])
        .await
        .map(|_| ())
    }

    pub(crate) async fn compose_down(
        &self,
        compose_file: &Path,
        remove_volumes: bool,
    ) -> Result<(), DriverError> {
        let file = compose_file.display().to_string();
        let mut args = vec!["compose", "-f", file.as_str(), "down"];

        if remove_volumes {
            args.push("-v");
        }

        self.run(&args).await.map(|_| ())
    }

    /// Engine-reported status line for a container, `None` when not running.
    pub(crate) async fn container_status(
        &self,
        container_name: &str,
    ) -> Result<Option<String>, DriverError> {
        let filter = format!("name={container_name}");

        let output = self
            .run(&["ps", "--filter", &filter, "--format", "{{.Status}}"])
            .await?;

        if output.is_empty() {
            Ok(None)
        } else {
            Ok(Some(output))
        }
    }

    pub(crate) async fn running_container_names(&self) -> Result<Vec<String>, DriverError> {
        let output = self.run(&["ps", "--format", "{{.Names}}"]).await?;

        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    /// Wipe a named volume through a disposable container; the volume itself
    /// is retained.
    pub(crate) async fn clear_volume(&self, volume: &str) -> Result<(), DriverError> {
        let mount = format!("{volume}:/wipe");

        self.run(&[
            "run",
            "--rm",
            "-v",
            &mount,
            "busybox",
            "sh",
            "-c",
            "rm -rf /wipe/* /wipe/.[!.]*",
        ])
        .await
        .map(|_| ())
    }
}
