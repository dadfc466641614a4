//! Tenant Runtime Image Config

use clap::Args;

/// Markers that indicate the image reference was never configured.
const IMAGE_PLACEHOLDERS: [&str; 3] = ["replace_with", "your-org", "<org>"];

/// Tenant runtime image settings.
#[derive(Debug, Args)]
pub struct RuntimeImageConfig {
    /// Runtime image reference used for tenant containers
    #[arg(long, env = "NEXUS_IMAGE", default_value = "")]
    pub nexus_image: String,
}

impl RuntimeImageConfig {
    /// The configured image, or `None` while it is blank or a placeholder.
    #[must_use]
    pub fn valid_image(&self) -> Option<String> {
        let image = self.nexus_image.trim();

        if image.is_empty() {
            return None;
        }

        let lowered = image.to_lowercase();

        if IMAGE_PLACEHOLDERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            return None;
        }

        Some(image.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(image: &str) -> RuntimeImageConfig {
        RuntimeImageConfig {
            nexus_image: image.to_string(),
        }
    }

    #[test]
    fn placeholder_tags_are_invalid() {
        assert!(config("").valid_image().is_none());
        assert!(
            config("ghcr.io/your-org/nexus-runtime:sha-REPLACE_WITH_COMMIT")
                .valid_image()
                .is_none()
        );
    }

    #[test]
    fn real_tags_pass() {
        assert_eq!(
            config("ghcr.io/trellis/nexus-runtime:sha-abc123").valid_image(),
            Some("ghcr.io/trellis/nexus-runtime:sha-abc123".to_string())
        );
    }
}
