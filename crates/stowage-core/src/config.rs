//! Configuration module
//!
//! This module provides the configuration for the storage router, the
//! file-serving endpoint and the CLI. Values come from the process
//! environment (and a `.env` file when present).

use std::env;
use std::sync::Arc;

use crate::mode::{DeploymentMode, EnvironmentMode, FixedMode, ModeSelection, ModeSource};

// Common constants
const SERVER_PORT: u16 = 4000;
const LOCAL_STORAGE_PATH: &str = "storage/app";

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub server_port: u16,
    /// Explicit `STORAGE_MODE`; `None` derives the mode from `environment`.
    pub storage_mode: Option<ModeSelection>,
    // Local backend
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    // Remote backend
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // Custom endpoint for S3-compatible providers (MinIO, DigitalOcean Spaces, etc.)
    pub aws_region: Option<String>,
    /// Whether an upload may silently replace an existing local file.
    pub overwrite_existing: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = match lookup("PORT") {
            Some(port) => port
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let storage_mode = lookup("STORAGE_MODE")
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<ModeSelection>())
            .transpose()?;

        let local_storage_base_url = lookup("LOCAL_STORAGE_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}/storage", server_port));

        let overwrite_existing = match lookup("UPLOAD_OVERWRITE")
            .filter(|s| !s.trim().is_empty())
        {
            Some(value) => parse_flag("UPLOAD_OVERWRITE", &value)?,
            None => true,
        };

        Ok(Config {
            environment,
            server_port,
            storage_mode,
            local_storage_path: lookup("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|| LOCAL_STORAGE_PATH.to_string()),
            local_storage_base_url,
            s3_bucket: lookup("S3_BUCKET"),
            s3_region: lookup("S3_REGION"),
            s3_endpoint: lookup("S3_ENDPOINT"),
            aws_region: lookup("AWS_REGION"),
            overwrite_existing,
        })
    }

    /// Check if the application is running in a production-like environment
    pub fn is_production(&self) -> bool {
        DeploymentMode::from_environment(&self.environment).is_remote()
    }

    /// Mode at startup: the explicit `STORAGE_MODE`, or the one derived from the environment.
    pub fn deployment_mode(&self) -> DeploymentMode {
        match self.storage_mode {
            Some(ModeSelection::Fixed(mode)) => mode,
            Some(ModeSelection::FollowEnvironment) | None => {
                DeploymentMode::from_environment(&self.environment)
            }
        }
    }

    /// Mode source handed to the storage router.
    pub fn mode_source(&self) -> Arc<dyn ModeSource> {
        match self.storage_mode {
            Some(ModeSelection::FollowEnvironment) => Arc::new(EnvironmentMode),
            _ => Arc::new(FixedMode(self.deployment_mode())),
        }
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.s3_bucket.as_deref()
    }

    /// `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.s3_endpoint.as_deref()
    }

    pub fn remote_configured(&self) -> bool {
        self.s3_bucket.is_some()
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.local_storage_path.trim().is_empty() {
            return Err(anyhow::anyhow!("LOCAL_STORAGE_PATH must not be empty"));
        }

        if !self.local_storage_base_url.starts_with("http://")
            && !self.local_storage_base_url.starts_with("https://")
        {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_BASE_URL must be an http(s) URL"
            ));
        }

        // Remote mode needs a complete S3 configuration up front
        if self.deployment_mode().is_remote() || self.remote_configured() {
            if self.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET must be set when using the remote storage backend"
                ));
            }
            if self.s3_region().is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when using the remote storage backend"
                ));
            }
        }

        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, anyhow::Error> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!(
            "{} must be a boolean (true/false, 1/0, yes/no, on/off), got '{}'",
            name,
            other
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_local_development() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.environment, "development");
        assert_eq!(config.server_port, 4000);
        assert_eq!(config.local_storage_path, "storage/app");
        assert_eq!(
            config.local_storage_base_url,
            "http://localhost:4000/storage"
        );
        assert_eq!(config.deployment_mode(), DeploymentMode::Local);
        assert!(config.overwrite_existing);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn staging_selects_remote() {
        let config = config_from(&[("APP_ENV", "staging")]).unwrap();
        assert!(config.is_production());
        assert_eq!(config.deployment_mode(), DeploymentMode::Remote);
    }

    #[test]
    fn storage_mode_overrides_environment() {
        let config =
            config_from(&[("ENVIRONMENT", "production"), ("STORAGE_MODE", "local")]).unwrap();
        assert_eq!(config.deployment_mode(), DeploymentMode::Local);
        assert_eq!(
            config.mode_source().current_mode(),
            DeploymentMode::Local
        );
    }

    #[test]
    fn invalid_storage_mode_is_rejected() {
        assert!(config_from(&[("STORAGE_MODE", "nfs")]).is_err());
    }

    #[test]
    fn invalid_port_is_rejected() {
        assert!(config_from(&[("PORT", "eighty")]).is_err());
    }

    #[test]
    fn remote_mode_requires_bucket_and_region() {
        let config = config_from(&[("ENVIRONMENT", "production")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("ENVIRONMENT", "production"), ("S3_BUCKET", "uploads")])
            .unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[
            ("ENVIRONMENT", "production"),
            ("S3_BUCKET", "uploads"),
            ("AWS_REGION", "eu-west-1"),
        ])
        .unwrap();
        assert_eq!(config.s3_region(), Some("eu-west-1"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overwrite_flag_is_parsed() {
        let config = config_from(&[("UPLOAD_OVERWRITE", "False")]).unwrap();
        assert!(!config.overwrite_existing);

        for value in ["no", "0", "off", " NO "] {
            let config = config_from(&[("UPLOAD_OVERWRITE", value)]).unwrap();
            assert!(!config.overwrite_existing, "{value} should disable overwrite");
        }
        for value in ["yes", "1", "on", "TRUE"] {
            let config = config_from(&[("UPLOAD_OVERWRITE", value)]).unwrap();
            assert!(config.overwrite_existing, "{value} should enable overwrite");
        }
    }

    #[test]
    fn unrecognised_overwrite_flag_is_rejected() {
        for value in ["maybe", "2", "enabled"] {
            assert!(config_from(&[("UPLOAD_OVERWRITE", value)]).is_err());
        }
    }
}
