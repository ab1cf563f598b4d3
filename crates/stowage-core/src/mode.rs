use std::env;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Environment names that route uploads to the remote backend.
/// "staging" is included because it behaves like production for storage.
pub const REMOTE_ENVIRONMENTS: &[&str] = &["production", "prod", "staging"];

/// Deployment mode
///
/// Selects which backend receives uploads, resolves URLs and handles deletes.
/// It's defined in core because it's used by configuration and by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Local,
    Remote,
}

impl DeploymentMode {
    /// Map an environment name (e.g. `APP_ENV`) to a mode.
    pub fn from_environment(environment: &str) -> Self {
        let environment = environment.trim().to_lowercase();
        if REMOTE_ENVIRONMENTS.contains(&environment.as_str()) {
            DeploymentMode::Remote
        } else {
            DeploymentMode::Local
        }
    }

    pub fn is_remote(self) -> bool {
        self == DeploymentMode::Remote
    }
}

impl FromStr for DeploymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(DeploymentMode::Local),
            "remote" | "s3" => Ok(DeploymentMode::Remote),
            _ => Err(anyhow::anyhow!("Invalid deployment mode: {}", s)),
        }
    }
}

impl Display for DeploymentMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeploymentMode::Local => write!(f, "local"),
            DeploymentMode::Remote => write!(f, "remote"),
        }
    }
}

/// Source of the deployment mode, consulted on every storage operation.
pub trait ModeSource: Send + Sync {
    fn current_mode(&self) -> DeploymentMode;
}

/// A mode fixed when the router is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMode(pub DeploymentMode);

impl ModeSource for FixedMode {
    fn current_mode(&self) -> DeploymentMode {
        self.0
    }
}

/// Re-reads `ENVIRONMENT` (or `APP_ENV`) from the process environment on every call.
///
/// A change to the environment between an upload and a later URL lookup is not
/// compensated for: the lookup goes to whichever backend is current at that time.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentMode;

impl ModeSource for EnvironmentMode {
    fn current_mode(&self) -> DeploymentMode {
        env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .map(|environment| DeploymentMode::from_environment(&environment))
            .unwrap_or(DeploymentMode::Local)
    }
}

/// How the mode is chosen, as configured by `STORAGE_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeSelection {
    Fixed(DeploymentMode),
    FollowEnvironment,
}

impl FromStr for ModeSelection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "environment" | "env" => Ok(ModeSelection::FollowEnvironment),
            other => other.parse().map(ModeSelection::Fixed),
        }
    }
}
