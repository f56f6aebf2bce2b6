//! Run configuration and the optional TOML profile file.
//!
//! A [`RunConfig`] is assembled once per run (by the CLI, from flags,
//! environment and profile) and then shared read-only by every worker.
//!
//! Secrets are never written into a profile. Instead the profile names an
//! environment variable via `password_env`, resolved at runtime with
//! [`Profile::resolve_env_vars`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

/// Number of concurrent workers when nothing else is configured.
pub const DEFAULT_WORKERS: usize = 10;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// HTTP Basic credentials for the repository manager.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials only when both parts are non-empty; anything else
    /// means an unauthenticated run.
    pub fn from_parts(username: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self {
                username: u.to_string(),
                password: p.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Run config
// ---------------------------------------------------------------------------

/// Read-only configuration for one export or import run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Repository manager base URL, without trailing slash.
    pub base_url: String,

    /// Name of the remote repository.
    pub repo_name: String,

    /// Raw repository-type tag as supplied by the user.
    pub repo_type: String,

    /// Optional Basic credentials.
    pub credentials: Option<Credentials>,

    /// Root of the local tree to upload (import only).
    pub import_dir: Option<PathBuf>,

    /// Where exported assets land. Defaults to the repository name.
    pub export_dir: Option<PathBuf>,

    /// Enumerate and count, but transfer nothing.
    pub dry_run: bool,

    /// Number of concurrent workers.
    pub workers: usize,
}

impl RunConfig {
    /// Create a config with defaults for everything but the three required
    /// values.
    pub fn new(
        base_url: impl Into<String>,
        repo_name: impl Into<String>,
        repo_type: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            repo_name: repo_name.into(),
            repo_type: repo_type.into(),
            credentials: None,
            import_dir: None,
            export_dir: None,
            dry_run: false,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_import_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.import_dir = Some(dir.into());
        self
    }

    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Directory that receives exported assets.
    pub fn export_root(&self) -> PathBuf {
        self.export_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(&self.repo_name))
    }

    /// Validate the values every run needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingValue("repo-url".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "repo-url".into(),
                detail: format!("'{}' is not an http(s) URL", self.base_url),
            });
        }
        if self.repo_name.is_empty() {
            return Err(ConfigError::MissingValue("repo-name".into()));
        }
        if self.repo_type.is_empty() {
            return Err(ConfigError::MissingValue("repo-type".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                field: "workers".into(),
                detail: "worker count must be > 0".into(),
            });
        }
        debug!(
            base_url = %self.base_url,
            repository = %self.repo_name,
            repo_type = %self.repo_type,
            workers = self.workers,
            dry_run = self.dry_run,
            authenticated = self.credentials.is_some(),
            "run configuration validated"
        );
        Ok(())
    }

    /// The import root, which an import run cannot do without.
    pub fn require_import_dir(&self) -> Result<&Path, ConfigError> {
        self.import_dir
            .as_deref()
            .ok_or_else(|| ConfigError::MissingValue("import-dir".into()))
    }
}

// ---------------------------------------------------------------------------
// Profile file
// ---------------------------------------------------------------------------

/// Optional TOML profile supplying defaults for CLI flags.
///
/// ```toml
/// [repository]
/// url = "https://nexus.example.com"
/// name = "maven-releases"
/// type = "maven"
/// username = "deployer"
/// password_env = "NEXUS_PASSWORD"
///
/// [transfer]
/// workers = 16
/// export_dir = "/srv/mirror/maven-releases"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub repository: RepositorySection,

    #[serde(default)]
    pub transfer: TransferSection,
}

/// Remote repository settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySection {
    pub url: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub repo_type: Option<String>,
    pub username: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

/// Transfer behaviour settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferSection {
    pub workers: Option<usize>,
    pub export_dir: Option<PathBuf>,
}

impl Profile {
    /// Load a profile from a TOML file on disk.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let profile = Self::parse(&content)?;
        info!(path = %path.display(), "loaded profile");
        Ok(profile)
    }

    /// Parse a profile from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Resolve `password_env` into `password`.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if let Some(var) = self.repository.password_env.as_deref() {
            let value = std::env::var(var).map_err(|_| ConfigError::EnvVarMissing {
                var: var.to_string(),
                field: "repository.password_env".into(),
            })?;
            debug!(var, "resolved password from environment");
            self.repository.password = Some(value);
        }
        Ok(())
    }
}
