//! Package-format adapters.
//!
//! Each supported repository type maps to a fixed pair of behaviours:
//!
//! | Type  | Export mapping      | Import eligibility | Upload route              |
//! |-------|---------------------|--------------------|---------------------------|
//! | maven | identity            | `.jar`, `.pom`     | PUT group/artifact/version |
//! | npm   | collapse first `/-/`| `.tgz`             | component `npm.asset`     |
//! | raw   | identity            | any file           | PUT relative path         |
//! | pypi  | identity            | `.whl`, `.tar.gz`  | component `pypi.asset`    |
//! | nuget | identity            | `.nupkg`           | PUT repository root       |
//! | helm  | identity            | `.tgz`             | component `helm.asset`    |
//! | yum   | identity            | `.rpm`             | component `yum.asset`     |
//! | apt   | identity            | `.deb`             | component `apt.asset`     |
//!
//! The [`FormatRegistry`] is populated once at construction and passed into
//! the orchestrators; adapters are stateless `Copy` values shared freely
//! across workers.

pub mod exporter;
pub mod paths;
pub mod uploader;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::ConfigError;

pub use exporter::Exporter;
pub use paths::{relative_to_root, MavenCoordinates};
pub use uploader::{Eligibility, UploadContext, UploadPlan, UploadRoute, Uploader};

// ---------------------------------------------------------------------------
// Repository type
// ---------------------------------------------------------------------------

/// Package ecosystem of a remote repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoType {
    Maven,
    Npm,
    Raw,
    Pypi,
    Nuget,
    Helm,
    Yum,
    Apt,
}

impl RepoType {
    pub const ALL: [RepoType; 8] = [
        Self::Maven,
        Self::Npm,
        Self::Raw,
        Self::Pypi,
        Self::Nuget,
        Self::Helm,
        Self::Yum,
        Self::Apt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Maven => "maven",
            Self::Npm => "npm",
            Self::Raw => "raw",
            Self::Pypi => "pypi",
            Self::Nuget => "nuget",
            Self::Helm => "helm",
            Self::Yum => "yum",
            Self::Apt => "apt",
        }
    }

    fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ConfigError::UnsupportedRepoType {
                tag: s.to_string(),
                supported: Self::supported_list(),
            })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Lookup from repository-type tag to export mapping and uploader.
#[derive(Debug, Clone)]
pub struct FormatRegistry {
    exporters: HashMap<RepoType, Exporter>,
    uploaders: HashMap<RepoType, Uploader>,
}

impl FormatRegistry {
    /// Registry with every built-in format.
    pub fn standard() -> Self {
        let exporters = HashMap::from([(RepoType::Npm, Exporter::Npm)]);
        let uploaders = RepoType::ALL
            .iter()
            .map(|&t| (t, Uploader::for_type(t)))
            .collect();
        Self {
            exporters,
            uploaders,
        }
    }

    /// Export mapping for `tag`. Unknown tags fall back to the identity
    /// mapping instead of failing.
    pub fn exporter_for(&self, tag: &str) -> Exporter {
        match tag.parse::<RepoType>() {
            Ok(repo_type) => self
                .exporters
                .get(&repo_type)
                .copied()
                .unwrap_or(Exporter::Identity),
            Err(_) => {
                warn!(
                    repo_type = tag,
                    "unrecognized repository type, exporting with identity path mapping"
                );
                Exporter::Identity
            }
        }
    }

    /// Uploader for `tag`. Unknown tags are a configuration error.
    pub fn uploader_for(&self, tag: &str) -> Result<Uploader, ConfigError> {
        let repo_type: RepoType = tag.parse()?;
        self.uploaders
            .get(&repo_type)
            .copied()
            .ok_or_else(|| ConfigError::UnsupportedRepoType {
                tag: tag.to_string(),
                supported: RepoType::supported_list(),
            })
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
