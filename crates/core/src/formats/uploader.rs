//! Per-format upload rules.
//!
//! Two protocols are in play: a PUT of the raw file to a path under
//! `/repository/{repo}/`, and a multipart POST to the components API where
//! the server derives coordinates from the package itself. Each format also
//! has its own set of success statuses.

use std::path::{Path, PathBuf};

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, Url};
use tracing::debug;

use super::paths::{relative_to_root, MavenCoordinates};
use super::RepoType;
use crate::errors::{TransferError, TransportError};
use crate::transport::{diagnostic_body, RequestBody, Transport, OCTET_STREAM};

const MAVEN_OK: &[u16] = &[200, 201, 204];
const RAW_OK: &[u16] = &[200, 201];
const NUGET_OK: &[u16] = &[201];
const COMPONENT_OK: &[u16] = &[204];

/// Which local files a format picks up during an import walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Any,
    Suffixes(&'static [&'static str]),
}

impl Eligibility {
    pub fn matches(&self, path: &Path) -> bool {
        match self {
            Self::Any => true,
            Self::Suffixes(suffixes) => {
                let name = path.to_string_lossy();
                suffixes.iter().any(|s| name.ends_with(s))
            }
        }
    }
}

/// Where and how a file is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadRoute {
    /// PUT to `group/artifact/version/file` derived from the local layout.
    MavenLayout,
    /// PUT to the path relative to the import root.
    RelativePath,
    /// PUT to the repository root; the server reads metadata from the package.
    RepositoryRoot,
    /// Multipart POST to the components API under the given field name.
    Component { field: &'static str },
}

/// Request derived for one file, before any I/O happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadPlan {
    Put {
        url: String,
    },
    Component {
        url: String,
        field: &'static str,
        file_name: String,
    },
}

impl UploadPlan {
    pub fn url(&self) -> &str {
        match self {
            Self::Put { url } | Self::Component { url, .. } => url,
        }
    }
}

/// Run-scoped values every upload needs.
#[derive(Clone)]
pub struct UploadContext {
    pub transport: Transport,
    pub base_url: String,
    pub repo_name: String,
    pub import_root: PathBuf,
}

/// Import behaviour of one repository type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uploader {
    repo_type: RepoType,
    eligibility: Eligibility,
    route: UploadRoute,
    accepted: &'static [u16],
}

impl Uploader {
    pub fn for_type(repo_type: RepoType) -> Self {
        use Eligibility::*;
        use UploadRoute::*;

        let (eligibility, route, accepted) = match repo_type {
            RepoType::Maven => (Suffixes(&[".jar", ".pom"]), MavenLayout, MAVEN_OK),
            RepoType::Npm => (
                Suffixes(&[".tgz"]),
                Component { field: "npm.asset" },
                COMPONENT_OK,
            ),
            RepoType::Raw => (Any, RelativePath, RAW_OK),
            RepoType::Pypi => (
                Suffixes(&[".whl", ".tar.gz"]),
                Component { field: "pypi.asset" },
                COMPONENT_OK,
            ),
            RepoType::Nuget => (Suffixes(&[".nupkg"]), RepositoryRoot, NUGET_OK),
            // Helm charts share the .tgz suffix with npm; the repository
            // type chosen by the user decides.
            RepoType::Helm => (
                Suffixes(&[".tgz"]),
                Component { field: "helm.asset" },
                COMPONENT_OK,
            ),
            RepoType::Yum => (
                Suffixes(&[".rpm"]),
                Component { field: "yum.asset" },
                COMPONENT_OK,
            ),
            RepoType::Apt => (
                Suffixes(&[".deb"]),
                Component { field: "apt.asset" },
                COMPONENT_OK,
            ),
        };

        Self {
            repo_type,
            eligibility,
            route,
            accepted,
        }
    }

    pub fn repo_type(&self) -> RepoType {
        self.repo_type
    }

    pub fn route(&self) -> UploadRoute {
        self.route
    }

    pub fn accepted_statuses(&self) -> &'static [u16] {
        self.accepted
    }

    pub fn is_eligible(&self, path: &Path) -> bool {
        self.eligibility.matches(path)
    }

    /// Derive the request for `file` without touching the file or network.
    pub fn plan(
        &self,
        base_url: &str,
        repo_name: &str,
        import_root: &Path,
        file: &Path,
    ) -> Result<UploadPlan, TransferError> {
        let relative = relative_to_root(import_root, file)?;

        let plan = match self.route {
            UploadRoute::MavenLayout => {
                let coords = MavenCoordinates::from_relative_path(&relative)?;
                let path = coords.repository_path();
                UploadPlan::Put {
                    url: repository_url(base_url, repo_name, path.split('/'))?,
                }
            }
            UploadRoute::RelativePath => UploadPlan::Put {
                url: repository_url(base_url, repo_name, relative.split('/'))?,
            },
            // Trailing slash is significant.
            UploadRoute::RepositoryRoot => UploadPlan::Put {
                url: repository_url(base_url, repo_name, [""])?,
            },
            UploadRoute::Component { field } => UploadPlan::Component {
                url: components_url(base_url, repo_name)?,
                field,
                file_name: relative.rsplit('/').next().unwrap_or(&relative).to_string(),
            },
        };
        Ok(plan)
    }

    /// Upload one file and check the response against this format's success
    /// statuses. The file is streamed, never held in memory whole.
    pub async fn upload(&self, ctx: &UploadContext, file: &Path) -> Result<(), TransferError> {
        let plan = self.plan(&ctx.base_url, &ctx.repo_name, &ctx.import_root, file)?;

        let io_err = |source: std::io::Error| TransferError::Io {
            path: file.to_path_buf(),
            source,
        };
        let handle = tokio::fs::File::open(file).await.map_err(io_err)?;
        let length = handle.metadata().await.map_err(io_err)?.len();

        let (method, url, body) = match plan {
            UploadPlan::Put { url } => (
                Method::PUT,
                url,
                RequestBody::Raw {
                    content_type: OCTET_STREAM,
                    body: Body::from(handle),
                },
            ),
            UploadPlan::Component {
                url,
                field,
                file_name,
            } => {
                let part = Part::stream_with_length(handle, length)
                    .file_name(file_name)
                    .mime_str(OCTET_STREAM)
                    .map_err(|source| TransportError::Request {
                        method: Method::POST.to_string(),
                        url: url.clone(),
                        source,
                    })?;
                (
                    Method::POST,
                    url,
                    RequestBody::Multipart(Form::new().part(field, part)),
                )
            }
        };

        let resp = ctx.transport.execute(method, &url, body).await?;
        let status = resp.status();
        if self.accepted.contains(&status.as_u16()) {
            debug!(path = %file.display(), bytes = length, status = %status, "uploaded");
            return Ok(());
        }

        Err(TransferError::UnexpectedStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: diagnostic_body(resp).await,
        })
    }
}

/// `base_url` with `segments` appended to its path, each one
/// percent-encoded so names containing `#`, `?` or `%` stay in the path.
fn url_with_segments<'a>(
    base_url: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, TransferError> {
    let invalid = |detail: String| {
        TransferError::Transport(TransportError::InvalidUrl {
            url: base_url.to_string(),
            detail,
        })
    };
    let mut url = Url::parse(base_url).map_err(|e| invalid(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("URL cannot carry a path".into()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `{base}/repository/{repo}/{segments...}`.
fn repository_url<'a>(
    base_url: &str,
    repo_name: &'a str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<String, TransferError> {
    let prefix = ["repository", repo_name];
    let url = url_with_segments(base_url, prefix.into_iter().chain(segments))?;
    Ok(url.to_string())
}

/// `{base}/service/rest/v1/components?repository={repo}`.
fn components_url(base_url: &str, repo_name: &str) -> Result<String, TransferError> {
    let mut url = url_with_segments(base_url, ["service", "rest", "v1", "components"])?;
    url.query_pairs_mut().append_pair("repository", repo_name);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://nexus.example.com";

    fn eligible(t: RepoType, name: &str) -> bool {
        Uploader::for_type(t).is_eligible(Path::new(name))
    }

    #[test]
    fn test_eligibility_table() {
        assert!(eligible(RepoType::Maven, "a.jar"));
        assert!(eligible(RepoType::Maven, "a.pom"));
        assert!(!eligible(RepoType::Maven, "a.jar.sha1"));
        assert!(!eligible(RepoType::Npm, "a.jar"));

        assert!(eligible(RepoType::Npm, "pkg-1.0.0.tgz"));
        assert!(!eligible(RepoType::Npm, "pkg-1.0.0.tar.gz"));

        assert!(eligible(RepoType::Raw, "anything"));
        assert!(eligible(RepoType::Raw, "dir/file.bin"));

        assert!(eligible(RepoType::Pypi, "pkg-1.0-py3-none-any.whl"));
        assert!(eligible(RepoType::Pypi, "pkg-1.0.tar.gz"));
        assert!(!eligible(RepoType::Pypi, "pkg-1.0.zip"));

        assert!(eligible(RepoType::Nuget, "Pkg.1.0.0.nupkg"));
        assert!(!eligible(RepoType::Nuget, "Pkg.1.0.0.snupkg.zip"));

        assert!(eligible(RepoType::Helm, "chart-0.1.0.tgz"));
        assert!(!eligible(RepoType::Helm, "chart-0.1.0.tar.gz"));

        assert!(eligible(RepoType::Yum, "pkg-1.0-1.x86_64.rpm"));
        assert!(!eligible(RepoType::Yum, "pkg_1.0_amd64.deb"));

        assert!(eligible(RepoType::Apt, "pkg_1.0_amd64.deb"));
        assert!(!eligible(RepoType::Apt, "pkg-1.0-1.x86_64.rpm"));
    }

    #[test]
    fn test_accepted_statuses() {
        let accepted = |t| Uploader::for_type(t).accepted_statuses();
        assert_eq!(accepted(RepoType::Maven), &[200, 201, 204]);
        assert_eq!(accepted(RepoType::Raw), &[200, 201]);
        assert_eq!(accepted(RepoType::Nuget), &[201]);
        for t in [
            RepoType::Npm,
            RepoType::Pypi,
            RepoType::Helm,
            RepoType::Yum,
            RepoType::Apt,
        ] {
            assert_eq!(accepted(t), &[204]);
        }
    }

    #[test]
    fn test_plan_maven() {
        let root = PathBuf::from("/import");
        let file = root.join("com/example/my-app/1.0/my-app-1.0.jar");
        let plan = Uploader::for_type(RepoType::Maven)
            .plan(BASE, "maven-releases", &root, &file)
            .unwrap();
        assert_eq!(
            plan,
            UploadPlan::Put {
                url: "https://nexus.example.com/repository/maven-releases/com/example/my-app/1.0/my-app-1.0.jar".into()
            }
        );
    }

    #[test]
    fn test_plan_maven_too_shallow() {
        let root = PathBuf::from("/import");
        let file = root.join("my-app/1.0/my-app-1.0.jar");
        let err = Uploader::for_type(RepoType::Maven)
            .plan(BASE, "maven-releases", &root, &file)
            .unwrap_err();
        assert!(matches!(err, TransferError::InvalidLayout { .. }));
    }

    #[test]
    fn test_plan_raw_and_nuget() {
        let root = PathBuf::from("/import");
        let plan = Uploader::for_type(RepoType::Raw)
            .plan(BASE, "files", &root, &root.join("docs/readme.txt"))
            .unwrap();
        assert_eq!(plan.url(), "https://nexus.example.com/repository/files/docs/readme.txt");

        let plan = Uploader::for_type(RepoType::Nuget)
            .plan(BASE, "nuget-hosted", &root, &root.join("a/Pkg.1.0.0.nupkg"))
            .unwrap();
        assert_eq!(plan.url(), "https://nexus.example.com/repository/nuget-hosted/");
    }

    #[test]
    fn test_plan_percent_encodes_segments() {
        let root = PathBuf::from("/import");
        let uploader = Uploader::for_type(RepoType::Raw);
        let cases = [
            ("notes#v2.txt", "notes%23v2.txt"),
            ("q?x.txt", "q%3Fx.txt"),
            ("100%.bin", "100%25.bin"),
            ("my docs/read me.txt", "my%20docs/read%20me.txt"),
        ];
        for (rel, encoded) in cases {
            let plan = uploader.plan(BASE, "files", &root, &root.join(rel)).unwrap();
            assert_eq!(
                plan.url(),
                format!("https://nexus.example.com/repository/files/{}", encoded),
                "{rel}"
            );
        }

        let plan = Uploader::for_type(RepoType::Maven)
            .plan(BASE, "releases", &root, &root.join("org/a b/app/1.0#rc/app.jar"))
            .unwrap();
        assert_eq!(
            plan.url(),
            "https://nexus.example.com/repository/releases/org/a%20b/app/1.0%23rc/app.jar"
        );
    }

    #[test]
    fn test_plan_keeps_base_path_prefix() {
        let root = PathBuf::from("/import");
        let plan = Uploader::for_type(RepoType::Raw)
            .plan("http://host/nexus", "files", &root, &root.join("a.txt"))
            .unwrap();
        assert_eq!(plan.url(), "http://host/nexus/repository/files/a.txt");

        let plan = Uploader::for_type(RepoType::Npm)
            .plan("http://host/nexus", "npm hosted", &root, &root.join("p-1.tgz"))
            .unwrap();
        assert_eq!(
            plan.url(),
            "http://host/nexus/service/rest/v1/components?repository=npm+hosted"
        );
    }

    #[test]
    fn test_plan_components() {
        let root = PathBuf::from("/import");
        let cases = [
            (RepoType::Npm, "npm.asset", "@s/p/p-1.tgz"),
            (RepoType::Pypi, "pypi.asset", "p/p-1.0.tar.gz"),
            (RepoType::Helm, "helm.asset", "chart-0.1.0.tgz"),
            (RepoType::Yum, "yum.asset", "el9/p-1.rpm"),
            (RepoType::Apt, "apt.asset", "pool/p_1_amd64.deb"),
        ];
        for (t, expected_field, rel) in cases {
            let plan = Uploader::for_type(t)
                .plan(BASE, "hosted", &root, &root.join(rel))
                .unwrap();
            match plan {
                UploadPlan::Component {
                    url,
                    field,
                    file_name,
                } => {
                    assert_eq!(
                        url,
                        "https://nexus.example.com/service/rest/v1/components?repository=hosted"
                    );
                    assert_eq!(field, expected_field);
                    assert_eq!(file_name, rel.rsplit('/').next().unwrap());
                }
                other => panic!("{t}: unexpected plan {other:?}"),
            }
        }
    }

    #[test]
    fn test_plan_outside_root_for_every_format() {
        let root = PathBuf::from("/import");
        for t in RepoType::ALL {
            let err = Uploader::for_type(t)
                .plan(BASE, "r", &root, Path::new("/elsewhere/x.tgz"))
                .unwrap_err();
            assert!(
                matches!(err, TransferError::OutsideImportRoot { .. }),
                "{t} should reject paths outside the root"
            );
        }
    }
}
