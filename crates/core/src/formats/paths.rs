//! Local-path to repository-path derivation.

use std::path::{Component, Path};

use crate::errors::TransferError;

/// Path of `file` relative to `root`, with `/` separators on every platform.
///
/// Fails when `file` is not strictly below `root`.
pub fn relative_to_root(root: &Path, file: &Path) -> Result<String, TransferError> {
    let outside = || TransferError::OutsideImportRoot {
        path: file.to_path_buf(),
        root: root.to_path_buf(),
    };

    let rest = file.strip_prefix(root).map_err(|_| outside())?;
    let mut segments = Vec::new();
    for component in rest.components() {
        match component {
            Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(outside()),
        }
    }
    if segments.is_empty() {
        return Err(outside());
    }
    Ok(segments.join("/"))
}

/// Maven coordinates derived from a `group/.../artifact/version/file` path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MavenCoordinates {
    /// Group id as a path, e.g. `com/example`.
    pub group_path: String,
    pub artifact_id: String,
    pub version: String,
    pub file_name: String,
}

impl MavenCoordinates {
    /// Split a root-relative path. At least four segments are needed: one or
    /// more for the group, then artifact, version and file name.
    pub fn from_relative_path(relative: &str) -> Result<Self, TransferError> {
        let parts: Vec<&str> = relative.split('/').collect();
        if parts.len() < 4 {
            return Err(TransferError::InvalidLayout {
                format: "maven".into(),
                path: relative.to_string(),
                detail: format!(
                    "expected group/artifact/version/file, found {} segment(s)",
                    parts.len()
                ),
            });
        }

        let n = parts.len();
        Ok(Self {
            group_path: parts[..n - 3].join("/"),
            artifact_id: parts[n - 3].to_string(),
            version: parts[n - 2].to_string(),
            file_name: parts[n - 1].to_string(),
        })
    }

    /// Dotted group id, e.g. `com.example`.
    pub fn group_id(&self) -> String {
        self.group_path.replace('/', ".")
    }

    /// Path of the artifact inside a maven2 repository.
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_path, self.artifact_id, self.version, self.file_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_relative_to_root() {
        let root = PathBuf::from("/import");
        let file = root.join("com").join("example").join("a.jar");
        assert_eq!(relative_to_root(&root, &file).unwrap(), "com/example/a.jar");
    }

    #[test]
    fn test_relative_to_root_rejects_outside_paths() {
        let root = PathBuf::from("/import");
        for file in ["/other/a.jar", "/import2/a.jar", "/import"] {
            let err = relative_to_root(&root, Path::new(file)).unwrap_err();
            assert!(
                matches!(err, TransferError::OutsideImportRoot { .. }),
                "{file} should be outside"
            );
        }
    }

    #[test]
    fn test_relative_to_root_rejects_parent_escape() {
        let root = PathBuf::from("/import");
        let err = relative_to_root(&root, Path::new("/import/../etc/passwd")).unwrap_err();
        assert!(matches!(err, TransferError::OutsideImportRoot { .. }));
    }

    #[test]
    fn test_maven_coordinates() {
        let coords =
            MavenCoordinates::from_relative_path("com/example/my-app/1.0/my-app-1.0.jar").unwrap();
        assert_eq!(coords.group_path, "com/example");
        assert_eq!(coords.group_id(), "com.example");
        assert_eq!(coords.artifact_id, "my-app");
        assert_eq!(coords.version, "1.0");
        assert_eq!(coords.file_name, "my-app-1.0.jar");
        assert_eq!(
            coords.repository_path(),
            "com/example/my-app/1.0/my-app-1.0.jar"
        );
    }

    #[test]
    fn test_maven_single_segment_group() {
        let coords =
            MavenCoordinates::from_relative_path("junit/junit/4.13/junit-4.13.pom").unwrap();
        assert_eq!(coords.group_path, "junit");
        assert_eq!(coords.artifact_id, "junit");
    }

    #[test]
    fn test_maven_too_few_segments() {
        let err = MavenCoordinates::from_relative_path("my-app/1.0/my-app-1.0.jar").unwrap_err();
        match err {
            TransferError::InvalidLayout { format, path, .. } => {
                assert_eq!(format, "maven");
                assert_eq!(path, "my-app/1.0/my-app-1.0.jar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
