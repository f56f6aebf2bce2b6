//! Remote-to-local path mapping for exported assets.

/// How an asset's remote path becomes a path under the export root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exporter {
    /// Use the remote path verbatim.
    Identity,
    /// npm tarballs live under `<pkg>/-/<file>` remotely; the `-` segment is
    /// dropped so the exported tree can be imported again.
    Npm,
}

impl Exporter {
    pub fn local_path(&self, asset_path: &str) -> String {
        match self {
            Self::Identity => asset_path.to_string(),
            Self::Npm => asset_path.replacen("/-/", "/", 1),
        }
    }
}
