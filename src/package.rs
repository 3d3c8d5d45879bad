//! Store packages and the names they are published under.

use std::path::{Path, PathBuf};

use crate::version::PackageVersion;

/// An MSIX package listed by the store, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsixPackage {
    /// Store identifier, e.g. `App_1.2.3.0_x64__8wekyb3d8bbwe`
    pub moniker: String,
    pub version: PackageVersion,
    pub architecture: String,
    pub download_url: String,
    /// Empty until resolved against the download URL
    pub file_name: String,
}

/// A [`MsixPackage`] that has been downloaded to `file_path`.
///
/// Only the download step creates these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPackage {
    package: MsixPackage,
    file_path: PathBuf,
}

impl DownloadedPackage {
    pub(crate) fn new(package: MsixPackage, file_path: PathBuf) -> Self {
        Self { package, file_path }
    }

    pub fn package(&self) -> &MsixPackage {
        &self.package
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

/// Returns the release asset name for `package`.
///
/// Without a pattern this is the package's own file name. Otherwise every
/// `{version}` and `{arch}` in the pattern is substituted and the extension
/// of the package file name is appended, so `App_{version}_{arch}` becomes
/// `App_1.2.3.0_x64.Msix` for `foo.Msix`.
pub fn asset_name(package: &MsixPackage, pattern: Option<&str>) -> String {
    let pattern = match pattern {
        Some(p) if !p.is_empty() => p,
        _ => return package.file_name.clone(),
    };

    let mut name = pattern
        .replace("{version}", &package.version.to_string())
        .replace("{arch}", &package.architecture);
    name.push_str(&file_extension(&package.file_name));
    name
}

/// Extension of `file_name` including the leading dot, or empty.
fn file_extension(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
