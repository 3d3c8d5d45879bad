//! Fatal conditions of an upload run.
//!
//! Everything else in the crate flows through `anyhow::Result`; these variants
//! mark the failures the orchestrator is expected to produce, so callers and
//! tests can recover them with `downcast_ref::<UploadError>()`.

use thiserror::Error;

use crate::version::PackageVersion;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum UploadError {
    /// The store reported a version string that is not a dotted version.
    #[error("Invalid package version \"{0}\"")]
    InvalidPackageVersion(String),

    /// The store catalog returned no packages for the product ID.
    #[error("App with ID \"{0}\" not found.")]
    AppNotFound(String),

    /// No release tag matched the package version.
    #[error("Cannot find GitHub release with version \"{version}\"")]
    ReleaseNotFound { version: PackageVersion },

    #[error("Failed to download {architecture} package")]
    DownloadFailed {
        architecture: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to upload release asset {asset}")]
    UploadFailed {
        asset: String,
        #[source]
        source: BoxError,
    },
}
