pub mod config;
pub mod download;
pub mod error;
pub mod github;
pub mod http;
mod output;
pub mod package;
pub mod runtime;
pub mod services;
pub mod store;
pub mod upload;
pub mod version;

/// Test utilities for cross-platform path handling.
#[cfg(test)]
pub mod test_utils {
    use std::path::PathBuf;

    /// Returns the scratch directory used by tests based on the platform.
    /// - Unix: `/scratch`
    /// - Windows: `C:\scratch`
    pub fn test_scratch_dir() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/scratch")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\scratch")
        }
    }
}
