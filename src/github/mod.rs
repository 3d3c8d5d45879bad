//! GitHub releases: listing, locating by version, and asset upload.

mod client;
mod locate;
mod repo;
mod types;

#[cfg(test)]
pub use client::MockReleaseClient;
pub use client::{DEFAULT_API_URL, GitHub, ReleaseClient};
pub use locate::locate;
pub use repo::GitHubRepo;
pub use types::{Release, ReleaseAsset};
