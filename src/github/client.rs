use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use std::path::Path;

use crate::http::{HttpClient, check_retryable, is_not_found};

use super::repo::GitHubRepo;
use super::types::{Release, ReleaseAsset};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    /// The repository's latest release, `None` when it has none.
    async fn get_latest_release(&self, repo: &GitHubRepo) -> Result<Option<Release>>;

    /// Every release of the repository, in the order the API lists them.
    async fn get_releases(&self, repo: &GitHubRepo) -> Result<Vec<Release>>;

    /// Streams the file at `path` to the release as an asset called `name`.
    async fn upload_asset(
        &self,
        release: &Release,
        name: &str,
        content_type: &str,
        path: &Path,
    ) -> Result<ReleaseAsset>;
}

pub struct GitHub {
    http_client: HttpClient,
    api_url: String,
}

impl GitHub {
    #[tracing::instrument(skip(http_client, api_url))]
    pub fn new(http_client: HttpClient, api_url: Option<String>) -> Self {
        let api_url = api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ReleaseClient for GitHub {
    #[tracing::instrument(skip(self, repo))]
    async fn get_latest_release(&self, repo: &GitHubRepo) -> Result<Option<Release>> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.api_url, repo.owner, repo.repo
        );

        debug!("Fetching latest release from {}...", url);

        match self.http_client.get_json::<Release>(&url).await {
            Ok(release) => Ok(Some(release)),
            Err(e) if is_not_found(&e) => {
                debug!("{} has no latest release", repo);
                Ok(None)
            }
            Err(e) => Err(e.context(format!("Failed to fetch latest release of {}", repo))),
        }
    }

    #[tracing::instrument(skip(self, repo))]
    async fn get_releases(&self, repo: &GitHubRepo) -> Result<Vec<Release>> {
        let url = format!("{}/repos/{}/{}/releases", self.api_url, repo.owner, repo.repo);
        let per_page = PER_PAGE.to_string();
        let mut releases = Vec::new();
        let mut page = 1;

        loop {
            debug!("Fetching releases page {} from {}...", page, url);

            let parsed: Vec<Release> = self
                .http_client
                .get_json_with_query(&url, &[("per_page", &per_page), ("page", &page.to_string())])
                .await
                .with_context(|| format!("Failed to list releases of {}", repo))?;

            let len = parsed.len();
            releases.extend(parsed);

            if len < PER_PAGE {
                break;
            }

            page += 1;
        }

        Ok(releases)
    }

    #[tracing::instrument(skip(self, release, path))]
    async fn upload_asset(
        &self,
        release: &Release,
        name: &str,
        content_type: &str,
        path: &Path,
    ) -> Result<ReleaseAsset> {
        let endpoint = release.upload_endpoint();
        if endpoint.is_empty() {
            anyhow::bail!("Release {} has no upload URL", release.tag_name);
        }

        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {:?}", path))?;
        let length = file
            .metadata()
            .await
            .with_context(|| format!("Failed to read metadata of {:?}", path))?
            .len();

        debug!("Uploading {} ({} bytes) to {}...", name, length, endpoint);

        // The request body owns the file handle; it is closed once the request finishes
        let response = self
            .http_client
            .inner()
            .post(endpoint)
            .query(&[("name", name)])
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, length)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .context("Failed to send upload request to GitHub")?;

        let asset = response
            .error_for_status()
            .map_err(check_retryable)?
            .json::<ReleaseAsset>()
            .await
            .context("Failed to parse upload response from GitHub")?;

        Ok(asset)
    }
}
