use anyhow::{Context, Result, anyhow};
use std::path::PathBuf;

use crate::github::GitHubRepo;
use crate::runtime::Runtime;

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const REPOSITORY_ENV: &str = "GITHUB_REPOSITORY";
const SCRATCH_DIR_NAME: &str = "msix-release-uploader";

/// Settings as given on the command line, before validation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub store_id: String,
    pub token: Option<String>,
    /// `owner/repo`
    pub repository: Option<String>,
    pub asset_name_pattern: Option<String>,
    pub dry_run: bool,
    pub api_url: Option<String>,
    pub catalog_url: Option<String>,
    pub delivery_url: Option<String>,
}

/// Validated settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub store_id: String,
    pub token: String,
    pub repo: GitHubRepo,
    pub asset_name_pattern: Option<String>,
    pub dry_run: bool,
    pub api_url: Option<String>,
    pub catalog_url: Option<String>,
    pub delivery_url: Option<String>,
    /// Where downloaded packages are kept
    pub scratch_dir: PathBuf,
}

impl Config {
    /// Fills in what the options leave out from the environment.
    pub fn new<R: Runtime + ?Sized>(runtime: &R, options: Options) -> Result<Self> {
        let token = match options.token.filter(|t| !t.is_empty()) {
            Some(token) => token,
            None => runtime
                .env_var(TOKEN_ENV)
                .ok()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| anyhow!("A GitHub token is required, pass --token or set {}", TOKEN_ENV))?,
        };

        let repository = match options.repository {
            Some(repository) => repository,
            None => runtime
                .env_var(REPOSITORY_ENV)
                .with_context(|| format!("Cannot get environment variable \"{}\"", REPOSITORY_ENV))?,
        };
        let repo = repository.parse::<GitHubRepo>()?;

        Ok(Self {
            store_id: options.store_id,
            token,
            repo,
            asset_name_pattern: options.asset_name_pattern.filter(|p| !p.is_empty()),
            dry_run: options.dry_run,
            api_url: options.api_url,
            catalog_url: options.catalog_url,
            delivery_url: options.delivery_url,
            scratch_dir: runtime.temp_dir().join(SCRATCH_DIR_NAME),
        })
    }
}
