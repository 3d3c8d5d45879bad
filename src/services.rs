//! Service factory for building the collaborators of a run.
//!
//! GitHub calls go through a client carrying the token. The store and the
//! package downloads use a separate client without it.

use anyhow::Result;
use log::debug;
use reqwest::{
    Client,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};

use crate::{
    config::Config,
    download::HttpDownloader,
    github::GitHub,
    http::HttpClient,
    runtime::Runtime,
    store::MicrosoftStore,
};

const USER_AGENT: &str = concat!("msix-release-uploader/", env!("CARGO_PKG_VERSION"));

/// Build an HTTP client with optional authentication token
pub fn build_http_client(token: Option<&str>) -> Result<HttpClient> {
    let mut headers = HeaderMap::new();

    if let Some(token) = token {
        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);
        debug!("HTTP client configured with authentication");
    }

    let client = Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()?;

    Ok(HttpClient::new(client))
}

/// Build the GitHub release client from configuration
pub fn build_github(config: &Config) -> Result<GitHub> {
    let http_client = build_http_client(Some(&config.token))?;
    Ok(GitHub::new(http_client, config.api_url.clone()))
}

/// Build the store catalog client from configuration
pub fn build_store(config: &Config, http_client: HttpClient) -> MicrosoftStore {
    MicrosoftStore::new(
        http_client,
        config.catalog_url.clone(),
        config.delivery_url.clone(),
    )
}

/// Container for the collaborators of one run.
pub struct Services<R: Runtime> {
    pub store: MicrosoftStore,
    pub github: GitHub,
    pub downloader: HttpDownloader<R>,
}

impl<R: Runtime> Services<R> {
    pub fn from_config(runtime: R, config: &Config) -> Result<Self> {
        let anonymous = build_http_client(None)?;

        Ok(Self {
            store: build_store(config, anonymous.clone()),
            github: build_github(config)?,
            downloader: HttpDownloader::new(runtime, anonymous),
        })
    }
}
