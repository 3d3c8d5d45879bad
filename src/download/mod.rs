//! Retrieval of package files into the scratch directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

use crate::http::HttpClient;
use crate::runtime::Runtime;

/// A file fetched to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    /// Name resolved from the response
    pub file_name: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Downloads `url` into `dest_dir`, returning once the file is complete.
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<DownloadedFile>;
}

pub struct HttpDownloader<R: Runtime> {
    runtime: R,
    http_client: HttpClient,
}

impl<R: Runtime> HttpDownloader<R> {
    pub fn new(runtime: R, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }
}

#[async_trait]
impl<R: Runtime> Downloader for HttpDownloader<R> {
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, url: &str, dest_dir: &Path) -> Result<DownloadedFile> {
        info!("Downloading file from {}...", url);

        if !self.runtime.exists(dest_dir) {
            self.runtime
                .create_dir_all(dest_dir)
                .with_context(|| format!("Failed to create download directory {:?}", dest_dir))?;
        }

        let downloaded = self
            .http_client
            .download_file(url, |file_name| {
                let path = dest_dir.join(file_name);
                self.runtime
                    .create_file(&path)
                    .with_context(|| format!("Failed to create file at {:?}", path))
            })
            .await?;

        info!("Download complete ({} bytes).", downloaded.bytes);

        Ok(DownloadedFile {
            path: dest_dir.join(&downloaded.file_name),
            file_name: downloaded.file_name,
        })
    }
}
