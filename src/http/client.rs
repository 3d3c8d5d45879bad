//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use reqwest::Client;
use reqwest::Response;
use reqwest::header::CONTENT_DISPOSITION;
use serde::de::DeserializeOwned;
use std::io::Write;

use super::retry::{MAX_RETRIES, RETRY_DELAY_MS, check_retryable, is_retryable};

/// Result of a completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    /// Name announced by the server, or the last URL path segment
    pub file_name: String,
    pub bytes: u64,
}

/// HTTP client with built-in retry logic for network reads.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns a reference to the underlying reqwest Client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Performs a GET request and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET JSON from {}...", url);

        self.with_retry("GET JSON", || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// Performs a GET request with query parameters and deserializes the JSON response.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, query))]
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!("GET JSON from {} with query {:?}...", url, query);

        self.with_retry("GET JSON with query", || async {
            let response = self
                .client
                .get(url)
                .query(query)
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            response
                .json::<T>()
                .await
                .context("Failed to parse JSON response")
        })
        .await
    }

    /// Posts a text body (e.g. a SOAP envelope) and returns the response text.
    /// Only use for requests that are safe to repeat; transient errors are retried.
    #[tracing::instrument(skip(self, body))]
    pub async fn post_text(&self, url: &str, content_type: &str, body: &str) -> Result<String> {
        debug!("POST {} ({} bytes)...", url, body.len());

        self.with_retry("POST", || async {
            let response = self
                .client
                .post(url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(body.to_string())
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            response.text().await.context("Failed to read response body")
        })
        .await
    }

    /// Resolves the file name a download URL would produce without reading the body.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_file_name(&self, url: &str) -> Result<String> {
        self.with_retry("Resolving file name", || async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .context("Failed to send request")?;

            let response = response.error_for_status().map_err(check_retryable)?;

            // Dropping the response abandons the body
            file_name_from_response(&response)
        })
        .await
    }

    /// Downloads a file from a URL, streaming it into the writer returned by
    /// `create_writer`, which receives the resolved file name.
    /// Automatically retries on transient errors.
    #[tracing::instrument(skip(self, create_writer))]
    pub async fn download_file<W, F>(&self, url: &str, create_writer: F) -> Result<Downloaded>
    where
        W: Write,
        F: Fn(&str) -> Result<W>,
    {
        debug!("Downloading file from {}...", url);

        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match self.download_file_once(url, &create_writer).await {
                Ok(downloaded) => return Ok(downloaded),
                Err(e) => {
                    if !is_retryable(&e) {
                        return Err(e);
                    }

                    if attempt < MAX_RETRIES {
                        warn!(
                            "Download attempt {}/{} failed ({}), retrying...",
                            attempt, MAX_RETRIES, e
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Download failed after {} attempts", MAX_RETRIES)))
    }

    /// Single download attempt without retry.
    async fn download_file_once<W, F>(&self, url: &str, create_writer: &F) -> Result<Downloaded>
    where
        W: Write,
        F: Fn(&str) -> Result<W>,
    {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(check_retryable)?;

        let file_name = file_name_from_response(&response)?;
        let mut writer = create_writer(&file_name)?;
        let mut bytes: u64 = 0;

        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            writer
                .write_all(&chunk)
                .context("Failed to write chunk to file")?;
            bytes += chunk.len() as u64;
        }
        writer.flush().context("Failed to flush downloaded file")?;

        debug!("Downloaded {:.2} MB", bytes as f64 / (1024.0 * 1024.0));

        Ok(Downloaded { file_name, bytes })
    }

    /// Executes an async operation with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }

                    if attempt < MAX_RETRIES {
                        warn!(
                            "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                            operation_name, attempt, MAX_RETRIES, e, RETRY_DELAY_MS
                        );
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            anyhow!("{}: failed after {} attempts", operation_name, MAX_RETRIES)
        }))
    }
}

/// File name from `Content-Disposition`, falling back to the final URL's last path segment.
fn file_name_from_response(response: &Response) -> Result<String> {
    let from_header = response
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_content_disposition);

    if let Some(name) = from_header {
        return Ok(name);
    }

    response
        .url()
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Cannot determine file name for {}", response.url()))
}

/// Extracts the file name from a `Content-Disposition` header value.
pub(crate) fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;

    for param in value.split(';').map(str::trim) {
        let Some((key, raw)) = param.split_once('=') else {
            continue;
        };
        let raw = raw.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            // RFC 5987 form: UTF-8''name
            "filename*" => {
                if let Some((_, name)) = raw.split_once("''") {
                    let name = name.trim_matches('"');
                    if !name.is_empty() {
                        return Some(base_name(name));
                    }
                }
            }
            "filename" => {
                let name = raw.trim_matches('"');
                if !name.is_empty() {
                    plain = Some(base_name(name));
                }
            }
            _ => {}
        }
    }

    plain
}

/// Strips any directory part a server may have sent.
fn base_name(name: &str) -> String {
    name.rsplit(['/', '\\']).next().unwrap_or(name).to_string()
}
