//! Retry policy and error classification for HTTP reads.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of attempts for retryable operations.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

/// HTTP failures that will not succeed on a retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NonRetryableError {
    /// HTTP 403 mentioning a rate limit, or 429
    #[error("Rate limit exceeded: {0}. Try again later.")]
    RateLimitExceeded(String),
    /// HTTP 401
    #[error("Authentication failed: {0}. Check the token passed with --token.")]
    AuthenticationFailed(String),
    /// HTTP 404
    #[error("Not found: {0}")]
    NotFound(String),
    /// HTTP 403 without a rate limit message
    #[error("Access forbidden: {0}. The token may lack the required permissions.")]
    Forbidden(String),
    /// Any other 4xx
    #[error("Request error: {0}")]
    ClientError(String),
}

/// Classifies a response status.
///
/// Returns `None` for statuses worth retrying (5xx) and for success statuses.
pub fn classify_status(status: StatusCode, detail: &str) -> Option<NonRetryableError> {
    match status {
        StatusCode::UNAUTHORIZED => Some(NonRetryableError::AuthenticationFailed(
            "Invalid or missing authentication token".to_string(),
        )),
        StatusCode::FORBIDDEN if detail.contains("rate limit") => Some(
            NonRetryableError::RateLimitExceeded("GitHub API rate limit exceeded".to_string()),
        ),
        StatusCode::FORBIDDEN => Some(NonRetryableError::Forbidden(
            "Access to this resource is forbidden".to_string(),
        )),
        StatusCode::TOO_MANY_REQUESTS => Some(NonRetryableError::RateLimitExceeded(
            "Too many requests".to_string(),
        )),
        StatusCode::NOT_FOUND => Some(NonRetryableError::NotFound(
            "The requested resource was not found".to_string(),
        )),
        s if s.is_client_error() => Some(NonRetryableError::ClientError(format!(
            "HTTP {} error",
            s.as_u16()
        ))),
        _ => None,
    }
}

/// Converts an error from `error_for_status()` into an `anyhow::Error`,
/// replacing it with a [`NonRetryableError`] when retrying is pointless.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    let classified = error
        .status()
        .and_then(|status| classify_status(status, &error.to_string()));

    match classified {
        Some(non_retryable) => anyhow::Error::from(non_retryable),
        None => anyhow::Error::from(error),
    }
}

/// True for errors that may succeed when attempted again.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    error.downcast_ref::<NonRetryableError>().is_none()
}

/// True when the error chain holds an HTTP 404.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| {
            matches!(
                cause.downcast_ref::<NonRetryableError>(),
                Some(NonRetryableError::NotFound(_))
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Some(NonRetryableError::AuthenticationFailed(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "API rate limit exceeded"),
            Some(NonRetryableError::RateLimitExceeded(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            Some(NonRetryableError::Forbidden(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Some(NonRetryableError::RateLimitExceeded(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            Some(NonRetryableError::NotFound(_))
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            Some(NonRetryableError::ClientError(_))
        ));
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY, ""), None);
        assert_eq!(classify_status(StatusCode::OK, ""), None);
    }

    #[test]
    fn test_non_retryable_error_display() {
        let err = NonRetryableError::AuthenticationFailed("bad token".to_string());
        assert!(err.to_string().contains("--token"));

        let err = NonRetryableError::ClientError("HTTP 422 error".to_string());
        assert_eq!(err.to_string(), "Request error: HTTP 422 error");
    }

    #[test]
    fn test_is_not_found_through_context() {
        let err = anyhow::Error::from(NonRetryableError::NotFound("x".into()));
        let err = Err::<(), _>(err).context("Fetching latest release").unwrap_err();
        assert!(is_not_found(&err));
        assert!(!is_retryable(&err));

        let other = anyhow::anyhow!("connection reset");
        assert!(!is_not_found(&other));
        assert!(is_retryable(&other));
    }

    #[tokio::test]
    async fn test_check_retryable_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;

        let response = reqwest::Client::new().get(server.url()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();

        let result = check_retryable(err);
        assert!(is_not_found(&result));
    }

    #[tokio::test]
    async fn test_check_retryable_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let response = reqwest::Client::new().get(server.url()).send().await.unwrap();
        let err = response.error_for_status().unwrap_err();

        let result = check_retryable(err);
        assert!(result.downcast_ref::<reqwest::Error>().is_some());
        assert!(is_retryable(&result));
    }
}
