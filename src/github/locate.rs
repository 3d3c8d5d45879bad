//! Finding the release a package version belongs to.

use anyhow::Result;
use log::debug;

use crate::error::UploadError;
use crate::version::{PackageVersion, versions_equal};

use super::client::ReleaseClient;
use super::repo::GitHubRepo;
use super::types::Release;

/// Returns the release whose tag matches `version`.
///
/// The latest release is checked first since a freshly published store
/// version is usually the newest release; only on a miss is the full list
/// paged through, taking the first match in listing order.
#[tracing::instrument(skip(client))]
pub async fn locate<G: ReleaseClient + ?Sized>(
    client: &G,
    repo: &GitHubRepo,
    version: &PackageVersion,
) -> Result<Release> {
    match client.get_latest_release(repo).await? {
        Some(latest) if versions_equal(version, &latest.tag_name) => {
            debug!("Latest release {} matches {}", latest.tag_name, version);
            return Ok(latest);
        }
        Some(latest) => debug!(
            "Latest release {} does not match {}, searching all releases",
            latest.tag_name, version
        ),
        None => debug!("{} has no latest release, searching all releases", repo),
    }

    let releases = client.get_releases(repo).await?;
    debug!("Scanning {} release(s) of {}", releases.len(), repo);

    releases
        .into_iter()
        .find(|release| versions_equal(version, &release.tag_name))
        .ok_or_else(|| UploadError::ReleaseNotFound { version: *version }.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::MockReleaseClient;

    fn repo() -> GitHubRepo {
        GitHubRepo {
            owner: "o".into(),
            repo: "r".into(),
        }
    }

    fn release(tag: &str) -> Release {
        Release {
            tag_name: tag.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_locate_latest_matches() {
        let mut client = MockReleaseClient::new();
        client
            .expect_get_latest_release()
            .times(1)
            .returning(|_| Ok(Some(release("v2.0.0"))));
        client.expect_get_releases().never();

        let version = "2.0.0.5".parse().unwrap();
        let found = locate(&client, &repo(), &version).await.unwrap();
        assert_eq!(found.tag_name, "v2.0.0");
    }

    #[tokio::test]
    async fn test_locate_falls_back_when_no_latest() {
        let mut client = MockReleaseClient::new();
        client.expect_get_latest_release().returning(|_| Ok(None));
        client
            .expect_get_releases()
            .times(1)
            .returning(|_| Ok(vec![release("1.0.0")]));

        let version = "1.0.0.2".parse().unwrap();
        let found = locate(&client, &repo(), &version).await.unwrap();
        assert_eq!(found.tag_name, "1.0.0");
    }

    #[tokio::test]
    async fn test_locate_falls_back_when_latest_differs() {
        let mut client = MockReleaseClient::new();
        client
            .expect_get_latest_release()
            .returning(|_| Ok(Some(release("v3.0.0"))));
        client.expect_get_releases().returning(|_| {
            Ok(vec![
                release("v3.0.0"),
                release("nightly"),
                release("v2.1.0"),
                release("2.1.0.9"),
            ])
        });

        let version = "2.1.0.0".parse().unwrap();
        let found = locate(&client, &repo(), &version).await.unwrap();
        // First match in listing order
        assert_eq!(found.tag_name, "v2.1.0");
    }

    #[tokio::test]
    async fn test_locate_not_found() {
        let mut client = MockReleaseClient::new();
        client.expect_get_latest_release().returning(|_| Ok(None));
        client
            .expect_get_releases()
            .returning(|_| Ok(vec![release("v1.0.0"), release("v2.0.0")]));

        let version: PackageVersion = "9.9.9.9".parse().unwrap();
        let err = locate(&client, &repo(), &version).await.unwrap_err();
        match err.downcast_ref::<UploadError>() {
            Some(UploadError::ReleaseNotFound { version: v }) => assert_eq!(*v, version),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_locate_propagates_latest_failure() {
        let mut client = MockReleaseClient::new();
        client
            .expect_get_latest_release()
            .returning(|_| Err(anyhow::anyhow!("Authentication failed")));
        client.expect_get_releases().never();

        let version = "1.0.0.0".parse().unwrap();
        let err = locate(&client, &repo(), &version).await.unwrap_err();
        assert!(err.to_string().contains("Authentication failed"));
    }

    #[tokio::test]
    async fn test_locate_propagates_listing_failure() {
        let mut client = MockReleaseClient::new();
        client.expect_get_latest_release().returning(|_| Ok(None));
        client
            .expect_get_releases()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));

        let version = "1.0.0.0".parse().unwrap();
        let err = locate(&client, &repo(), &version).await.unwrap_err();
        assert!(err.downcast_ref::<UploadError>().is_none());
    }
}
