//! Publishing store packages to the matching GitHub release.

use anyhow::Result;
use log::debug;

use crate::{
    config::{Config, Options},
    download::Downloader,
    error::UploadError,
    github::{ReleaseClient, locate},
    runtime::Runtime,
    services::Services,
    store::StoreCatalog,
};

mod executor;
mod plan;

pub use executor::{ASSET_CONTENT_TYPE, UploadReport, execute};
pub use plan::plan;

/// Builds the configuration and services, then performs the run.
#[tracing::instrument(skip(runtime, options))]
pub async fn upload<R: Runtime + 'static>(runtime: R, options: Options) -> Result<Vec<UploadReport>> {
    let config = Config::new(&runtime, options)?;
    let services = Services::from_config(runtime, &config)?;
    run(
        &services.store,
        &services.github,
        &services.downloader,
        &config,
    )
    .await
}

/// Uploads the store's latest packages that the matching release lacks.
#[tracing::instrument(skip(store, releases, downloader, config))]
pub async fn run<S, G, D>(
    store: &S,
    releases: &G,
    downloader: &D,
    config: &Config,
) -> Result<Vec<UploadReport>>
where
    S: StoreCatalog + ?Sized,
    G: ReleaseClient + ?Sized,
    D: Downloader + ?Sized,
{
    let packages = store.latest_packages(&config.store_id).await?;
    let Some(first) = packages.first() else {
        return Err(UploadError::AppNotFound(config.store_id.clone()).into());
    };

    let release = locate(releases, &config.repo, &first.version).await?;
    println!("Found GitHub release: {}", release.tag_name);

    let pattern = config.asset_name_pattern.as_deref();
    let planned = plan(&release, &packages, pattern);
    debug!(
        "{} of {} package(s) missing from {}",
        planned.len(),
        packages.len(),
        release.tag_name
    );

    let reports = execute(
        releases,
        downloader,
        &release,
        &planned,
        pattern,
        &config.scratch_dir,
        config.dry_run,
    )
    .await?;

    println!("Exiting ...");
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{DownloadedFile, MockDownloader};
    use crate::github::{GitHubRepo, MockReleaseClient, Release, ReleaseAsset};
    use crate::package::tests::make_package;
    use crate::store::MockStoreCatalog;
    use crate::test_utils::test_scratch_dir;
    use mockall::predicate::eq;

    fn config(dry_run: bool) -> Config {
        Config {
            store_id: "9NF7JTB3B17P".into(),
            token: "t".into(),
            repo: GitHubRepo {
                owner: "o".into(),
                repo: "r".into(),
            },
            asset_name_pattern: None,
            dry_run,
            api_url: None,
            catalog_url: None,
            delivery_url: None,
            scratch_dir: test_scratch_dir(),
        }
    }

    fn store_with_three_packages() -> MockStoreCatalog {
        let mut store = MockStoreCatalog::new();
        store
            .expect_latest_packages()
            .with(eq("9NF7JTB3B17P"))
            .returning(|_| {
                Ok(vec![
                    make_package("2.0.0.5", "x64", "App_x64.msix"),
                    make_package("2.0.0.5", "arm64", "App_arm64.msix"),
                    make_package("2.0.0.5", "x86", "App_x86.msix"),
                ])
            });
        store
    }

    fn release_v2() -> Release {
        Release {
            tag_name: "v2.0.0".into(),
            upload_url: "https://uploads.example/assets{?name,label}".into(),
            assets: vec![ReleaseAsset {
                name: "App_x64.msix".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn echo_downloader() -> MockDownloader {
        let mut downloader = MockDownloader::new();
        downloader.expect_fetch().returning(|url, dir| {
            let arch = url.rsplit('/').next().unwrap_or_default();
            let file_name = format!("App_{}.msix", arch);
            Ok(DownloadedFile {
                path: dir.join(&file_name),
                file_name,
            })
        });
        downloader
    }

    #[tokio::test]
    async fn test_run_uploads_missing_architectures() {
        let store = store_with_three_packages();
        let mut releases = MockReleaseClient::new();
        releases
            .expect_get_latest_release()
            .returning(|_| Ok(Some(release_v2())));
        releases
            .expect_upload_asset()
            .times(2)
            .returning(|_, name, _, _| {
                Ok(ReleaseAsset {
                    name: name.to_string(),
                    ..Default::default()
                })
            });

        let reports = run(&store, &releases, &echo_downloader(), &config(false))
            .await
            .unwrap();

        let names: Vec<&str> = reports.iter().map(|r| r.asset_name.as_str()).collect();
        assert_eq!(names, vec!["App_arm64.msix", "App_x86.msix"]);
        assert!(reports.iter().all(|r| r.uploaded.is_some()));
    }

    #[tokio::test]
    async fn test_run_dry_run_downloads_without_uploading() {
        let store = store_with_three_packages();
        let mut releases = MockReleaseClient::new();
        releases
            .expect_get_latest_release()
            .returning(|_| Ok(Some(release_v2())));
        releases.expect_upload_asset().never();

        let reports = run(&store, &releases, &echo_downloader(), &config(true))
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.uploaded.is_none()));
    }

    #[tokio::test]
    async fn test_run_app_not_found() {
        let mut store = MockStoreCatalog::new();
        store.expect_latest_packages().returning(|_| Ok(vec![]));
        let mut releases = MockReleaseClient::new();
        releases.expect_get_latest_release().never();
        releases.expect_get_releases().never();

        let err = run(&store, &releases, &MockDownloader::new(), &config(false))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "App with ID \"9NF7JTB3B17P\" not found.");
    }

    #[tokio::test]
    async fn test_run_release_not_found() {
        let store = store_with_three_packages();
        let mut releases = MockReleaseClient::new();
        releases.expect_get_latest_release().returning(|_| Ok(None));
        releases.expect_get_releases().returning(|_| {
            Ok(vec![Release {
                tag_name: "v1.0.0".into(),
                ..Default::default()
            }])
        });
        releases.expect_upload_asset().never();
        let mut downloader = MockDownloader::new();
        downloader.expect_fetch().never();

        let err = run(&store, &releases, &downloader, &config(false))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<UploadError>(),
            Some(UploadError::ReleaseNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_everything_already_uploaded() {
        let mut store = MockStoreCatalog::new();
        store
            .expect_latest_packages()
            .returning(|_| Ok(vec![make_package("2.0.0.5", "x64", "App_x64.msix")]));
        let mut releases = MockReleaseClient::new();
        releases
            .expect_get_latest_release()
            .returning(|_| Ok(Some(release_v2())));
        releases.expect_upload_asset().never();
        let mut downloader = MockDownloader::new();
        downloader.expect_fetch().never();

        let reports = run(&store, &releases, &downloader, &config(false))
            .await
            .unwrap();
        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_run_store_failure_propagates() {
        let mut store = MockStoreCatalog::new();
        store
            .expect_latest_packages()
            .returning(|_| Err(anyhow::anyhow!("delivery service unavailable")));
        let releases = MockReleaseClient::new();

        let err = run(&store, &releases, &MockDownloader::new(), &config(false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("delivery service unavailable"));
    }
}
