use anyhow::Result;
use log::info;
use std::path::Path;

use crate::download::Downloader;
use crate::error::UploadError;
use crate::github::{Release, ReleaseAsset, ReleaseClient};
use crate::output::quantity;
use crate::package::{DownloadedPackage, MsixPackage, asset_name};

pub const ASSET_CONTENT_TYPE: &str = "application/octet-stream";

/// What happened to one planned package.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReport {
    pub asset_name: String,
    pub file: DownloadedPackage,
    /// `None` on a dry run
    pub uploaded: Option<ReleaseAsset>,
}

/// Downloads each planned package and attaches it to `release`.
///
/// Packages are handled one at a time in the given order; the first download
/// or upload failure ends the run.
#[tracing::instrument(skip(releases, downloader, release, planned))]
pub async fn execute<G, D>(
    releases: &G,
    downloader: &D,
    release: &Release,
    planned: &[MsixPackage],
    pattern: Option<&str>,
    scratch_dir: &Path,
    dry_run: bool,
) -> Result<Vec<UploadReport>>
where
    G: ReleaseClient + ?Sized,
    D: Downloader + ?Sized,
{
    println!("{} to upload.", quantity(planned.len(), "file"));
    println!();

    let mut reports = Vec::with_capacity(planned.len());

    for package in planned {
        let name = asset_name(package, pattern);
        println!("File to upload: {}", name);

        let file = download(downloader, package, scratch_dir).await?;

        let uploaded = if dry_run {
            println!("This is a dry run, so the file won't be uploaded.");
            None
        } else {
            println!("Uploading to GitHub release ...");
            let asset = releases
                .upload_asset(release, &name, ASSET_CONTENT_TYPE, file.file_path())
                .await
                .map_err(|e| UploadError::UploadFailed {
                    asset: name.clone(),
                    source: e.into(),
                })?;
            println!("File uploaded: {}", asset.name);
            Some(asset)
        };
        println!();

        reports.push(UploadReport {
            asset_name: name,
            file,
            uploaded,
        });
    }

    Ok(reports)
}

async fn download<D: Downloader + ?Sized>(
    downloader: &D,
    package: &MsixPackage,
    scratch_dir: &Path,
) -> Result<DownloadedPackage> {
    println!(
        "Downloading {} package from Microsoft Store ...",
        package.architecture
    );

    let file = downloader
        .fetch(&package.download_url, scratch_dir)
        .await
        .map_err(|e| UploadError::DownloadFailed {
            architecture: package.architecture.clone(),
            source: e.into(),
        })?;

    if file.file_name != package.file_name {
        info!(
            "{} was saved as {} rather than {}",
            package.moniker, file.file_name, package.file_name
        );
    }
    println!("File downloaded to: {}", file.path.display());

    Ok(DownloadedPackage::new(package.clone(), file.path))
}
