//! Microsoft Store package discovery.

mod catalog;
mod delivery;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use log::{debug, warn};

use crate::error::UploadError;
use crate::http::HttpClient;
use crate::output::quantity;
use crate::package::MsixPackage;
use crate::version::PackageVersion;

pub use catalog::{DEFAULT_CATALOG_URL, ProductInfo, lookup_product};
pub use delivery::{DEFAULT_DELIVERY_URL, DeliveryClient, UpdateEntry};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreCatalog: Send + Sync {
    /// Lists the packages of the product's newest version, one per
    /// architecture. Empty when the product is unknown or has no packages.
    async fn latest_packages(&self, product_id: &str) -> Result<Vec<MsixPackage>>;
}

/// Store catalog backed by the public display catalog and delivery service.
pub struct MicrosoftStore {
    http_client: HttpClient,
    catalog_url: String,
    delivery_url: String,
}

impl MicrosoftStore {
    pub fn new(
        http_client: HttpClient,
        catalog_url: Option<String>,
        delivery_url: Option<String>,
    ) -> Self {
        let trim = |url: String| url.trim_end_matches('/').to_string();
        Self {
            http_client,
            catalog_url: catalog_url
                .map(trim)
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string()),
            delivery_url: delivery_url
                .map(trim)
                .unwrap_or_else(|| DEFAULT_DELIVERY_URL.to_string()),
        }
    }
}

#[async_trait]
impl StoreCatalog for MicrosoftStore {
    #[tracing::instrument(skip(self))]
    async fn latest_packages(&self, product_id: &str) -> Result<Vec<MsixPackage>> {
        println!(
            "Getting info of app with ID \"{}\" from Microsoft Store ...",
            product_id
        );

        let product = lookup_product(&self.http_client, &self.catalog_url, product_id)
            .await
            .map_err(|e| e.context(UploadError::AppNotFound(product_id.to_string())))?;

        let Some(product) = product else {
            return Ok(Vec::new());
        };

        if let Some(title) = &product.title {
            println!("Found app: {}", title);
        }
        println!();

        let Some(identity_name) = product.identity_name() else {
            debug!("{} lists no package family", product_id);
            return Ok(Vec::new());
        };
        let Some(category_id) = product.wu_category_id.as_deref() else {
            warn!("{} has no update category, it cannot be downloaded", product_id);
            return Ok(Vec::new());
        };

        println!("Getting app package list ...");

        let delivery = DeliveryClient::new(&self.http_client, &self.delivery_url);
        let cookie = delivery.get_cookie().await?;
        let updates = delivery.sync_updates(&cookie, category_id).await?;

        let candidates = updates
            .into_iter()
            .filter(|update| update.moniker.starts_with(identity_name))
            .map(|update| {
                let (version, architecture) = parse_moniker(&update.moniker)?;
                Ok((update, version, architecture))
            })
            .collect::<Result<Vec<_>>>()?;

        let Some(latest) = candidates.iter().map(|(_, version, _)| *version).max() else {
            return Ok(Vec::new());
        };

        let mut packages = Vec::new();
        for (update, version, architecture) in candidates
            .into_iter()
            .filter(|(_, version, _)| *version == latest)
        {
            let download_url = delivery
                .file_url(&update.update_id, &update.revision)
                .await?
                .ok_or_else(|| anyhow!("No download URL for package {}", update.moniker))?;

            let file_name = self
                .http_client
                .resolve_file_name(&download_url)
                .await
                .with_context(|| format!("Failed to resolve file name of {}", update.moniker))?;

            debug!("{} resolves to {}", update.moniker, file_name);

            packages.push(MsixPackage {
                moniker: update.moniker,
                version,
                architecture,
                download_url,
                file_name,
            });
        }

        let architectures: Vec<&str> = packages.iter().map(|p| p.architecture.as_str()).collect();
        println!("The latest app version is: {}", latest);
        println!(
            "Found {}: {}",
            quantity(packages.len(), "package"),
            architectures.join(", ")
        );
        println!();

        Ok(packages)
    }
}

/// Splits `Name_Version_Arch_ResourceId_PublisherId` into version and
/// architecture.
fn parse_moniker(moniker: &str) -> Result<(PackageVersion, String)> {
    match moniker.split('_').collect::<Vec<_>>().as_slice() {
        [_, version, architecture, ..] => Ok((version.parse()?, architecture.to_string())),
        _ => bail!(
            "Cannot get version and architecture from package moniker \"{}\"",
            moniker
        ),
    }
}
