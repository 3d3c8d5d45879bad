//! Product lookups against the store's display catalog.

use anyhow::Result;
use log::debug;
use serde::Deserialize;

use crate::http::{HttpClient, is_not_found};

pub const DEFAULT_CATALOG_URL: &str = "https://displaycatalog.mp.microsoft.com";

/// The parts of a catalog listing needed to find the product's packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductInfo {
    pub title: Option<String>,
    pub package_family_name: Option<String>,
    pub wu_category_id: Option<String>,
}

impl ProductInfo {
    /// Package identity name, the family name up to its first `_`.
    pub fn identity_name(&self) -> Option<&str> {
        self.package_family_name
            .as_deref()
            .and_then(|family| family.split('_').next())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProductResponse {
    product: Option<Product>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Product {
    display_sku_availabilities: Option<Vec<DisplaySkuAvailability>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DisplaySkuAvailability {
    sku: Option<Sku>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Sku {
    localized_properties: Option<Vec<SkuLocalizedProperties>>,
    properties: Option<SkuProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SkuLocalizedProperties {
    sku_title: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SkuProperties {
    fulfillment_data: Option<FulfillmentData>,
    packages: Option<Vec<SkuPackage>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FulfillmentData {
    wu_category_id: Option<String>,
    package_family_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SkuPackage {
    package_family_name: Option<String>,
}

impl From<ProductResponse> for ProductInfo {
    fn from(response: ProductResponse) -> Self {
        let skus: Vec<Sku> = response
            .product
            .and_then(|p| p.display_sku_availabilities)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|a| a.sku)
            .collect();

        let title = skus
            .first()
            .and_then(|sku| sku.localized_properties.as_ref())
            .and_then(|props| props.first())
            .and_then(|p| p.sku_title.clone());

        let properties: Vec<&SkuProperties> =
            skus.iter().filter_map(|sku| sku.properties.as_ref()).collect();

        let package_family_name = properties
            .iter()
            .copied()
            .flat_map(|p| p.packages.iter().flatten())
            .find_map(|p| p.package_family_name.clone())
            .or_else(|| {
                properties.iter().find_map(|p| {
                    p.fulfillment_data
                        .as_ref()
                        .and_then(|f| f.package_family_name.clone())
                })
            });

        let wu_category_id = properties.iter().find_map(|p| {
            p.fulfillment_data
                .as_ref()
                .and_then(|f| f.wu_category_id.clone())
        });

        Self {
            title,
            package_family_name,
            wu_category_id,
        }
    }
}

/// Looks up `product_id` in the US market. A 404 yields `Ok(None)`.
#[tracing::instrument(skip(http_client))]
pub async fn lookup_product(
    http_client: &HttpClient,
    catalog_url: &str,
    product_id: &str,
) -> Result<Option<ProductInfo>> {
    let url = format!("{}/v7.0/products/{}", catalog_url, product_id);
    let query = [
        ("market", "US"),
        ("languages", "en-US,en,neutral"),
        ("fieldsTemplate", "Details"),
    ];

    match http_client
        .get_json_with_query::<ProductResponse>(&url, &query)
        .await
    {
        Ok(response) => Ok(Some(response.into())),
        Err(e) if is_not_found(&e) => {
            debug!("Product {} is not listed in the catalog", product_id);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
