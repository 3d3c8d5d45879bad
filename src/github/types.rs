use serde::{Deserialize, Serialize};

/// Represents a file attached to a GitHub release
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
pub struct ReleaseAsset {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub browser_download_url: String,
}

/// Represents a GitHub release
#[derive(Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
pub struct Release {
    #[serde(default)]
    pub id: u64,
    pub tag_name: String,
    pub name: Option<String>,
    /// Hypermedia template, e.g. `https://uploads.github.com/repos/o/r/releases/1/assets{?name,label}`
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// True when an asset with exactly this name is attached.
    pub fn has_asset(&self, name: &str) -> bool {
        self.assets.iter().any(|a| a.name == name)
    }

    /// The upload endpoint with the URI template suffix removed.
    pub fn upload_endpoint(&self) -> &str {
        match self.upload_url.find('{') {
            Some(idx) => &self.upload_url[..idx],
            None => &self.upload_url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_deserialize_minimal() {
        let release: Release = serde_json::from_str(r#"{"tag_name": "v1.0.0"}"#).unwrap();
        assert_eq!(release.tag_name, "v1.0.0");
        assert!(release.assets.is_empty());
        assert_eq!(release.upload_url, "");
    }

    #[test]
    fn test_upload_endpoint_strips_template() {
        let release = Release {
            upload_url: "https://uploads.github.com/repos/o/r/releases/7/assets{?name,label}"
                .into(),
            ..Default::default()
        };
        assert_eq!(
            release.upload_endpoint(),
            "https://uploads.github.com/repos/o/r/releases/7/assets"
        );
    }

    #[test]
    fn test_has_asset() {
        let release = Release {
            assets: vec![ReleaseAsset {
                name: "App_2.0.0.5_x64.msix".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(release.has_asset("App_2.0.0.5_x64.msix"));
        assert!(!release.has_asset("App_2.0.0.5_x64.MSIX"));
    }
}
