use log::{debug, warn};
use std::collections::HashSet;

use crate::github::Release;
use crate::package::{MsixPackage, asset_name};

/// Returns the packages whose asset is not yet attached to `release`, in
/// input order.
pub fn plan(release: &Release, packages: &[MsixPackage], pattern: Option<&str>) -> Vec<MsixPackage> {
    let mut planned_names = HashSet::new();

    packages
        .iter()
        .filter(|package| {
            let name = asset_name(package, pattern);
            if release.has_asset(&name) {
                debug!("{} is already attached to {}", name, release.tag_name);
                return false;
            }
            if !planned_names.insert(name.clone()) {
                warn!(
                    "{} ({}) produces the asset name {} twice, the second upload will fail",
                    package.moniker, package.architecture, name
                );
            }
            true
        })
        .cloned()
        .collect()
}
