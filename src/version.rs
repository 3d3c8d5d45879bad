//! Package versions and their relaxed comparison with release tags.
//!
//! Store packages carry four-component versions (`1.2.3.0`) while release tags
//! are loosely formatted (`v1.2.3`, `1.2.3.0`, `V1.2`). A tag matches a package
//! when major, minor and build agree; the revision is never compared.

use std::fmt;
use std::str::FromStr;

use crate::error::UploadError;

/// A dotted version with four numeric components.
///
/// Parsed from 2 to 4 components; missing trailing components are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PackageVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl PackageVersion {
    pub fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// True when both versions agree on major, minor and build.
    pub fn same_release(&self, other: &PackageVersion) -> bool {
        self.major == other.major && self.minor == other.minor && self.build == other.build
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for PackageVersion {
    type Err = UploadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UploadError::InvalidPackageVersion(s.to_string());

        let parts: Vec<&str> = s.split('.').collect();
        if !(2..=4).contains(&parts.len()) {
            return Err(invalid());
        }

        let mut components = [0u32; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            // u32::from_str would accept a leading '+'
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        let [major, minor, build, revision] = components;
        Ok(Self::new(major, minor, build, revision))
    }
}

/// Parses a release tag into a version, stripping one leading `v`/`V`.
///
/// Returns `None` for anything that is not a 2-4 component dotted version.
pub fn parse_tag(tag_name: &str) -> Option<PackageVersion> {
    let stripped = tag_name
        .strip_prefix('v')
        .or_else(|| tag_name.strip_prefix('V'))
        .unwrap_or(tag_name);
    stripped.parse().ok()
}

/// Compares a package version with a release tag.
///
/// An unparseable tag is not an error, it simply does not match.
pub fn versions_equal(package_version: &PackageVersion, tag_name: &str) -> bool {
    parse_tag(tag_name).is_some_and(|tag| package_version.same_release(&tag))
}

/// Like [`versions_equal`], taking the package version as the raw store string.
///
/// Fails with [`UploadError::InvalidPackageVersion`] when the package version
/// itself is malformed.
pub fn versions_equal_str(package_version: &str, tag_name: &str) -> Result<bool, UploadError> {
    let package_version: PackageVersion = package_version.parse()?;
    Ok(versions_equal(&package_version, tag_name))
}
