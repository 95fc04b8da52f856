//! Repository trait for package feeds.
//!
//! A repository lists, fetches, adds and deletes packages for one feed. The
//! engine awaits every call before moving on; any internal parallelism stays
//! inside the implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::package::{compare_versions, normalize_id, Package, PackageIdentity};

/// Result type for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Listing filter pushed into [`Repository::fetch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageFilter {
    /// Keep only the newest version of each package id.
    pub only_latest_version: bool,
    /// Keep prerelease versions.
    pub include_prerelease: bool,
}

impl PackageFilter {
    pub fn new(only_latest_version: bool, include_prerelease: bool) -> Self {
        Self {
            only_latest_version,
            include_prerelease,
        }
    }

    /// Whether a single package passes the prerelease toggle.
    pub fn admits(&self, package: &Package) -> bool {
        self.include_prerelease || !package.is_prerelease
    }

    /// Apply the filter to a full listing, preserving listing order.
    ///
    /// With `only_latest_version`, the newest admitted version of each id
    /// (case-insensitive) is kept. Backends that evaluate the filter remotely
    /// don't need this; in-process backends share it.
    pub fn apply(&self, packages: Vec<Package>) -> Vec<Package> {
        let admitted: Vec<Package> = packages.into_iter().filter(|p| self.admits(p)).collect();
        if !self.only_latest_version {
            return admitted;
        }

        let mut newest: HashMap<String, String> = HashMap::new();
        for package in &admitted {
            let key = normalize_id(&package.id);
            match newest.get(&key) {
                Some(current)
                    if compare_versions(&package.version, current) != std::cmp::Ordering::Greater => {}
                _ => {
                    newest.insert(key, package.version.clone());
                }
            }
        }

        let mut kept = std::collections::HashSet::new();
        admitted
            .into_iter()
            .filter(|p| {
                let key = normalize_id(&p.id);
                newest.get(&key) == Some(&p.version) && kept.insert(key)
            })
            .collect()
    }
}

/// A package feed.
///
/// Guarantees:
/// - `fetch` returns listing entries without content, in a stable order.
/// - `fetch_package` returns the package with content, or `None` when absent.
/// - `delete` reports `RepositoryError::NotFound` for unknown packages.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Feed name from configuration.
    fn name(&self) -> &str;

    /// Registry type tag of this backend.
    fn repository_type(&self) -> &str;

    /// List packages matching the filter.
    async fn fetch(&self, filter: &PackageFilter) -> RepositoryResult<Vec<Package>>;

    /// Fetch a single package including its content.
    async fn fetch_package(&self, identity: &PackageIdentity) -> RepositoryResult<Option<Package>>;

    /// Publish a package (content required).
    async fn add(&self, package: &Package) -> RepositoryResult<()>;

    /// Remove a package.
    async fn delete(&self, package: &Package) -> RepositoryResult<()>;
}
