//! Directory-backed package feed.
//!
//! Packages live as `<id>.<version>.nupkg` files in one flat directory. The
//! id may itself contain dots, and segments that start with a digit
//! (`Contoso.3DPrint`). The version is the longest dot-suffix that parses as
//! one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use feedsync_core::{
    compare_versions, is_valid_version, normalize_id, require_setting, ConfigError, Package,
    PackageFilter, PackageIdentity, Repository, RepositoryError, RepositoryResult, Settings,
};

/// File extension of package files.
pub const PACKAGE_EXTENSION: &str = "nupkg";

/// Split `<id>.<version>.nupkg` into `(id, version)`.
///
/// The split falls before the longest suffix that is a valid version, so a
/// file written for `(id, version)` parses back to the same pair. Names with
/// no valid version suffix fall back to splitting at the first segment that
/// starts with a digit. Returns `None` for other extensions and for names
/// with no version part.
pub fn parse_file_name(file_name: &str) -> Option<(String, String)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(PACKAGE_EXTENSION) {
        return None;
    }

    let segments: Vec<&str> = stem.split('.').collect();
    let split = (1..segments.len())
        .find(|&i| is_valid_version(&segments[i..].join(".")))
        .or_else(|| {
            (1..segments.len()).find(|&i| segments[i].starts_with(|c: char| c.is_ascii_digit()))
        })?;

    let id = segments[..split].join(".");
    let version = segments[split..].join(".");
    if id.is_empty() || version.is_empty() {
        return None;
    }
    Some((id, version))
}

#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    name: String,
    root: PathBuf,
}

impl DirectoryRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Build from feed settings; `path` is required.
    pub fn from_settings(name: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let path = require_setting(settings, name, "path")?;
        Ok(Self::new(name, path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_path(&self, id: &str, version: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}.{}", id, version, PACKAGE_EXTENSION))
    }

    /// Locate the file of a package, matching the id case-insensitively.
    async fn find_file(&self, identity: &PackageIdentity) -> RepositoryResult<Option<PathBuf>> {
        let exact = self.file_path(&identity.id, &identity.version);
        if tokio::fs::try_exists(&exact).await? {
            return Ok(Some(exact));
        }
        for (path, package) in self.scan().await? {
            if package.identity() == *identity {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }

    /// Every package file in the directory, sorted by file name.
    async fn scan(&self) -> RepositoryResult<Vec<(PathBuf, Package)>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepositoryError::Communication(format!(
                    "feed directory {} does not exist",
                    self.root.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match parse_file_name(&file_name) {
                Some((id, version)) => found.push((entry.path(), Package::new(id, version))),
                None => debug!(feed = %self.name, file = %file_name, "Skipping non-package file"),
            }
        }
        found.sort_by(|a, b| a.0.cmp(&b.0));
        mark_latest(&mut found);
        Ok(found)
    }
}

/// Flag the newest stable version of each id, compared case-insensitively.
fn mark_latest(found: &mut [(PathBuf, Package)]) {
    let mut newest: HashMap<String, String> = HashMap::new();
    for (_, package) in found.iter().filter(|(_, p)| !p.is_prerelease) {
        let key = normalize_id(&package.id);
        let replace = match newest.get(&key) {
            Some(current) => compare_versions(&package.version, current).is_gt(),
            None => true,
        };
        if replace {
            newest.insert(key, package.version.clone());
        }
    }
    for (_, package) in found.iter_mut() {
        package.is_latest_version = !package.is_prerelease
            && newest.get(&normalize_id(&package.id)) == Some(&package.version);
    }
}

#[async_trait]
impl Repository for DirectoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn repository_type(&self) -> &str {
        crate::DIRECTORY_TYPE
    }

    async fn fetch(&self, filter: &PackageFilter) -> RepositoryResult<Vec<Package>> {
        let listing: Vec<Package> = self.scan().await?.into_iter().map(|(_, p)| p).collect();
        let total = listing.len();
        let listing = filter.apply(listing);
        debug!(feed = %self.name, total, returned = listing.len(), "Listed directory feed");
        Ok(listing)
    }

    async fn fetch_package(&self, identity: &PackageIdentity) -> RepositoryResult<Option<Package>> {
        let Some(path) = self.find_file(identity).await? else {
            return Ok(None);
        };
        let bytes = tokio::fs::read(&path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (id, version) =
            parse_file_name(&file_name).unwrap_or_else(|| (identity.id.clone(), identity.version.clone()));
        Ok(Some(Package::new(id, version).with_content(bytes)))
    }

    async fn add(&self, package: &Package) -> RepositoryResult<()> {
        let content = package
            .content
            .as_deref()
            .ok_or_else(|| RepositoryError::MissingContent(package.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await?;
        if let Some(existing) = self.find_file(&package.identity()).await? {
            tokio::fs::remove_file(existing).await?;
        }
        let path = self.file_path(&package.id, &package.version);
        tokio::fs::write(&path, content).await?;
        info!(feed = %self.name, package = %package, bytes = content.len(), "Package written");
        Ok(())
    }

    async fn delete(&self, package: &Package) -> RepositoryResult<()> {
        let identity = package.identity();
        let path = self
            .find_file(&identity)
            .await?
            .ok_or_else(|| RepositoryError::NotFound {
                id: identity.id.clone(),
                version: identity.version.clone(),
            })?;
        tokio::fs::remove_file(&path).await?;
        info!(feed = %self.name, package = %package, "Package removed");
        Ok(())
    }
}
