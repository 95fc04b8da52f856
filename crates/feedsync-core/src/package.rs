//! Package identity, version ordering and set difference.
//!
//! Two packages are the same entity iff their ids match case-insensitively and
//! their versions match exactly. Content and metadata never take part in
//! equality, so a listed package (no content) and a fetched one (with content)
//! are interchangeable for diffing.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Case-folded form of a package id, the key for every id comparison.
pub fn normalize_id(id: &str) -> String {
    id.to_lowercase()
}

// ---------------------------------------------------------------------------
// PackageIdentity
// ---------------------------------------------------------------------------

/// The `(id, version)` pair that defines set membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        normalize_id(&self.id) == normalize_id(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        normalize_id(&self.id).hash(state);
        self.version.hash(state);
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

// ---------------------------------------------------------------------------
// Package
// ---------------------------------------------------------------------------

/// A package as listed or fetched from a feed.
///
/// Instances are never mutated after a repository hands them out; transfers
/// between feeds work on clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub is_prerelease: bool,
    #[serde(default)]
    pub is_latest_version: bool,
    /// Raw package bytes, absent until explicitly fetched.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

impl Package {
    /// Create a package without content. Prerelease is derived from the version.
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            id: id.into(),
            is_prerelease: is_prerelease_version(&version),
            version,
            title: None,
            is_latest_version: false,
            content: None,
        }
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_latest(mut self, latest: bool) -> Self {
        self.is_latest_version = latest;
        self
    }

    pub fn identity(&self) -> PackageIdentity {
        PackageIdentity::new(self.id.clone(), self.version.clone())
    }

    pub fn has_content(&self) -> bool {
        self.content.is_some()
    }

    /// Content length in bytes, zero when not fetched.
    pub fn content_len(&self) -> usize {
        self.content.as_ref().map(Vec::len).unwrap_or(0)
    }
}

impl PartialEq for Package {
    fn eq(&self, other: &Self) -> bool {
        normalize_id(&self.id) == normalize_id(&other.id) && self.version == other.version
    }
}

impl Eq for Package {}

impl Hash for Package {
    fn hash<H: Hasher>(&self, state: &mut H) {
        normalize_id(&self.id).hash(state);
        self.version.hash(state);
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

// ---------------------------------------------------------------------------
// PackageEvent
// ---------------------------------------------------------------------------

/// Why a command is being invoked for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageEvent {
    Added,
    Deleted,
    Deployed,
    Promoted,
    Processed,
}

impl std::fmt::Display for PackageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PackageEvent::Added => "added",
            PackageEvent::Deleted => "deleted",
            PackageEvent::Deployed => "deployed",
            PackageEvent::Promoted => "promoted",
            PackageEvent::Processed => "processed",
        };
        write!(f, "{}", s)
    }
}

// ---------------------------------------------------------------------------
// Set difference
// ---------------------------------------------------------------------------

/// Packages of `left` absent (by identity) from `right`, in `left` order.
///
/// Duplicates within `left` are reported once.
pub fn difference(left: &[Package], right: &[Package]) -> Vec<Package> {
    let exclude: HashSet<PackageIdentity> = right.iter().map(Package::identity).collect();
    let mut seen = HashSet::new();
    left.iter()
        .filter(|p| {
            let identity = p.identity();
            !exclude.contains(&identity) && seen.insert(identity)
        })
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// True when the version carries a prerelease label (`1.0.0-beta`).
pub fn is_prerelease_version(version: &str) -> bool {
    let core = version.split('+').next().unwrap_or(version);
    core.contains('-')
}

/// True when `version` has a well-formed numeric release (up to four parts)
/// and, if present, a valid prerelease label.
pub fn is_valid_version(version: &str) -> bool {
    VersionKey::parse(version).is_some()
}

/// Order two package versions.
///
/// Numeric release parts are compared first (missing parts count as zero, so
/// `1.0` == `1.0.0.0`), a release sorts after any of its prereleases, and
/// prerelease labels follow semver precedence. Unparseable versions fall back
/// to case-insensitive string order.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (VersionKey::parse(a), VersionKey::parse(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb),
        _ => a.to_ascii_lowercase().cmp(&b.to_ascii_lowercase()),
    }
}

#[derive(Debug, PartialEq, Eq)]
struct VersionKey {
    release: [u64; 4],
    pre: Option<semver::Prerelease>,
    raw_pre: String,
}

impl VersionKey {
    fn parse(version: &str) -> Option<Self> {
        let version = version.split('+').next().unwrap_or(version).trim();
        let (release_part, pre_part) = match version.split_once('-') {
            Some((r, p)) => (r, Some(p)),
            None => (version, None),
        };

        let mut release = [0u64; 4];
        let parts: Vec<&str> = release_part.split('.').collect();
        if parts.is_empty() || parts.len() > 4 {
            return None;
        }
        for (slot, part) in release.iter_mut().zip(parts.iter()) {
            *slot = part.parse().ok()?;
        }

        let raw_pre = pre_part.unwrap_or_default().to_ascii_lowercase();
        let pre = match pre_part {
            Some(p) => Some(semver::Prerelease::new(&p.to_ascii_lowercase()).ok()?),
            None => None,
        };

        Some(Self {
            release,
            pre,
            raw_pre,
        })
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.release.cmp(&other.release).then_with(|| {
            match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b).then_with(|| self.raw_pre.cmp(&other.raw_pre)),
            }
        })
    }
}
