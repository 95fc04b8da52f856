//! In-memory fakes for engine traits
//!
//! Provides `MemoryRepository`, `ScriptedCommand` and `RecordingObserver`
//! that satisfy the trait contracts without touching disk or network.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::command::{Command, CommandResult};
use crate::config::Settings;
use crate::error::{FeedSyncError, RepositoryError, Result};
use crate::observer::{ActionEvent, ActionEventType, ActionInfo, Observer};
use crate::package::{normalize_id, Package, PackageEvent, PackageIdentity};
use crate::repository::{PackageFilter, Repository, RepositoryResult};

/// Shared, ordered log of calls, used to assert cross-object ordering.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

// ---------------------------------------------------------------------------
// MemoryRepository
// ---------------------------------------------------------------------------

/// Feed backed by a `Vec<Package>` kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    name: String,
    packages: Mutex<Vec<Package>>,
    broken_ids: Mutex<HashSet<String>>,
    listing_broken: Mutex<bool>,
    fetched: Mutex<Vec<PackageIdentity>>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Seed a feed. Packages without content get their id as content.
    pub fn with_packages(name: impl Into<String>, packages: Vec<Package>) -> Self {
        let repo = Self::new(name);
        for package in packages {
            repo.seed(package);
        }
        repo
    }

    pub fn seed(&self, package: Package) {
        let package = match package.content {
            Some(_) => package,
            None => {
                let bytes = package.id.as_bytes().to_vec();
                package.with_content(bytes)
            }
        };
        self.packages.lock().unwrap().push(package);
    }

    /// Make `fetch_package` fail with a communication error for this id.
    pub fn break_package(&self, id: &str) {
        self.broken_ids.lock().unwrap().insert(normalize_id(id));
    }

    /// Make `fetch` fail with a communication error.
    pub fn break_listing(&self) {
        *self.listing_broken.lock().unwrap() = true;
    }

    /// Current contents as `id@version` strings, in storage order.
    pub fn identities(&self) -> Vec<String> {
        self.packages
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.identity().to_string())
            .collect()
    }

    pub fn contains(&self, id: &str, version: &str) -> bool {
        let wanted = PackageIdentity::new(id, version);
        self.packages
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.identity() == wanted)
    }

    /// Identities passed to `fetch_package`, in call order.
    pub fn fetched(&self) -> Vec<PackageIdentity> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn repository_type(&self) -> &str {
        "memory"
    }

    async fn fetch(&self, filter: &PackageFilter) -> RepositoryResult<Vec<Package>> {
        if *self.listing_broken.lock().unwrap() {
            return Err(RepositoryError::Communication(format!(
                "feed {} unreachable",
                self.name
            )));
        }
        let listing: Vec<Package> = self
            .packages
            .lock()
            .unwrap()
            .iter()
            .map(|p| Package {
                content: None,
                ..p.clone()
            })
            .collect();
        Ok(filter.apply(listing))
    }

    async fn fetch_package(&self, identity: &PackageIdentity) -> RepositoryResult<Option<Package>> {
        self.fetched.lock().unwrap().push(identity.clone());
        if self
            .broken_ids
            .lock()
            .unwrap()
            .contains(&normalize_id(&identity.id))
        {
            return Err(RepositoryError::Communication(format!(
                "timed out fetching {}",
                identity
            )));
        }
        Ok(self
            .packages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.identity() == *identity)
            .cloned())
    }

    async fn add(&self, package: &Package) -> RepositoryResult<()> {
        if !package.has_content() {
            return Err(RepositoryError::MissingContent(package.to_string()));
        }
        let mut packages = self.packages.lock().unwrap();
        packages.retain(|p| p != package);
        packages.push(package.clone());
        Ok(())
    }

    async fn delete(&self, package: &Package) -> RepositoryResult<()> {
        let mut packages = self.packages.lock().unwrap();
        let before = packages.len();
        packages.retain(|p| p != package);
        if packages.len() == before {
            return Err(RepositoryError::NotFound {
                id: package.id.clone(),
                version: package.version.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedCommand
// ---------------------------------------------------------------------------

/// Command whose verdict is scripted per package id.
#[derive(Debug)]
pub struct ScriptedCommand {
    command_type: String,
    settings: Settings,
    failing_ids: HashSet<String>,
    erroring_ids: HashSet<String>,
    calls: CallLog,
}

impl ScriptedCommand {
    /// Passes every package.
    pub fn passing(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            settings: Settings::new(),
            failing_ids: HashSet::new(),
            erroring_ids: HashSet::new(),
            calls: call_log(),
        }
    }

    /// Reports `result_valid = false` for the given ids.
    pub fn failing_for(command_type: impl Into<String>, ids: &[&str]) -> Self {
        let mut command = Self::passing(command_type);
        command.failing_ids = ids.iter().copied().map(normalize_id).collect();
        command
    }

    /// Returns `Err` for the given ids.
    pub fn with_error_for(mut self, ids: &[&str]) -> Self {
        self.erroring_ids = ids.iter().copied().map(normalize_id).collect();
        self
    }

    /// Record invocations into a shared log as `type:id@version`.
    pub fn with_call_log(mut self, calls: CallLog) -> Self {
        self.calls = calls;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Command for ScriptedCommand {
    fn command_type(&self) -> &str {
        &self.command_type
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn execute(&self, package: &Package, _event: PackageEvent) -> Result<CommandResult> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.command_type, package));

        let id = normalize_id(&package.id);
        if self.erroring_ids.contains(&id) {
            return Err(FeedSyncError::Command {
                command: self.command_type.clone(),
                message: format!("crashed on {}", package),
            });
        }
        if self.failing_ids.contains(&id) {
            return Ok(CommandResult::invalid(
                &self.command_type,
                format!("{} rejected", package),
            ));
        }
        Ok(CommandResult::valid(
            &self.command_type,
            format!("{} accepted", package),
        ))
    }
}

// ---------------------------------------------------------------------------
// RecordingObserver
// ---------------------------------------------------------------------------

/// Observer that keeps every event it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    name: String,
    events: Arc<Mutex<Vec<ActionEvent>>>,
}

impl RecordingObserver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<ActionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_types(&self) -> Vec<ActionEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub fn count(&self, event_type: ActionEventType) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Events emitted by one action.
    pub fn events_for(&self, action: &str) -> Vec<ActionEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Observer for RecordingObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, _action: &ActionInfo, event: &ActionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
