//! Actions: the configured units of work.
//!
//! Both variants share an [`ActionScope`] by composition. The scope owns
//! everything resolved for one execution (repositories, the command chain,
//! the observer list, running counters) and the helpers common to both
//! variants: the ignore check, the filtered listing, the command-chain runner
//! and per-package error containment.

mod process;
mod sync;

pub use process::ProcessAction;
pub use sync::SyncAction;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::command::{ConfiguredCommand, FailureAction};
use crate::config::{ActionConfig, ActionKind, AppConfig, FeedConfig, Settings};
use crate::error::{ConfigError, FeedSyncError, RepositoryError, Result};
use crate::observer::{ActionEvent, ActionEventType, ActionInfo, ObserverManager};
use crate::package::{normalize_id, Package, PackageEvent};
use crate::registry::Registry;
use crate::repository::Repository;

/// A runnable action.
#[async_trait]
pub trait Action: Send + Sync {
    fn scope(&self) -> &ActionScope;

    /// Run the action over its feeds.
    ///
    /// Errors returned here are per-action failures: listing failures, or
    /// per-package failures re-raised because `fail_on_error` is set.
    async fn run(&mut self) -> Result<()>;

    /// Handle one package. Returns `false` when the action must stop.
    async fn process_package(&mut self, package: &Package, event: PackageEvent) -> Result<bool>;
}

/// Running counters for one action execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionStats {
    /// Packages that reached the command chain or a repository mutation.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub ignored: usize,
    pub added: usize,
    pub deleted: usize,
    /// Infrastructure errors contained at package level.
    pub errors: usize,
    /// A command escalated to `FailAction`.
    pub stopped: bool,
}

/// Everything resolved for one action execution.
pub struct ActionScope {
    pub config: ActionConfig,
    pub kind: ActionKind,
    pub source: Arc<dyn Repository>,
    pub target: Option<Arc<dyn Repository>>,
    pub commands: Vec<ConfiguredCommand>,
    pub observers: ObserverManager,
    /// `custom_settings` merged with the action's settings group.
    pub custom_settings: Settings,
    pub stats: ActionStats,
}

impl ActionScope {
    /// Assemble a scope from already-resolved parts.
    pub fn new(
        config: ActionConfig,
        source: Arc<dyn Repository>,
        target: Option<Arc<dyn Repository>>,
        commands: Vec<ConfiguredCommand>,
        observers: ObserverManager,
    ) -> Result<Self> {
        let kind = config.kind()?;
        if kind == ActionKind::Sync && target.is_none() {
            return Err(ConfigError::MissingTargetFeed {
                action: config.name.clone(),
            }
            .into());
        }
        let custom_settings = config.custom_settings.clone();
        Ok(Self {
            config,
            kind,
            source,
            target,
            commands,
            observers,
            custom_settings,
            stats: ActionStats::default(),
        })
    }

    /// Resolve an action's feeds, commands and observers through the registry.
    ///
    /// Every configuration problem surfaces here, before any package is read.
    pub fn build(app: &AppConfig, action: &ActionConfig, registry: &Registry) -> Result<Self> {
        let kind = action.kind()?;

        let source_feed = find_feed(app, action, &action.source_feed)?;
        let source = create_repository(app, registry, source_feed)?;

        let target = match (kind, action.target_feed.as_deref()) {
            (ActionKind::Sync, Some(name)) => {
                let feed = find_feed(app, action, name)?;
                Some(create_repository(app, registry, feed)?)
            }
            (ActionKind::Sync, None) => {
                return Err(ConfigError::MissingTargetFeed {
                    action: action.name.clone(),
                }
                .into())
            }
            (ActionKind::Process, _) => None,
        };

        let mut commands = Vec::with_capacity(action.commands.len());
        for command in &action.commands {
            let settings =
                app.resolve_settings(&command.settings, command.settings_group.as_deref())?;
            let instance = registry.create_command(&command.command_type, &settings)?;
            commands.push(ConfiguredCommand::new(instance, command.failure_action));
        }

        let mut observers = Vec::with_capacity(action.observers.len());
        for observer in &action.observers {
            let settings =
                app.resolve_settings(&observer.settings, observer.settings_group.as_deref())?;
            observers.push(registry.create_observer(
                &observer.observer_type,
                observer.display_name(),
                &settings,
            )?);
        }

        let info = ActionInfo {
            name: action.name.clone(),
            action_type: kind.as_str().to_string(),
            source_feed: source_feed.name.clone(),
            target_feed: action.target_feed.clone(),
        };

        let mut scope = Self::new(
            action.clone(),
            source,
            target,
            commands,
            ObserverManager::new(info, observers),
        )?;
        scope.custom_settings =
            app.resolve_settings(&action.custom_settings, action.settings_group.as_deref())?;

        debug!(
            action = %action.name,
            commands = scope.commands.len(),
            observers = scope.observers.len(),
            "Action scope built"
        );
        Ok(scope)
    }

    /// Turn the scope into the action variant its kind names.
    pub fn into_action(self) -> Result<Box<dyn Action>> {
        match self.kind {
            ActionKind::Process => Ok(Box::new(ProcessAction::new(self))),
            ActionKind::Sync => Ok(Box::new(SyncAction::new(self)?)),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// True iff `id` matches an ignore-list entry case-insensitively.
    pub fn ignore_package(&self, id: &str) -> bool {
        let id = normalize_id(id);
        self.config
            .packages_to_ignore
            .iter()
            .any(|ignored| normalize_id(ignored) == id)
    }

    /// List a repository through the action's filter toggles.
    pub async fn get_packages(&self, repository: &dyn Repository) -> Result<Vec<Package>> {
        let filter = self.config.filter();
        let packages = repository.fetch(&filter).await?;
        info!(
            action = %self.config.name,
            feed = %repository.name(),
            count = packages.len(),
            only_latest = filter.only_latest_version,
            prerelease = filter.include_prerelease,
            "Fetched package listing"
        );
        Ok(packages)
    }

    /// Fetch a package with content, treating absence as an error.
    pub async fn fetch_content(
        &self,
        repository: &dyn Repository,
        package: &Package,
    ) -> Result<Package> {
        let identity = package.identity();
        repository
            .fetch_package(&identity)
            .await?
            .ok_or_else(|| {
                RepositoryError::NotFound {
                    id: identity.id.clone(),
                    version: identity.version.clone(),
                }
                .into()
            })
    }

    /// Run the command chain in declared order.
    ///
    /// A failing command whose tier is `FailPackage` or `FailAction` stops the
    /// chain and its tier is returned. `Continue`-tier failures move on.
    pub async fn process_commands(
        &self,
        package: &Package,
        event: PackageEvent,
    ) -> Result<FailureAction> {
        for configured in &self.commands {
            let command_type = configured.command.command_type();
            let result = configured.command.execute(package, event).await?;

            if result.result_valid {
                debug!(action = %self.config.name, package = %package, command = %command_type, "Command passed");
                self.emit(
                    self.event(ActionEventType::ActionCommandSuccess, result.message)
                        .with_command(command_type)
                        .with_package(package),
                )
                .await;
                continue;
            }

            warn!(
                action = %self.config.name,
                package = %package,
                command = %command_type,
                failure_action = %configured.failure_action,
                message = %result.message,
                "Command failed"
            );
            self.emit(
                self.event(ActionEventType::ActionCommandFailed, result.message)
                    .with_command(command_type)
                    .with_package(package),
            )
            .await;

            match configured.failure_action {
                FailureAction::Continue => {}
                tier => return Ok(tier),
            }
        }
        Ok(FailureAction::Continue)
    }

    /// Short-circuit for ignored packages. Returns true when the package was skipped.
    pub async fn skip_if_ignored(&mut self, package: &Package) -> bool {
        if !self.ignore_package(&package.id) {
            return false;
        }
        info!(action = %self.config.name, package = %package, "Package ignored");
        self.stats.ignored += 1;
        self.emit(
            self.event(ActionEventType::ActionPackageIgnored, format!("{} is on the ignore list", package))
                .with_package(package),
        )
        .await;
        true
    }

    pub async fn report_success(&mut self, package: &Package, message: impl Into<String>) {
        self.stats.succeeded += 1;
        self.emit(
            self.event(ActionEventType::ActionPackageSuccess, message)
                .with_package(package),
        )
        .await;
    }

    /// Report a non-`Continue` chain verdict. Returns whether the action goes on.
    pub async fn report_rejection(&mut self, package: &Package, verdict: FailureAction) -> bool {
        self.stats.failed += 1;
        match verdict {
            FailureAction::FailAction => {
                self.stats.stopped = true;
                warn!(action = %self.config.name, package = %package, "Command chain failed the action");
                self.emit(
                    self.event(
                        ActionEventType::ActionFailed,
                        format!("{} failed validation; stopping action", package),
                    )
                    .with_package(package),
                )
                .await;
                false
            }
            _ => {
                info!(action = %self.config.name, package = %package, "Package failed validation");
                self.emit(
                    self.event(
                        ActionEventType::ActionPackageFailed,
                        format!("{} failed validation", package),
                    )
                    .with_package(package),
                )
                .await;
                true
            }
        }
    }

    /// Contain or re-raise an infrastructure error for one package.
    pub async fn handle_package_error(
        &mut self,
        package: &Package,
        err: FeedSyncError,
    ) -> Result<bool> {
        if self.config.fail_on_error {
            error!(action = %self.config.name, package = %package, error = %err, "Package processing failed");
            return Err(err);
        }
        warn!(action = %self.config.name, package = %package, error = %err, "Package processing failed; continuing");
        self.stats.failed += 1;
        self.stats.errors += 1;
        self.emit(
            self.event(ActionEventType::ActionPackageFailed, err.to_string())
                .with_package(package),
        )
        .await;
        Ok(true)
    }

    /// New event stamped with this action's name.
    pub fn event(&self, event_type: ActionEventType, message: impl Into<String>) -> ActionEvent {
        ActionEvent::new(event_type, self.config.name.clone(), message)
    }

    pub async fn emit(&self, event: ActionEvent) {
        self.observers.notify_observers(&event).await;
    }
}

fn find_feed<'a>(app: &'a AppConfig, action: &ActionConfig, name: &str) -> Result<&'a FeedConfig> {
    app.feed(name).ok_or_else(|| {
        ConfigError::MissingFeed {
            action: action.name.clone(),
            feed: name.to_string(),
        }
        .into()
    })
}

fn create_repository(
    app: &AppConfig,
    registry: &Registry,
    feed: &FeedConfig,
) -> Result<Arc<dyn Repository>> {
    let settings = app.resolve_settings(&feed.settings, feed.settings_group.as_deref())?;
    registry.create_repository(&feed.repository_type, &feed.name, &settings)
}
