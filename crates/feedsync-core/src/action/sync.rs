//! Sync action: mirror the source feed into the target feed.
//!
//! Adds run through the command chain and a `FailAction` verdict skips the
//! remaining adds and the delete phase. Deletes walk the whole orphan list no
//! matter how individual deletes turn out. By default deletes bypass the
//! command chain; `validate_deletes` routes them through it first, and any
//! rejection there keeps the package without stopping the action.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Action, ActionScope};
use crate::command::FailureAction;
use crate::error::{ConfigError, Result};
use crate::package::{difference, Package, PackageEvent};
use crate::repository::Repository;

pub struct SyncAction {
    scope: ActionScope,
    target: Arc<dyn Repository>,
}

impl SyncAction {
    pub fn new(scope: ActionScope) -> Result<Self> {
        let target = scope.target.clone().ok_or_else(|| ConfigError::MissingTargetFeed {
            action: scope.config.name.clone(),
        })?;
        Ok(Self { scope, target })
    }

    async fn add_package(&mut self, package: &Package, event: PackageEvent) -> Result<bool> {
        if self.scope.skip_if_ignored(package).await {
            return Ok(true);
        }
        self.scope.stats.processed += 1;

        let source = self.scope.source.clone();
        let full = self.scope.fetch_content(source.as_ref(), package).await?;

        match self.scope.process_commands(&full, event).await? {
            FailureAction::Continue => {
                let copy = full.clone();
                self.target.add(&copy).await?;
                self.scope.stats.added += 1;
                info!(action = %self.scope.name(), package = %copy, target = %self.target.name(), "Package added");
                self.scope
                    .report_success(&copy, format!("{} added to {}", copy, self.target.name()))
                    .await;
                Ok(true)
            }
            verdict => Ok(self.scope.report_rejection(&full, verdict).await),
        }
    }

    async fn delete_package(&mut self, package: &Package) -> Result<bool> {
        self.scope.stats.processed += 1;

        if self.scope.config.validate_deletes {
            let verdict = self
                .scope
                .process_commands(package, PackageEvent::Deleted)
                .await?;
            if verdict != FailureAction::Continue {
                // The delete phase never stops, so every rejection is package-level.
                if verdict == FailureAction::FailAction {
                    debug!(action = %self.scope.name(), package = %package, "FailAction on delete treated as FailPackage");
                }
                return Ok(self
                    .scope
                    .report_rejection(package, FailureAction::FailPackage)
                    .await);
            }
        }

        self.target.delete(package).await?;
        self.scope.stats.deleted += 1;
        info!(action = %self.scope.name(), package = %package, target = %self.target.name(), "Package deleted");
        self.scope
            .report_success(package, format!("{} deleted from {}", package, self.target.name()))
            .await;
        Ok(true)
    }
}

#[async_trait]
impl Action for SyncAction {
    fn scope(&self) -> &ActionScope {
        &self.scope
    }

    async fn run(&mut self) -> Result<()> {
        let source_repo = self.scope.source.clone();
        let target_repo = self.target.clone();
        let source = self.scope.get_packages(source_repo.as_ref()).await?;
        let target = self.scope.get_packages(target_repo.as_ref()).await?;

        let to_add = difference(&source, &target);
        info!(action = %self.scope.name(), count = to_add.len(), "Packages to add");

        for (index, package) in to_add.iter().enumerate() {
            if !self.process_package(package, PackageEvent::Added).await? {
                warn!(
                    action = %self.scope.name(),
                    skipped_adds = to_add.len() - index - 1,
                    "Action stopped; remaining adds and delete phase skipped"
                );
                return Ok(());
            }
        }

        if !self.scope.config.delete_from_target {
            info!(action = %self.scope.name(), stats = ?self.scope.stats, "Sync action finished");
            return Ok(());
        }

        let to_delete = difference(&target, &source);
        info!(action = %self.scope.name(), count = to_delete.len(), "Packages to delete");

        for package in &to_delete {
            // Delete outcomes never stop the phase.
            self.process_package(package, PackageEvent::Deleted).await?;
        }

        info!(action = %self.scope.name(), stats = ?self.scope.stats, "Sync action finished");
        Ok(())
    }

    async fn process_package(&mut self, package: &Package, event: PackageEvent) -> Result<bool> {
        let outcome = match event {
            PackageEvent::Deleted => self.delete_package(package).await,
            _ => self.add_package(package, event).await,
        };
        match outcome {
            Ok(keep_going) => Ok(keep_going),
            Err(err) => self.scope.handle_package_error(package, err).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::command::ConfiguredCommand;
    use crate::config::{ActionConfig, ActionKind};
    use crate::fakes::{call_log, MemoryRepository, RecordingObserver, ScriptedCommand};
    use crate::observer::{ActionEventType, ActionInfo, Observer, ObserverManager};

    struct Fixture {
        source: Arc<MemoryRepository>,
        target: Arc<MemoryRepository>,
        observer: RecordingObserver,
    }

    impl Fixture {
        fn new(source: &[(&str, &str)], target: &[(&str, &str)]) -> Self {
            fn to_packages(list: &[(&str, &str)]) -> Vec<Package> {
                list.iter().map(|(id, v)| Package::new(*id, *v)).collect()
            }
            Self {
                source: Arc::new(MemoryRepository::with_packages("source", to_packages(source))),
                target: Arc::new(MemoryRepository::with_packages("target", to_packages(target))),
                observer: RecordingObserver::new("rec"),
            }
        }

        fn action(
            &self,
            commands: Vec<ConfiguredCommand>,
            tweak: impl FnOnce(&mut ActionConfig),
        ) -> SyncAction {
            let mut config = ActionConfig::new("mirror", ActionKind::Sync, "source", Some("target"));
            tweak(&mut config);
            let info = ActionInfo {
                name: "mirror".to_string(),
                action_type: "sync".to_string(),
                source_feed: "source".to_string(),
                target_feed: Some("target".to_string()),
            };
            let observers = ObserverManager::new(
                info,
                vec![Arc::new(self.observer.clone()) as Arc<dyn Observer>],
            );
            let scope = ActionScope::new(
                config,
                self.source.clone(),
                Some(self.target.clone() as Arc<dyn Repository>),
                commands,
                observers,
            )
            .unwrap();
            SyncAction::new(scope).unwrap()
        }
    }

    fn sorted(mut ids: Vec<String>) -> Vec<String> {
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_sync_without_delete_keeps_orphans() {
        let fx = Fixture::new(&[("A", "1.0"), ("B", "1.0")], &[("B", "1.0"), ("C", "1.0")]);
        let mut action = fx.action(Vec::new(), |_| {});

        action.run().await.unwrap();

        assert_eq!(
            sorted(fx.target.identities()),
            vec!["A@1.0".to_string(), "B@1.0".to_string(), "C@1.0".to_string()]
        );
        assert_eq!(action.scope().stats.added, 1);
        assert_eq!(action.scope().stats.deleted, 0);
    }

    #[tokio::test]
    async fn test_sync_with_delete_removes_orphans() {
        let fx = Fixture::new(&[("A", "1.0"), ("B", "1.0")], &[("B", "1.0"), ("C", "1.0")]);
        let mut action = fx.action(Vec::new(), |c| c.delete_from_target = true);

        action.run().await.unwrap();

        assert_eq!(
            sorted(fx.target.identities()),
            vec!["A@1.0".to_string(), "B@1.0".to_string()]
        );
        assert_eq!(action.scope().stats.deleted, 1);
    }

    #[tokio::test]
    async fn test_added_package_carries_content() {
        let fx = Fixture::new(&[("A", "1.0")], &[]);
        let mut action = fx.action(Vec::new(), |_| {});

        action.run().await.unwrap();

        let copied = fx
            .target
            .fetch_package(&Package::new("a", "1.0").identity())
            .await
            .unwrap()
            .expect("copied");
        assert_eq!(copied.content, Some(b"A".to_vec()));
    }

    #[tokio::test]
    async fn test_rejected_package_not_added() {
        let fx = Fixture::new(&[("A", "1.0"), ("B", "1.0")], &[]);
        let commands = vec![ConfiguredCommand::new(
            Arc::new(ScriptedCommand::failing_for("check", &["A"])),
            FailureAction::FailPackage,
        )];
        let mut action = fx.action(commands, |_| {});

        action.run().await.unwrap();

        assert_eq!(fx.target.identities(), vec!["B@1.0".to_string()]);
        assert_eq!(fx.observer.count(ActionEventType::ActionPackageFailed), 1);
    }

    #[tokio::test]
    async fn test_fail_action_skips_adds_and_deletes() {
        let fx = Fixture::new(
            &[("A", "1.0"), ("B", "1.0"), ("C", "1.0")],
            &[("Orphan", "1.0")],
        );
        let log = call_log();
        let commands = vec![ConfiguredCommand::new(
            Arc::new(ScriptedCommand::failing_for("gate", &["B"]).with_call_log(log.clone())),
            FailureAction::FailAction,
        )];
        let mut action = fx.action(commands, |c| c.delete_from_target = true);

        action.run().await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["gate:A@1.0".to_string(), "gate:B@1.0".to_string()]
        );
        assert!(fx.target.contains("Orphan", "1.0"));
        assert!(!fx.target.contains("C", "1.0"));
        assert_eq!(fx.observer.count(ActionEventType::ActionFailed), 1);
    }

    #[tokio::test]
    async fn test_deletes_bypass_commands_by_default() {
        let fx = Fixture::new(&[], &[("Old", "1.0")]);
        let log = call_log();
        let commands = vec![ConfiguredCommand::new(
            Arc::new(ScriptedCommand::failing_for("gate", &["Old"]).with_call_log(log.clone())),
            FailureAction::FailAction,
        )];
        let mut action = fx.action(commands, |c| c.delete_from_target = true);

        action.run().await.unwrap();

        assert!(log.lock().unwrap().is_empty());
        assert!(fx.target.identities().is_empty());
    }

    #[tokio::test]
    async fn test_validate_deletes_runs_chain() {
        let fx = Fixture::new(&[], &[("Keep", "1.0"), ("Drop", "1.0")]);
        let log = call_log();
        let commands = vec![ConfiguredCommand::new(
            Arc::new(ScriptedCommand::failing_for("gate", &["Keep"]).with_call_log(log.clone())),
            FailureAction::FailAction,
        )];
        let mut action = fx.action(commands, |c| {
            c.delete_from_target = true;
            c.validate_deletes = true;
        });

        action.run().await.unwrap();

        // FailAction on a delete does not stop the delete phase.
        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(fx.target.identities(), vec!["Keep@1.0".to_string()]);
        assert!(!action.scope().stats.stopped);
        assert_eq!(action.scope().stats.failed, 1);
        assert_eq!(fx.observer.count(ActionEventType::ActionPackageFailed), 1);
        assert_eq!(fx.observer.count(ActionEventType::ActionFailed), 0);
    }

    #[tokio::test]
    async fn test_delete_failures_do_not_stop_phase() {
        let fx = Fixture::new(&[], &[("X", "1.0"), ("Y", "1.0")]);
        let mut action = fx.action(Vec::new(), |c| c.delete_from_target = true);

        // Delete X out from under the action so its delete reports NotFound.
        let ghost = Package::new("X", "1.0");
        let packages = action
            .scope()
            .get_packages(fx.target.as_ref())
            .await
            .unwrap();
        fx.target.delete(&ghost).await.unwrap();
        for package in &packages {
            let keep_going = action
                .process_package(package, PackageEvent::Deleted)
                .await
                .unwrap();
            assert!(keep_going);
        }

        assert!(fx.target.identities().is_empty());
        assert_eq!(action.scope().stats.errors, 1);
        assert_eq!(action.scope().stats.deleted, 1);
    }

    #[tokio::test]
    async fn test_ignored_package_not_added() {
        let fx = Fixture::new(&[("Foo", "2.0"), ("Bar", "1.0")], &[]);
        let log = call_log();
        let commands = vec![ConfiguredCommand::new(
            Arc::new(ScriptedCommand::passing("check").with_call_log(log.clone())),
            FailureAction::Continue,
        )];
        let mut action = fx.action(commands, |c| c.packages_to_ignore = vec!["FOO".to_string()]);

        action.run().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["check:Bar@1.0".to_string()]);
        assert_eq!(fx.target.identities(), vec!["Bar@1.0".to_string()]);
        assert_eq!(fx.observer.count(ActionEventType::ActionPackageIgnored), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_escapes_run() {
        let fx = Fixture::new(&[("A", "1.0")], &[]);
        fx.target.break_listing();
        let mut action = fx.action(Vec::new(), |_| {});

        assert!(action.run().await.is_err());
    }
}
