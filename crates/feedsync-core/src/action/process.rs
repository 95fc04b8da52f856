//! Process action: validate every package of the source feed.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Action, ActionScope};
use crate::command::FailureAction;
use crate::error::Result;
use crate::package::{Package, PackageEvent};

pub struct ProcessAction {
    scope: ActionScope,
}

impl ProcessAction {
    pub fn new(scope: ActionScope) -> Self {
        Self { scope }
    }

    async fn try_process(&mut self, package: &Package, event: PackageEvent) -> Result<bool> {
        if self.scope.skip_if_ignored(package).await {
            return Ok(true);
        }
        self.scope.stats.processed += 1;

        let source = self.scope.source.clone();
        let full = self.scope.fetch_content(source.as_ref(), package).await?;

        match self.scope.process_commands(&full, event).await? {
            FailureAction::Continue => {
                self.scope
                    .report_success(&full, format!("{} passed all commands", full))
                    .await;
                Ok(true)
            }
            verdict => Ok(self.scope.report_rejection(&full, verdict).await),
        }
    }
}

#[async_trait]
impl Action for ProcessAction {
    fn scope(&self) -> &ActionScope {
        &self.scope
    }

    async fn run(&mut self) -> Result<()> {
        let source = self.scope.source.clone();
        let packages = self.scope.get_packages(source.as_ref()).await?;

        for (index, package) in packages.iter().enumerate() {
            if !self.process_package(package, PackageEvent::Processed).await? {
                warn!(
                    action = %self.scope.name(),
                    skipped = packages.len() - index - 1,
                    "Action stopped; remaining packages skipped"
                );
                break;
            }
        }

        info!(action = %self.scope.name(), stats = ?self.scope.stats, "Process action finished");
        Ok(())
    }

    async fn process_package(&mut self, package: &Package, event: PackageEvent) -> Result<bool> {
        match self.try_process(package, event).await {
            Ok(keep_going) => Ok(keep_going),
            Err(err) => self.scope.handle_package_error(package, err).await,
        }
    }
}
