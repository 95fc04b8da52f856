//! Top-level driver: selects configured actions and runs them one at a time.
//!
//! Each action gets its own scope. A failure escaping an action is logged and
//! reported; the batch moves on to the next action. Configuration errors are
//! the exception and abort the batch.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Instrument};

use crate::action::{ActionScope, ActionStats};
use crate::config::{ActionConfig, AppConfig};
use crate::error::Result;
use crate::observer::ActionEventType;
use crate::registry::Registry;
use crate::telemetry::action_span;

/// How an action execution ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum ActionStatus {
    /// Ran to the end of its package set.
    Completed,
    /// A command escalated to `FailAction`.
    Stopped,
    /// An error escaped `run()`.
    Failed(String),
}

/// Result of one action execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub name: String,
    pub action_type: String,
    #[serde(flatten)]
    pub status: ActionStatus,
    pub stats: ActionStats,
    pub duration_ms: u64,
}

/// Result of a complete batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<ActionOutcome>,
}

impl BatchReport {
    pub fn outcome(&self, name: &str) -> Option<&ActionOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ActionStatus::Failed(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

pub struct ActionProcessor {
    config: Arc<AppConfig>,
    registry: Arc<Registry>,
}

impl ActionProcessor {
    pub fn new(config: Arc<AppConfig>, registry: Arc<Registry>) -> Self {
        Self { config, registry }
    }

    /// Pick the actions to run.
    ///
    /// No names selects every enabled action. Names match case-insensitively;
    /// unmatched names are logged and skipped.
    pub fn select(&self, names: &[String]) -> Vec<&ActionConfig> {
        if names.is_empty() {
            return self.config.actions.iter().filter(|a| a.enabled).collect();
        }

        for name in names {
            if !self
                .config
                .actions
                .iter()
                .any(|a| a.name.eq_ignore_ascii_case(name))
            {
                warn!(action = %name, "Requested action is not configured");
            }
        }

        self.config
            .actions
            .iter()
            .filter(|a| names.iter().any(|n| a.name.eq_ignore_ascii_case(n)))
            .collect()
    }

    /// Run the selected actions in configuration order.
    ///
    /// Returns `Err` only for configuration errors. Any other error, including
    /// one raised while a factory builds a feed, command or observer, fails
    /// that action alone.
    pub async fn execute(&self, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::default();

        if self.config.actions.is_empty() {
            info!("No actions configured");
            return Ok(report);
        }

        let selected = self.select(names);
        if selected.is_empty() {
            if names.is_empty() {
                info!("No enabled actions");
            } else {
                info!(requested = ?names, "No configured action matches the requested names");
            }
            return Ok(report);
        }

        info!(count = selected.len(), "Running actions");
        for action in selected {
            let span = action_span(&action.name, &action.action_type);
            let outcome = self.run_action(action).instrument(span).await?;
            report.outcomes.push(outcome);
        }

        info!(
            actions = report.outcomes.len(),
            failed = report.failed_count(),
            "Batch finished"
        );
        Ok(report)
    }

    async fn run_action(&self, config: &ActionConfig) -> Result<ActionOutcome> {
        let start = Instant::now();
        let action_type = config.kind()?.as_str().to_string();
        let scope = match ActionScope::build(&self.config, config, &self.registry) {
            Ok(scope) => scope,
            Err(err) if err.is_config_error() => return Err(err),
            Err(err) => {
                // A factory hit a runtime fault; no observers exist yet to notify.
                error!(
                    action = %config.name,
                    action_type = %action_type,
                    error = %err,
                    "Action could not be prepared"
                );
                return Ok(ActionOutcome {
                    name: config.name.clone(),
                    action_type,
                    status: ActionStatus::Failed(err.to_string()),
                    stats: ActionStats::default(),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
        };
        let mut action = scope.into_action()?;

        info!(action = %config.name, action_type = %action_type, "Action started");
        let started = action
            .scope()
            .event(ActionEventType::ActionStarted, format!("{} started", config.name));
        action.scope().emit(started).await;

        let status = match action.run().await {
            Ok(()) => {
                let completed = action.scope().event(
                    ActionEventType::ActionCompleted,
                    format!("{} completed", config.name),
                );
                action.scope().emit(completed).await;
                if action.scope().stats.stopped {
                    ActionStatus::Stopped
                } else {
                    ActionStatus::Completed
                }
            }
            Err(err) => {
                error!(
                    action = %config.name,
                    action_type = %action_type,
                    error = %err,
                    "Action failed"
                );
                let failed = action
                    .scope()
                    .event(ActionEventType::ActionFailed, err.to_string());
                action.scope().emit(failed).await;
                ActionStatus::Failed(err.to_string())
            }
        };

        let outcome = ActionOutcome {
            name: config.name.clone(),
            action_type,
            status,
            stats: action.scope().stats.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(action = %outcome.name, status = ?outcome.status, duration_ms = outcome.duration_ms, "Action finished");
        Ok(outcome)
    }
}
