//! Command contract: per-package validators and transformers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::{ConfigError, Result};
use crate::package::{Package, PackageEvent};

/// Outcome of one command invocation.
///
/// `result_valid = false` is a validation failure, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub result_valid: bool,
    /// Type tag of the command that produced this result.
    pub command: String,
    pub message: String,
}

impl CommandResult {
    pub fn valid(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result_valid: true,
            command: command.into(),
            message: message.into(),
        }
    }

    pub fn invalid(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            result_valid: false,
            command: command.into(),
            message: message.into(),
        }
    }
}

/// How far a failing command's verdict propagates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FailureAction {
    /// Keep running the chain.
    #[default]
    Continue,
    /// Stop the chain and skip this package.
    FailPackage,
    /// Stop the chain and the rest of the action's phase.
    FailAction,
}

impl FailureAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureAction::Continue => "Continue",
            FailureAction::FailPackage => "FailPackage",
            FailureAction::FailAction => "FailAction",
        }
    }
}

impl std::str::FromStr for FailureAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "continue" => Ok(FailureAction::Continue),
            "failpackage" => Ok(FailureAction::FailPackage),
            "failaction" => Ok(FailureAction::FailAction),
            _ => Err(ConfigError::InvalidValue {
                field: "failure_action".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for FailureAction {
    type Error = ConfigError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FailureAction> for String {
    fn from(action: FailureAction) -> Self {
        action.as_str().to_string()
    }
}

impl std::fmt::Display for FailureAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A per-package validator or transformer.
///
/// Implementations are invoked once per package per run and must not mutate
/// the package. Report a failed check through `CommandResult`; return `Err`
/// only for infrastructure problems.
#[async_trait]
pub trait Command: Send + Sync {
    /// Registry type tag.
    fn command_type(&self) -> &str;

    /// Resolved settings this command was built from.
    fn settings(&self) -> &Settings;

    async fn execute(&self, package: &Package, event: PackageEvent) -> Result<CommandResult>;
}

/// A command paired with its configured escalation tier.
#[derive(Clone)]
pub struct ConfiguredCommand {
    pub command: Arc<dyn Command>,
    pub failure_action: FailureAction,
}

impl ConfiguredCommand {
    pub fn new(command: Arc<dyn Command>, failure_action: FailureAction) -> Self {
        Self {
            command,
            failure_action,
        }
    }
}

impl std::fmt::Debug for ConfiguredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredCommand")
            .field("command", &self.command.command_type())
            .field("failure_action", &self.failure_action)
            .finish()
    }
}
