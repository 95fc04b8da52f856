//! Error types for feedsync-core

use thiserror::Error;

/// Registry category a type name is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryCategory {
    Action,
    Command,
    Observer,
    Repository,
}

impl std::fmt::Display for FactoryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FactoryCategory::Action => "action",
            FactoryCategory::Command => "command",
            FactoryCategory::Observer => "observer",
            FactoryCategory::Repository => "repository",
        };
        write!(f, "{}", s)
    }
}

/// Errors raised while resolving configuration into runnable objects.
///
/// These are raised before any package is touched and always abort the batch.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown {category} type: {name}")]
    UnknownType {
        category: FactoryCategory,
        name: String,
    },

    #[error("Action '{action}' references unknown feed '{feed}'")]
    MissingFeed { action: String, feed: String },

    #[error("Action '{action}' requires a target feed")]
    MissingTargetFeed { action: String },

    #[error("Settings group not found: {0}")]
    MissingSettingsGroup(String),

    #[error("Invalid setting '{key}': {message}")]
    InvalidSetting { key: String, message: String },

    #[error("Missing required setting '{key}' for {owner}")]
    MissingSetting { owner: String, key: String },

    #[error("Duplicate action name: {0}")]
    DuplicateAction(String),

    #[error("Invalid value '{value}' for {field}")]
    InvalidValue { field: String, value: String },
}

/// Errors reported by repository backends.
///
/// `NotFound` and `Communication` are kept apart so callers can tell a missing
/// package from an unreachable feed.
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Package not found: {id} {version}")]
    NotFound { id: String, version: String },

    #[error("Feed communication failed: {0}")]
    Communication(String),

    #[error("Package {0} has no content to publish")]
    MissingContent(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for engine operations.
#[derive(Error, Debug)]
pub enum FeedSyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FeedSyncError {
    /// Configuration errors abort a whole batch; everything else is contained.
    pub fn is_config_error(&self) -> bool {
        matches!(self, FeedSyncError::Config(_))
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, FeedSyncError>;
