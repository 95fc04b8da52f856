//! feedsync-core: the package feed execution engine
//!
//! Loads configured actions, resolves their feeds, commands and observers
//! through a [`Registry`], and runs them one at a time.
//!
//! ## Key Components
//!
//! - [`ActionProcessor`]: selects and runs actions, isolating failures per action
//! - [`ProcessAction`] / [`SyncAction`]: validate a feed, or mirror one feed into another
//! - [`Command`]: a validation step with a [`FailureAction`] tier
//! - [`ObserverManager`]: fans action events out to observers
//! - [`difference`]: order-preserving package set difference

pub mod action;
pub mod command;
pub mod config;
mod error;
pub mod fakes;
pub mod observer;
pub mod package;
pub mod processor;
pub mod registry;
pub mod repository;
pub mod telemetry;

pub use action::{Action, ActionScope, ActionStats, ProcessAction, SyncAction};
pub use command::{Command, CommandResult, ConfiguredCommand, FailureAction};
pub use config::{
    merge_settings, parse_setting, require_setting, ActionConfig, ActionKind, AppConfig,
    CommandConfig, FeedConfig, ObserverConfig, Settings, SettingsGroup,
};
pub use error::{ConfigError, FactoryCategory, FeedSyncError, RepositoryError, Result};
pub use observer::{ActionEvent, ActionEventType, ActionInfo, EventId, Observer, ObserverManager};
pub use package::{
    compare_versions, difference, is_prerelease_version, is_valid_version, normalize_id, Package,
    PackageEvent, PackageIdentity,
};
pub use processor::{ActionOutcome, ActionProcessor, ActionStatus, BatchReport};
pub use registry::Registry;
pub use repository::{PackageFilter, Repository, RepositoryResult};
