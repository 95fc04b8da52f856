//! Configuration model consumed by the engine.
//!
//! The model is plain data deserialized with serde. Settings at feed, action,
//! command and observer level can name a shared settings group; merging keeps
//! local keys and only fills keys that are absent locally.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::command::FailureAction;
use crate::error::{ConfigError, FactoryCategory, Result};
use crate::repository::PackageFilter;

/// Key-value settings, ordered for stable output.
pub type Settings = BTreeMap<String, String>;

/// Merge a shared group into local settings. Local keys win.
pub fn merge_settings(local: &Settings, group: &Settings) -> Settings {
    let mut merged = local.clone();
    for (key, value) in group {
        merged.entry(key.clone()).or_insert_with(|| value.clone());
    }
    merged
}

/// Look up a required setting.
pub fn require_setting<'a>(
    settings: &'a Settings,
    owner: &str,
    key: &str,
) -> std::result::Result<&'a str, ConfigError> {
    settings
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingSetting {
            owner: owner.to_string(),
            key: key.to_string(),
        })
}

/// Parse an optional setting, reporting malformed values as configuration errors.
pub fn parse_setting<T>(settings: &Settings, key: &str) -> std::result::Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match settings.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidSetting {
                key: key.to_string(),
                message: format!("'{}': {}", raw, e),
            }),
    }
}

// ---------------------------------------------------------------------------
// Action kinds
// ---------------------------------------------------------------------------

/// The closed set of action variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Validate every package of the source feed.
    Process,
    /// Mirror the source feed into the target feed.
    Sync,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Process => "process",
            ActionKind::Sync => "sync",
        }
    }

    /// Resolve a configured type name (case-insensitive).
    pub fn resolve(name: &str) -> std::result::Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(ActionKind::Process),
            "sync" => Ok(ActionKind::Sync),
            _ => Err(ConfigError::UnknownType {
                category: FactoryCategory::Action,
                name: name.to_string(),
            }),
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Config sections
// ---------------------------------------------------------------------------

/// A named, shared settings bundle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsGroup {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
}

/// A package feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub repository_type: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub settings_group: Option<String>,
}

/// One entry of an action's command chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub failure_action: FailureAction,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub settings_group: Option<String>,
}

impl CommandConfig {
    pub fn new(command_type: impl Into<String>, failure_action: FailureAction) -> Self {
        Self {
            command_type: command_type.into(),
            failure_action,
            settings: Settings::new(),
            settings_group: None,
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// An observer attached to an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(rename = "type")]
    pub observer_type: String,
    /// Display name; defaults to the type.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub settings_group: Option<String>,
}

impl ObserverConfig {
    pub fn new(observer_type: impl Into<String>) -> Self {
        Self {
            observer_type: observer_type.into(),
            name: None,
            settings: Settings::new(),
            settings_group: None,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.observer_type)
    }
}

fn default_true() -> bool {
    true
}

/// One configured unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub source_feed: String,
    #[serde(default)]
    pub target_feed: Option<String>,
    #[serde(default)]
    pub fail_on_error: bool,
    #[serde(default)]
    pub only_latest_version: bool,
    #[serde(default)]
    pub include_prerelease: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub packages_to_ignore: Vec<String>,
    #[serde(default)]
    pub commands: Vec<CommandConfig>,
    #[serde(default)]
    pub observers: Vec<ObserverConfig>,
    #[serde(default)]
    pub custom_settings: Settings,
    #[serde(default)]
    pub settings_group: Option<String>,
    /// Sync only: remove target packages missing from the source.
    #[serde(default)]
    pub delete_from_target: bool,
    /// Sync only: run the command chain before deleting. Off by default, in
    /// which case deletes bypass the chain.
    #[serde(default)]
    pub validate_deletes: bool,
}

impl ActionConfig {
    pub fn new(
        name: impl Into<String>,
        kind: ActionKind,
        source_feed: impl Into<String>,
        target_feed: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            action_type: kind.as_str().to_string(),
            source_feed: source_feed.into(),
            target_feed: target_feed.map(str::to_string),
            fail_on_error: false,
            only_latest_version: false,
            include_prerelease: false,
            enabled: true,
            packages_to_ignore: Vec::new(),
            commands: Vec::new(),
            observers: Vec::new(),
            custom_settings: Settings::new(),
            settings_group: None,
            delete_from_target: false,
            validate_deletes: false,
        }
    }

    pub fn filter(&self) -> PackageFilter {
        PackageFilter::new(self.only_latest_version, self.include_prerelease)
    }

    pub fn kind(&self) -> std::result::Result<ActionKind, ConfigError> {
        ActionKind::resolve(&self.action_type)
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default)]
    pub settings_groups: Vec<SettingsGroup>,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Find a feed by name (case-insensitive).
    pub fn feed(&self, name: &str) -> Option<&FeedConfig> {
        self.feeds.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Find a settings group by name (case-insensitive).
    pub fn settings_group(&self, name: &str) -> std::result::Result<&Settings, ConfigError> {
        self.settings_groups
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
            .map(|g| &g.settings)
            .ok_or_else(|| ConfigError::MissingSettingsGroup(name.to_string()))
    }

    /// Local settings merged with their optional group.
    pub fn resolve_settings(
        &self,
        local: &Settings,
        group: Option<&str>,
    ) -> std::result::Result<Settings, ConfigError> {
        match group {
            Some(name) => Ok(merge_settings(local, self.settings_group(name)?)),
            None => Ok(local.clone()),
        }
    }

    /// Check references and names without touching any feed.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for feed in &self.feeds {
            self.resolve_settings(&feed.settings, feed.settings_group.as_deref())?;
        }

        let mut names = HashSet::new();
        for action in &self.actions {
            if !names.insert(action.name.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateAction(action.name.clone()));
            }

            let kind = action.kind()?;

            if self.feed(&action.source_feed).is_none() {
                return Err(ConfigError::MissingFeed {
                    action: action.name.clone(),
                    feed: action.source_feed.clone(),
                });
            }

            match (&action.target_feed, kind) {
                (Some(target), _) if self.feed(target).is_none() => {
                    return Err(ConfigError::MissingFeed {
                        action: action.name.clone(),
                        feed: target.clone(),
                    });
                }
                (None, ActionKind::Sync) => {
                    return Err(ConfigError::MissingTargetFeed {
                        action: action.name.clone(),
                    });
                }
                _ => {}
            }

            self.resolve_settings(&action.custom_settings, action.settings_group.as_deref())?;
            for command in &action.commands {
                self.resolve_settings(&command.settings, command.settings_group.as_deref())?;
            }
            for observer in &action.observers {
                self.resolve_settings(&observer.settings, observer.settings_group.as_deref())?;
            }
        }
        Ok(())
    }
}
