//! Type-name registry for repositories, commands and observers.
//!
//! Populated once at start-up; every lookup is case-insensitive and an
//! unknown name is a configuration error.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::Command;
use crate::config::Settings;
use crate::error::{ConfigError, FactoryCategory, Result};
use crate::observer::Observer;
use crate::repository::Repository;

/// Builds a repository from `(feed name, resolved settings)`.
pub type RepositoryFactory =
    Arc<dyn Fn(&str, &Settings) -> Result<Arc<dyn Repository>> + Send + Sync>;

/// Builds a command from its resolved settings.
pub type CommandFactory = Arc<dyn Fn(&Settings) -> Result<Arc<dyn Command>> + Send + Sync>;

/// Builds an observer from `(display name, resolved settings)`.
pub type ObserverFactory =
    Arc<dyn Fn(&str, &Settings) -> Result<Arc<dyn Observer>> + Send + Sync>;

#[derive(Default, Clone)]
pub struct Registry {
    repositories: HashMap<String, RepositoryFactory>,
    commands: HashMap<String, CommandFactory>,
    observers: HashMap<String, ObserverFactory>,
}

fn key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn unknown(category: FactoryCategory, name: &str) -> ConfigError {
    ConfigError::UnknownType {
        category,
        name: name.to_string(),
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_repository<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&str, &Settings) -> Result<Arc<dyn Repository>> + Send + Sync + 'static,
    {
        self.repositories.insert(key(name), Arc::new(factory));
        self
    }

    pub fn register_command<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&Settings) -> Result<Arc<dyn Command>> + Send + Sync + 'static,
    {
        self.commands.insert(key(name), Arc::new(factory));
        self
    }

    pub fn register_observer<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&str, &Settings) -> Result<Arc<dyn Observer>> + Send + Sync + 'static,
    {
        self.observers.insert(key(name), Arc::new(factory));
        self
    }

    pub fn create_repository(
        &self,
        repository_type: &str,
        feed_name: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn Repository>> {
        let factory = self
            .repositories
            .get(&key(repository_type))
            .ok_or_else(|| unknown(FactoryCategory::Repository, repository_type))?;
        factory(feed_name, settings)
    }

    pub fn create_command(&self, command_type: &str, settings: &Settings) -> Result<Arc<dyn Command>> {
        let factory = self
            .commands
            .get(&key(command_type))
            .ok_or_else(|| unknown(FactoryCategory::Command, command_type))?;
        factory(settings)
    }

    pub fn create_observer(
        &self,
        observer_type: &str,
        name: &str,
        settings: &Settings,
    ) -> Result<Arc<dyn Observer>> {
        let factory = self
            .observers
            .get(&key(observer_type))
            .ok_or_else(|| unknown(FactoryCategory::Observer, observer_type))?;
        factory(name, settings)
    }

    /// Registered type names per category, sorted.
    pub fn type_names(&self, category: FactoryCategory) -> Vec<String> {
        let mut names: Vec<String> = match category {
            FactoryCategory::Repository => self.repositories.keys().cloned().collect(),
            FactoryCategory::Command => self.commands.keys().cloned().collect(),
            FactoryCategory::Observer => self.observers.keys().cloned().collect(),
            FactoryCategory::Action => vec!["process".to_string(), "sync".to_string()],
        };
        names.sort();
        names
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("repositories", &self.type_names(FactoryCategory::Repository))
            .field("commands", &self.type_names(FactoryCategory::Command))
            .field("observers", &self.type_names(FactoryCategory::Observer))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedSyncError;
    use crate::fakes::{MemoryRepository, ScriptedCommand};

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = Registry::new();
        registry.register_command("Always_Pass", |_settings| {
            Ok(Arc::new(ScriptedCommand::passing("always_pass")) as Arc<dyn Command>)
        });

        let command = registry
            .create_command("ALWAYS_PASS", &Settings::new())
            .expect("should resolve");
        assert_eq!(command.command_type(), "always_pass");
    }

    #[test]
    fn test_unknown_name_is_config_error() {
        let registry = Registry::new();
        let err = match registry.create_repository("odata", "nuget.org", &Settings::new()) {
            Err(e) => e,
            Ok(_) => panic!("lookup should fail"),
        };
        assert!(err.is_config_error());
        assert!(matches!(
            err,
            FeedSyncError::Config(ConfigError::UnknownType {
                category: FactoryCategory::Repository,
                ..
            })
        ));
    }

    #[test]
    fn test_factory_receives_feed_name() {
        let mut registry = Registry::new();
        registry.register_repository("memory", |name, _settings| {
            Ok(Arc::new(MemoryRepository::new(name)) as Arc<dyn Repository>)
        });
        let repo = registry
            .create_repository("memory", "upstream", &Settings::new())
            .unwrap();
        assert_eq!(repo.name(), "upstream");
        assert_eq!(
            registry.type_names(FactoryCategory::Repository),
            vec!["memory".to_string()]
        );
    }
}
