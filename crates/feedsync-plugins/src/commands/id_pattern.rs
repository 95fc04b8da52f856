use async_trait::async_trait;
use regex::Regex;

use feedsync_core::{
    require_setting, Command, CommandResult, ConfigError, Package, PackageEvent, Result, Settings,
};

/// Rejects packages whose id does not match the `pattern` regex.
#[derive(Debug, Clone)]
pub struct IdPatternCommand {
    settings: Settings,
    pattern: Regex,
}

impl IdPatternCommand {
    pub const TYPE: &'static str = "id_pattern";

    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        let raw = require_setting(settings, Self::TYPE, "pattern")?;
        let pattern = Regex::new(raw).map_err(|e| ConfigError::InvalidSetting {
            key: "pattern".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            settings: settings.clone(),
            pattern,
        })
    }
}

#[async_trait]
impl Command for IdPatternCommand {
    fn command_type(&self) -> &str {
        Self::TYPE
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn execute(&self, package: &Package, _event: PackageEvent) -> Result<CommandResult> {
        if self.pattern.is_match(&package.id) {
            Ok(CommandResult::valid(
                Self::TYPE,
                format!("{} matches {}", package.id, self.pattern),
            ))
        } else {
            Ok(CommandResult::invalid(
                Self::TYPE,
                format!("{} does not match {}", package.id, self.pattern),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pattern: &str) -> Settings {
        let mut settings = Settings::new();
        settings.insert("pattern".to_string(), pattern.to_string());
        settings
    }

    #[tokio::test]
    async fn test_matches_id() {
        let command = IdPatternCommand::from_settings(&settings(r"^Contoso\.")).unwrap();

        let ok = command
            .execute(&Package::new("Contoso.Core", "1.0"), PackageEvent::Added)
            .await
            .unwrap();
        let bad = command
            .execute(&Package::new("Fabrikam.Core", "1.0"), PackageEvent::Added)
            .await
            .unwrap();

        assert!(ok.result_valid);
        assert!(!bad.result_valid);
        assert!(bad.message.contains("Fabrikam.Core"));
    }

    #[test]
    fn test_invalid_or_missing_pattern_is_config_error() {
        assert!(matches!(
            IdPatternCommand::from_settings(&settings("(unclosed")),
            Err(ConfigError::InvalidSetting { .. })
        ));
        assert!(matches!(
            IdPatternCommand::from_settings(&Settings::new()),
            Err(ConfigError::MissingSetting { .. })
        ));
    }
}
