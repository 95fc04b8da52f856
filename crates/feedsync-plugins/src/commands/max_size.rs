use async_trait::async_trait;

use feedsync_core::{
    parse_setting, Command, CommandResult, ConfigError, Package, PackageEvent, Result, Settings,
};

/// Rejects packages larger than `max_bytes`.
#[derive(Debug, Clone)]
pub struct MaxSizeCommand {
    settings: Settings,
    max_bytes: u64,
}

impl MaxSizeCommand {
    pub const TYPE: &'static str = "max_size";

    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        let max_bytes = parse_setting::<u64>(settings, "max_bytes")?.ok_or_else(|| {
            ConfigError::MissingSetting {
                owner: Self::TYPE.to_string(),
                key: "max_bytes".to_string(),
            }
        })?;
        Ok(Self {
            settings: settings.clone(),
            max_bytes,
        })
    }
}

#[async_trait]
impl Command for MaxSizeCommand {
    fn command_type(&self) -> &str {
        Self::TYPE
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn execute(&self, package: &Package, _event: PackageEvent) -> Result<CommandResult> {
        let size = package.content_len() as u64;
        if size > self.max_bytes {
            return Ok(CommandResult::invalid(
                Self::TYPE,
                format!("{} is {} bytes, limit is {}", package, size, self.max_bytes),
            ));
        }
        Ok(CommandResult::valid(
            Self::TYPE,
            format!("{} is {} bytes", package, size),
        ))
    }
}
