use async_trait::async_trait;

use feedsync_core::{Command, CommandResult, Package, PackageEvent, Result, Settings};

/// Rejects packages whose fetched content is missing or empty.
///
/// Deletes carry no content and always pass.
#[derive(Debug, Clone, Default)]
pub struct RequireContentCommand {
    settings: Settings,
}

impl RequireContentCommand {
    pub const TYPE: &'static str = "require_content";

    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Command for RequireContentCommand {
    fn command_type(&self) -> &str {
        Self::TYPE
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn execute(&self, package: &Package, event: PackageEvent) -> Result<CommandResult> {
        if event == PackageEvent::Deleted {
            return Ok(CommandResult::valid(Self::TYPE, format!("{} is being deleted", package)));
        }
        if package.content_len() == 0 {
            return Ok(CommandResult::invalid(
                Self::TYPE,
                format!("{} has no content", package),
            ));
        }
        Ok(CommandResult::valid(
            Self::TYPE,
            format!("{} has {} bytes", package, package.content_len()),
        ))
    }
}
