use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use feedsync_core::{
    require_setting, Command, CommandResult, ConfigError, Package, PackageEvent, Result, Settings,
};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn short(digest: &str) -> &str {
    &digest[..12.min(digest.len())]
}

/// Rejects packages whose content digest is on the `blocked` list.
#[derive(Debug, Clone)]
pub struct DigestBlocklistCommand {
    settings: Settings,
    blocked: HashSet<String>,
}

impl DigestBlocklistCommand {
    pub const TYPE: &'static str = "digest_blocklist";

    /// `blocked` is a comma-separated list of SHA-256 hex digests.
    pub fn from_settings(settings: &Settings) -> std::result::Result<Self, ConfigError> {
        let raw = require_setting(settings, Self::TYPE, "blocked")?;
        let mut blocked = HashSet::new();
        for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if entry.len() != 64 || hex::decode(entry).is_err() {
                return Err(ConfigError::InvalidSetting {
                    key: "blocked".to_string(),
                    message: format!("'{}' is not a SHA-256 hex digest", entry),
                });
            }
            blocked.insert(entry.to_ascii_lowercase());
        }
        Ok(Self {
            settings: settings.clone(),
            blocked,
        })
    }
}

#[async_trait]
impl Command for DigestBlocklistCommand {
    fn command_type(&self) -> &str {
        Self::TYPE
    }

    fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn execute(&self, package: &Package, _event: PackageEvent) -> Result<CommandResult> {
        let digest = sha256_hex(package.content.as_deref().unwrap_or_default());
        if self.blocked.contains(&digest) {
            Ok(CommandResult::invalid(
                Self::TYPE,
                format!("{} content {} is blocked", package, short(&digest)),
            ))
        } else {
            Ok(CommandResult::valid(
                Self::TYPE,
                format!("{} content {}", package, short(&digest)),
            ))
        }
    }
}
