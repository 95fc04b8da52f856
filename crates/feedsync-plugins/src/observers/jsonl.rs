use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use feedsync_core::{require_setting, ActionEvent, ActionInfo, ConfigError, Observer, Settings};

use super::EventRecord;

/// Appends each event as one JSON line to a file.
#[derive(Debug)]
pub struct JsonlObserver {
    name: String,
    path: PathBuf,
    // Serializes appends from concurrent notifications.
    write_lock: Mutex<()>,
}

impl JsonlObserver {
    pub const TYPE: &'static str = "jsonl";

    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_settings(name: &str, settings: &Settings) -> Result<Self, ConfigError> {
        let path = require_setting(settings, name, "path")?;
        Ok(Self::new(name, path))
    }

    async fn append(&self, line: &[u8]) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line).await?;
        file.flush().await
    }
}

#[async_trait]
impl Observer for JsonlObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, action: &ActionInfo, event: &ActionEvent) {
        let record = EventRecord {
            action_info: action,
            event,
        };
        let mut line = match serde_json::to_vec(&record) {
            Ok(line) => line,
            Err(e) => {
                warn!(observer = %self.name, error = %e, "Failed to serialize event");
                return;
            }
        };
        line.push(b'\n');

        if let Err(e) = self.append(&line).await {
            warn!(
                observer = %self.name,
                path = %self.path.display(),
                error = %e,
                "Failed to append event"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_core::{ActionEventType, Package};

    fn info() -> ActionInfo {
        ActionInfo {
            name: "mirror".to_string(),
            action_type: "sync".to_string(),
            source_feed: "upstream".to_string(),
            target_feed: Some("local".to_string()),
        }
    }

    #[tokio::test]
    async fn test_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("events.jsonl");
        let observer = JsonlObserver::new("audit", &path);

        observer
            .notify(
                &info(),
                &ActionEvent::new(ActionEventType::ActionStarted, "mirror", "started"),
            )
            .await;
        observer
            .notify(
                &info(),
                &ActionEvent::new(ActionEventType::ActionPackageFailed, "mirror", "rejected")
                    .with_package(&Package::new("Foo", "1.0")),
            )
            .await;

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event_type"], "ActionStarted");
        assert_eq!(lines[1]["action_info"]["target_feed"], "local");
        assert_eq!(lines[1]["package"]["id"], "Foo");
    }

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for append.
        let observer = JsonlObserver::new("audit", dir.path());
        observer
            .notify(
                &info(),
                &ActionEvent::new(ActionEventType::ActionStarted, "mirror", "started"),
            )
            .await;
    }
}
