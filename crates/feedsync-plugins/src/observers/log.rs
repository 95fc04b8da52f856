use async_trait::async_trait;
use tracing::{info, warn};

use feedsync_core::{ActionEvent, ActionInfo, Observer};

/// Writes every event through `tracing`; failure events at warn level.
#[derive(Debug, Clone)]
pub struct LogObserver {
    name: String,
}

impl LogObserver {
    pub const TYPE: &'static str = "log";

    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Observer for LogObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, action: &ActionInfo, event: &ActionEvent) {
        let package = event
            .package
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        let command = event.command.as_deref().unwrap_or_default();

        if event.event_type.is_failure() {
            warn!(
                observer = %self.name,
                action = %action.name,
                event = %event.event_type,
                package = %package,
                command = %command,
                "{}", event.message
            );
        } else {
            info!(
                observer = %self.name,
                action = %action.name,
                event = %event.event_type,
                package = %package,
                command = %command,
                "{}", event.message
            );
        }
    }
}
