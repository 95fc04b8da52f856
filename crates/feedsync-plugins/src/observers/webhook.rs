use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use feedsync_core::{
    require_setting, ActionEvent, ActionEventType, ActionInfo, ConfigError, Observer, Settings,
};

use super::EventRecord;

/// POSTs each event as JSON to a URL.
///
/// Settings:
/// - `url` (required)
/// - `event_types`: comma-separated event type names; all events when absent
#[derive(Debug, Clone)]
pub struct WebhookObserver {
    name: String,
    url: String,
    event_types: Option<HashSet<ActionEventType>>,
    client: reqwest::Client,
}

impl WebhookObserver {
    pub const TYPE: &'static str = "webhook";

    pub fn new(name: impl Into<String>, url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            event_types: None,
            client,
        }
    }

    pub fn from_settings(
        name: &str,
        settings: &Settings,
        client: reqwest::Client,
    ) -> Result<Self, ConfigError> {
        let url = require_setting(settings, name, "url")?;
        let parsed = reqwest::Url::parse(url).map_err(|e| ConfigError::InvalidSetting {
            key: "url".to_string(),
            message: format!("'{}' is not a valid URL: {}", url, e),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidSetting {
                key: "url".to_string(),
                message: format!("'{}' is not an http(s) URL", url),
            });
        }

        let mut observer = Self::new(name, url, client);
        if let Some(raw) = settings.get("event_types") {
            let mut types = HashSet::new();
            for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let parsed = entry
                    .parse::<ActionEventType>()
                    .map_err(|message| ConfigError::InvalidSetting {
                        key: "event_types".to_string(),
                        message,
                    })?;
                types.insert(parsed);
            }
            observer.event_types = Some(types);
        }
        Ok(observer)
    }

    pub fn accepts(&self, event_type: ActionEventType) -> bool {
        self.event_types
            .as_ref()
            .map_or(true, |types| types.contains(&event_type))
    }
}

#[async_trait]
impl Observer for WebhookObserver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, action: &ActionInfo, event: &ActionEvent) {
        if !self.accepts(event.event_type) {
            return;
        }

        let record = EventRecord {
            action_info: action,
            event,
        };
        match self.client.post(&self.url).json(&record).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(observer = %self.name, event = %event.event_type, "Webhook delivered");
            }
            Ok(response) => {
                warn!(
                    observer = %self.name,
                    url = %self.url,
                    status = %response.status(),
                    "Webhook rejected event"
                );
            }
            Err(e) => {
                warn!(observer = %self.name, url = %self.url, error = %e, "Webhook delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_event_type_filter() {
        let observer = WebhookObserver::from_settings(
            "alerts",
            &settings(&[
                ("url", "https://hooks.example.com/feed"),
                ("event_types", "actionfailed, ActionPackageFailed"),
            ]),
            reqwest::Client::new(),
        )
        .unwrap();

        assert!(observer.accepts(ActionEventType::ActionFailed));
        assert!(observer.accepts(ActionEventType::ActionPackageFailed));
        assert!(!observer.accepts(ActionEventType::ActionStarted));
    }

    #[test]
    fn test_invalid_settings() {
        let client = reqwest::Client::new();
        assert!(matches!(
            WebhookObserver::from_settings("alerts", &Settings::new(), client.clone()),
            Err(ConfigError::MissingSetting { .. })
        ));
        for url in ["ftp://x", "http://", "https://exa mple.com/hook", "hooks.example.com/feed"] {
            assert!(
                matches!(
                    WebhookObserver::from_settings("alerts", &settings(&[("url", url)]), client.clone()),
                    Err(ConfigError::InvalidSetting { .. })
                ),
                "{url} should be rejected"
            );
        }
        assert!(matches!(
            WebhookObserver::from_settings(
                "alerts",
                &settings(&[("url", "http://x"), ("event_types", "Whatever")]),
                client
            ),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_swallowed() {
        let observer = WebhookObserver::new("alerts", "http://127.0.0.1:9/hook", reqwest::Client::new());
        let info = ActionInfo {
            name: "mirror".to_string(),
            action_type: "sync".to_string(),
            source_feed: "a".to_string(),
            target_feed: Some("b".to_string()),
        };
        observer
            .notify(
                &info,
                &ActionEvent::new(ActionEventType::ActionFailed, "mirror", "boom"),
            )
            .await;
    }
}
