//! Built-in observers.
//!
//! Observers never fail the action: delivery problems are logged and dropped.

mod jsonl;
mod log;
mod webhook;

use std::sync::Arc;

use serde::Serialize;

use feedsync_core::{ActionEvent, ActionInfo, Observer, Registry};

pub use self::log::LogObserver;
pub use jsonl::JsonlObserver;
pub use webhook::WebhookObserver;

/// Wire shape shared by the JSON-emitting observers.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    pub action_info: &'a ActionInfo,
    #[serde(flatten)]
    pub event: &'a ActionEvent,
}

pub fn register_observers(registry: &mut Registry, client: reqwest::Client) {
    registry
        .register_observer(LogObserver::TYPE, |name, _settings| {
            Ok(Arc::new(LogObserver::new(name)) as Arc<dyn Observer>)
        })
        .register_observer(JsonlObserver::TYPE, |name, settings| {
            Ok(Arc::new(JsonlObserver::from_settings(name, settings)?) as Arc<dyn Observer>)
        })
        .register_observer(WebhookObserver::TYPE, move |name, settings| {
            let observer = WebhookObserver::from_settings(name, settings, client.clone())?;
            Ok(Arc::new(observer) as Arc<dyn Observer>)
        });
}
