//! End-to-end engine tests: JSON config -> registry -> processor -> feeds.
//!
//! Feeds are in-memory and shared with the test through the registry closures,
//! so every assertion looks at the real post-run feed contents.

use std::collections::HashMap;
use std::sync::Arc;

use feedsync_core::fakes::{call_log, CallLog, MemoryRepository, RecordingObserver, ScriptedCommand};
use feedsync_core::{
    ActionEventType, ActionProcessor, ActionStatus, AppConfig, Command, Observer, Package,
    Registry, Repository,
};
use tracing_test::traced_test;

struct Harness {
    feeds: HashMap<String, Arc<MemoryRepository>>,
    observer: RecordingObserver,
    log: CallLog,
}

impl Harness {
    fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            observer: RecordingObserver::new("recorder"),
            log: call_log(),
        }
    }

    fn with_feed(mut self, name: &str, packages: &[(&str, &str)]) -> Self {
        let list = packages.iter().map(|(id, v)| Package::new(*id, *v)).collect();
        self.feeds.insert(
            name.to_string(),
            Arc::new(MemoryRepository::with_packages(name, list)),
        );
        self
    }

    fn feed(&self, name: &str) -> &MemoryRepository {
        &self.feeds[name]
    }

    /// Registry with `memory` feeds, a `scripted` command that rejects the
    /// comma-separated ids in its `reject` setting, and a `recorder` observer.
    fn registry(&self) -> Registry {
        let mut registry = Registry::new();

        let feeds = self.feeds.clone();
        registry.register_repository("memory", move |name, _settings| {
            let repo = feeds
                .get(name)
                .cloned()
                .unwrap_or_else(|| Arc::new(MemoryRepository::new(name)));
            Ok(repo as Arc<dyn Repository>)
        });

        let log = self.log.clone();
        registry.register_command("scripted", move |settings| {
            let label = settings.get("label").cloned().unwrap_or_else(|| "scripted".to_string());
            let reject: Vec<&str> = settings
                .get("reject")
                .map(|s| s.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();
            let command = ScriptedCommand::failing_for(label, &reject).with_call_log(log.clone());
            Ok(Arc::new(command) as Arc<dyn Command>)
        });

        let observer = self.observer.clone();
        registry.register_observer("recorder", move |_name, _settings| {
            Ok(Arc::new(observer.clone()) as Arc<dyn Observer>)
        });

        registry
    }

    fn processor(&self, json: &str) -> ActionProcessor {
        let config = AppConfig::from_json_str(json).expect("config parses");
        config.validate().expect("config validates");
        ActionProcessor::new(Arc::new(config), Arc::new(self.registry()))
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

const FEEDS: &str = r#"
    "feeds": [
        { "name": "S", "type": "memory" },
        { "name": "T", "type": "memory" }
    ]
"#;

fn config(actions: &str) -> String {
    format!("{{ {FEEDS}, \"actions\": [ {actions} ] }}")
}

#[tokio::test]
async fn test_sync_adds_missing_packages() {
    let h = Harness::new()
        .with_feed("S", &[("A", "1.0"), ("B", "1.0")])
        .with_feed("T", &[("A", "1.0")]);
    let p = h.processor(&config(
        r#"{ "name": "mirror", "type": "Sync", "source_feed": "S", "target_feed": "T",
             "observers": [ { "type": "recorder" } ] }"#,
    ));

    let report = p.execute(&[]).await.unwrap();

    assert_eq!(h.feed("T").identities(), vec!["A@1.0", "B@1.0"]);
    assert_eq!(h.feed("S").identities(), vec!["A@1.0", "B@1.0"]);
    let outcome = report.outcome("mirror").unwrap();
    assert_eq!(outcome.status, ActionStatus::Completed);
    assert_eq!(outcome.stats.added, 1);
}

#[tokio::test]
async fn test_sync_deletes_extra_packages() {
    let h = Harness::new()
        .with_feed("S", &[("A", "1.0")])
        .with_feed("T", &[("A", "1.0"), ("C", "2.0")]);
    let p = h.processor(&config(
        r#"{ "name": "mirror", "type": "sync", "source_feed": "S", "target_feed": "T",
             "delete_from_target": true }"#,
    ));

    p.execute(&[]).await.unwrap();

    assert_eq!(h.feed("T").identities(), vec!["A@1.0"]);
}

#[tokio::test]
async fn test_fail_package_tier_continues_with_next_package() {
    let h = Harness::new().with_feed("S", &[("Bad", "1.0"), ("Good", "1.0")]);
    let p = h.processor(&config(
        r#"{ "name": "validate", "type": "process", "source_feed": "S",
             "observers": [ { "type": "recorder" } ],
             "commands": [
                { "type": "scripted", "failure_action": "FailPackage",
                  "settings": { "label": "first", "reject": "Bad" } },
                { "type": "scripted", "failure_action": "Continue",
                  "settings": { "label": "second" } }
             ] }"#,
    ));

    let report = p.execute(&[]).await.unwrap();

    assert_eq!(
        h.calls(),
        vec!["first:Bad@1.0", "first:Good@1.0", "second:Good@1.0"]
    );
    assert_eq!(h.observer.count(ActionEventType::ActionPackageFailed), 1);
    assert_eq!(report.outcome("validate").unwrap().status, ActionStatus::Completed);
}

#[tokio::test]
async fn test_fail_action_tier_stops_action() {
    let h = Harness::new().with_feed(
        "S",
        &[("P1", "1.0"), ("P2", "1.0"), ("P3", "1.0"), ("P4", "1.0"), ("P5", "1.0")],
    );
    let p = h.processor(&config(
        r#"{ "name": "validate", "type": "process", "source_feed": "S",
             "observers": [ { "type": "recorder" } ],
             "commands": [
                { "type": "scripted", "failure_action": "fail_action",
                  "settings": { "label": "gate", "reject": "P2" } }
             ] }"#,
    ));

    let report = p.execute(&[]).await.unwrap();

    assert_eq!(h.calls(), vec!["gate:P1@1.0", "gate:P2@1.0"]);
    assert_eq!(report.outcome("validate").unwrap().status, ActionStatus::Stopped);
    let types = h.observer.event_types();
    assert_eq!(types.first(), Some(&ActionEventType::ActionStarted));
    assert_eq!(types.last(), Some(&ActionEventType::ActionCompleted));
    assert_eq!(h.observer.count(ActionEventType::ActionFailed), 1);
}

#[tokio::test]
async fn test_ignored_package_never_reaches_target() {
    let h = Harness::new()
        .with_feed("S", &[("Foo", "2.0"), ("Bar", "1.0")])
        .with_feed("T", &[]);
    let p = h.processor(&config(
        r#"{ "name": "mirror", "type": "sync", "source_feed": "S", "target_feed": "T",
             "packages_to_ignore": ["foo"],
             "commands": [ { "type": "scripted", "failure_action": "FailAction" } ] }"#,
    ));

    p.execute(&[]).await.unwrap();

    assert_eq!(h.feed("T").identities(), vec!["Bar@1.0"]);
    assert_eq!(h.calls(), vec!["scripted:Bar@1.0"]);
}

#[tokio::test]
async fn test_failing_action_does_not_stop_batch() {
    let h = Harness::new()
        .with_feed("S", &[("A", "1.0")])
        .with_feed("T", &[]);
    h.feed("S").break_listing();
    let p = h.processor(&config(
        r#"{ "name": "broken", "type": "process", "source_feed": "S",
             "observers": [ { "type": "recorder" } ] },
           { "name": "healthy", "type": "process", "source_feed": "T" }"#,
    ));

    let report = p.execute(&[]).await.unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        report.outcome("broken").unwrap().status,
        ActionStatus::Failed(_)
    ));
    assert_eq!(report.outcome("healthy").unwrap().status, ActionStatus::Completed);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(h.observer.events_for("broken").len(), 2);
}

#[tokio::test]
async fn test_named_selection_runs_disabled_action() {
    let h = Harness::new()
        .with_feed("S", &[("A", "1.0")])
        .with_feed("T", &[]);
    let p = h.processor(&config(
        r#"{ "name": "mirror", "type": "sync", "source_feed": "S", "target_feed": "T",
             "enabled": false }"#,
    ));

    let skipped = p.execute(&[]).await.unwrap();
    assert!(skipped.is_empty());
    assert!(h.feed("T").identities().is_empty());

    let forced = p.execute(&["MIRROR".to_string()]).await.unwrap();
    assert_eq!(forced.outcomes.len(), 1);
    assert_eq!(h.feed("T").identities(), vec!["A@1.0"]);
}

#[tokio::test]
async fn test_settings_group_feeds_command_settings() {
    let h = Harness::new()
        .with_feed("S", &[("Blocked", "1.0"), ("Fine", "1.0")])
        .with_feed("T", &[]);
    let json = format!(
        r#"{{ {FEEDS},
             "settings_groups": [
                {{ "name": "strict", "settings": {{ "label": "policy", "reject": "Blocked" }} }}
             ],
             "actions": [
                {{ "name": "mirror", "type": "sync", "source_feed": "S", "target_feed": "T",
                   "commands": [ {{ "type": "scripted", "failure_action": "FailPackage",
                                    "settings_group": "strict" }} ] }}
             ] }}"#
    );
    let p = h.processor(&json);

    p.execute(&[]).await.unwrap();

    assert_eq!(h.feed("T").identities(), vec!["Fine@1.0"]);
    assert_eq!(h.calls(), vec!["policy:Blocked@1.0", "policy:Fine@1.0"]);
}

#[tokio::test]
async fn test_unknown_command_type_aborts_batch() {
    let h = Harness::new().with_feed("S", &[("A", "1.0")]);
    let p = h.processor(&config(
        r#"{ "name": "validate", "type": "process", "source_feed": "S",
             "commands": [ { "type": "nope" } ] }"#,
    ));

    let err = p.execute(&[]).await.unwrap_err();
    assert!(err.is_config_error());
    assert!(h.calls().is_empty());
}

#[traced_test]
#[tokio::test]
async fn test_unmatched_requested_name_is_skipped() {
    let h = Harness::new()
        .with_feed("S", &[("A", "1.0")])
        .with_feed("T", &[]);
    let p = h.processor(&config(
        r#"{ "name": "X", "type": "sync", "source_feed": "S", "target_feed": "T" }"#,
    ));

    let report = p
        .execute(&["X".to_string(), "Y".to_string()])
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].name, "X");
    assert_eq!(h.feed("T").identities(), vec!["A@1.0"]);
    assert!(logs_contain("Requested action is not configured"));
    assert!(logs_contain("action=Y"));
}
