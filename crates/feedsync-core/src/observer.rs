//! Action lifecycle events and observer fan-out.
//!
//! Events are created by the action and handed, unchanged, to every
//! registered observer in declared order.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::package::{Package, PackageIdentity};

/// A unique event ID (UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// EVENT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionEventType {
    ActionStarted,
    ActionCompleted,
    ActionFailed,
    ActionCommandSuccess,
    ActionCommandFailed,
    ActionPackageIgnored,
    ActionPackageFailed,
    ActionPackageSuccess,
}

impl ActionEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionEventType::ActionStarted => "ActionStarted",
            ActionEventType::ActionCompleted => "ActionCompleted",
            ActionEventType::ActionFailed => "ActionFailed",
            ActionEventType::ActionCommandSuccess => "ActionCommandSuccess",
            ActionEventType::ActionCommandFailed => "ActionCommandFailed",
            ActionEventType::ActionPackageIgnored => "ActionPackageIgnored",
            ActionEventType::ActionPackageFailed => "ActionPackageFailed",
            ActionEventType::ActionPackageSuccess => "ActionPackageSuccess",
        }
    }

    /// Failure-class events, for observers that filter on severity.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ActionEventType::ActionFailed
                | ActionEventType::ActionCommandFailed
                | ActionEventType::ActionPackageFailed
        )
    }
}

impl std::str::FromStr for ActionEventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let all = [
            ActionEventType::ActionStarted,
            ActionEventType::ActionCompleted,
            ActionEventType::ActionFailed,
            ActionEventType::ActionCommandSuccess,
            ActionEventType::ActionCommandFailed,
            ActionEventType::ActionPackageIgnored,
            ActionEventType::ActionPackageFailed,
            ActionEventType::ActionPackageSuccess,
        ];
        all.into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown event type: {}", s))
    }
}

impl std::fmt::Display for ActionEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable lifecycle notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    pub event_id: EventId,
    pub event_type: ActionEventType,
    /// Name of the action that emitted the event.
    pub action: String,
    pub message: String,
    /// Type tag of the command involved, if any.
    pub command: Option<String>,
    pub package: Option<PackageIdentity>,
    pub timestamp: DateTime<Utc>,
}

impl ActionEvent {
    pub fn new(
        event_type: ActionEventType,
        action: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type,
            action: action.into(),
            message: message.into(),
            command: None,
            package: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_package(mut self, package: &Package) -> Self {
        self.package = Some(package.identity());
        self
    }
}

/// Descriptive context handed to observers alongside each event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInfo {
    pub name: String,
    pub action_type: String,
    pub source_feed: String,
    pub target_feed: Option<String>,
}

// ============================================================================
// OBSERVERS
// ============================================================================

/// A notification sink for lifecycle events.
///
/// Observers never influence control flow. `notify` is infallible: an
/// implementation that can fail (network delivery, file append) logs and
/// swallows its own errors so sibling observers and the action carry on.
#[async_trait]
pub trait Observer: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, action: &ActionInfo, event: &ActionEvent);
}

/// Ordered fan-out over the observers resolved for one action scope.
///
/// The list is fixed at construction; there is no lazy resolution.
#[derive(Clone)]
pub struct ObserverManager {
    info: ActionInfo,
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverManager {
    pub fn new(info: ActionInfo, observers: Vec<Arc<dyn Observer>>) -> Self {
        Self { info, observers }
    }

    pub fn info(&self) -> &ActionInfo {
        &self.info
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver an event to every observer, awaiting each in turn.
    pub async fn notify_observers(&self, event: &ActionEvent) {
        debug!(
            action = %self.info.name,
            event = %event.event_type,
            observers = self.observers.len(),
            "Notifying observers"
        );
        for observer in &self.observers {
            observer.notify(&self.info, event).await;
        }
    }
}

impl std::fmt::Debug for ObserverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverManager")
            .field("info", &self.info)
            .field(
                "observers",
                &self.observers.iter().map(|o| o.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
