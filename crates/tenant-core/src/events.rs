//! Lifecycle Event Bus
//!
//! Fire-and-forget notifications for project lifecycle and membership
//! changes. The orchestrator never awaits acknowledgement.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Lifecycle event name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// A project finished provisioning
    ProjectCreated,
    /// A project teardown sweep completed
    ProjectDeleted,
    /// A user was bound to a project
    UserAddedToProject,
    /// A user was removed from a project
    UserRemovedFromProject,
    /// A personal project was auto-created for a visitor
    PersonalProjectCreated,
}

impl EventName {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectDeleted => "project_deleted",
            Self::UserAddedToProject => "user_added_to_project",
            Self::UserRemovedFromProject => "user_removed_from_project",
            Self::PersonalProjectCreated => "personal_project_created",
        }
    }
}

/// A fired lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event name
    pub name: EventName,
    /// Serialized payload
    pub payload: serde_json::Value,
    /// Fire timestamp
    pub fired_at: DateTime<Utc>,
}

/// Event bus boundary
pub trait EventBus: Send + Sync {
    /// Fire an event. Must not block on delivery.
    fn fire(&self, name: EventName, payload: serde_json::Value);
}

/// Recording in-memory bus
#[derive(Default)]
pub struct InMemoryEventBus {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// All fired events, in order
    pub fn fired(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Fired events with the given name
    pub fn fired_named(&self, name: EventName) -> Vec<Event> {
        self.events
            .read()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }
}

impl EventBus for InMemoryEventBus {
    fn fire(&self, name: EventName, payload: serde_json::Value) {
        tracing::debug!(event = name.as_str(), "firing lifecycle event");
        self.events.write().push(Event {
            name,
            payload,
            fired_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_and_filter() {
        let bus = InMemoryEventBus::new();
        bus.fire(EventName::ProjectCreated, serde_json::json!({"id": 1}));
        bus.fire(EventName::ProjectDeleted, serde_json::json!({"id": 1}));

        assert_eq!(bus.fired().len(), 2);
        let created = bus.fired_named(EventName::ProjectCreated);
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].payload["id"], 1);
    }
}
