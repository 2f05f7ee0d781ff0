//! Task record type
//!
//! Tasks carry a fixed set of documented fields; anything open-ended a
//! caller wants to attach travels in the `metadata` map and is ignored by
//! the runtime.

use crate::{new_entity_id, EntityId, TaskPriority, TaskStatus, Timestamp, WorkflowKind};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of work submitted to the orchestrator.
///
/// Owned first by the task queue, then by the agent it is assigned to.
/// The `id` is immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task
    pub id: EntityId,
    /// What needs to be done
    pub description: String,
    /// Capabilities an agent must have (all of them) to take this task
    pub required_capabilities: Vec<String>,
    /// Scheduling priority
    pub priority: TaskPriority,
    /// Workflow kind, drives collaboration phase templates
    pub kind: WorkflowKind,
    /// Current status
    pub status: TaskStatus,

    /// Agent the task is currently assigned to (if any)
    pub assigned_to: Option<String>,
    /// Result text (when completed)
    pub result: Option<String>,
    /// Error text (when failed)
    pub error: Option<String>,

    /// When this task was created
    pub created_at: Timestamp,
    /// When this task was enqueued
    pub enqueued_at: Option<Timestamp>,
    /// When this task was assigned to an agent
    pub assigned_at: Option<Timestamp>,
    /// When this task reached a terminal status
    pub completed_at: Option<Timestamp>,

    /// Open-ended extra fields, ignored by the runtime
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    /// Create a new pending task with a generated id.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            description: description.into(),
            required_capabilities: Vec::new(),
            priority: TaskPriority::Normal,
            kind: WorkflowKind::General,
            status: TaskStatus::Pending,
            assigned_to: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            enqueued_at: None,
            assigned_at: None,
            completed_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Set required capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.required_capabilities = capabilities;
        self
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set workflow kind.
    pub fn with_kind(mut self, kind: WorkflowKind) -> Self {
        self.kind = kind;
        self
    }

    /// Attach an extra metadata field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Stamp the task as enqueued.
    pub fn mark_enqueued(&mut self) {
        self.enqueued_at = Some(Utc::now());
        self.status = TaskStatus::Pending;
    }

    /// Stamp the task as assigned to an agent.
    pub fn mark_assigned(&mut self, agent: &str) {
        self.assigned_to = Some(agent.to_string());
        self.assigned_at = Some(Utc::now());
        self.status = TaskStatus::InProgress;
    }

    /// Stamp the task as completed with a result.
    pub fn mark_completed(&mut self, result: impl Into<String>) {
        self.result = Some(result.into());
        self.completed_at = Some(Utc::now());
        self.status = TaskStatus::Completed;
    }

    /// Stamp the task as failed with an error.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        self.status = TaskStatus::Failed;
    }

    /// Check if a capability set satisfies this task's requirements.
    /// AND semantics: every required capability must be present.
    pub fn capabilities_satisfied_by(&self, capabilities: &[String]) -> bool {
        self.required_capabilities
            .iter()
            .all(|required| capabilities.iter().any(|c| c == required))
    }
}

// ============================================================================
// TESTS
// ============================================================================
