//! Troupe Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! identity aliases, enums, the task record, the error taxonomy,
//! configuration and health types. No orchestration logic lives here.

mod config;
mod enums;
mod error;
mod health;
mod identity;
mod task;

pub use config::{
    TroupeConfig, DEFAULT_ACTIVITY_WINDOW_SECS, DEFAULT_DISPATCH_BACKOFF_MS,
    DEFAULT_DISPATCH_INTERVAL_MS, DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_MAX_TASK_DURATION_SECS,
    DEFAULT_MEMORY_SIZE, DEFAULT_MESSAGE_HISTORY_LIMIT, DEFAULT_MONITOR_INTERVAL_SECS,
    DEFAULT_WORKER_THREADS,
};
pub use enums::{
    AgentAction, AgentState, CollaborationStatus, Importance, MessageKind, TaskPriority,
    TaskPriorityParseError, TaskStatus, TeamStrategy, WorkflowKind,
};
pub use error::{
    AgentError, CollaborationError, ConfigError, ProviderError, TroupeError, TroupeResult,
};
pub use health::{AgentHealth, HealthStatus};
pub use identity::{new_entity_id, EntityId, Timestamp};
pub use task::Task;
