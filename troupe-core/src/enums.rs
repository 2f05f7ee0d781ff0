//! Enum types for Troupe entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// AGENT ENUMS
// ============================================================================

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    /// Agent is registered but has not been started
    #[default]
    Idle,
    /// Agent is running and may accept tasks
    Active,
    /// Agent is temporarily suspended; can be resumed
    Paused,
    /// Agent has been stopped; terminal, accepts no further work
    Stopped,
}

impl AgentState {
    /// Check if the agent can accept new work in this state.
    pub fn can_accept_work(&self) -> bool {
        matches!(self, AgentState::Active)
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentState::Stopped)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Active => "active",
            AgentState::Paused => "paused",
            AgentState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Action vocabulary an agent can choose from when deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentAction {
    /// Do nothing for now
    #[default]
    Wait,
    /// Reason further before acting
    Think,
    /// Act on the current task directly
    Act,
    /// Work with another agent
    Collaborate,
    /// Hand the task to a better-suited agent
    Delegate,
}

// ============================================================================
// TASK ENUMS
// ============================================================================

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low priority - can be delayed
    Low,
    /// Normal priority
    #[default]
    Normal,
    /// High priority - should be processed soon
    High,
    /// Critical - must be processed immediately
    Critical,
}

impl TaskPriority {
    /// Numeric score used for queue ordering. Higher dequeues first.
    pub fn score(&self) -> i32 {
        match self {
            TaskPriority::Low => 1,
            TaskPriority::Normal => 2,
            TaskPriority::High => 3,
            TaskPriority::Critical => 4,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPriority::Low => "low",
            TaskPriority::Normal => "normal",
            TaskPriority::High => "high",
            TaskPriority::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TaskPriority {
    type Err = TaskPriorityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            _ => Err(TaskPriorityParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid task priority string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPriorityParseError(pub String);

impl fmt::Display for TaskPriorityParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task priority: {}", self.0)
    }
}

impl std::error::Error for TaskPriorityParseError {}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Queued, waiting for assignment
    #[default]
    Pending,
    /// Assigned to an agent and being worked on
    InProgress,
    /// Finished successfully
    Completed,
    /// Finished unsuccessfully
    Failed,
}

impl TaskStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// Workflow kind driving collaboration phase templates.
/// A closed set - resolved once when a collaboration is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Investigate and evaluate a subject
    Analysis,
    /// Generate and refine ideas
    Creative,
    /// Diagnose a problem and design a solution
    ProblemSolving,
    /// Anything else
    #[default]
    General,
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowKind::Analysis => "analysis",
            WorkflowKind::Creative => "creative",
            WorkflowKind::ProblemSolving => "problem_solving",
            WorkflowKind::General => "general",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// MEMORY ENUMS
// ============================================================================

/// Importance level of a memory entry. Controls eviction priority,
/// not task priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Routine - first to be evicted
    Low,
    /// Normal - evictable
    #[default]
    Normal,
    /// Important - never evicted implicitly
    High,
    /// Critical - never evicted implicitly
    Critical,
}

impl Importance {
    /// Numeric score used for ranking and eviction decisions.
    pub fn score(&self) -> i32 {
        match self {
            Importance::Low => 1,
            Importance::Normal => 2,
            Importance::High => 3,
            Importance::Critical => 4,
        }
    }

    /// Entries at or below normal importance may be evicted at capacity.
    pub fn is_evictable(&self) -> bool {
        self.score() <= 2
    }
}

// ============================================================================
// COORDINATION ENUMS
// ============================================================================

/// Kind of message carried by the bus, so receivers can dispatch
/// without sniffing payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Free-form chatter between agents
    #[default]
    Chat,
    /// Task delegation request
    Delegation,
    /// Progress report or collaboration contribution
    Progress,
    /// A collaboration advanced to a new phase
    PhaseChange,
    /// Knowledge shared across a team
    Knowledge,
    /// Terminal outcome of a collaboration or task
    Outcome,
}

/// Strategy a team uses to assign incoming tasks to members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TeamStrategy {
    /// Cycle through members in order
    #[default]
    RoundRobin,
    /// Pick the member whose capabilities best cover the task
    CapabilityBased,
    /// Pick the member with the fewest active tasks
    LoadBalanced,
    /// All members contribute to every task
    Collaborative,
}

/// Status of a collaboration workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationStatus {
    /// Created but not yet started
    #[default]
    Pending,
    /// Phases are being worked through
    InProgress,
    /// Synthesis produced a final result
    Completed,
    /// Terminal failure
    Failed,
}

impl CollaborationStatus {
    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CollaborationStatus::Completed | CollaborationStatus::Failed
        )
    }
}

impl fmt::Display for CollaborationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CollaborationStatus::Pending => "pending",
            CollaborationStatus::InProgress => "in_progress",
            CollaborationStatus::Completed => "completed",
            CollaborationStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// TESTS
// ============================================================================
