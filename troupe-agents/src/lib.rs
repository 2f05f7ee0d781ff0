//! Troupe Agents - Multi-Agent Orchestration Runtime
//!
//! Autonomous, capability-tagged agents coordinated by a manager. The
//! manager owns a shared priority task queue and a publish/subscribe
//! message bus, scores agents against pending tasks, and runs background
//! dispatch and health-monitor loops. Agents can be grouped into teams
//! with an assignment strategy, or into phase-gated collaborations that
//! synthesize a final result once every phase has enough contributions.
//!
//! Reasoning is injected at construction time through the
//! `troupe_llm::ReasoningProvider` trait; nothing in this crate talks to
//! an LLM any other way.

mod agent;
mod bus;
mod collaboration;
mod manager;
mod memory;
mod queue;
mod specialized;
mod team;

pub use agent::{Agent, AgentHandle, AgentStatusReport, Decision, SharedAgent, TaskDelegation};
pub use bus::{AgentMessage, BusStats, MessageBus, Subscriber};
pub use collaboration::{phases_for, Collaboration, CollaborationProgress, Contribution, Phase};
pub use manager::{
    AgentManager, DispatchOutcome, DispatcherMetrics, DispatcherSnapshot, SystemHealth,
    SystemStatus,
};
pub use memory::{AgentMemory, MemoryEntry, MemoryStats};
pub use queue::{QueueStats, TaskQueue};
pub use team::{
    AgentTeam, TeamAssignment, TeamCollaboration, TeamContribution, TeamHealth, TeamLearnings,
};
