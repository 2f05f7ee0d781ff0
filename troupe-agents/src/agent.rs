//! Agent base type
//!
//! A named, capability-tagged worker with lifecycle state, its own memory,
//! an inbox, and a bounded number of concurrent tasks. Reasoning goes
//! through the injected provider; coordination goes through the bus.
//!
//! Agent state is not internally locked: each instance is driven by one
//! logical owner at a time (the dispatcher worker that holds its lock, or a
//! direct caller). `SharedAgent` is the handle that enforces this.

use crate::bus::{AgentMessage, MessageBus, Subscriber};
use crate::memory::AgentMemory;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use troupe_core::{
    AgentAction, AgentError, AgentHealth, AgentState, EntityId, Importance, MessageKind, Task,
    Timestamp, TroupeConfig, TroupeResult,
};
use troupe_llm::{ReasoningContext, ReasoningProvider, UsageTracker, STUB_RESPONSE};

/// Shared handle to an agent. All mutation goes through the lock; callers
/// must not hold it across calls that deliver messages back to the same
/// agent.
pub type SharedAgent = Arc<RwLock<Agent>>;

/// A structured next-action decision produced by `decide_next_action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Chosen action
    pub action: AgentAction,
    /// Why the agent chose it
    #[serde(default)]
    pub reason: String,
}

/// A task responsibility transfer sent over the bus.
/// The receiver re-runs its own acceptance gate before taking the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDelegation {
    /// The task being handed over
    pub task: Task,
    /// Delegating agent
    pub from: String,
    /// Why the task is being handed over
    pub reason: String,
    /// When the delegation was issued
    pub delegated_at: Timestamp,
}

/// Read-only snapshot of an agent for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub name: String,
    pub role: String,
    pub state: AgentState,
    pub capabilities: Vec<String>,
    pub active_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    pub memory_entries: usize,
    pub memory_usage_pct: f64,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

/// An autonomous worker in the troupe.
pub struct Agent {
    /// Unique name, doubles as the bus address
    pub name: String,
    /// Free-text role label, woven into prompts
    pub role: String,
    /// Capability tags used for task matching
    pub capabilities: Vec<String>,
    /// Lifecycle state
    pub state: AgentState,
    /// Owned memory store
    pub memory: AgentMemory,
    /// Tasks currently being worked on
    pub active_tasks: Vec<Task>,
    /// Finished tasks with results
    pub completed_tasks: Vec<Task>,
    /// Finished tasks with errors
    pub failed_tasks: Vec<Task>,
    /// When the agent was created
    pub created_at: Timestamp,
    /// Last time the agent did anything
    pub last_activity: Timestamp,
    /// Concurrency bound
    pub max_concurrent_tasks: usize,
    /// Staleness bound for active tasks
    pub max_task_duration: Duration,
    /// Window within which activity counts as recent
    pub activity_window: Duration,
    /// Reasoning call counters
    pub usage: Arc<UsageTracker>,

    stub_responses: bool,
    provider: Arc<dyn ReasoningProvider>,
    bus: Option<Arc<MessageBus>>,
    inbox: Vec<AgentMessage>,
}

impl Agent {
    /// Create an idle agent.
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        capabilities: Vec<String>,
        provider: Arc<dyn ReasoningProvider>,
        config: &TroupeConfig,
    ) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            role: role.into(),
            capabilities,
            state: AgentState::Idle,
            memory: AgentMemory::new(config.memory_size),
            active_tasks: Vec::new(),
            completed_tasks: Vec::new(),
            failed_tasks: Vec::new(),
            created_at: now,
            last_activity: now,
            max_concurrent_tasks: config.max_concurrent_tasks,
            max_task_duration: config.max_task_duration,
            activity_window: config.activity_window,
            usage: Arc::new(UsageTracker::new()),
            stub_responses: config.stub_responses,
            provider,
            bus: None,
            inbox: Vec::new(),
        }
    }

    /// Connect the agent to a message bus. Done by the manager at
    /// registration time.
    pub fn attach_bus(&mut self, bus: Arc<MessageBus>) {
        self.bus = Some(bus);
    }

    /// Record activity now.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Idle -> Active. Returns false for any other starting state.
    pub fn start(&mut self) -> bool {
        if self.state != AgentState::Idle {
            return false;
        }
        self.state = AgentState::Active;
        self.touch();
        true
    }

    /// Active -> Paused.
    pub fn pause(&mut self) -> bool {
        if self.state != AgentState::Active {
            return false;
        }
        self.state = AgentState::Paused;
        self.touch();
        true
    }

    /// Paused -> Active.
    pub fn resume(&mut self) -> bool {
        if self.state != AgentState::Paused {
            return false;
        }
        self.state = AgentState::Active;
        self.touch();
        true
    }

    /// Any state -> Stopped. Terminal.
    pub fn stop(&mut self) -> bool {
        if self.state == AgentState::Stopped {
            return false;
        }
        self.state = AgentState::Stopped;
        self.touch();
        true
    }

    // ========================================================================
    // TASKS
    // ========================================================================

    /// Check if the agent has a capability tag.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Active, under capacity, and holding every required capability.
    pub fn can_handle_task(&self, task: &Task) -> bool {
        self.state.can_accept_work()
            && self.active_tasks.len() < self.max_concurrent_tasks
            && task.capabilities_satisfied_by(&self.capabilities)
    }

    /// Take responsibility for a task. Returns false without side effects
    /// if the acceptance gate fails.
    pub fn assign_task(&mut self, mut task: Task) -> bool {
        if !self.can_handle_task(&task) {
            return false;
        }
        task.mark_assigned(&self.name);
        self.active_tasks.push(task);
        self.touch();
        true
    }

    /// Move an active task to the completed list with its result.
    pub fn complete_task(&mut self, task_id: EntityId, result: &str) -> bool {
        let Some(position) = self.active_tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let mut task = self.active_tasks.remove(position);
        task.mark_completed(result);
        self.completed_tasks.push(task);
        self.touch();
        true
    }

    /// Move an active task to the failed list with its error.
    pub fn fail_task(&mut self, task_id: EntityId, error: &str) -> bool {
        let Some(position) = self.active_tasks.iter().position(|t| t.id == task_id) else {
            return false;
        };
        let mut task = self.active_tasks.remove(position);
        task.mark_failed(error);
        self.failed_tasks.push(task);
        self.touch();
        true
    }

    /// Run an active task to completion through the reasoning provider.
    /// The outcome lands on the task either way: a provider failure becomes
    /// the task's failure record and is also returned to the caller.
    pub fn execute_task(&mut self, task_id: EntityId) -> TroupeResult<String> {
        let task = self
            .active_tasks
            .iter()
            .find(|t| t.id == task_id)
            .cloned()
            .ok_or_else(|| AgentError::TaskNotFound {
                name: self.name.clone(),
                task_id,
            })?;

        let context = ReasoningContext::new()
            .with_var("task_id", task.id.to_string())
            .with_var("workflow", task.kind.to_string());
        let prompt = format!(
            "Complete the following task and report the outcome.\n\nTask: {}",
            task.description
        );

        match self.think(&prompt, &context) {
            Ok(result) => {
                self.complete_task(task_id, &result);
                Ok(result)
            }
            Err(err) => {
                self.fail_task(task_id, &err.to_string());
                Err(err)
            }
        }
    }

    // ========================================================================
    // REASONING
    // ========================================================================

    /// Ask the reasoning provider for text, with the agent's identity and
    /// the context annotated into the prompt. The sole LLM contact point.
    pub fn think(&mut self, prompt: &str, context: &ReasoningContext) -> TroupeResult<String> {
        self.touch();
        let full_prompt = self.build_prompt(prompt, context);

        if self.stub_responses {
            return Ok(STUB_RESPONSE.to_string());
        }

        match self.provider.generate(&full_prompt, context) {
            Ok(response) => {
                self.usage.record_success(full_prompt.len(), response.len());
                Ok(response)
            }
            Err(err) => {
                self.usage.record_failure(full_prompt.len());
                Err(err)
            }
        }
    }

    fn build_prompt(&self, prompt: &str, context: &ReasoningContext) -> String {
        let mut lines = vec![format!("You are {}, a {} agent.", self.name, self.role)];
        if !self.capabilities.is_empty() {
            lines.push(format!("Capabilities: {}.", self.capabilities.join(", ")));
        }
        // Sort for a deterministic prompt regardless of map order.
        let mut vars: Vec<(&String, &String)> = context.vars.iter().collect();
        vars.sort_by_key(|(k, _)| k.as_str());
        for (key, value) in vars {
            lines.push(format!("{}: {}", key, value));
        }
        lines.push(String::new());
        lines.push(prompt.to_string());
        lines.join("\n")
    }

    /// Pick the next action from a fixed vocabulary. A malformed provider
    /// response falls back to waiting; only transport-level provider
    /// failures surface as errors.
    pub fn decide_next_action(&mut self, context: &ReasoningContext) -> TroupeResult<Decision> {
        let prompt = "Decide your next action. Respond with JSON only: \
                      {\"action\": \"wait|think|act|collaborate|delegate\", \"reason\": \"...\"}";
        let response = self.think(prompt, context)?;
        Ok(serde_json::from_str(&response).unwrap_or_else(|_| Decision {
            action: AgentAction::Wait,
            reason: "could not parse decision response".to_string(),
        }))
    }

    /// Produce a contribution toward a shared task and forward it to the
    /// other agent as a progress message.
    pub fn collaborate_with(
        &mut self,
        other: &str,
        task: &Task,
        context: &ReasoningContext,
    ) -> TroupeResult<String> {
        let prompt = format!(
            "You are collaborating with {} on a shared task. Offer your strongest contribution.\n\nTask: {}",
            other, task.description
        );
        let contribution = self.think(&prompt, context)?;

        if other != self.name {
            if let Some(bus) = &self.bus {
                bus.send_message(
                    &self.name,
                    other,
                    MessageKind::Progress,
                    json!({ "task_id": task.id, "contribution": contribution }),
                );
            }
        }
        Ok(contribution)
    }

    // ========================================================================
    // MESSAGING
    // ========================================================================

    /// Send a chat message to another agent through the bus.
    pub fn send_message(&self, to: &str, content: serde_json::Value) -> bool {
        match &self.bus {
            Some(bus) => bus.send_message(&self.name, to, MessageKind::Chat, content),
            None => {
                tracing::warn!(agent = %self.name, "cannot send message: no bus attached");
                false
            }
        }
    }

    /// Accept an inbound message: remember it and keep it in the inbox.
    /// A stopped agent refuses delivery.
    pub fn receive_message(&mut self, message: AgentMessage) -> TroupeResult<()> {
        if self.state == AgentState::Stopped {
            return Err(AgentError::NotActive {
                name: self.name.clone(),
                state: self.state.to_string(),
            }
            .into());
        }

        let key = format!("message:{}:{}", message.from, message.id);
        self.memory.add(
            key,
            json!({
                "from": message.from,
                "kind": message.kind,
                "content": message.content,
            }),
            Importance::Normal,
        );
        self.inbox.push(message);
        self.touch();
        Ok(())
    }

    /// Messages received so far, oldest first.
    pub fn inbox(&self) -> &[AgentMessage] {
        &self.inbox
    }

    /// Take every message out of the inbox.
    pub fn drain_inbox(&mut self) -> Vec<AgentMessage> {
        std::mem::take(&mut self.inbox)
    }

    // ========================================================================
    // DELEGATION
    // ========================================================================

    /// Hand a task to another agent over the bus. The receiver decides
    /// whether to accept; a refused delegation is simply dropped.
    pub fn delegate_task(&mut self, task: Task, target: &str, reason: &str) -> bool {
        if target == self.name {
            return false;
        }
        let Some(bus) = &self.bus else {
            tracing::warn!(agent = %self.name, "cannot delegate: no bus attached");
            return false;
        };

        let delegation = TaskDelegation {
            task,
            from: self.name.clone(),
            reason: reason.to_string(),
            delegated_at: Utc::now(),
        };
        let content = match serde_json::to_value(&delegation) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(agent = %self.name, error = %err, "could not encode delegation");
                return false;
            }
        };
        let sent = bus.send_message(&self.name, target, MessageKind::Delegation, content);
        self.touch();
        sent
    }

    /// Accept a delegated task after re-running the acceptance gate.
    pub fn accept_delegated_task(&mut self, delegation: TaskDelegation) -> bool {
        if !self.can_handle_task(&delegation.task) {
            tracing::debug!(
                agent = %self.name,
                from = %delegation.from,
                task_id = %delegation.task.id,
                "delegated task refused"
            );
            return false;
        }
        self.assign_task(delegation.task)
    }

    // ========================================================================
    // MEMORY PASS-THROUGHS
    // ========================================================================

    /// Store a fact in memory.
    pub fn remember(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        importance: Importance,
    ) {
        self.memory.add(key, value, importance);
    }

    /// Recall a fact by key.
    pub fn recall(&mut self, key: &str) -> Option<serde_json::Value> {
        self.memory.get(key)
    }

    /// Forget a fact by key.
    pub fn forget(&mut self, key: &str) -> Option<serde_json::Value> {
        self.memory.remove(key)
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    /// Read-only status snapshot.
    pub fn status(&self) -> AgentStatusReport {
        AgentStatusReport {
            name: self.name.clone(),
            role: self.role.clone(),
            state: self.state,
            capabilities: self.capabilities.clone(),
            active_tasks: self.active_tasks.len(),
            completed_tasks: self.completed_tasks.len(),
            failed_tasks: self.failed_tasks.len(),
            memory_entries: self.memory.len(),
            memory_usage_pct: self.memory.usage_percentage(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }

    /// Health report: memory below 90%, no task past the staleness bound,
    /// and activity within the recent window.
    pub fn health_check(&self) -> AgentHealth {
        let now = Utc::now();
        let memory_usage_pct = self.memory.usage_percentage();
        let memory_ok = memory_usage_pct < 90.0;

        let no_stale_tasks = self.active_tasks.iter().all(|task| {
            task.assigned_at
                .map(|at| {
                    now.signed_duration_since(at)
                        .to_std()
                        .map(|age| age <= self.max_task_duration)
                        .unwrap_or(true)
                })
                .unwrap_or(true)
        });

        let last_activity_recent = now
            .signed_duration_since(self.last_activity)
            .to_std()
            .map(|age| age <= self.activity_window)
            .unwrap_or(true);

        AgentHealth {
            agent: self.name.clone(),
            memory_ok,
            memory_usage_pct,
            no_stale_tasks,
            last_activity_recent,
            last_activity: self.last_activity,
            healthy: memory_ok && no_stale_tasks && last_activity_recent,
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("capabilities", &self.capabilities)
            .field("active_tasks", &self.active_tasks.len())
            .field("provider", &self.provider.provider_id())
            .finish()
    }
}

// ============================================================================
// BUS HANDLE
// ============================================================================

/// Subscriber adapter handing bus deliveries to a shared agent.
pub struct AgentHandle {
    inner: SharedAgent,
}

impl AgentHandle {
    /// Wrap a shared agent for bus registration.
    pub fn new(inner: SharedAgent) -> Self {
        Self { inner }
    }
}

impl Subscriber for AgentHandle {
    fn deliver(&self, message: AgentMessage) -> TroupeResult<()> {
        let mut agent = self.inner.write().unwrap_or_else(|e| e.into_inner());
        agent.receive_message(message)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use troupe_llm::StubReasoningProvider;

    fn stub_config() -> TroupeConfig {
        TroupeConfig::development()
    }

    fn live_config() -> TroupeConfig {
        TroupeConfig {
            stub_responses: false,
            ..TroupeConfig::development()
        }
    }

    fn agent_with(config: &TroupeConfig, provider: StubReasoningProvider) -> Agent {
        let mut agent = Agent::new(
            "atlas",
            "research specialist",
            vec!["research".to_string(), "analysis".to_string()],
            Arc::new(provider),
            config,
        );
        agent.start();
        agent
    }

    fn active_agent() -> Agent {
        agent_with(&stub_config(), StubReasoningProvider::new())
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut agent = Agent::new(
            "a",
            "worker",
            vec![],
            Arc::new(StubReasoningProvider::new()),
            &stub_config(),
        );

        assert_eq!(agent.state, AgentState::Idle);
        assert!(agent.start());
        assert_eq!(agent.state, AgentState::Active);
        assert!(!agent.start());

        assert!(agent.pause());
        assert_eq!(agent.state, AgentState::Paused);
        assert!(!agent.pause());

        assert!(agent.resume());
        assert_eq!(agent.state, AgentState::Active);

        assert!(agent.stop());
        assert_eq!(agent.state, AgentState::Stopped);
        assert!(!agent.stop());
        assert!(!agent.start());
    }

    #[test]
    fn test_assign_requires_active_state() {
        let mut agent = Agent::new(
            "a",
            "worker",
            vec![],
            Arc::new(StubReasoningProvider::new()),
            &stub_config(),
        );
        assert!(!agent.assign_task(Task::new("idle refuses")));

        agent.start();
        assert!(agent.assign_task(Task::new("active accepts")));

        agent.pause();
        assert!(!agent.assign_task(Task::new("paused refuses")));
    }

    #[test]
    fn test_assign_enforces_capacity() {
        let config = TroupeConfig {
            max_concurrent_tasks: 2,
            ..stub_config()
        };
        let mut agent = agent_with(&config, StubReasoningProvider::new());

        assert!(agent.assign_task(Task::new("one")));
        assert!(agent.assign_task(Task::new("two")));
        assert!(!agent.assign_task(Task::new("three")));
        assert_eq!(agent.active_tasks.len(), 2);
    }

    #[test]
    fn test_assign_requires_all_capabilities() {
        let mut agent = active_agent();

        let partial = Task::new("needs more").with_capabilities(vec![
            "research".to_string(),
            "sculpting".to_string(),
        ]);
        assert!(!agent.assign_task(partial));

        let covered = Task::new("covered").with_capabilities(vec![
            "research".to_string(),
            "analysis".to_string(),
        ]);
        assert!(agent.assign_task(covered));
    }

    #[test]
    fn test_can_handle_is_idempotent() {
        let agent = active_agent();
        let task = Task::new("t").with_capabilities(vec!["research".to_string()]);
        let first = agent.can_handle_task(&task);
        let second = agent.can_handle_task(&task);
        assert_eq!(first, second);
        assert!(first);
    }

    #[test]
    fn test_complete_task_moves_record() {
        let mut agent = active_agent();
        let task = Task::new("work");
        let id = task.id;
        agent.assign_task(task);

        assert!(agent.complete_task(id, "all done"));
        assert!(agent.active_tasks.is_empty());
        assert_eq!(agent.completed_tasks.len(), 1);
        assert_eq!(agent.completed_tasks[0].result.as_deref(), Some("all done"));
        assert!(!agent.complete_task(id, "again"));
    }

    #[test]
    fn test_fail_task_moves_record() {
        let mut agent = active_agent();
        let task = Task::new("work");
        let id = task.id;
        agent.assign_task(task);

        assert!(agent.fail_task(id, "boom"));
        assert!(agent.active_tasks.is_empty());
        assert_eq!(agent.failed_tasks.len(), 1);
        assert_eq!(agent.failed_tasks[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_think_stubbed_returns_placeholder() {
        let mut agent = active_agent();
        let reply = agent.think("anything", &ReasoningContext::new()).unwrap();
        assert_eq!(reply, STUB_RESPONSE);
    }

    #[test]
    fn test_think_provider_error_propagates_and_counts() {
        let mut agent = agent_with(
            &live_config(),
            StubReasoningProvider::new().failing_on("doomed"),
        );
        assert!(agent.think("doomed prompt", &ReasoningContext::new()).is_err());
        let usage = agent.usage.snapshot();
        assert_eq!(usage.calls, 1);
        assert_eq!(usage.failures, 1);
    }

    #[test]
    fn test_prompt_carries_identity_and_context() {
        let mut agent = agent_with(&live_config(), StubReasoningProvider::new());
        let context = ReasoningContext::new().with_var("team", "alpha");
        agent.think("do the thing", &context).unwrap();

        let prompt = agent.build_prompt("do the thing", &context);
        assert!(prompt.contains("You are atlas, a research specialist agent."));
        assert!(prompt.contains("Capabilities: research, analysis."));
        assert!(prompt.contains("team: alpha"));
        assert!(prompt.ends_with("do the thing"));
    }

    #[test]
    fn test_decide_next_action_parses_valid_json() {
        let mut agent = agent_with(
            &live_config(),
            StubReasoningProvider::with_reply(r#"{"action": "act", "reason": "ready"}"#),
        );
        let decision = agent.decide_next_action(&ReasoningContext::new()).unwrap();
        assert_eq!(decision.action, AgentAction::Act);
        assert_eq!(decision.reason, "ready");
    }

    #[test]
    fn test_decide_next_action_falls_back_to_wait() {
        let mut agent = agent_with(
            &live_config(),
            StubReasoningProvider::with_reply("not json at all"),
        );
        let decision = agent.decide_next_action(&ReasoningContext::new()).unwrap();
        assert_eq!(decision.action, AgentAction::Wait);
        assert!(decision.reason.contains("parse"));
    }

    #[test]
    fn test_receive_message_stores_in_memory_and_inbox() {
        let mut agent = active_agent();
        let message = AgentMessage::new("bob", "atlas", MessageKind::Chat, json!("hello"));
        let key = format!("message:bob:{}", message.id);

        agent.receive_message(message).unwrap();

        assert_eq!(agent.inbox().len(), 1);
        assert!(agent.recall(&key).is_some());
    }

    #[test]
    fn test_stopped_agent_refuses_delivery() {
        let mut agent = active_agent();
        agent.stop();
        let message = AgentMessage::new("bob", "atlas", MessageKind::Chat, json!("hello"));
        assert!(agent.receive_message(message).is_err());
    }

    #[test]
    fn test_delegation_accept_and_refuse() {
        let mut capable = active_agent();
        let delegation = TaskDelegation {
            task: Task::new("research this").with_capabilities(vec!["research".to_string()]),
            from: "bob".to_string(),
            reason: "capability match".to_string(),
            delegated_at: Utc::now(),
        };
        assert!(capable.accept_delegated_task(delegation.clone()));
        assert_eq!(capable.active_tasks.len(), 1);

        let mut unable = agent_with(&stub_config(), StubReasoningProvider::new());
        unable.capabilities = vec!["catering".to_string()];
        assert!(!unable.accept_delegated_task(delegation));
        assert!(unable.active_tasks.is_empty());
    }

    #[test]
    fn test_delegate_to_self_is_refused() {
        let mut agent = active_agent();
        assert!(!agent.delegate_task(Task::new("loop"), "atlas", "why not"));
    }

    #[test]
    fn test_execute_task_success_and_failure() {
        let mut agent = active_agent();
        let task = Task::new("work");
        let id = task.id;
        agent.assign_task(task);
        assert_eq!(agent.execute_task(id).unwrap(), STUB_RESPONSE);
        assert_eq!(agent.completed_tasks.len(), 1);

        let mut failing = agent_with(
            &live_config(),
            StubReasoningProvider::new().failing_on("Task:"),
        );
        let task = Task::new("doomed work");
        let id = task.id;
        failing.assign_task(task);
        assert!(failing.execute_task(id).is_err());
        assert_eq!(failing.failed_tasks.len(), 1);
        assert!(failing.failed_tasks[0].error.is_some());
    }

    #[test]
    fn test_health_check_flags_old_activity_only() {
        let mut agent = active_agent();
        agent.last_activity = Utc::now() - ChronoDuration::minutes(10);

        let health = agent.health_check();
        assert!(!health.last_activity_recent);
        assert!(health.memory_ok);
        assert!(health.no_stale_tasks);
        assert!(!health.healthy);
    }

    #[test]
    fn test_health_check_flags_stale_task() {
        let mut agent = active_agent();
        let task = Task::new("slow");
        let id = task.id;
        agent.assign_task(task);
        let slot = agent.active_tasks.iter_mut().find(|t| t.id == id).unwrap();
        slot.assigned_at = Some(Utc::now() - ChronoDuration::hours(1));

        let health = agent.health_check();
        assert!(!health.no_stale_tasks);
        assert!(health.last_activity_recent);
        assert!(!health.healthy);
    }

    #[test]
    fn test_remember_recall_forget() {
        let mut agent = active_agent();
        agent.remember("fact", json!(42), Importance::High);
        assert_eq!(agent.recall("fact"), Some(json!(42)));
        assert_eq!(agent.forget("fact"), Some(json!(42)));
        assert_eq!(agent.recall("fact"), None);
    }
}
