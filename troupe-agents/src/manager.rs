//! Agent manager
//!
//! Top-level coordinator: owns the bus and the task queue, keeps the agent
//! directory, scores agents against pending tasks, and runs the background
//! dispatcher and health-monitor loops over a small worker pool.
//!
//! The loops run until the running flag is cleared; `stop` drains them
//! with a grace bounded by the configured poll intervals plus any reasoning
//! call already in flight.

use crate::agent::{Agent, AgentHandle, SharedAgent};
use crate::bus::{BusStats, MessageBus};
use crate::collaboration::Collaboration;
use crate::queue::{QueueStats, TaskQueue};
use crate::team::AgentTeam;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use troupe_core::{
    AgentError, AgentHealth, AgentState, EntityId, HealthStatus, Task, TaskPriority, Timestamp,
    TroupeConfig, TroupeResult,
};
use troupe_llm::{ReasoningProvider, UsageSnapshot};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for the background loops.
/// These track dispatch activity and can be scraped for monitoring.
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Dispatcher cycles that dequeued a task
    pub dispatch_cycles: AtomicU64,
    /// Tasks handed to an agent
    pub tasks_dispatched: AtomicU64,
    /// Dispatched tasks that completed
    pub tasks_completed: AtomicU64,
    /// Dispatched tasks that failed
    pub tasks_failed: AtomicU64,
    /// Tasks re-enqueued because no agent could take them
    pub tasks_requeued: AtomicU64,
    /// Health monitor sweeps completed
    pub monitor_cycles: AtomicU64,
}

/// Snapshot of dispatcher metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherSnapshot {
    pub dispatch_cycles: u64,
    pub tasks_dispatched: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_requeued: u64,
    pub monitor_cycles: u64,
}

impl DispatcherMetrics {
    /// Create new metrics with zero counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> DispatcherSnapshot {
        DispatcherSnapshot {
            dispatch_cycles: self.dispatch_cycles.load(Ordering::Relaxed),
            tasks_dispatched: self.tasks_dispatched.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_requeued: self.tasks_requeued.load(Ordering::Relaxed),
            monitor_cycles: self.monitor_cycles.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// WORKER POOL
// ============================================================================

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Spawn `size` worker threads draining jobs from a shared channel.
/// Workers exit when the sending side is dropped.
fn spawn_workers(size: usize) -> (mpsc::Sender<Job>, Vec<JoinHandle<()>>) {
    let (sender, receiver) = mpsc::channel::<Job>();
    let receiver = Arc::new(Mutex::new(receiver));

    let handles = (0..size)
        .map(|_| {
            let receiver = Arc::clone(&receiver);
            std::thread::spawn(move || loop {
                let job = {
                    let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
                    guard.recv()
                };
                match job {
                    Ok(job) => job(),
                    Err(_) => break,
                }
            })
        })
        .collect();

    (sender, handles)
}

// ============================================================================
// STATUS TYPES
// ============================================================================

/// Outcome of one dispatcher cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing was queued within the dequeue timeout
    Idle,
    /// A task was assigned and scheduled for execution
    Dispatched { agent: String },
    /// No agent could take the task; it went back at elevated priority
    Requeued,
}

/// Aggregate view of the whole system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub running: bool,
    pub agents_total: usize,
    pub agents_active: usize,
    pub agents_idle: usize,
    pub agents_paused: usize,
    pub agents_stopped: usize,
    /// Aggregate memory usage across agents, percent of total capacity
    pub memory_usage_pct: f64,
    pub queue: QueueStats,
    pub bus: BusStats,
    pub dispatcher: DispatcherSnapshot,
    pub usage: UsageSnapshot,
}

/// Aggregate health view of the whole system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: HealthStatus,
    pub agents: Vec<AgentHealth>,
}

// ============================================================================
// MANAGER
// ============================================================================

/// Top-level coordinator for a troupe of agents.
///
/// Construct one per system and share it as `Arc<AgentManager>`; the
/// background loops hold clones of the same Arc.
pub struct AgentManager {
    config: TroupeConfig,
    provider: Arc<dyn ReasoningProvider>,
    bus: Arc<MessageBus>,
    queue: Arc<TaskQueue>,
    agents: RwLock<HashMap<String, SharedAgent>>,
    running: AtomicBool,
    metrics: Arc<DispatcherMetrics>,
    job_sender: RwLock<Option<mpsc::Sender<Job>>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    loop_handles: Mutex<Vec<JoinHandle<()>>>,
    /// When the manager was created
    pub created_at: Timestamp,
}

impl AgentManager {
    /// Create a manager with a validated configuration and an injected
    /// reasoning provider.
    pub fn new(config: TroupeConfig, provider: Arc<dyn ReasoningProvider>) -> TroupeResult<Self> {
        config.validate()?;
        let bus = Arc::new(MessageBus::new(config.message_history_limit));
        Ok(Self {
            config,
            provider,
            bus,
            queue: Arc::new(TaskQueue::new()),
            agents: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            metrics: Arc::new(DispatcherMetrics::new()),
            job_sender: RwLock::new(None),
            worker_handles: Mutex::new(Vec::new()),
            loop_handles: Mutex::new(Vec::new()),
            created_at: Utc::now(),
        })
    }

    /// The manager's message bus.
    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }

    /// The shared task queue.
    pub fn queue(&self) -> Arc<TaskQueue> {
        Arc::clone(&self.queue)
    }

    /// The active configuration.
    pub fn config(&self) -> &TroupeConfig {
        &self.config
    }

    /// The reasoning provider agents are built against.
    pub fn provider(&self) -> Arc<dyn ReasoningProvider> {
        Arc::clone(&self.provider)
    }

    /// Snapshot of dispatcher counters.
    pub fn metrics(&self) -> DispatcherSnapshot {
        self.metrics.snapshot()
    }

    /// Whether the background loops are running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // REGISTRY
    // ========================================================================

    /// Register an agent: wire it to the bus and add it to the directory.
    pub fn register_agent(&self, mut agent: Agent) -> TroupeResult<SharedAgent> {
        let name = agent.name.clone();
        let mut agents = self.agents.write().unwrap_or_else(|e| e.into_inner());
        if agents.contains_key(&name) {
            return Err(AgentError::AlreadyRegistered { name }.into());
        }

        agent.attach_bus(Arc::clone(&self.bus));
        let shared: SharedAgent = Arc::new(RwLock::new(agent));
        self.bus
            .subscribe(&name, Arc::new(AgentHandle::new(Arc::clone(&shared))));
        agents.insert(name.clone(), Arc::clone(&shared));
        tracing::info!(agent = %name, "agent registered");
        Ok(shared)
    }

    /// Remove an agent from the directory, unsubscribe it from the bus and
    /// stop it.
    pub fn unregister_agent(&self, name: &str) -> bool {
        let removed = self
            .agents
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);
        match removed {
            Some(handle) => {
                self.bus.unsubscribe(name);
                handle.write().unwrap_or_else(|e| e.into_inner()).stop();
                tracing::info!(agent = %name, "agent unregistered");
                true
            }
            None => false,
        }
    }

    /// Look up a registered agent by name.
    pub fn agent(&self, name: &str) -> Option<SharedAgent> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Names of every registered agent.
    pub fn agent_names(&self) -> Vec<String> {
        self.agents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    // ========================================================================
    // TASKS
    // ========================================================================

    /// Enqueue a task for asynchronous assignment by the dispatcher.
    pub fn submit_task(&self, task: Task) -> EntityId {
        let id = task.id;
        tracing::debug!(task_id = %id, priority = %task.priority, "task submitted");
        self.queue.enqueue(task);
        id
    }

    /// Score every active agent against a task and return the best match.
    ///
    /// Score = capability-match fraction x 40
    ///       + workload headroom, max(0, 30 - 10 x active tasks)
    ///       + memory bonus (20 below 80% usage, 10 otherwise)
    ///       + recency bonus (10 within the activity window, 5 otherwise).
    ///
    /// Ties resolve to the first maximum in iteration order. Returns None
    /// only when no active agent exists.
    pub fn find_best_agent_for_task(&self, task: &Task) -> Option<(String, f64)> {
        let now = Utc::now();
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());

        let mut best: Option<(String, f64)> = None;
        for (name, handle) in agents.iter() {
            let agent = handle.read().unwrap_or_else(|e| e.into_inner());
            if agent.state != AgentState::Active {
                continue;
            }

            let capability_fraction = if task.required_capabilities.is_empty() {
                1.0
            } else {
                let matched = task
                    .required_capabilities
                    .iter()
                    .filter(|c| agent.has_capability(c))
                    .count();
                matched as f64 / task.required_capabilities.len() as f64
            };

            let workload = (30.0 - 10.0 * agent.active_tasks.len() as f64).max(0.0);
            let memory = if agent.memory.usage_percentage() < 80.0 {
                20.0
            } else {
                10.0
            };
            let recency = now
                .signed_duration_since(agent.last_activity)
                .to_std()
                .map(|age| age <= self.config.activity_window)
                .unwrap_or(true);
            let recency = if recency { 10.0 } else { 5.0 };

            let score = capability_fraction * 40.0 + workload + memory + recency;
            if best.as_ref().map(|(_, s)| score > *s).unwrap_or(true) {
                best = Some((name.clone(), score));
            }
        }
        best
    }

    /// Assign a task directly to a named agent.
    pub fn assign_task_to_agent(&self, task: Task, name: &str) -> TroupeResult<bool> {
        let handle = self.agent(name).ok_or_else(|| AgentError::NotRegistered {
            name: name.to_string(),
        })?;
        let mut agent = handle.write().unwrap_or_else(|e| e.into_inner());
        Ok(agent.assign_task(task))
    }

    /// Score and assign in one step. Returns the chosen agent's name, or
    /// None when no agent could take the task.
    pub fn auto_assign_task(&self, task: Task) -> Option<String> {
        let (name, _) = self.find_best_agent_for_task(&task)?;
        let handle = self.agent(&name)?;
        let mut agent = handle.write().unwrap_or_else(|e| e.into_inner());
        agent.assign_task(task).then_some(name)
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Run one dispatcher cycle: dequeue with the configured timeout, score
    /// agents, and either schedule execution or re-enqueue at elevated
    /// priority. No task is ever dropped.
    ///
    /// When the worker pool is not running the execution job runs inline,
    /// which keeps this callable synchronously.
    pub fn dispatch_once(&self) -> DispatchOutcome {
        let Some(task) = self.queue.dequeue(self.config.dispatch_interval) else {
            return DispatchOutcome::Idle;
        };
        self.metrics.dispatch_cycles.fetch_add(1, Ordering::Relaxed);

        let task_id = task.id;
        let chosen = self.find_best_agent_for_task(&task).and_then(|(name, score)| {
            let handle = self.agent(&name)?;
            let assigned = handle
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .assign_task(task.clone());
            assigned.then_some((name, score, handle))
        });

        let Some((name, score, handle)) = chosen else {
            return self.requeue(task);
        };

        tracing::debug!(task_id = %task_id, agent = %name, score, "task dispatched");
        self.metrics.tasks_dispatched.fetch_add(1, Ordering::Relaxed);

        let job = self.execution_job(handle, task_id, Arc::clone(&self.queue));

        let sender = self
            .job_sender
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match sender {
            Some(sender) => {
                if let Err(send_error) = sender.send(job) {
                    // Pool already shut down; run inline rather than drop.
                    (send_error.0)();
                }
            }
            None => job(),
        }

        DispatchOutcome::Dispatched { agent: name }
    }

    /// Re-enqueue a task nobody could take, elevating it to at least high
    /// priority so it is retried ahead of routine work.
    fn requeue(&self, mut task: Task) -> DispatchOutcome {
        if task.priority.score() < TaskPriority::High.score() {
            task.priority = TaskPriority::High;
        }
        tracing::warn!(
            task_id = %task.id,
            priority = %task.priority,
            "no agent available, task re-enqueued"
        );
        self.queue.enqueue(task);
        self.metrics.tasks_requeued.fetch_add(1, Ordering::Relaxed);
        DispatchOutcome::Requeued
    }

    fn execution_job(&self, handle: SharedAgent, task_id: EntityId, queue: Arc<TaskQueue>) -> Job {
        let metrics = Arc::clone(&self.metrics);
        Box::new(move || {
            let outcome = {
                let mut agent = handle.write().unwrap_or_else(|e| e.into_inner());
                agent.execute_task(task_id)
            };
            queue.mark_processed(task_id);
            match outcome {
                Ok(_) => {
                    metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(task_id = %task_id, error = %err, "task execution failed");
                }
            }
        })
    }

    // ========================================================================
    // BACKGROUND LOOPS
    // ========================================================================

    /// Start the worker pool, the dispatcher loop and the health monitor.
    /// Calling start on a running manager is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (sender, workers) = spawn_workers(self.config.worker_threads);
        *self.job_sender.write().unwrap_or_else(|e| e.into_inner()) = Some(sender);
        *self
            .worker_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = workers;

        tracing::info!(
            worker_threads = self.config.worker_threads,
            dispatch_interval_ms = self.config.dispatch_interval.as_millis() as u64,
            monitor_interval_ms = self.config.monitor_interval.as_millis() as u64,
            "agent manager started"
        );

        let dispatcher = {
            let manager = Arc::clone(self);
            std::thread::spawn(move || {
                while manager.running.load(Ordering::SeqCst) {
                    if manager.dispatch_once() == DispatchOutcome::Requeued {
                        manager.sleep_while_running(manager.config.dispatch_backoff);
                    }
                }
                tracing::info!("dispatcher loop stopped");
            })
        };

        let monitor = {
            let manager = Arc::clone(self);
            std::thread::spawn(move || {
                while manager.running.load(Ordering::SeqCst) {
                    manager.sleep_while_running(manager.config.monitor_interval);
                    if !manager.running.load(Ordering::SeqCst) {
                        break;
                    }
                    manager.monitor_once();
                }
                tracing::info!("health monitor stopped");
            })
        };

        self.loop_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend([dispatcher, monitor]);
    }

    /// Clear the running flag and drain the loops and the worker pool.
    /// Returns once everything has exited; in-flight reasoning calls are
    /// allowed to finish.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        for handle in self
            .loop_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            let _ = handle.join();
        }

        // Dropping the sender lets workers drain and exit.
        self.job_sender
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        for handle in self
            .worker_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
        {
            let _ = handle.join();
        }

        let snapshot = self.metrics.snapshot();
        tracing::info!(
            tasks_dispatched = snapshot.tasks_dispatched,
            tasks_completed = snapshot.tasks_completed,
            tasks_failed = snapshot.tasks_failed,
            tasks_requeued = snapshot.tasks_requeued,
            monitor_cycles = snapshot.monitor_cycles,
            "agent manager stopped"
        );
    }

    /// Sleep in short slices so stop() is never blocked on a full interval.
    fn sleep_while_running(&self, duration: Duration) {
        const SLICE: Duration = Duration::from_millis(50);
        let mut remaining = duration;
        while !remaining.is_zero() && self.running.load(Ordering::SeqCst) {
            let nap = SLICE.min(remaining);
            std::thread::sleep(nap);
            remaining -= nap;
        }
    }

    /// One health monitor sweep: check every agent and log unhealthy ones.
    /// Agents currently locked by a worker are skipped until the next sweep.
    pub fn monitor_once(&self) {
        self.metrics.monitor_cycles.fetch_add(1, Ordering::Relaxed);

        let handles: Vec<(String, SharedAgent)> = {
            let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
            agents
                .iter()
                .map(|(name, handle)| (name.clone(), Arc::clone(handle)))
                .collect()
        };

        for (name, handle) in handles {
            match handle.try_read() {
                Ok(agent) => {
                    let health = agent.health_check();
                    if !health.healthy {
                        tracing::warn!(
                            agent = %name,
                            memory_ok = health.memory_ok,
                            no_stale_tasks = health.no_stale_tasks,
                            last_activity_recent = health.last_activity_recent,
                            "agent unhealthy"
                        );
                    }
                }
                Err(_) => {
                    tracing::debug!(agent = %name, "agent busy, skipping health check");
                }
            }
        }
    }

    // ========================================================================
    // HIGHER-LEVEL OBJECTS
    // ========================================================================

    /// Register a set of new agents and group them into a team.
    pub fn create_agent_team(
        &self,
        name: impl Into<String>,
        agents: Vec<Agent>,
        strategy: troupe_core::TeamStrategy,
    ) -> TroupeResult<AgentTeam> {
        let mut members = Vec::with_capacity(agents.len());
        for agent in agents {
            members.push(self.register_agent(agent)?);
        }
        Ok(AgentTeam::new(name, members, strategy).with_bus(Arc::clone(&self.bus)))
    }

    /// Register a set of new agents and start a collaboration over the
    /// task, with phases derived from the task's workflow kind.
    pub fn orchestrate_collaboration(
        &self,
        task: Task,
        agents: Vec<Agent>,
    ) -> TroupeResult<Collaboration> {
        let mut participants = Vec::with_capacity(agents.len());
        for agent in agents {
            participants.push(self.register_agent(agent)?);
        }
        self.start_collaboration(task, participants)
    }

    /// Start a collaboration over already-registered agents.
    pub fn collaboration_of(
        &self,
        task: Task,
        participant_names: &[&str],
    ) -> TroupeResult<Collaboration> {
        let mut participants = Vec::with_capacity(participant_names.len());
        for name in participant_names {
            participants.push(self.agent(name).ok_or_else(|| AgentError::NotRegistered {
                name: name.to_string(),
            })?);
        }
        self.start_collaboration(task, participants)
    }

    fn start_collaboration(
        &self,
        task: Task,
        participants: Vec<SharedAgent>,
    ) -> TroupeResult<Collaboration> {
        let mut collaboration = Collaboration::new(task, participants, Arc::clone(&self.bus))?;
        collaboration.start();
        Ok(collaboration)
    }

    // ========================================================================
    // REPORTING
    // ========================================================================

    /// Aggregate counts over agents, queue, bus and reasoning usage.
    pub fn system_status(&self) -> SystemStatus {
        let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());

        let mut by_state = [0usize; 4];
        let mut memory_used = 0usize;
        let mut memory_capacity = 0usize;
        let mut usage = UsageSnapshot {
            calls: 0,
            failures: 0,
            prompt_chars: 0,
            completion_chars: 0,
        };
        for handle in agents.values() {
            let agent = handle.read().unwrap_or_else(|e| e.into_inner());
            let slot = match agent.state {
                AgentState::Idle => 0,
                AgentState::Active => 1,
                AgentState::Paused => 2,
                AgentState::Stopped => 3,
            };
            by_state[slot] += 1;
            memory_used += agent.memory.len();
            memory_capacity += agent.memory.capacity();

            let snapshot = agent.usage.snapshot();
            usage.calls += snapshot.calls;
            usage.failures += snapshot.failures;
            usage.prompt_chars += snapshot.prompt_chars;
            usage.completion_chars += snapshot.completion_chars;
        }

        let memory_usage_pct = if memory_capacity == 0 {
            0.0
        } else {
            let pct = memory_used as f64 / memory_capacity as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        };

        SystemStatus {
            running: self.is_running(),
            agents_total: agents.len(),
            agents_idle: by_state[0],
            agents_active: by_state[1],
            agents_paused: by_state[2],
            agents_stopped: by_state[3],
            memory_usage_pct,
            queue: self.queue.stats(),
            bus: self.bus.stats(),
            dispatcher: self.metrics.snapshot(),
            usage,
        }
    }

    /// Health check over every registered agent.
    pub fn health_check(&self) -> SystemHealth {
        let handles: Vec<SharedAgent> = {
            let agents = self.agents.read().unwrap_or_else(|e| e.into_inner());
            agents.values().cloned().collect()
        };
        let reports: Vec<AgentHealth> = handles
            .iter()
            .map(|h| h.read().unwrap_or_else(|e| e.into_inner()).health_check())
            .collect();

        let status = if reports.is_empty() {
            HealthStatus::Degraded
        } else if reports.iter().all(|r| r.healthy) {
            HealthStatus::Healthy
        } else if reports.iter().any(|r| r.healthy) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Unhealthy
        };

        SystemHealth {
            status,
            agents: reports,
        }
    }
}

impl Drop for AgentManager {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AgentManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentManager")
            .field("agents", &self.agent_names())
            .field("running", &self.is_running())
            .field("queue_size", &self.queue.size())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::{TaskStatus, TeamStrategy};
    use troupe_llm::StubReasoningProvider;

    fn stub_manager() -> AgentManager {
        AgentManager::new(
            TroupeConfig::development(),
            Arc::new(StubReasoningProvider::new()),
        )
        .unwrap()
    }

    fn new_agent(manager: &AgentManager, name: &str, capabilities: Vec<&str>) -> Agent {
        Agent::new(
            name,
            "worker",
            capabilities.into_iter().map(String::from).collect(),
            manager.provider(),
            manager.config(),
        )
    }

    fn register_started(
        manager: &AgentManager,
        name: &str,
        capabilities: Vec<&str>,
    ) -> SharedAgent {
        let mut agent = new_agent(manager, name, capabilities);
        agent.start();
        manager.register_agent(agent).unwrap()
    }

    #[test]
    fn test_register_rejects_duplicate_names() {
        let manager = stub_manager();
        register_started(&manager, "atlas", vec![]);
        let err = manager
            .register_agent(new_agent(&manager, "atlas", vec![]))
            .unwrap_err();
        assert!(matches!(
            err,
            troupe_core::TroupeError::Agent(AgentError::AlreadyRegistered { .. })
        ));
    }

    #[test]
    fn test_unregister_stops_and_unsubscribes() {
        let manager = stub_manager();
        let handle = register_started(&manager, "atlas", vec![]);

        assert!(manager.unregister_agent("atlas"));
        assert!(!manager.unregister_agent("atlas"));
        assert_eq!(handle.read().unwrap().state, AgentState::Stopped);
        assert!(!manager.bus().is_subscribed("atlas"));
    }

    #[test]
    fn test_scoring_formula_for_fresh_capable_agent() {
        let manager = stub_manager();
        register_started(&manager, "atlas", vec!["research"]);

        let task = Task::new("t").with_capabilities(vec!["research".to_string()]);
        let (name, score) = manager.find_best_agent_for_task(&task).unwrap();
        assert_eq!(name, "atlas");
        // 40 (full capability match) + 30 (no load) + 20 (memory) + 10 (recent)
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_scoring_penalizes_load_and_partial_capabilities() {
        let manager = stub_manager();
        let handle = register_started(&manager, "atlas", vec!["research"]);
        handle.write().unwrap().assign_task(Task::new("busywork"));

        let task = Task::new("t").with_capabilities(vec![
            "research".to_string(),
            "analysis".to_string(),
        ]);
        let (_, score) = manager.find_best_agent_for_task(&task).unwrap();
        // 20 (half the capabilities) + 20 (one active task) + 20 + 10
        assert_eq!(score, 70.0);
    }

    #[test]
    fn test_find_best_ignores_inactive_agents() {
        let manager = stub_manager();
        let handle = register_started(&manager, "atlas", vec![]);
        handle.write().unwrap().pause();

        assert!(manager.find_best_agent_for_task(&Task::new("t")).is_none());
    }

    #[test]
    fn test_auto_assign_places_task_on_best_agent() {
        let manager = stub_manager();
        let busy = register_started(&manager, "busy", vec![]);
        busy.write().unwrap().assign_task(Task::new("existing"));
        let free = register_started(&manager, "free", vec![]);

        let assigned = manager.auto_assign_task(Task::new("new")).unwrap();
        assert_eq!(assigned, "free");
        assert_eq!(free.read().unwrap().active_tasks.len(), 1);
        assert_eq!(busy.read().unwrap().active_tasks.len(), 1);
    }

    #[test]
    fn test_dispatch_once_idle_on_empty_queue() {
        let manager = stub_manager();
        assert_eq!(manager.dispatch_once(), DispatchOutcome::Idle);
    }

    #[test]
    fn test_dispatch_once_requeues_when_no_capable_agent() {
        let manager = stub_manager();
        // Active agent without the required capability: scored, chosen,
        // refused at the assignment gate.
        register_started(&manager, "atlas", vec!["writing"]);

        let task = Task::new("needs x")
            .with_priority(TaskPriority::High)
            .with_capabilities(vec!["x".to_string()]);
        manager.submit_task(task);

        assert_eq!(manager.dispatch_once(), DispatchOutcome::Requeued);
        assert_eq!(manager.queue().size(), 1);
        assert_eq!(
            manager.queue().peek().unwrap().priority,
            TaskPriority::High
        );
        assert_eq!(manager.metrics().tasks_requeued, 1);
    }

    #[test]
    fn test_dispatch_once_elevates_priority_on_requeue() {
        let manager = stub_manager();
        manager.submit_task(Task::new("nobody home"));

        assert_eq!(manager.dispatch_once(), DispatchOutcome::Requeued);
        assert_eq!(
            manager.queue().peek().unwrap().priority,
            TaskPriority::High
        );
    }

    #[test]
    fn test_dispatch_once_executes_inline_without_pool() {
        let manager = stub_manager();
        let handle = register_started(&manager, "atlas", vec![]);
        manager.submit_task(Task::new("quick work"));

        let outcome = manager.dispatch_once();
        assert_eq!(
            outcome,
            DispatchOutcome::Dispatched {
                agent: "atlas".to_string()
            }
        );

        let agent = handle.read().unwrap();
        assert_eq!(agent.completed_tasks.len(), 1);
        assert_eq!(agent.completed_tasks[0].status, TaskStatus::Completed);
        assert_eq!(manager.queue().total_processed(), 1);
        assert_eq!(manager.metrics().tasks_completed, 1);
    }

    #[test]
    fn test_dispatcher_converts_provider_failure_into_task_failure() {
        let manager = AgentManager::new(
            TroupeConfig {
                stub_responses: false,
                ..TroupeConfig::development()
            },
            Arc::new(StubReasoningProvider::new().failing_on("Task:")),
        )
        .unwrap();
        let handle = register_started(&manager, "atlas", vec![]);
        manager.submit_task(Task::new("doomed"));

        // The loop must not propagate the provider error.
        manager.dispatch_once();

        let agent = handle.read().unwrap();
        assert_eq!(agent.failed_tasks.len(), 1);
        assert_eq!(manager.metrics().tasks_failed, 1);
    }

    #[test]
    fn test_system_status_aggregates() {
        let manager = stub_manager();
        register_started(&manager, "a", vec![]);
        let paused = register_started(&manager, "b", vec![]);
        paused.write().unwrap().pause();

        let status = manager.system_status();
        assert_eq!(status.agents_total, 2);
        assert_eq!(status.agents_active, 1);
        assert_eq!(status.agents_paused, 1);
        assert!(!status.running);
        assert_eq!(status.memory_usage_pct, 0.0);
    }

    #[test]
    fn test_health_check_statuses() {
        let manager = stub_manager();
        assert_eq!(manager.health_check().status, HealthStatus::Degraded);

        register_started(&manager, "a", vec![]);
        assert_eq!(manager.health_check().status, HealthStatus::Healthy);
    }

    #[test]
    fn test_create_agent_team_registers_members() {
        let manager = stub_manager();
        let agents = vec![
            new_agent(&manager, "a", vec![]),
            new_agent(&manager, "b", vec![]),
        ];
        let team = manager
            .create_agent_team("squad", agents, TeamStrategy::RoundRobin)
            .unwrap();

        assert_eq!(team.member_names(), vec!["a", "b"]);
        assert!(manager.agent("a").is_some());
        assert!(manager.bus().is_subscribed("b"));
    }

    #[test]
    fn test_collaboration_of_requires_registered_agents() {
        let manager = stub_manager();
        let err = manager
            .collaboration_of(Task::new("t"), &["ghost"])
            .unwrap_err();
        assert!(matches!(
            err,
            troupe_core::TroupeError::Agent(AgentError::NotRegistered { .. })
        ));
    }

    #[test]
    fn test_orchestrate_collaboration_starts_in_progress() {
        let manager = stub_manager();
        let mut a = new_agent(&manager, "a", vec![]);
        let mut b = new_agent(&manager, "b", vec![]);
        a.start();
        b.start();

        let collaboration = manager
            .orchestrate_collaboration(Task::new("joint effort"), vec![a, b])
            .unwrap();
        assert_eq!(
            collaboration.status,
            troupe_core::CollaborationStatus::InProgress
        );
        assert_eq!(collaboration.participant_names(), ["a", "b"]);
    }
}
