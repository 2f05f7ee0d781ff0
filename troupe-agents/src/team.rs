//! Agent teams
//!
//! A team is a named group of shared agents plus an assignment strategy.
//! Members are shared, not owned - the same agents stay registered with
//! the manager and reachable over the bus.

use crate::agent::SharedAgent;
use crate::bus::MessageBus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use troupe_core::{new_entity_id, EntityId, MessageKind, Task, TeamStrategy, Timestamp};
use troupe_core::{AgentHealth, AgentState};
use troupe_llm::ReasoningContext;

/// One member's contribution to a collaborative round.
/// A failed contribution is recorded, not raised - partial failure is
/// tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamContribution {
    /// Contributing agent
    pub agent: String,
    /// Contribution text (when the agent succeeded)
    pub content: Option<String>,
    /// Error text (when the agent's reasoning call failed)
    pub error: Option<String>,
}

/// Record of one collaborative round over a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamCollaboration {
    /// Task worked in this round
    pub task_id: EntityId,
    /// Task description at the time of the round
    pub task_description: String,
    /// One entry per member, in member order
    pub contributions: Vec<TeamContribution>,
    /// When the round started
    pub started_at: Timestamp,
    /// When the round finished
    pub finished_at: Timestamp,
}

/// Outcome of a team task assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum TeamAssignment {
    /// The task went to a single member
    Assigned { agent: String },
    /// The collaborative strategy ran a full round instead
    Collaborative(TeamCollaboration),
    /// No member could take the task
    Unassigned,
}

/// Aggregate team health view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamHealth {
    pub team: String,
    pub members: usize,
    pub active_members: usize,
    pub healthy_members: usize,
    pub total_active_tasks: usize,
    pub reports: Vec<AgentHealth>,
}

/// Lessons derived from a team's collaboration history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamLearnings {
    /// Rounds recorded so far
    pub collaborations: usize,
    /// Fraction of contributions that succeeded, in [0, 1]
    pub success_rate: f64,
    /// Distinct failure reasons with occurrence counts, most common first
    pub common_errors: Vec<(String, usize)>,
    /// Member with the most successful contributions
    pub most_active: Option<String>,
}

/// A named group of agents with an assignment strategy.
pub struct AgentTeam {
    /// Team name
    pub name: String,
    /// Assignment strategy
    pub strategy: TeamStrategy,
    /// Free-form shared team state
    pub team_memory: HashMap<String, serde_json::Value>,
    /// Past collaborative rounds
    pub collaboration_history: Vec<TeamCollaboration>,

    members: Vec<SharedAgent>,
    cursor: usize,
    bus: Option<Arc<MessageBus>>,
}

impl AgentTeam {
    /// Create a team over existing shared agents.
    pub fn new(name: impl Into<String>, members: Vec<SharedAgent>, strategy: TeamStrategy) -> Self {
        Self {
            name: name.into(),
            strategy,
            team_memory: HashMap::new(),
            collaboration_history: Vec::new(),
            members,
            cursor: 0,
            bus: None,
        }
    }

    /// Connect the team to the manager's message bus.
    pub fn with_bus(mut self, bus: Arc<MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Member handles, in team order.
    pub fn members(&self) -> &[SharedAgent] {
        &self.members
    }

    /// Member names, in team order.
    pub fn member_names(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.read().unwrap_or_else(|e| e.into_inner()).name.clone())
            .collect()
    }

    /// Assign a task according to the team strategy.
    pub fn assign_task(&mut self, task: Task) -> TeamAssignment {
        if self.members.is_empty() {
            return TeamAssignment::Unassigned;
        }
        match self.strategy {
            TeamStrategy::RoundRobin => self.assign_round_robin(task),
            TeamStrategy::CapabilityBased => self.assign_capability_based(task),
            TeamStrategy::LoadBalanced => self.assign_load_balanced(task),
            TeamStrategy::Collaborative => {
                TeamAssignment::Collaborative(self.collaborate_on_task(task))
            }
        }
    }

    /// Cycle the cursor across the member list, wrapping modulo length.
    /// The cursor advances whether or not the pick accepts the task.
    fn assign_round_robin(&mut self, task: Task) -> TeamAssignment {
        let pick = &self.members[self.cursor % self.members.len()];
        self.cursor = self.cursor.wrapping_add(1);

        let mut agent = pick.write().unwrap_or_else(|e| e.into_inner());
        if agent.assign_task(task) {
            TeamAssignment::Assigned {
                agent: agent.name.clone(),
            }
        } else {
            TeamAssignment::Unassigned
        }
    }

    /// Pick the active member covering the most required capabilities,
    /// first maximum on ties.
    fn assign_capability_based(&mut self, task: Task) -> TeamAssignment {
        let mut best: Option<(usize, usize)> = None;
        for (index, member) in self.members.iter().enumerate() {
            let agent = member.read().unwrap_or_else(|e| e.into_inner());
            if agent.state != AgentState::Active {
                continue;
            }
            let coverage = task
                .required_capabilities
                .iter()
                .filter(|c| agent.has_capability(c))
                .count();
            if best.map(|(_, score)| coverage > score).unwrap_or(true) {
                best = Some((index, coverage));
            }
        }

        match best {
            Some((index, _)) => {
                let mut agent = self.members[index].write().unwrap_or_else(|e| e.into_inner());
                if agent.assign_task(task) {
                    TeamAssignment::Assigned {
                        agent: agent.name.clone(),
                    }
                } else {
                    TeamAssignment::Unassigned
                }
            }
            None => TeamAssignment::Unassigned,
        }
    }

    /// Pick the active member with the fewest active tasks, first minimum
    /// on ties.
    fn assign_load_balanced(&mut self, task: Task) -> TeamAssignment {
        let mut best: Option<(usize, usize)> = None;
        for (index, member) in self.members.iter().enumerate() {
            let agent = member.read().unwrap_or_else(|e| e.into_inner());
            if agent.state != AgentState::Active {
                continue;
            }
            let load = agent.active_tasks.len();
            if best.map(|(_, current)| load < current).unwrap_or(true) {
                best = Some((index, load));
            }
        }

        match best {
            Some((index, _)) => {
                let mut agent = self.members[index].write().unwrap_or_else(|e| e.into_inner());
                if agent.assign_task(task) {
                    TeamAssignment::Assigned {
                        agent: agent.name.clone(),
                    }
                } else {
                    TeamAssignment::Unassigned
                }
            }
            None => TeamAssignment::Unassigned,
        }
    }

    /// Run a collaborative round: every member contributes independently.
    /// A member whose reasoning call fails is recorded as an error entry
    /// rather than aborting the round.
    pub fn collaborate_on_task(&mut self, task: Task) -> TeamCollaboration {
        let started_at = Utc::now();
        let context = ReasoningContext::new().with_var("team", self.name.clone());
        let prompt = format!(
            "Your team \"{}\" is collaborating on a shared task. Offer your strongest contribution.\n\nTask: {}",
            self.name, task.description
        );

        let mut contributions = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let mut agent = member.write().unwrap_or_else(|e| e.into_inner());
            let name = agent.name.clone();
            let entry = match agent.think(&prompt, &context) {
                Ok(content) => TeamContribution {
                    agent: name,
                    content: Some(content),
                    error: None,
                },
                Err(err) => {
                    tracing::warn!(team = %self.name, agent = %name, error = %err, "contribution failed");
                    TeamContribution {
                        agent: name,
                        content: None,
                        error: Some(err.to_string()),
                    }
                }
            };
            contributions.push(entry);
        }

        let record = TeamCollaboration {
            task_id: task.id,
            task_description: task.description.clone(),
            contributions,
            started_at,
            finished_at: Utc::now(),
        };
        self.collaboration_history.push(record.clone());
        record
    }

    /// Ask every member for a perspective on the agenda and store the
    /// round in team memory.
    pub fn team_meeting(&mut self, agenda: &str) -> HashMap<String, String> {
        let context = ReasoningContext::new().with_var("team", self.name.clone());
        let prompt = format!(
            "Team meeting. Share your perspective on the agenda below.\n\nAgenda: {}",
            agenda
        );

        let mut perspectives = HashMap::new();
        for member in &self.members {
            let mut agent = member.write().unwrap_or_else(|e| e.into_inner());
            let name = agent.name.clone();
            let view = match agent.think(&prompt, &context) {
                Ok(view) => view,
                Err(err) => format!("error: {}", err),
            };
            perspectives.insert(name, view);
        }

        self.team_memory.insert(
            format!("meeting:{}", new_entity_id()),
            serde_json::json!({ "agenda": agenda, "perspectives": perspectives }),
        );
        perspectives
    }

    /// Record a piece of knowledge in team memory and push it to every
    /// other member over the bus. Returns the delivery count.
    pub fn share_knowledge(&mut self, agent_name: &str, knowledge: serde_json::Value) -> usize {
        self.team_memory.insert(
            format!("knowledge:{}:{}", agent_name, new_entity_id()),
            knowledge.clone(),
        );

        let Some(bus) = &self.bus else {
            return 0;
        };
        let mut delivered = 0;
        for name in self.member_names() {
            if name == agent_name {
                continue;
            }
            if bus.send_message(agent_name, &name, MessageKind::Knowledge, knowledge.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Aggregate health view over every member.
    pub fn team_health(&self) -> TeamHealth {
        let mut reports = Vec::with_capacity(self.members.len());
        let mut active_members = 0;
        let mut total_active_tasks = 0;
        for member in &self.members {
            let agent = member.read().unwrap_or_else(|e| e.into_inner());
            if agent.state == AgentState::Active {
                active_members += 1;
            }
            total_active_tasks += agent.active_tasks.len();
            reports.push(agent.health_check());
        }

        TeamHealth {
            team: self.name.clone(),
            members: self.members.len(),
            active_members,
            healthy_members: reports.iter().filter(|r| r.healthy).count(),
            total_active_tasks,
            reports,
        }
    }

    /// Derive lessons from the collaboration history.
    pub fn learn_from_experience(&self) -> TeamLearnings {
        let mut successes = 0usize;
        let mut failures: HashMap<String, usize> = HashMap::new();
        let mut per_agent: HashMap<String, usize> = HashMap::new();
        let mut total = 0usize;

        for round in &self.collaboration_history {
            for contribution in &round.contributions {
                total += 1;
                match (&contribution.content, &contribution.error) {
                    (Some(_), _) => {
                        successes += 1;
                        *per_agent.entry(contribution.agent.clone()).or_default() += 1;
                    }
                    (None, Some(error)) => {
                        *failures.entry(error.clone()).or_default() += 1;
                    }
                    (None, None) => {}
                }
            }
        }

        let mut common_errors: Vec<(String, usize)> = failures.into_iter().collect();
        common_errors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let most_active = per_agent
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(agent, _)| agent);

        TeamLearnings {
            collaborations: self.collaboration_history.len(),
            success_rate: if total == 0 {
                0.0
            } else {
                successes as f64 / total as f64
            },
            common_errors,
            most_active,
        }
    }
}

impl std::fmt::Debug for AgentTeam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTeam")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .field("members", &self.member_names())
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
