//! Phase-gated collaborative workflows
//!
//! A collaboration runs one task through an ordered list of phases derived
//! from the task's workflow kind. A phase advances only once enough
//! distinct participants have contributed to it; after the last phase, one
//! participant synthesizes every contribution into the final result.

use crate::agent::SharedAgent;
use crate::bus::MessageBus;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use troupe_core::{
    new_entity_id, CollaborationError, CollaborationStatus, EntityId, MessageKind, Task, Timestamp,
    TroupeResult, WorkflowKind,
};
use troupe_llm::ReasoningContext;

/// One stage of a collaborative workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Short phase name
    pub name: String,
    /// What contributors are asked to do in this phase
    pub description: String,
    /// Distinct contributors needed before the phase advances
    pub required_agents: usize,
}

impl Phase {
    /// Create a phase.
    pub fn new(name: impl Into<String>, description: impl Into<String>, required_agents: usize) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required_agents,
        }
    }
}

/// Fixed phase template for a workflow kind.
/// The final phase of every template requires a single contributor - the
/// synthesizer's warm-up contribution.
pub fn phases_for(kind: WorkflowKind) -> Vec<Phase> {
    match kind {
        WorkflowKind::Analysis => vec![
            Phase::new("exploration", "Gather relevant facts and context", 2),
            Phase::new("evaluation", "Weigh the evidence and identify implications", 2),
            Phase::new("synthesis", "Produce the unified analysis", 1),
        ],
        WorkflowKind::Creative => vec![
            Phase::new("ideation", "Generate candidate ideas", 2),
            Phase::new("refinement", "Develop and stress the strongest ideas", 2),
            Phase::new("synthesis", "Produce the unified concept", 1),
        ],
        WorkflowKind::ProblemSolving => vec![
            Phase::new("diagnosis", "Identify the root cause", 2),
            Phase::new("solutioning", "Propose and compare solutions", 2),
            Phase::new("synthesis", "Produce the recommended solution", 1),
        ],
        WorkflowKind::General => vec![
            Phase::new("contribution", "Contribute your perspective on the task", 2),
            Phase::new("synthesis", "Produce the unified result", 1),
        ],
    }
}

/// What happened as a result of recording a contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaborationProgress {
    /// Recorded; the current phase still needs more contributors
    Recorded,
    /// The workflow advanced to the given phase index
    AdvancedTo(usize),
    /// The last phase completed and synthesis produced the final result
    Completed,
    /// Synthesis failed and the collaboration is terminally failed
    Failed,
}

/// A single recorded contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Phase index the contribution was made in
    pub phase: usize,
    /// Contribution text
    pub content: String,
    /// When it was recorded
    pub at: Timestamp,
}

/// A phase-gated workflow instance over one task and a set of agents.
pub struct Collaboration {
    /// Unique identifier
    pub id: EntityId,
    /// The task being worked
    pub task: Task,
    /// Workflow status
    pub status: CollaborationStatus,
    /// Ordered phases, fixed at construction
    pub phases: Vec<Phase>,
    /// Index of the phase currently accepting contributions
    pub current_phase: usize,
    /// Contributions keyed by agent name
    pub contributions: HashMap<String, Vec<Contribution>>,
    /// Final synthesized result (when completed)
    pub result: Option<String>,
    /// Failure reason (when failed)
    pub error: Option<String>,
    /// When the collaboration was created
    pub created_at: Timestamp,
    /// When the collaboration reached a terminal status
    pub completed_at: Option<Timestamp>,

    participants: Vec<SharedAgent>,
    participant_names: Vec<String>,
    bus: Arc<MessageBus>,
}

impl Collaboration {
    /// Create a collaboration with phases derived from the task's workflow
    /// kind. Rejects configurations that could never advance: an empty
    /// participant set, or a phase requiring more contributors than there
    /// are participants.
    pub fn new(task: Task, participants: Vec<SharedAgent>, bus: Arc<MessageBus>) -> TroupeResult<Self> {
        let phases = phases_for(task.kind);
        Self::with_phases(task, participants, bus, phases)
    }

    /// Create a collaboration with an explicit phase list.
    pub fn with_phases(
        task: Task,
        participants: Vec<SharedAgent>,
        bus: Arc<MessageBus>,
        phases: Vec<Phase>,
    ) -> TroupeResult<Self> {
        if participants.is_empty() {
            return Err(CollaborationError::NoParticipants.into());
        }
        for phase in &phases {
            if phase.required_agents > participants.len() {
                return Err(CollaborationError::PhaseUnsatisfiable {
                    phase: phase.name.clone(),
                    required: phase.required_agents,
                    participants: participants.len(),
                }
                .into());
            }
        }

        let participant_names = participants
            .iter()
            .map(|p| p.read().unwrap_or_else(|e| e.into_inner()).name.clone())
            .collect();

        Ok(Self {
            id: new_entity_id(),
            task,
            status: CollaborationStatus::Pending,
            phases,
            current_phase: 0,
            contributions: HashMap::new(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
            participants,
            participant_names,
            bus,
        })
    }

    /// Names of the participating agents, in participant order.
    pub fn participant_names(&self) -> &[String] {
        &self.participant_names
    }

    /// Move to in-progress and announce the opening phase.
    pub fn start(&mut self) {
        if self.status != CollaborationStatus::Pending {
            return;
        }
        self.status = CollaborationStatus::InProgress;
        tracing::info!(
            collaboration_id = %self.id,
            task_id = %self.task.id,
            phases = self.phases.len(),
            participants = self.participant_names.len(),
            "collaboration started"
        );
        self.announce_phase();
    }

    /// Record a contribution for the current phase. When the phase's
    /// required contributor count is met the workflow advances; meeting it
    /// on the final phase triggers synthesis and a terminal transition.
    pub fn add_contribution(
        &mut self,
        agent_name: &str,
        content: impl Into<String>,
    ) -> TroupeResult<CollaborationProgress> {
        if self.status.is_terminal() {
            return Err(CollaborationError::AlreadyTerminal {
                id: self.id,
                status: self.status.to_string(),
            }
            .into());
        }
        if self.status == CollaborationStatus::Pending {
            return Err(CollaborationError::NotStarted { id: self.id }.into());
        }
        if !self.participant_names.iter().any(|n| n == agent_name) {
            return Err(CollaborationError::NotAParticipant {
                id: self.id,
                name: agent_name.to_string(),
            }
            .into());
        }

        let phase_index = self.current_phase;
        self.contributions
            .entry(agent_name.to_string())
            .or_default()
            .push(Contribution {
                phase: phase_index,
                content: content.into(),
                at: Utc::now(),
            });

        if self.phase_contributor_count(phase_index) < self.phases[phase_index].required_agents {
            return Ok(CollaborationProgress::Recorded);
        }

        if phase_index + 1 < self.phases.len() {
            self.current_phase = phase_index + 1;
            self.announce_phase();
            return Ok(CollaborationProgress::AdvancedTo(self.current_phase));
        }

        match self.synthesize() {
            Ok(result) => {
                self.complete(result);
                Ok(CollaborationProgress::Completed)
            }
            Err(err) => {
                self.fail(err.to_string());
                Ok(CollaborationProgress::Failed)
            }
        }
    }

    /// Distinct contributors that have contributed to a phase.
    pub fn phase_contributor_count(&self, phase: usize) -> usize {
        self.contributions
            .values()
            .filter(|entries| entries.iter().any(|c| c.phase == phase))
            .count()
    }

    /// Merge every contribution into one prompt and ask the first
    /// participant to produce the unified result.
    fn synthesize(&self) -> TroupeResult<String> {
        let mut prompt = format!(
            "Synthesize the contributions below into one unified result.\n\nTask: {}\n\nContributions:\n",
            self.task.description
        );
        for name in &self.participant_names {
            if let Some(entries) = self.contributions.get(name) {
                for contribution in entries {
                    prompt.push_str(&format!(
                        "- {} ({}): {}\n",
                        name, self.phases[contribution.phase].name, contribution.content
                    ));
                }
            }
        }

        let synthesizer = self
            .participants
            .first()
            .ok_or(CollaborationError::NoParticipants)?;
        let mut agent = synthesizer.write().unwrap_or_else(|e| e.into_inner());
        let context = ReasoningContext::new().with_var("collaboration_id", self.id.to_string());
        agent.think(&prompt, &context)
    }

    /// Terminal success: store the result and notify every participant.
    pub fn complete(&mut self, result: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let result = result.into();
        self.status = CollaborationStatus::Completed;
        self.result = Some(result.clone());
        self.completed_at = Some(Utc::now());
        tracing::info!(collaboration_id = %self.id, "collaboration completed");
        self.notify_participants(
            MessageKind::Outcome,
            json!({
                "collaboration_id": self.id,
                "status": "completed",
                "result": result,
            }),
        );
    }

    /// Terminal failure: store the error and notify every participant.
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        let error = error.into();
        self.status = CollaborationStatus::Failed;
        self.error = Some(error.clone());
        self.completed_at = Some(Utc::now());
        tracing::warn!(collaboration_id = %self.id, error = %error, "collaboration failed");
        self.notify_participants(
            MessageKind::Outcome,
            json!({
                "collaboration_id": self.id,
                "status": "failed",
                "error": error,
            }),
        );
    }

    fn announce_phase(&self) {
        let phase = &self.phases[self.current_phase];
        self.notify_participants(
            MessageKind::PhaseChange,
            json!({
                "collaboration_id": self.id,
                "phase": self.current_phase,
                "name": phase.name,
                "description": phase.description,
                "required_agents": phase.required_agents,
            }),
        );
    }

    fn notify_participants(&self, kind: MessageKind, content: serde_json::Value) {
        let from = format!("collaboration:{}", self.id);
        for name in &self.participant_names {
            self.bus.send_message(&from, name, kind, content.clone());
        }
    }
}

impl std::fmt::Debug for Collaboration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaboration")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("current_phase", &self.current_phase)
            .field("phases", &self.phases.len())
            .field("participants", &self.participant_names)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
