//! Specialized agent presets
//!
//! Research, creative, technical and coordinator agents are the same base
//! type with a distinct default role and capability set, plus a handful of
//! templated convenience calls. No new state-machine behavior lives here.

use crate::agent::Agent;
use serde_json::json;
use std::sync::Arc;
use troupe_core::{Importance, Task, TroupeConfig, TroupeResult};
use troupe_llm::{ReasoningContext, ReasoningProvider};

/// Derive a memory key from free text: lowercase, hyphenated, truncated.
fn derived_key(prefix: &str, text: &str) -> String {
    let slug: String = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(48)
        .collect();
    format!("{}:{}", prefix, slug)
}

impl Agent {
    // ========================================================================
    // PRESETS
    // ========================================================================

    /// A research specialist.
    pub fn research(
        name: impl Into<String>,
        provider: Arc<dyn ReasoningProvider>,
        config: &TroupeConfig,
    ) -> Self {
        Self::new(
            name,
            "research specialist",
            vec![
                "research".to_string(),
                "analysis".to_string(),
                "summarization".to_string(),
            ],
            provider,
            config,
        )
    }

    /// A creative generalist.
    pub fn creative(
        name: impl Into<String>,
        provider: Arc<dyn ReasoningProvider>,
        config: &TroupeConfig,
    ) -> Self {
        Self::new(
            name,
            "creative generalist",
            vec![
                "brainstorming".to_string(),
                "writing".to_string(),
                "ideation".to_string(),
            ],
            provider,
            config,
        )
    }

    /// A technical specialist.
    pub fn technical(
        name: impl Into<String>,
        provider: Arc<dyn ReasoningProvider>,
        config: &TroupeConfig,
    ) -> Self {
        Self::new(
            name,
            "technical specialist",
            vec![
                "coding".to_string(),
                "debugging".to_string(),
                "architecture".to_string(),
            ],
            provider,
            config,
        )
    }

    /// A coordinator that plans and delegates.
    pub fn coordinator(
        name: impl Into<String>,
        provider: Arc<dyn ReasoningProvider>,
        config: &TroupeConfig,
    ) -> Self {
        Self::new(
            name,
            "coordinator",
            vec![
                "coordination".to_string(),
                "planning".to_string(),
                "delegation".to_string(),
            ],
            provider,
            config,
        )
    }

    // ========================================================================
    // TEMPLATED CONVENIENCE CALLS
    // ========================================================================

    /// Research a topic and keep the findings.
    pub fn research_topic(&mut self, topic: &str) -> TroupeResult<String> {
        let prompt = format!(
            "Research the following topic and summarize the key findings.\n\nTopic: {}",
            topic
        );
        let findings = self.think(&prompt, &ReasoningContext::new())?;
        self.remember(
            derived_key("research", topic),
            json!(findings),
            Importance::High,
        );
        Ok(findings)
    }

    /// Brainstorm ideas on a subject and keep the list.
    pub fn brainstorm(&mut self, subject: &str, ideas: usize) -> TroupeResult<String> {
        let prompt = format!(
            "Brainstorm {} distinct ideas for the subject below. One idea per line.\n\nSubject: {}",
            ideas, subject
        );
        let result = self.think(&prompt, &ReasoningContext::new())?;
        self.remember(
            derived_key("brainstorm", subject),
            json!(result),
            Importance::Normal,
        );
        Ok(result)
    }

    /// Work through a problem and keep the proposed solution.
    pub fn solve_problem(&mut self, problem: &str) -> TroupeResult<String> {
        let prompt = format!(
            "Diagnose the problem below, then propose and justify a solution.\n\nProblem: {}",
            problem
        );
        let solution = self.think(&prompt, &ReasoningContext::new())?;
        self.remember(
            derived_key("solution", problem),
            json!(solution),
            Importance::High,
        );
        Ok(solution)
    }

    /// Plan how a task should be split across a set of agents and keep the
    /// plan.
    pub fn coordinate_task(&mut self, task: &Task, agent_names: &[String]) -> TroupeResult<String> {
        let prompt = format!(
            "Plan how to split the task below across these agents: {}.\n\nTask: {}",
            agent_names.join(", "),
            task.description
        );
        let plan = self.think(&prompt, &ReasoningContext::new())?;
        self.remember(format!("plan:{}", task.id), json!(plan), Importance::High);
        Ok(plan)
    }
}

// ============================================================================
// TESTS
// ============================================================================
