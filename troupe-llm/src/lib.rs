//! Troupe LLM - Reasoning Abstraction Layer
//!
//! Provider-agnostic trait for text generation. This crate defines the
//! interface that reasoning providers must implement; actual provider
//! implementations (Anthropic, OpenAI, local models) are user-supplied.
//! The orchestration core touches an LLM through nothing but this trait.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use troupe_core::{ProviderError, TroupeResult};

/// Placeholder returned by `think` when stubbed responses are enabled.
/// Fixed and inspectable so tests can assert on it.
pub const STUB_RESPONSE: &str = "[stubbed reasoning response]";

// ============================================================================
// REASONING PROVIDER TRAIT
// ============================================================================

/// Context handed to the provider alongside the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningContext {
    /// Model identifier hint (provider-specific)
    pub model: Option<String>,
    /// Free-form key/value pairs annotated into or alongside the prompt
    pub vars: HashMap<String, String>,
}

impl ReasoningContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model hint.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a context variable.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

/// Trait for reasoning providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// # Example
/// ```ignore
/// struct ClaudeProvider { /* ... */ }
///
/// impl ReasoningProvider for ClaudeProvider {
///     fn generate(&self, prompt: &str, context: &ReasoningContext) -> TroupeResult<String> {
///         // Call the Anthropic API
///     }
///     // ...
/// }
/// ```
pub trait ReasoningProvider: Send + Sync {
    /// Generate a text completion for the prompt.
    ///
    /// # Returns
    /// * `Ok(String)` - The generated text
    /// * `Err(TroupeError::Provider)` - On auth, rate-limit, transport or
    ///   malformed-response failures
    fn generate(&self, prompt: &str, context: &ReasoningContext) -> TroupeResult<String>;

    /// Get the provider identifier (e.g., "anthropic", "stub").
    fn provider_id(&self) -> &str;
}

// ============================================================================
// USAGE TRACKER
// ============================================================================

/// Tracks reasoning-call volume across the system.
/// Thread-safe via atomic operations.
#[derive(Debug, Default)]
pub struct UsageTracker {
    calls: AtomicU64,
    failures: AtomicU64,
    prompt_chars: AtomicU64,
    completion_chars: AtomicU64,
}

/// Snapshot of usage counters at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub failures: u64,
    pub prompt_chars: u64,
    pub completion_chars: u64,
}

impl UsageTracker {
    /// Create a new tracker with zero counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful reasoning call.
    pub fn record_success(&self, prompt_chars: usize, completion_chars: usize) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.prompt_chars
            .fetch_add(prompt_chars as u64, Ordering::Relaxed);
        self.completion_chars
            .fetch_add(completion_chars as u64, Ordering::Relaxed);
    }

    /// Record a failed reasoning call.
    pub fn record_failure(&self, prompt_chars: usize) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.prompt_chars
            .fetch_add(prompt_chars as u64, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters.
    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            prompt_chars: self.prompt_chars.load(Ordering::Relaxed),
            completion_chars: self.completion_chars.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.calls.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.prompt_chars.store(0, Ordering::Relaxed);
        self.completion_chars.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// STUB PROVIDER FOR TESTING
// ============================================================================

/// Deterministic stub provider for testing and offline runs.
/// Echoes a canned reply, optionally failing on a trigger substring so
/// failure paths can be exercised.
#[derive(Debug, Clone)]
pub struct StubReasoningProvider {
    /// Reply returned for every prompt
    reply: String,
    /// When set, prompts containing this substring fail with a RequestFailed
    fail_trigger: Option<String>,
}

impl StubReasoningProvider {
    /// Create a stub returning the default canned reply.
    pub fn new() -> Self {
        Self {
            reply: STUB_RESPONSE.to_string(),
            fail_trigger: None,
        }
    }

    /// Create a stub returning a custom reply.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            fail_trigger: None,
        }
    }

    /// Make the stub fail for prompts containing the trigger substring.
    pub fn failing_on(mut self, trigger: impl Into<String>) -> Self {
        self.fail_trigger = Some(trigger.into());
        self
    }
}

impl Default for StubReasoningProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ReasoningProvider for StubReasoningProvider {
    fn generate(&self, prompt: &str, _context: &ReasoningContext) -> TroupeResult<String> {
        if let Some(trigger) = &self.fail_trigger {
            if prompt.contains(trigger.as_str()) {
                return Err(ProviderError::RequestFailed {
                    provider: self.provider_id().to_string(),
                    status: 500,
                    message: format!("stubbed failure on trigger '{}'", trigger),
                }
                .into());
            }
        }
        Ok(self.reply.clone())
    }

    fn provider_id(&self) -> &str {
        "stub"
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use troupe_core::TroupeError;

    #[test]
    fn test_stub_provider_returns_canned_reply() {
        let provider = StubReasoningProvider::new();
        let reply = provider
            .generate("anything", &ReasoningContext::new())
            .unwrap();
        assert_eq!(reply, STUB_RESPONSE);
    }

    #[test]
    fn test_stub_provider_custom_reply_is_deterministic() {
        let provider = StubReasoningProvider::with_reply("42");
        let a = provider.generate("q1", &ReasoningContext::new()).unwrap();
        let b = provider.generate("q2", &ReasoningContext::new()).unwrap();
        assert_eq!(a, "42");
        assert_eq!(a, b);
    }

    #[test]
    fn test_stub_provider_fails_on_trigger() {
        let provider = StubReasoningProvider::new().failing_on("explode");
        let ok = provider.generate("fine prompt", &ReasoningContext::new());
        assert!(ok.is_ok());

        let err = provider
            .generate("please explode now", &ReasoningContext::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TroupeError::Provider(ProviderError::RequestFailed { .. })
        ));
    }

    #[test]
    fn test_reasoning_context_builders() {
        let context = ReasoningContext::new()
            .with_model("claude-sonnet-4-5")
            .with_var("topic", "orchestration");
        assert_eq!(context.model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(context.vars.get("topic").map(String::as_str), Some("orchestration"));
    }

    #[test]
    fn test_usage_tracker_counts() {
        let tracker = UsageTracker::new();
        tracker.record_success(100, 40);
        tracker.record_success(50, 10);
        tracker.record_failure(30);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.calls, 3);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.prompt_chars, 180);
        assert_eq!(snapshot.completion_chars, 50);
    }

    #[test]
    fn test_usage_tracker_reset() {
        let tracker = UsageTracker::new();
        tracker.record_success(10, 10);
        tracker.reset();
        assert_eq!(tracker.snapshot().calls, 0);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
