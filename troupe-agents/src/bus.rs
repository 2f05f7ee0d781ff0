//! Publish/subscribe message bus
//!
//! Maps agent names to delivery handles. Delivery is synchronous,
//! at-most-once and best-effort: a failed delivery is logged and recorded
//! in history, never raised to the sender.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use troupe_core::{new_entity_id, EntityId, MessageKind, Timestamp, TroupeResult};
use troupe_core::DEFAULT_MESSAGE_HISTORY_LIMIT;

/// A message between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Unique identifier for this message
    pub id: EntityId,
    /// Sender name
    pub from: String,
    /// Recipient name
    pub to: String,
    /// Message kind for receiver-side dispatch
    pub kind: MessageKind,
    /// Opaque payload
    pub content: serde_json::Value,
    /// When the message was created
    pub timestamp: Timestamp,
    /// Whether delivery succeeded
    pub delivered: bool,
}

impl AgentMessage {
    /// Create a new undelivered message.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: new_entity_id(),
            from: from.into(),
            to: to.into(),
            kind,
            content,
            timestamp: Utc::now(),
            delivered: false,
        }
    }
}

/// Delivery handle registered with the bus.
/// Implementations must be thread-safe (Send + Sync).
pub trait Subscriber: Send + Sync {
    /// Hand a message to the receiver. An error marks the message as
    /// undelivered; it is never propagated to the sender.
    fn deliver(&self, message: AgentMessage) -> TroupeResult<()>;
}

/// Snapshot of bus counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub subscribers: usize,
    pub total_messages: u64,
    pub delivered: u64,
    pub failed: u64,
    pub history_len: usize,
}

/// Publish/subscribe registry with a bounded rolling history.
pub struct MessageBus {
    subscribers: RwLock<HashMap<String, Arc<dyn Subscriber>>>,
    history: Mutex<VecDeque<AgentMessage>>,
    max_history: usize,
    total_messages: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl MessageBus {
    /// Create a bus with the given history cap.
    pub fn new(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            max_history,
            total_messages: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Register a delivery handle under an agent name.
    /// Replaces any previous registration for the same name.
    pub fn subscribe(&self, name: impl Into<String>, subscriber: Arc<dyn Subscriber>) {
        let name = name.into();
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.clone(), subscriber);
        tracing::debug!(agent = %name, "subscribed to message bus");
    }

    /// Remove a registration. Messages already delivered are unaffected.
    pub fn unsubscribe(&self, name: &str) -> bool {
        let removed = self
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
            .is_some();
        if removed {
            tracing::debug!(agent = %name, "unsubscribed from message bus");
        }
        removed
    }

    /// Check whether a name is currently subscribed.
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }

    /// Names of all current subscribers.
    pub fn subscriber_names(&self) -> Vec<String> {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Send a message to a single recipient.
    ///
    /// Returns true only if the recipient is subscribed and its handler
    /// accepted the message. Every attempt, successful or not, lands in
    /// history with the `delivered` flag set accordingly.
    pub fn send_message(
        &self,
        from: &str,
        to: &str,
        kind: MessageKind,
        content: serde_json::Value,
    ) -> bool {
        let mut message = AgentMessage::new(from, to, kind, content);
        self.total_messages.fetch_add(1, Ordering::Relaxed);

        // Clone the handle out so delivery runs without the registry lock.
        let subscriber = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(to)
            .cloned();

        let ok = match subscriber {
            None => {
                tracing::warn!(from = %from, to = %to, "message undeliverable: recipient not subscribed");
                false
            }
            Some(subscriber) => match subscriber.deliver(message.clone()) {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(from = %from, to = %to, error = %err, "message delivery failed");
                    false
                }
            },
        };

        message.delivered = ok;
        if ok {
            self.delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.push_history(message);
        ok
    }

    /// Send to every subscriber except the sender and the excluded names.
    /// Returns the number of successful deliveries.
    pub fn broadcast(
        &self,
        from: &str,
        kind: MessageKind,
        content: serde_json::Value,
        exclude: &[&str],
    ) -> usize {
        let mut sent = 0;
        for name in self.subscriber_names() {
            if name == from || exclude.contains(&name.as_str()) {
                continue;
            }
            if self.send_message(from, &name, kind, content.clone()) {
                sent += 1;
            }
        }
        sent
    }

    fn push_history(&self, message: AgentMessage) {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.push_back(message);
        while history.len() > self.max_history {
            history.pop_front();
        }
    }

    /// Messages addressed to a given agent, oldest first.
    pub fn messages_for_agent(&self, name: &str) -> Vec<AgentMessage> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|m| m.to == name)
            .cloned()
            .collect()
    }

    /// Message history, oldest first, optionally capped to the most recent
    /// `limit` entries.
    pub fn history(&self, limit: Option<usize>) -> Vec<AgentMessage> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        match limit {
            Some(n) if n < history.len() => history.iter().skip(history.len() - n).cloned().collect(),
            _ => history.iter().cloned().collect(),
        }
    }

    /// Drop the message history. Counters are unaffected.
    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Counters for status reporting.
    pub fn stats(&self) -> BusStats {
        BusStats {
            subscribers: self
                .subscribers
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .len(),
            total_messages: self.total_messages.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            history_len: self.history.lock().unwrap_or_else(|e| e.into_inner()).len(),
        }
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_HISTORY_LIMIT)
    }
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("MessageBus")
            .field("subscribers", &stats.subscribers)
            .field("total_messages", &stats.total_messages)
            .field("history_len", &stats.history_len)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
