//! Bounded, importance-ranked agent memory
//!
//! Each agent owns exactly one memory store. Access is serialized by the
//! agent's own lock, so the store itself carries no interior locking.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use troupe_core::{Importance, Timestamp};

/// A single remembered fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Lookup key
    pub key: String,
    /// Stored value
    pub value: serde_json::Value,
    /// Importance level controlling eviction
    pub importance: Importance,
    /// When the entry was created
    pub created_at: Timestamp,
    /// When the entry was last read
    pub accessed_at: Timestamp,
    /// How many times the entry has been read
    pub access_count: u64,
    /// Monotonic insertion sequence; lower means older
    pub sequence: u64,
}

/// Snapshot of memory counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub capacity: usize,
    pub usage_pct: f64,
}

/// Bounded key/value store with importance-based eviction.
///
/// At capacity, inserting evicts the oldest entry whose importance is at or
/// below normal. High and critical entries are never evicted implicitly; if
/// nothing is evictable the store grows past its intended bound and logs a
/// warning.
#[derive(Debug, Clone)]
pub struct AgentMemory {
    entries: HashMap<String, MemoryEntry>,
    max_size: usize,
    next_sequence: u64,
}

impl AgentMemory {
    /// Create a memory store with the given capacity in entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_size,
            next_sequence: 0,
        }
    }

    /// Insert or replace an entry.
    pub fn add(
        &mut self,
        key: impl Into<String>,
        value: serde_json::Value,
        importance: Importance,
    ) {
        let key = key.into();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_one();
        }

        let now = Utc::now();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            key.clone(),
            MemoryEntry {
                key,
                value,
                importance,
                created_at: now,
                accessed_at: now,
                access_count: 0,
                sequence,
            },
        );
    }

    /// Evict the oldest evictable entry, if any.
    fn evict_one(&mut self) {
        let victim = self
            .entries
            .values()
            .filter(|e| e.importance.is_evictable())
            .min_by_key(|e| e.sequence)
            .map(|e| e.key.clone());

        match victim {
            Some(key) => {
                self.entries.remove(&key);
            }
            None => {
                tracing::warn!(
                    entries = self.entries.len(),
                    max_size = self.max_size,
                    "memory at capacity with no evictable entries, growing past bound"
                );
            }
        }
    }

    /// Look up a value by key, updating access metadata.
    pub fn get(&mut self, key: &str) -> Option<serde_json::Value> {
        let entry = self.entries.get_mut(key)?;
        entry.accessed_at = Utc::now();
        entry.access_count += 1;
        Some(entry.value.clone())
    }

    /// Remove an entry, returning its value if present.
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.entries.remove(key).map(|e| e.value)
    }

    /// Case-insensitive substring search over keys and the string form of
    /// values. Results are sorted by descending importance, newest first
    /// within a level, and capped at `limit`.
    pub fn search(&self, query: &str, limit: usize) -> Vec<MemoryEntry> {
        let needle = query.to_lowercase();
        let mut matches: Vec<MemoryEntry> = self
            .entries
            .values()
            .filter(|e| {
                e.key.to_lowercase().contains(&needle)
                    || e.value.to_string().to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            b.importance
                .score()
                .cmp(&a.importance.score())
                .then(b.sequence.cmp(&a.sequence))
        });
        matches.truncate(limit);
        matches
    }

    /// Most recently created entries, newest first, capped at `n`.
    pub fn recent(&self, n: usize) -> Vec<MemoryEntry> {
        let mut entries: Vec<MemoryEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        entries.truncate(n);
        entries
    }

    /// High and critical entries, highest importance first, capped at `n`.
    pub fn important(&self, n: usize) -> Vec<MemoryEntry> {
        let mut entries: Vec<MemoryEntry> = self
            .entries
            .values()
            .filter(|e| e.importance.score() >= 3)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.importance
                .score()
                .cmp(&a.importance.score())
                .then(b.sequence.cmp(&a.sequence))
        });
        entries.truncate(n);
        entries
    }

    /// Usage as a percentage of capacity, rounded to two decimals.
    pub fn usage_percentage(&self) -> f64 {
        let pct = self.entries.len() as f64 / self.max_size as f64 * 100.0;
        (pct * 100.0).round() / 100.0
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured capacity in entries.
    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Check if a key is present without touching access metadata.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Counters for status reporting.
    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            entries: self.entries.len(),
            capacity: self.max_size,
            usage_pct: self.usage_percentage(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_get_remove() {
        let mut memory = AgentMemory::new(10);
        memory.add("fact", json!("water is wet"), Importance::Normal);

        assert_eq!(memory.get("fact"), Some(json!("water is wet")));
        assert_eq!(memory.get("missing"), None);

        assert_eq!(memory.remove("fact"), Some(json!("water is wet")));
        assert!(memory.is_empty());
    }

    #[test]
    fn test_get_updates_access_metadata() {
        let mut memory = AgentMemory::new(10);
        memory.add("fact", json!(1), Importance::Normal);

        memory.get("fact");
        memory.get("fact");

        let entry = memory.search("fact", 1).pop().unwrap();
        assert_eq!(entry.access_count, 2);
    }

    #[test]
    fn test_eviction_removes_oldest_evictable() {
        let mut memory = AgentMemory::new(3);
        memory.add("first", json!(1), Importance::Normal);
        memory.add("second", json!(2), Importance::Low);
        memory.add("third", json!(3), Importance::Normal);

        // At capacity: the oldest evictable entry goes first.
        memory.add("fourth", json!(4), Importance::Normal);

        assert_eq!(memory.len(), 3);
        assert!(!memory.contains_key("first"));
        assert!(memory.contains_key("second"));
        assert!(memory.contains_key("fourth"));
    }

    #[test]
    fn test_high_importance_never_evicted_implicitly() {
        let mut memory = AgentMemory::new(2);
        memory.add("pin", json!("keep"), Importance::Critical);
        memory.add("note", json!("evictable"), Importance::Normal);

        memory.add("new", json!("incoming"), Importance::Normal);

        assert!(memory.contains_key("pin"));
        assert!(!memory.contains_key("note"));
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn test_grows_past_bound_when_nothing_evictable() {
        let mut memory = AgentMemory::new(2);
        memory.add("a", json!(1), Importance::Critical);
        memory.add("b", json!(2), Importance::High);
        memory.add("c", json!(3), Importance::Critical);

        assert_eq!(memory.len(), 3);
        assert!(memory.usage_percentage() > 100.0);
    }

    #[test]
    fn test_replacing_key_does_not_evict() {
        let mut memory = AgentMemory::new(2);
        memory.add("a", json!(1), Importance::Normal);
        memory.add("b", json!(2), Importance::Normal);

        memory.add("a", json!(10), Importance::Normal);

        assert_eq!(memory.len(), 2);
        assert_eq!(memory.get("a"), Some(json!(10)));
        assert!(memory.contains_key("b"));
    }

    #[test]
    fn test_search_matches_keys_and_values_case_insensitive() {
        let mut memory = AgentMemory::new(10);
        memory.add("deploy-notes", json!("remember the STAGING cluster"), Importance::Low);
        memory.add("other", json!("staging environment checklist"), Importance::High);
        memory.add("unrelated", json!("lunch order"), Importance::Critical);

        let results = memory.search("staging", 10);
        assert_eq!(results.len(), 2);
        // Sorted by descending importance.
        assert_eq!(results[0].key, "other");
        assert_eq!(results[1].key, "deploy-notes");
    }

    #[test]
    fn test_search_respects_limit() {
        let mut memory = AgentMemory::new(10);
        for i in 0..5 {
            memory.add(format!("item-{}", i), json!("shared text"), Importance::Normal);
        }
        assert_eq!(memory.search("shared", 2).len(), 2);
    }

    #[test]
    fn test_recent_and_important() {
        let mut memory = AgentMemory::new(10);
        memory.add("old", json!(1), Importance::Critical);
        memory.add("mid", json!(2), Importance::Normal);
        memory.add("new", json!(3), Importance::High);

        let recent = memory.recent(2);
        assert_eq!(recent[0].key, "new");
        assert_eq!(recent[1].key, "mid");

        let important = memory.important(10);
        assert_eq!(important.len(), 2);
        assert_eq!(important[0].key, "old");
        assert_eq!(important[1].key, "new");
    }

    #[test]
    fn test_usage_percentage_two_decimals() {
        let mut memory = AgentMemory::new(3);
        memory.add("a", json!(1), Importance::Normal);
        assert_eq!(memory.usage_percentage(), 33.33);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
