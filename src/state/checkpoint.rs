use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted crawl progress for one source
///
/// `cursor` is the offset just past the last page whose items were all
/// accounted for. `seen` holds every identifier already written to the logs.
/// Neither ever shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Offset into the source's ordered sequence to resume from
    #[serde(default, alias = "startAt")]
    pub cursor: u64,

    /// Identifiers already fully processed
    #[serde(default, alias = "seen_issue_keys")]
    pub seen: BTreeSet<String>,

    /// Identifiers whose detail fetch failed and await a retry
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub failed: BTreeSet<String>,

    /// When this checkpoint was last saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Checkpoint {
    /// Creates an empty checkpoint for a source that has never run
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the identifier was already processed
    pub fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Records a processed identifier
    ///
    /// Returns false if it was already present. A seen identifier is never
    /// also pending a retry.
    pub fn mark_seen(&mut self, id: &str) -> bool {
        self.failed.remove(id);
        self.seen.insert(id.to_string())
    }

    /// Queues an identifier whose detail fetch failed
    pub fn record_failure(&mut self, id: &str) {
        if !self.seen.contains(id) {
            self.failed.insert(id.to_string());
        }
    }

    /// Drops an identifier from the retry queue without marking it seen
    pub fn resolve_failure(&mut self, id: &str) -> bool {
        self.failed.remove(id)
    }

    /// Moves the cursor forward
    ///
    /// Returns the cursor after the call; a lower value is ignored.
    pub fn advance_to(&mut self, cursor: u64) -> u64 {
        if cursor > self.cursor {
            self.cursor = cursor;
        }
        self.cursor
    }

    /// Stamps the checkpoint right before it is written
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checkpoint_is_empty() {
        let checkpoint = Checkpoint::new();
        assert_eq!(checkpoint.cursor, 0);
        assert!(checkpoint.seen.is_empty());
        assert!(checkpoint.failed.is_empty());
        assert!(checkpoint.updated_at.is_none());
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut checkpoint = Checkpoint::new();
        assert_eq!(checkpoint.advance_to(50), 50);
        assert_eq!(checkpoint.advance_to(20), 50);
        assert_eq!(checkpoint.advance_to(100), 100);
    }

    #[test]
    fn test_mark_seen() {
        let mut checkpoint = Checkpoint::new();
        assert!(checkpoint.mark_seen("A-1"));
        assert!(!checkpoint.mark_seen("A-1"));
        assert!(checkpoint.is_seen("A-1"));
        assert!(!checkpoint.is_seen("A-2"));
    }

    #[test]
    fn test_failure_queue() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.record_failure("A-1");
        assert!(checkpoint.failed.contains("A-1"));

        // Succeeding later clears the pending retry
        checkpoint.mark_seen("A-1");
        assert!(checkpoint.failed.is_empty());

        // Seen identifiers are never queued again
        checkpoint.record_failure("A-1");
        assert!(checkpoint.failed.is_empty());

        checkpoint.record_failure("A-2");
        assert!(checkpoint.resolve_failure("A-2"));
        assert!(!checkpoint.resolve_failure("A-2"));
    }

    #[test]
    fn test_serialized_shape() {
        let mut checkpoint = Checkpoint::new();
        checkpoint.advance_to(50);
        checkpoint.mark_seen("B-2");
        checkpoint.mark_seen("B-1");

        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["cursor"], 50);
        assert_eq!(value["seen"], serde_json::json!(["B-1", "B-2"]));
        assert!(value.get("failed").is_none());
        assert!(value.get("updated_at").is_none());
    }

    #[test]
    fn test_reads_legacy_state_file() {
        let legacy = r#"{"startAt": 150, "seen_issue_keys": ["HADOOP-1", "HADOOP-2"]}"#;
        let checkpoint: Checkpoint = serde_json::from_str(legacy).unwrap();

        assert_eq!(checkpoint.cursor, 150);
        assert!(checkpoint.is_seen("HADOOP-2"));
        assert!(checkpoint.failed.is_empty());
    }
}
