//! Context compaction for long conversations
//!
//! Once the live buffer reaches the threshold, the protocol's policy picks a
//! prefix to summarize. The summary becomes the new running history and the
//! buffer shrinks to whatever the policy retains.

use tinycode_ai::Message;

/// Configuration for context compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionConfig {
    /// Compress once the live buffer holds at least this many messages
    pub max_messages: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self { max_messages: 5 }
    }
}

impl CompactionConfig {
    pub fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    /// Whether a buffer of `len` messages is due for compaction
    pub fn should_compress(&self, len: usize) -> bool {
        self.max_messages > 0 && len >= self.max_messages
    }
}

/// Result of a compaction attempt
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOutcome {
    /// Running history after compaction
    pub history: String,
    /// Live buffer after compaction
    pub messages: Vec<Message>,
    /// False when the policy found nothing to compress
    pub compacted: bool,
}

impl CompressionOutcome {
    /// Inputs handed back untouched
    pub fn unchanged(messages: Vec<Message>, history: String) -> Self {
        Self {
            history,
            messages,
            compacted: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let config = CompactionConfig::default();
        assert!(!config.should_compress(4));
        assert!(config.should_compress(5));
        assert!(config.should_compress(9));
    }

    #[test]
    fn test_zero_disables() {
        assert!(!CompactionConfig::new(0).should_compress(100));
    }
}
