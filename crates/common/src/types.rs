use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock instant used for every persisted timestamp.
pub type Timestamp = DateTime<Utc>;

/// Sentinel for values that could not be inferred (location, HP, ...).
pub const UNKNOWN: &str = "unknown";

/// Current UTC time.
pub fn now() -> Timestamp {
    Utc::now()
}

/// One narrative line in the recent-events buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentEvent {
    pub narrative: String,
    pub timestamp: Timestamp,
}

impl RecentEvent {
    /// Stamp a narrative line with the current time.
    pub fn new(narrative: impl Into<String>) -> Self {
        Self {
            narrative: narrative.into(),
            timestamp: now(),
        }
    }
}

/// The first `max_chars` characters of `text`.
///
/// Cuts on a char boundary, so multi-byte text is never split.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_shorter_than_limit_is_whole_text() {
        assert_eq!(excerpt("abc", 50), "abc");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let text = "江湖夜雨十年灯";
        assert_eq!(excerpt(text, 2), "江湖");
        assert_eq!(excerpt(text, 0), "");
    }

    #[test]
    fn recent_event_carries_narrative() {
        let event = RecentEvent::new("the gate opens");
        assert_eq!(event.narrative, "the gate opens");
    }
}
