use saga_common::RecentEvent;
use std::collections::VecDeque;

/// Number of narrative lines the recent-events buffer retains.
pub const RECENT_CAPACITY: usize = 10;

/// Bounded, insertion-ordered buffer of the latest narrative lines.
///
/// Not persisted on its own; it travels inside snapshots.
#[derive(Debug, Clone, Default)]
pub struct RecentEvents {
    events: VecDeque<RecentEvent>,
}

impl RecentEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a narrative line, evicting the oldest past capacity.
    pub fn push(&mut self, narrative: impl Into<String>) {
        self.push_event(RecentEvent::new(narrative));
    }

    pub fn push_event(&mut self, event: RecentEvent) {
        self.events.push_back(event);
        while self.events.len() > RECENT_CAPACITY {
            self.events.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Owned copy, oldest first, for embedding into a snapshot.
    pub fn snapshot_copy(&self) -> Vec<RecentEvent> {
        self.events.iter().cloned().collect()
    }

    /// Replace the buffer wholesale. Only the newest entries past
    /// capacity are kept.
    pub fn restore(&mut self, events: Vec<RecentEvent>) {
        let skip = events.len().saturating_sub(RECENT_CAPACITY);
        self.events = events.into_iter().skip(skip).collect();
    }

    /// Most recent narrative line, if any.
    pub fn last(&self) -> Option<&RecentEvent> {
        self.events.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecentEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_last_ten_in_order() {
        let mut buf = RecentEvents::new();
        for i in 0..15 {
            buf.push(format!("event {i}"));
        }
        assert_eq!(buf.len(), RECENT_CAPACITY);
        let lines: Vec<_> = buf.iter().map(|e| e.narrative.clone()).collect();
        let expected: Vec<_> = (5..15).map(|i| format!("event {i}")).collect();
        assert_eq!(lines, expected);
        assert_eq!(buf.last().unwrap().narrative, "event 14");
    }

    #[test]
    fn restore_replaces_wholesale() {
        let mut buf = RecentEvents::new();
        buf.push("stale");
        buf.restore(vec![RecentEvent::new("a"), RecentEvent::new("b")]);
        let lines: Vec<_> = buf.iter().map(|e| e.narrative.as_str()).collect();
        assert_eq!(lines, vec!["a", "b"]);
    }

    #[test]
    fn restore_truncates_oversized_input() {
        let mut buf = RecentEvents::new();
        let events = (0..12).map(|i| RecentEvent::new(format!("{i}"))).collect();
        buf.restore(events);
        assert_eq!(buf.len(), RECENT_CAPACITY);
        assert_eq!(buf.iter().next().unwrap().narrative, "2");
    }

    #[test]
    fn snapshot_copy_is_detached() {
        let mut buf = RecentEvents::new();
        buf.push("before");
        let copy = buf.snapshot_copy();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(copy.len(), 1);
    }
}
