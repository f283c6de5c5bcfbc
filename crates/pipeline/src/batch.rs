//! Batch accumulator and periodic flush timer
//!
//! The batch pairs each decoded event with the entry id it came from, in
//! claim order. It is owned by the consumer loop alone, so no locking.
//!
//! ```text
//!   push(event, id) ──► [ (e1,id1) (e2,id2) ... ] ──take()──► (events, ids)
//!                        └ full at max_size ┘
//! ```

use std::collections::HashSet;
use std::time::Duration;

use tally_protocol::InstallEvent;
use tally_stream::EntryId;
use tokio::time::Instant;

/// Ordered `(event, entry id)` pairs awaiting a flush
#[derive(Debug)]
pub(crate) struct Batch {
    events: Vec<InstallEvent>,
    ids: Vec<EntryId>,
    index: HashSet<EntryId>,
    max_size: usize,
}

impl Batch {
    pub(crate) fn new(max_size: usize) -> Self {
        Self {
            events: Vec::with_capacity(max_size),
            ids: Vec::with_capacity(max_size),
            index: HashSet::with_capacity(max_size),
            max_size,
        }
    }

    /// Add a pair; returns true once the batch has reached its size trigger
    pub(crate) fn push(&mut self, event: InstallEvent, id: EntryId) -> bool {
        self.index.insert(id.clone());
        self.events.push(event);
        self.ids.push(id);
        self.is_full()
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.events.len() >= self.max_size
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether an entry is already batched (reclaimed duplicates)
    pub(crate) fn contains(&self, id: &EntryId) -> bool {
        self.index.contains(id)
    }

    /// Empty the batch, returning its contents in claim order
    pub(crate) fn take(&mut self) -> (Vec<InstallEvent>, Vec<EntryId>) {
        self.index.clear();
        (
            std::mem::replace(&mut self.events, Vec::with_capacity(self.max_size)),
            std::mem::replace(&mut self.ids, Vec::with_capacity(self.max_size)),
        )
    }
}

/// Periodic flush deadline
///
/// Behaves like a ticker that can be reset: it elapses every `interval`
/// whether or not anything was batched, and a size-triggered flush pushes
/// the next deadline a full interval out.
#[derive(Debug)]
pub(crate) struct FlushTimer {
    interval: Duration,
    deadline: Instant,
}

impl FlushTimer {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Instant::now() + interval,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.deadline = Instant::now() + self.interval;
    }

    pub(crate) fn is_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Time until the deadline (zero once elapsed)
    pub(crate) fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tally_protocol::AppType;

    use super::*;

    fn event(id: &str) -> InstallEvent {
        InstallEvent::new(id, "app", AppType::Windows, "device", Utc::now())
    }

    #[test]
    fn test_push_reports_full_at_max_size() {
        let mut batch = Batch::new(2);
        assert!(batch.is_empty());
        assert!(!batch.push(event("a"), EntryId::new("1-0")));
        assert!(batch.push(event("b"), EntryId::new("1-1")));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_take_preserves_order_and_empties() {
        let mut batch = Batch::new(10);
        batch.push(event("a"), EntryId::new("1-0"));
        batch.push(event("b"), EntryId::new("1-1"));
        assert!(batch.contains(&EntryId::new("1-1")));

        let (events, ids) = batch.take();
        assert_eq!(events[0].event_id, "a");
        assert_eq!(events[1].event_id, "b");
        assert_eq!(ids, vec![EntryId::new("1-0"), EntryId::new("1-1")]);

        assert!(batch.is_empty());
        assert!(!batch.contains(&EntryId::new("1-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_elapses_and_resets() {
        let mut timer = FlushTimer::new(Duration::from_millis(200));
        assert!(!timer.is_elapsed());
        assert_eq!(timer.remaining(), Duration::from_millis(200));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(!timer.is_elapsed());
        assert_eq!(timer.remaining(), Duration::from_millis(50));

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(timer.is_elapsed());
        assert_eq!(timer.remaining(), Duration::ZERO);

        timer.reset();
        assert!(!timer.is_elapsed());
        assert_eq!(timer.remaining(), Duration::from_millis(200));
    }
}
