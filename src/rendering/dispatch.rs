//! Per-worker batching of dirty sections.
//!
//! Marking a whole column dirty touches dozens of sections in one burst. The
//! queue collects them per target worker and hands them out as one batch per
//! worker at the end of the scheduling tick, so each worker receives a single
//! message instead of one per section.

use std::collections::BTreeMap;

use crate::task_management::messages::DirtySection;
use crate::voxels::coords::SectionKey;

/// Picks the worker responsible for `key`.
///
/// A pure function of the section coordinates and the worker count: the same
/// section always lands on the same worker, whatever happened before. This
/// keeps updates to one section ordered and neighbouring sections spread
/// evenly across workers.
pub fn worker_for_section(key: SectionKey, worker_count: usize) -> usize {
    debug_assert!(worker_count > 0);
    key.coordinate_sum().rem_euclid(worker_count as i64) as usize
}

/// Dirty messages not yet sent, grouped by worker index.
#[derive(Debug, Default)]
pub struct PendingMessageQueue {
    queues: BTreeMap<usize, Vec<DirtySection>>,
    flush_scheduled: bool,
}

impl PendingMessageQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `section` to the queue of `worker`.
    ///
    /// Returns `true` when this is the first message since the last flush,
    /// i.e. when the caller has just scheduled a flush for this tick.
    pub fn push(&mut self, worker: usize, section: DirtySection) -> bool {
        self.queues.entry(worker).or_default().push(section);
        !std::mem::replace(&mut self.flush_scheduled, true)
    }

    /// Whether a flush is pending for the current tick.
    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Number of messages queued for `worker`.
    pub fn queued_for(&self, worker: usize) -> usize {
        self.queues.get(&worker).map_or(0, Vec::len)
    }

    /// Total number of queued messages.
    pub fn len(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Takes every batch at once, leaving the queue empty and unscheduled.
    pub fn take_batches(&mut self) -> Vec<(usize, Vec<DirtySection>)> {
        self.flush_scheduled = false;
        std::mem::take(&mut self.queues).into_iter().collect()
    }

    /// Drops everything queued.
    pub fn clear(&mut self) {
        self.queues.clear();
        self.flush_scheduled = false;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::task_management::messages::MesherConfig;

    fn section(x: i32, y: i32, z: i32) -> DirtySection {
        DirtySection {
            x,
            y,
            z,
            value: true,
            config: Arc::new(MesherConfig::default()),
        }
    }

    #[test]
    fn routing_depends_only_on_key_and_worker_count() {
        let key = SectionKey { x: -32, y: 48, z: 160 };
        let first = worker_for_section(key, 4);
        for _ in 0..10 {
            assert_eq!(worker_for_section(key, 4), first);
        }
        // -2 + 3 + 10 = 11
        assert_eq!(first, 3);
        assert_eq!(worker_for_section(key, 1), 0);
    }

    #[test]
    fn negative_coordinate_sums_wrap_to_valid_workers() {
        let key = SectionKey { x: -16, y: 0, z: -16 };
        assert_eq!(worker_for_section(key, 3), 1);
    }

    #[test]
    fn only_first_push_schedules_a_flush() {
        let mut queue = PendingMessageQueue::new();
        assert!(queue.push(0, section(0, 0, 0)));
        assert!(!queue.push(0, section(0, 16, 0)));
        assert!(!queue.push(2, section(16, 0, 0)));
        assert!(queue.is_flush_scheduled());
        assert_eq!(queue.queued_for(0), 2);
        assert_eq!(queue.len(), 3);

        let batches = queue.take_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, 0);
        assert_eq!(batches[0].1.len(), 2);
        assert!(queue.is_empty());
        assert!(!queue.is_flush_scheduled());

        assert!(queue.push(1, section(0, 0, 0)));
    }
}
