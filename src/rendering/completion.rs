//! # Section Completion Tracking
//!
//! Counts outstanding mesh jobs per section and rolls them up into per-chunk
//! and whole-world completion state.
//!
//! ## State Machines
//! - Section: `absent -> pending(n > 0) -> absent`, repeating on every
//!   re-dirty. A missing key is the only representation of zero.
//! - Chunk: `loading -> finished` once none of its sections is pending and
//!   every one of its sections has been dirtied since the column arrived;
//!   back to `loading` as soon as any of its sections is dirtied again.
//! - World: converged when nothing is pending and every loaded chunk is
//!   finished. Convergence raises a sticky flag that the next dirty mark
//!   clears.
//!
//! Completions may arrive in any order from any worker; only the counts
//! matter.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bitvec::prelude::BitVec;
use futures::channel::oneshot;
use futures::FutureExt;
use log::{debug, trace};

use crate::config::WorldConfig;
use crate::error::{StreamError, StreamResult};
use crate::voxels::coords::{ChunkKey, SectionKey};

/// What a processed completion changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// The owning chunk became finished
    pub chunk_finished: bool,
    /// The whole world converged; fired once per convergence episode
    pub converged: bool,
}

/// Bookkeeping for outstanding mesh work.
#[derive(Debug, Default)]
pub struct SectionCompletionTracker {
    world: WorldConfig,
    loaded: HashSet<ChunkKey>,
    finished: HashSet<ChunkKey>,
    outstanding: HashMap<SectionKey, u32>,
    /// Number of outstanding section keys per chunk
    outstanding_per_chunk: HashMap<ChunkKey, usize>,
    /// Sections dirtied since the column arrived, one bit per vertical section
    coverage: HashMap<ChunkKey, BitVec>,
    /// Jobs still running for columns that were removed
    retired: HashMap<SectionKey, u32>,
    fully_rendered: bool,
    waiters: Vec<oneshot::Sender<()>>,
}

impl SectionCompletionTracker {
    /// Creates an empty tracker for a world of the given height.
    pub fn new(world: WorldConfig) -> Self {
        SectionCompletionTracker {
            world,
            ..Default::default()
        }
    }

    /// Registers a column as loaded. Its coverage starts empty.
    pub fn add_chunk(&mut self, key: ChunkKey) {
        self.loaded.insert(key);
        self.finished.remove(&key);
        self.coverage
            .insert(key, BitVec::repeat(false, self.world.sections_per_column()));
    }

    /// Forgets a column.
    ///
    /// Its outstanding jobs are retired: they no longer hold back convergence,
    /// but the completions workers still send for them are accepted.
    ///
    /// Returns whether any job was retired. Only then can the removal have
    /// changed convergence; the caller re-checks it with
    /// [`check_convergence`](Self::check_convergence) once it has queued any
    /// follow-up work.
    pub fn remove_chunk(&mut self, key: ChunkKey) -> bool {
        self.loaded.remove(&key);
        self.finished.remove(&key);
        self.coverage.remove(&key);

        if self.outstanding_per_chunk.remove(&key).is_none() {
            return false;
        }
        let sections: Vec<SectionKey> = self
            .outstanding
            .keys()
            .filter(|section| section.chunk() == key)
            .copied()
            .collect();
        for section in sections {
            if let Some(count) = self.outstanding.remove(&section) {
                *self.retired.entry(section).or_insert(0) += count;
            }
        }
        trace!("Retired outstanding sections of chunk {key}");
        true
    }

    /// Records one more pending job for `key`.
    pub fn mark_dirty(&mut self, key: SectionKey) {
        let chunk = key.chunk();
        let count = self.outstanding.entry(key).or_insert(0);
        if *count == 0 {
            *self.outstanding_per_chunk.entry(chunk).or_insert(0) += 1;
        }
        *count += 1;

        self.fully_rendered = false;
        self.finished.remove(&chunk);
        if let (Some(bits), Some(index)) =
            (self.coverage.get_mut(&chunk), self.world.section_index(key.y))
        {
            if let Some(mut bit) = bits.get_mut(index) {
                *bit = true;
            }
        }
    }

    /// Applies a worker's completion for `key`.
    ///
    /// # Errors
    /// [`StreamError::UnmatchedSectionFinished`] when no job is pending for
    /// `key`: coordinator and worker disagree about outstanding work.
    pub fn section_finished(&mut self, key: SectionKey) -> StreamResult<CompletionOutcome> {
        let chunk = key.chunk();

        // A section always lands on the same worker, so jobs retired with an
        // earlier column complete before any job queued after it came back.
        if let Some(count) = self.retired.get_mut(&key) {
            *count -= 1;
            if *count == 0 {
                self.retired.remove(&key);
            }
            trace!("Absorbed late completion for removed section {key}");
            return Ok(CompletionOutcome::default());
        }

        let Some(count) = self.outstanding.get_mut(&key) else {
            return Err(StreamError::UnmatchedSectionFinished { key });
        };
        *count -= 1;
        if *count == 0 {
            self.outstanding.remove(&key);
            if let Some(sections) = self.outstanding_per_chunk.get_mut(&chunk) {
                *sections -= 1;
                if *sections == 0 {
                    self.outstanding_per_chunk.remove(&chunk);
                }
            }
        }

        let mut outcome = CompletionOutcome::default();
        // Neighbour updates for columns that are not loaded never finish a chunk
        if self.loaded.contains(&chunk)
            && !self.outstanding_per_chunk.contains_key(&chunk)
            && self.is_covered(chunk)
        {
            outcome.chunk_finished = self.finished.insert(chunk);
        }
        outcome.converged = self.check_convergence();

        Ok(outcome)
    }

    /// Returns a future resolving once no mesh job is outstanding. Resolves
    /// immediately when nothing is outstanding now.
    pub fn wait_for_chunks_to_render(&mut self) -> RenderWaiter {
        if self.outstanding.is_empty() {
            return RenderWaiter { receiver: None };
        }
        let (sender, receiver) = oneshot::channel();
        self.waiters.push(sender);
        RenderWaiter {
            receiver: Some(receiver),
        }
    }

    /// Drops all state. Pending waiters resolve with [`StreamError::WorldReset`].
    pub fn reset(&mut self) {
        *self = SectionCompletionTracker::new(self.world);
    }

    /// Pending job count of `key`, zero when absent.
    pub fn outstanding_jobs(&self, key: SectionKey) -> u32 {
        self.outstanding.get(&key).copied().unwrap_or(0)
    }

    /// Number of sections with pending jobs.
    pub fn outstanding_sections(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether `key` is loaded.
    pub fn is_loaded(&self, key: ChunkKey) -> bool {
        self.loaded.contains(&key)
    }

    /// Whether `key` is finished.
    pub fn is_finished(&self, key: ChunkKey) -> bool {
        self.finished.contains(&key)
    }

    /// Loaded chunk keys.
    pub fn loaded_chunks(&self) -> impl Iterator<Item = ChunkKey> + '_ {
        self.loaded.iter().copied()
    }

    /// Number of loaded chunks.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Number of finished chunks.
    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// The sticky fully-rendered flag.
    pub fn is_fully_rendered(&self) -> bool {
        self.fully_rendered
    }

    fn is_covered(&self, chunk: ChunkKey) -> bool {
        self.coverage.get(&chunk).is_some_and(|bits| bits.all())
    }

    /// Resolves convergence waiters when nothing is outstanding, and returns
    /// `true` when this starts a new convergence episode.
    pub fn check_convergence(&mut self) -> bool {
        if !self.outstanding.is_empty() {
            return false;
        }

        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(());
        }

        if self.fully_rendered || self.finished.len() != self.loaded.len() {
            return false;
        }
        self.fully_rendered = true;
        debug!("All {} loaded chunks finished rendering", self.loaded.len());
        true
    }
}

/// Future returned by [`SectionCompletionTracker::wait_for_chunks_to_render`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct RenderWaiter {
    receiver: Option<oneshot::Receiver<()>>,
}

impl Future for RenderWaiter {
    type Output = StreamResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.as_mut() {
            None => Poll::Ready(Ok(())),
            Some(receiver) => receiver
                .poll_unpin(cx)
                .map(|result| result.map_err(|_| StreamError::WorldReset)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(x: i32, y: i32, z: i32) -> SectionKey {
        SectionKey { x, y, z }
    }

    fn load_full_column(
        tracker: &mut SectionCompletionTracker,
        chunk: ChunkKey,
    ) -> Vec<SectionKey> {
        tracker.add_chunk(chunk);
        let keys: Vec<_> = WorldConfig::default()
            .section_ys()
            .map(|y| section(chunk.x, y, chunk.z))
            .collect();
        for key in &keys {
            tracker.mark_dirty(*key);
        }
        keys
    }

    #[test]
    fn double_dirty_needs_two_completions() {
        let mut tracker = SectionCompletionTracker::default();
        let key = section(0, 0, 0);
        tracker.mark_dirty(key);
        tracker.mark_dirty(key);
        assert_eq!(tracker.outstanding_jobs(key), 2);

        tracker.section_finished(key).unwrap();
        assert_eq!(tracker.outstanding_jobs(key), 1);
        tracker.section_finished(key).unwrap();
        assert_eq!(tracker.outstanding_sections(), 0);

        assert_eq!(
            tracker.section_finished(key),
            Err(StreamError::UnmatchedSectionFinished { key })
        );
    }

    #[test]
    fn completion_for_never_dirtied_section_is_fatal() {
        let mut tracker = SectionCompletionTracker::default();
        let key = section(16, 32, 48);
        assert_eq!(
            tracker.section_finished(key),
            Err(StreamError::UnmatchedSectionFinished { key })
        );
    }

    #[test]
    fn chunk_finishes_in_any_completion_order() {
        let mut tracker = SectionCompletionTracker::default();
        let chunk = ChunkKey { x: 0, z: 0 };
        let mut keys = load_full_column(&mut tracker, chunk);
        keys.reverse();

        let last = keys.pop().unwrap();
        for key in keys {
            let outcome = tracker.section_finished(key).unwrap();
            assert!(!outcome.chunk_finished);
        }
        assert!(!tracker.is_finished(chunk));

        let outcome = tracker.section_finished(last).unwrap();
        assert!(outcome.chunk_finished);
        assert!(outcome.converged);
        assert!(tracker.is_fully_rendered());
    }

    #[test]
    fn partially_covered_chunk_stays_loading() {
        let mut tracker = SectionCompletionTracker::default();
        let chunk = ChunkKey { x: 16, z: 16 };
        tracker.add_chunk(chunk);
        tracker.mark_dirty(section(16, 0, 16));

        let outcome = tracker.section_finished(section(16, 0, 16)).unwrap();
        assert!(!outcome.chunk_finished);
        assert!(!outcome.converged);
        assert!(!tracker.is_fully_rendered());
    }

    #[test]
    fn redirty_reopens_finished_chunk_and_clears_flag() {
        let mut tracker = SectionCompletionTracker::default();
        let chunk = ChunkKey { x: 0, z: 0 };
        for key in load_full_column(&mut tracker, chunk) {
            tracker.section_finished(key).unwrap();
        }
        assert!(tracker.is_fully_rendered());

        tracker.mark_dirty(section(0, 64, 0));
        assert!(!tracker.is_finished(chunk));
        assert!(!tracker.is_fully_rendered());

        let outcome = tracker.section_finished(section(0, 64, 0)).unwrap();
        assert!(outcome.chunk_finished);
        assert!(outcome.converged);
    }

    #[test]
    fn removed_chunk_absorbs_late_completions() {
        let mut tracker = SectionCompletionTracker::default();
        let chunk = ChunkKey { x: 32, z: 0 };
        let keys = load_full_column(&mut tracker, chunk);

        assert!(tracker.remove_chunk(chunk));
        assert_eq!(tracker.outstanding_sections(), 0);
        assert_eq!(tracker.loaded_count(), 0);

        for key in &keys {
            assert_eq!(
                tracker.section_finished(*key).unwrap(),
                CompletionOutcome::default()
            );
        }
        assert!(tracker.section_finished(keys[0]).is_err());
    }

    #[test]
    fn removal_leaves_convergence_to_the_caller() {
        let mut tracker = SectionCompletionTracker::default();
        let kept = ChunkKey { x: 0, z: 0 };
        for key in load_full_column(&mut tracker, kept) {
            tracker.section_finished(key).unwrap();
        }
        assert!(tracker.is_fully_rendered());

        let idle = ChunkKey { x: 16, z: 0 };
        tracker.add_chunk(idle);
        assert!(!tracker.remove_chunk(idle));

        let busy = ChunkKey { x: 32, z: 0 };
        tracker.add_chunk(busy);
        tracker.mark_dirty(section(32, 0, 0));
        assert!(!tracker.is_fully_rendered());
        assert!(tracker.remove_chunk(busy));
        assert!(!tracker.is_fully_rendered());

        assert!(tracker.check_convergence());
        assert!(tracker.is_fully_rendered());
        assert!(!tracker.check_convergence());
    }

    #[test]
    fn waiter_resolves_when_outstanding_drains() {
        let mut tracker = SectionCompletionTracker::default();
        assert_eq!(pollster::block_on(tracker.wait_for_chunks_to_render()), Ok(()));

        let key = section(0, 0, 0);
        tracker.mark_dirty(key);
        let waiter = tracker.wait_for_chunks_to_render();
        tracker.section_finished(key).unwrap();
        assert_eq!(pollster::block_on(waiter), Ok(()));
    }

    #[test]
    fn reset_cancels_waiters() {
        let mut tracker = SectionCompletionTracker::default();
        tracker.mark_dirty(section(0, 0, 0));
        let waiter = tracker.wait_for_chunks_to_render();
        tracker.reset();
        assert_eq!(pollster::block_on(waiter), Err(StreamError::WorldReset));
        assert_eq!(tracker.outstanding_sections(), 0);
    }
}
