//! Single-threaded worker pool.
//!
//! Every message is processed synchronously by the target worker's mesher at
//! send time and the replies wait in a queue until drained. This keeps the
//! coordinator's scheduling logic observable step by step.

use std::collections::VecDeque;

use super::mesher::{process_message, SectionMesher};
use super::messages::{WorkerMessage, WorkerReply};
use super::WorkerPool;
use crate::error::{StreamError, StreamResult};

/// Worker pool that runs its meshers on the calling thread.
#[derive(Default)]
pub struct InlineWorkerPool {
    meshers: Vec<Box<dyn SectionMesher>>,
    replies: VecDeque<(usize, WorkerReply)>,
    sent: Vec<usize>,
}

impl InlineWorkerPool {
    /// Creates `num_workers` inline workers.
    pub fn new<F>(num_workers: usize, make_mesher: F) -> Self
    where
        F: FnMut(usize) -> Box<dyn SectionMesher>,
    {
        InlineWorkerPool {
            meshers: (0..num_workers).map(make_mesher).collect(),
            replies: VecDeque::new(),
            sent: vec![0; num_workers],
        }
    }

    /// Number of messages each worker has received so far.
    pub fn messages_sent(&self) -> &[usize] {
        &self.sent
    }

    /// Number of replies waiting to be drained.
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl WorkerPool for InlineWorkerPool {
    fn len(&self) -> usize {
        self.meshers.len()
    }

    fn send_to(&mut self, index: usize, message: WorkerMessage) -> StreamResult<()> {
        let mesher = self
            .meshers
            .get_mut(index)
            .ok_or(StreamError::WorkersNotInitialized)?;
        self.sent[index] += 1;
        for reply in process_message(mesher.as_mut(), message) {
            self.replies.push_back((index, reply));
        }
        Ok(())
    }

    fn drain_replies(&mut self) -> StreamResult<Vec<(usize, WorkerReply)>> {
        Ok(self.replies.drain(..).collect())
    }

    fn terminate(&mut self) {
        self.meshers.clear();
        self.replies.clear();
        self.sent.clear();
    }
}
