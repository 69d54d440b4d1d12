//! # Mesh Worker Pool
//!
//! This module provides the parallel execution side of mesh generation: a
//! fixed set of workers that receive [`WorkerMessage`]s and answer with
//! [`WorkerReply`]s. Workers share no memory with the coordinator; all
//! communication is message passing.
//!
//! ## Architecture Overview
//!
//! - [`WorkerPool`]: the interface the coordinator schedules against
//!   (`broadcast`, `send_to`, reply draining, termination)
//! - [`ThreadWorkerPool`]: one OS thread per worker, each with a dedicated
//!   channel pair
//! - [`InlineWorkerPool`]: runs the meshers on the calling thread, for
//!   environments without threads and for deterministic tests
//! - [`SectionMesher`]: the meshing algorithm hosted by each worker
//!
//! ## Ordering
//! Messages sent to one worker are processed in send order. Nothing is
//! guaranteed across workers, so replies from different workers interleave
//! arbitrarily.
//!
//! ## Example Usage
//! ```rust,ignore
//! let mut pool = ThreadWorkerPool::new(4, |_| Box::new(MyMesher::default()));
//! pool.broadcast(&WorkerMessage::UnloadChunk { x: 0, z: 0 })?;
//!
//! // In the main loop:
//! for (worker, reply) in pool.drain_replies()? {
//!     // ...
//! }
//! ```

pub mod inline;
pub mod mesher;
pub mod messages;

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{info, warn};

use crate::error::{StreamError, StreamResult};
pub use inline::InlineWorkerPool;
pub use mesher::{process_message, SectionMesher};
use messages::{WorkerMessage, WorkerReply};

/// A fixed set of parallel mesh workers.
///
/// Workers are addressed by index; beyond that the coordinator knows nothing
/// about them.
pub trait WorkerPool {
    /// Number of workers in the pool.
    fn len(&self) -> usize;

    /// Whether the pool has no workers.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sends `message` to the worker at `index`.
    fn send_to(&mut self, index: usize, message: WorkerMessage) -> StreamResult<()>;

    /// Sends an identical copy of `message` to every worker.
    fn broadcast(&mut self, message: &WorkerMessage) -> StreamResult<()> {
        for index in 0..self.len() {
            self.send_to(index, message.clone())?;
        }
        Ok(())
    }

    /// Collects every reply that has arrived so far, tagged with the index of
    /// the worker that sent it.
    fn drain_replies(&mut self) -> StreamResult<Vec<(usize, WorkerReply)>>;

    /// Stops every worker at once. The pool is empty afterwards.
    fn terminate(&mut self);
}

/// A communication channel between the coordinator and one worker thread.
///
/// # Fields
/// - `message_sender`: Sends messages from the coordinator to the worker
/// - `reply_receiver`: Receives replies from the worker
/// - `worker`: Handle to the worker thread, joined on termination
#[derive(Debug)]
pub struct WorkerChannel {
    message_sender: Sender<WorkerMessage>,
    reply_receiver: Receiver<WorkerReply>,
    worker: JoinHandle<()>,
}

/// Worker pool backed by OS threads.
///
/// Each worker owns a [`SectionMesher`] built by the factory passed to
/// [`ThreadWorkerPool::new`] and processes its inbox strictly in order.
#[derive(Debug, Default)]
pub struct ThreadWorkerPool {
    channels: Vec<WorkerChannel>,
}

impl ThreadWorkerPool {
    /// Spawns `num_workers` worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create
    /// * `make_mesher` - Builds the mesher owned by the worker at the given index
    ///
    /// # Panics
    /// Panics if the underlying thread creation fails.
    pub fn new<F>(num_workers: usize, mut make_mesher: F) -> Self
    where
        F: FnMut(usize) -> Box<dyn SectionMesher>,
    {
        info!(
            "Spawning {} mesh workers, available parallelism: {:?}",
            num_workers,
            thread::available_parallelism()
        );

        let mut channels = Vec::with_capacity(num_workers);

        for index in 0..num_workers {
            let (message_tx, message_rx) = channel::<WorkerMessage>();
            let (reply_tx, reply_rx) = channel::<WorkerReply>();
            let mut mesher = make_mesher(index);

            let worker_loop = move || {
                while let Ok(message) = message_rx.recv() {
                    for reply in process_message(mesher.as_mut(), message) {
                        if reply_tx.send(reply).is_err() {
                            return;
                        }
                    }
                }
            };

            let worker = thread::Builder::new()
                .name(format!("mesh-worker-{index}"))
                .spawn(worker_loop)
                .expect("failed to spawn mesh worker thread");

            channels.push(WorkerChannel {
                message_sender: message_tx,
                reply_receiver: reply_rx,
                worker,
            });
        }

        ThreadWorkerPool { channels }
    }
}

impl WorkerPool for ThreadWorkerPool {
    fn len(&self) -> usize {
        self.channels.len()
    }

    fn send_to(&mut self, index: usize, message: WorkerMessage) -> StreamResult<()> {
        let channel = self
            .channels
            .get(index)
            .ok_or(StreamError::WorkersNotInitialized)?;
        channel.message_sender.send(message).map_err(|_| {
            warn!("Mesh worker {index} hung up");
            StreamError::WorkerDisconnected { index }
        })
    }

    fn drain_replies(&mut self) -> StreamResult<Vec<(usize, WorkerReply)>> {
        let mut replies = Vec::new();
        for (index, channel) in self.channels.iter().enumerate() {
            loop {
                match channel.reply_receiver.try_recv() {
                    Ok(reply) => replies.push((index, reply)),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        return Err(StreamError::WorkerDisconnected { index });
                    }
                }
            }
        }
        Ok(replies)
    }

    fn terminate(&mut self) {
        if self.channels.is_empty() {
            return;
        }
        info!("Terminating {} mesh workers", self.channels.len());
        for WorkerChannel {
            message_sender,
            reply_receiver,
            worker,
        } in self.channels.drain(..)
        {
            // Closing both ends stops the worker loop at its next recv or send
            drop(message_sender);
            drop(reply_receiver);
            if worker.join().is_err() {
                warn!("A mesh worker panicked before termination");
            }
        }
    }
}

impl Drop for ThreadWorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}
