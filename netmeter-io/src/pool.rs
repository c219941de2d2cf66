//! Worker pool for per-connection session handling.
//!
//! The server transport accepts sequentially and queues each connection
//! here, so a slow or stalled session occupies one worker instead of the
//! accept loop. Dropping the pool closes the queue and joins the workers
//! after they drain.

use crossbeam::channel::{self, Sender};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of job-running threads.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool needs at least one worker");
        let (sender, receiver) = channel::unbounded::<Job>();
        let workers = (0..size)
            .map(|id| {
                let receiver = receiver.clone();
                thread::spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        job();
                    }
                    tracing::trace!(worker = id, "worker drained");
                })
            })
            .collect();
        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Queue a job for the next free worker.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            // Workers hold the receiving side for the pool's lifetime, so
            // the send only fails during teardown.
            let _ = sender.send(Box::new(job));
        }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
