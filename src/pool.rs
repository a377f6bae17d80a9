//! Bounded worker pool
//!
//! Fixed worker count, channel-fed, with an explicit drain barrier: the
//! caller blocks (polling, not a hard join) until every dispatched unit has
//! finished. Workers share nothing with the caller except the jobs moved in.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Drain poll interval
const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// Fixed-size worker pool with a poll-based drain barrier
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<AtomicUsize>,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));
        let workers = (0..capacity.max(1))
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                std::thread::spawn(move || worker_loop(&receiver))
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
            pending,
        }
    }

    /// Dispatch one independent unit of work
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        let pending = Arc::clone(&self.pending);
        pending.fetch_add(1, Ordering::SeqCst);
        let wrapped: Job = Box::new(move || {
            // The guard releases the counter even if the job panics and
            // unwinds through the worker, so drain() still terminates.
            let _guard = PendingGuard(pending);
            job();
        });
        if let Some(sender) = &self.sender {
            // Send fails only if all workers died; the pending counter is
            // released so drain() cannot hang on the lost job.
            if sender.send(wrapped).is_err() {
                self.pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    /// Stop accepting work and block until every dispatched job finished
    pub fn drain(mut self) {
        self.sender.take();
        while self.pending.load(Ordering::SeqCst) > 0 {
            std::thread::sleep(DRAIN_INTERVAL);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
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

/// Decrements the pending counter when the job finishes or unwinds
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = {
            let guard = match receiver.lock() {
                Ok(guard) => guard,
                Err(_) => return,
            };
            guard.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => return,
        }
    }
}
