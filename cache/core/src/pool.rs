//! Fixed-size worker pool for background loads.
//!
//! Shared by the prefetcher and the cache warmer. Jobs may block inside a
//! `DataLoader` for an arbitrary time, so shutdown joins with a bounded
//! grace period and detaches stragglers instead of hanging.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Sender, unbounded};

type Job = Box<dyn FnOnce() + Send + 'static>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Fixed set of worker threads draining a shared job channel.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` named threads (`<name_prefix>-0`, `<name_prefix>-1`, ...).
    pub fn new(name_prefix: &str, workers: usize) -> Self {
        let (tx, rx) = unbounded::<Job>();
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers.max(1) {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", name_prefix, worker_id))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
                .expect("failed to spawn pool worker");
            handles.push(handle);
        }

        Self {
            tx: Some(tx),
            handles,
        }
    }

    /// Submit a job. Returns false if the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Close the queue, drain outstanding jobs for up to the grace period,
    /// then detach any worker still blocked.
    pub fn shutdown(mut self) {
        // Dropping the sender closes the channel; workers exit after the
        // job they are currently running.
        self.tx.take();

        let deadline = Instant::now() + SHUTDOWN_GRACE;
        let mut pending = std::mem::take(&mut self.handles);
        while !pending.is_empty() && Instant::now() < deadline {
            let (finished, still_running): (Vec<_>, Vec<_>) =
                pending.into_iter().partition(|h| h.is_finished());
            for handle in finished {
                let _ = handle.join();
            }
            pending = still_running;
            if !pending.is_empty() {
                std::thread::sleep(Duration::from_millis(10));
            }
        }
        if !pending.is_empty() {
            tracing::warn!(
                stragglers = pending.len(),
                "worker pool shutdown grace expired, detaching"
            );
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.tx.take();
    }
}
