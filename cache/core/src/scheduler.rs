//! Periodic background tasks.
//!
//! One dedicated OS thread per timer, woken on its interval or on stop.
//! Stopping waits a bounded grace period for the in-flight tick to finish,
//! then detaches the thread so shutdown never hangs.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};

/// Grace period waited on stop before a scheduler thread is abandoned.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Handle to a periodic background task.
pub struct Scheduler {
    name: String,
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn a named thread running `task` every `interval` until stopped.
    /// The first run happens one interval after spawn, matching a fixed-rate
    /// timer that does not fire at time zero.
    pub fn spawn<F>(name: &str, interval: Duration, mut task: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);

        let thread_name = name.to_string();
        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                        Err(crossbeam_channel::RecvTimeoutError::Timeout) => task(),
                    }
                }
                let _ = done_tx.send(());
            })
            .expect("failed to spawn scheduler thread");

        Self {
            name: name.to_string(),
            stop_tx,
            done_rx,
            handle: Some(handle),
        }
    }

    /// Signal the timer to stop and wait up to the grace period for it.
    pub fn stop(mut self) {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(STOP_GRACE) {
            Ok(()) => {
                if let Some(handle) = self.handle.take() {
                    let _ = handle.join();
                }
            }
            Err(_) => {
                tracing::warn!(scheduler = %self.name, "did not stop within grace period, detaching");
                self.handle.take();
            }
        }
    }
}
