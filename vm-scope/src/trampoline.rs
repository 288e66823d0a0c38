//! Main-thread trampoline.
//!
//! Out-of-band threads (samplers, middleware, embedder plumbing) sometimes
//! need to run code that the host only allows on its main thread. The queue
//! decouples the two sides: any thread enqueues a callable through a cloned
//! [`MainThreadHandle`] and returns immediately; the main thread drains
//! pending callables whenever it next calls [`MainThreadQueue::run_pending`].

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::domain::ScheduleError;

/// A deferred call. Failures are reported by the runner, not the scheduler.
pub type MainThreadJob = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// The main-thread side: owns the receiver and executes pending jobs.
pub struct MainThreadQueue {
    tx: Sender<MainThreadJob>,
    rx: Receiver<MainThreadJob>,
}

/// The scheduling side; clone freely across threads.
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: Sender<MainThreadJob>,
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        MainThreadQueue { tx, rx }
    }

    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every currently queued job in FIFO order; returns how many ran.
    ///
    /// A failing job is logged and does not stop the drain.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    ran += 1;
                    if let Err(err) = job() {
                        log::warn!("deferred main-thread call failed: {err:#}");
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MainThreadHandle {
    /// Enqueue `job` for the next `run_pending` on the main thread.
    /// Returns immediately; fails only when the queue side is gone.
    pub fn schedule<F>(&self, job: F) -> Result<(), ScheduleError>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        self.tx
            .send(Box::new(job))
            .map_err(|_| ScheduleError::Closed)
    }
}
