//! Signal-driven sampler.
//!
//! No worker thread: an external periodic event (interval timer, signal
//! handler, embedder callback) calls [`SignalSampler::tick`] and one bounded
//! invocation folds every thread's stack. The tick is written for
//! async-signal-like contexts:
//!
//! - an atomic reentrancy guard makes overlapping ticks no-ops,
//! - the 16 KiB label buffer and formatter config are prepared in `start`,
//!   so the label path does not allocate,
//! - nothing is logged and no error propagates; a failing tick drops the
//!   in-flight sample and returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, TryLockError};

use crate::domain::{SamplerError, ThreadId};
use crate::host::{FrameView, HostRuntime};

use super::builder::SamplerBuilder;
use super::core::{fold_thread_sample, SamplerCore};
use super::middleware::SamplerMiddleware;
use super::settings::{SamplerStats, Settings};
use super::thread_directory::ThreadDirectory;

/// Name prepended to the stack the runtime hands directly to `tick`.
const MAIN_THREAD_NAME: &str = "MainThread";

const TID_UNSET: u64 = u64::MAX;

/// Sampling profiler driven by an external periodic tick.
pub struct SignalSampler {
    core: SamplerCore,
    /// Thread excluded from registry folds (the tick runs on it and its
    /// stack arrives via the `main_frame` argument instead).
    sampling_tid: AtomicU64,
}

impl SignalSampler {
    pub fn builder(host: Arc<dyn HostRuntime>) -> SamplerBuilder {
        SamplerBuilder::new(host)
    }

    pub(crate) fn from_core(core: SamplerCore) -> Self {
        SignalSampler {
            core,
            sampling_tid: AtomicU64::new(TID_UNSET),
        }
    }

    /// Mark the sampler enabled and record its start time. The calling
    /// thread becomes the excluded `sampling_tid` unless one was set
    /// explicitly beforehand.
    pub fn start(&self) -> Result<(), SamplerError> {
        if !self.core.settings.try_enable() {
            return Err(SamplerError::AlreadyRunning);
        }
        if self.sampling_tid.load(Ordering::Acquire) == TID_UNSET {
            self.set_sampling_tid(self.core.host.current_thread_id());
        }
        {
            let mut st = self.core.lock_state();
            st.label_cfg = self.core.settings.label_config();
        }
        self.core
            .stats
            .start
            .store(self.core.settings.now_us(), Ordering::Release);
        self.core.notify_start();
        Ok(())
    }

    /// Mark the sampler disabled; subsequent ticks return immediately.
    pub fn stop(&self) -> Result<(), SamplerError> {
        if !self.core.settings.disable() {
            return Err(SamplerError::NotRunning);
        }
        let stats = &self.core.stats;
        let end = self.core.settings.now_us();
        stats.end.store(end, Ordering::Release);
        stats.life_time.store(
            end.saturating_sub(stats.start_time()),
            Ordering::Release,
        );
        self.core.notify_stop();
        Ok(())
    }

    /// One sampling pass, driven by the external timer.
    ///
    /// `main_frame` is the current leaf frame of the thread the runtime
    /// routed the timer event to (by contract the main thread); it is folded
    /// under the `MainThread` label. Every other thread comes from the
    /// host's frame snapshot and the signal-safe registry path.
    ///
    /// Never blocks, never allocates on the label path, never logs. If a
    /// tick is already in flight, or the state is briefly held by a reader,
    /// the sample is dropped.
    pub fn tick(&self, _signo: i32, main_frame: Option<&dyn FrameView>) {
        let settings = &self.core.settings;
        if !settings.enabled() {
            return;
        }
        if !settings.begin_sampling() {
            return;
        }
        self.sample_once(main_frame);
        settings.end_sampling();
    }

    fn sample_once(&self, main_frame: Option<&dyn FrameView>) {
        let mut st = match self.core.state.try_lock() {
            Ok(st) => st,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return,
        };
        let settings = &self.core.settings;
        let stats = &self.core.stats;
        let t0 = settings.now_us();
        settings.refresh_label_flags(&mut st.label_cfg);

        if let Some(frame) = main_frame {
            if fold_thread_sample(&mut st, MAIN_THREAD_NAME, frame).is_err() {
                return;
            }
        }

        let frames = self.core.host.current_frames();
        let directory = ThreadDirectory::from_registry(self.core.host.as_ref());
        let sampling_tid = ThreadId(self.sampling_tid.load(Ordering::Acquire));
        for (tid, frame) in &frames {
            if *tid == sampling_tid {
                continue;
            }
            let Some(name) = directory.name_of(*tid) else {
                // Registry and frame snapshot disagree; abandon the pass.
                return;
            };
            if fold_thread_sample(&mut st, name, frame.as_ref()).is_err() {
                return;
            }
        }
        drop(st);

        stats
            .acc_sampling_time
            .fetch_add(settings.now_us().saturating_sub(t0), Ordering::AcqRel);
        stats.sampling_times.fetch_add(1, Ordering::AcqRel);
    }

    // --- properties -------------------------------------------------------

    pub fn sampling_tid(&self) -> Option<ThreadId> {
        match self.sampling_tid.load(Ordering::Acquire) {
            TID_UNSET => None,
            tid => Some(ThreadId(tid)),
        }
    }

    pub fn set_sampling_tid(&self, tid: ThreadId) {
        self.sampling_tid.store(tid.0, Ordering::Release);
    }

    /// Start timestamp in the configured time source's microseconds.
    pub fn start_time(&self) -> u64 {
        self.core.stats.start_time()
    }

    /// Stop timestamp; 0 until the first stop.
    pub fn end_time(&self) -> u64 {
        self.core.stats.end_time()
    }

    pub fn enabled(&self) -> bool {
        self.core.settings.enabled()
    }

    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }

    pub fn stats(&self) -> &SamplerStats {
        &self.core.stats
    }

    pub fn dumps(&self) -> String {
        self.core.dumps()
    }

    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), SamplerError> {
        self.core.save(path)
    }

    pub fn clear(&self) -> Result<(), SamplerError> {
        self.core.clear()
    }

    pub fn start_trace_native(&self) -> Result<(), SamplerError> {
        self.core.start_trace_native()
    }

    pub fn stop_trace_native(&self) -> Result<(), SamplerError> {
        self.core.stop_trace_native()
    }

    pub fn register_middleware(&self, middleware: Arc<dyn SamplerMiddleware>) {
        self.core.register_middleware(middleware);
    }

    pub fn unregister_middleware(&self, middleware: &Arc<dyn SamplerMiddleware>) {
        self.core.unregister_middleware(middleware);
    }

    pub fn clear_middleware(&self) {
        self.core.clear_middleware();
    }

    /// See [`Sampler::adjust`](super::sampler::Sampler::adjust).
    pub fn adjust(&self) -> bool {
        let secs = self.core.settings.interval_us() as f64 * 1e-6;
        self.core.host.set_switch_interval(secs)
    }
}
