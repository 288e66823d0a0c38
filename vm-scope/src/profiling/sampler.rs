//! Synchronous sampler.
//!
//! A dedicated worker thread loops sleep → snapshot → fold. During the sleep
//! the interpreter runs undisturbed; after it the worker pulls the host's
//! frame snapshot, labels every thread's stack, and folds the labels into
//! the tree. `stop` flips the shared enabled flag and joins the worker, so
//! a reader that wants a quiescent tree only has to stop first.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::domain::SamplerError;
use crate::host::HostRuntime;

use super::builder::SamplerBuilder;
use super::core::{fold_thread_sample, SamplerCore};
use super::middleware::SamplerMiddleware;
use super::settings::{SamplerStats, Settings};
use super::thread_directory::ThreadDirectory;

/// Sampling profiler driven by a background worker thread.
pub struct Sampler {
    core: SamplerCore,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Sampler {
    pub fn builder(host: Arc<dyn HostRuntime>) -> SamplerBuilder {
        SamplerBuilder::new(host)
    }

    pub(crate) fn from_core(core: SamplerCore) -> Self {
        Sampler {
            core,
            worker: Mutex::new(None),
        }
    }

    /// Launch the worker thread. Fails if the sampler is already running.
    pub fn start(&self) -> Result<(), SamplerError> {
        if !self.core.settings.try_enable() {
            return Err(SamplerError::AlreadyRunning);
        }
        self.core.take_error();
        {
            // Fresh formatter snapshot: patterns and paths as configured now.
            let mut st = self.core.lock_state();
            st.label_cfg = self.core.settings.label_config();
        }

        let core = self.core.clone();
        let spawned = thread::Builder::new()
            .name("vm-scope-sampler".to_string())
            .spawn(move || sampling_routine(core));
        match spawned {
            Ok(handle) => {
                *self
                    .worker
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                self.core.notify_start();
                Ok(())
            }
            Err(err) => {
                self.core.settings.disable();
                Err(SamplerError::Io(err))
            }
        }
    }

    /// Signal the worker to stop and join it. Fails if not running, and
    /// surfaces any error that killed the worker early.
    pub fn stop(&self) -> Result<(), SamplerError> {
        let was_enabled = self.core.settings.disable();
        let joined = self.join_worker();
        if !was_enabled {
            // The worker may have bailed out on its own; report why.
            return Err(self
                .core
                .take_error()
                .unwrap_or(SamplerError::NotRunning));
        }
        joined?;
        if let Some(err) = self.core.take_error() {
            return Err(err);
        }
        self.core.notify_stop();
        Ok(())
    }

    /// Block until the worker exits. Unlike `stop`, the enabled flag is left
    /// alone, so this waits for someone else to stop the sampler.
    pub fn join_sampling_thread(&self) -> Result<(), SamplerError> {
        self.join_worker()
    }

    fn join_worker(&self) -> Result<(), SamplerError> {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) => handle.join().map_err(|_| SamplerError::WorkerPanicked),
            None => Ok(()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.core.settings.enabled()
    }

    /// Handle of the worker thread, while one is running.
    pub fn sampling_thread(&self) -> Option<std::thread::Thread> {
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|handle| handle.thread().clone())
    }

    /// Atomic property access shared with the worker.
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

    /// Ask the host to shorten its thread switch interval to at most the
    /// sampling interval, so every thread gets scheduled between samples.
    pub fn adjust(&self) -> bool {
        let secs = self.core.settings.interval_us() as f64 * 1e-6;
        self.core.host.set_switch_interval(secs)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.core.settings.disable();
        let _ = self.join_worker();
    }
}

/// The worker loop. Runs until the enabled flag clears or a sample fails
/// hard (format-buffer overflow), in which case the error is parked for
/// `stop` to report.
fn sampling_routine(core: SamplerCore) {
    let settings = core.settings.clone();
    let stats = core.stats.clone();
    let sampler_tid = core.host.current_thread_id();

    let start_us = settings.now_us();
    stats.start.store(start_us, Ordering::Release);

    'sampling: while settings.enabled() {
        stats.sampling_times.fetch_add(1, Ordering::AcqRel);
        thread::sleep(Duration::from_micros(settings.interval_us()));

        let t0 = settings.now_us();
        let frames = core.host.current_frames();
        let directory = ThreadDirectory::enumerate(core.host.as_ref());

        let mut st = core.lock_state();
        settings.refresh_label_flags(&mut st.label_cfg);
        st.label_cfg.patterns = settings.regex_patterns();
        for (tid, frame) in &frames {
            if *tid == sampler_tid {
                continue;
            }
            let Some(name) = directory.name_of(*tid) else {
                log::warn!("no registry entry for {tid}; skipping its sample");
                continue;
            };
            if let Err(err) = fold_thread_sample(&mut st, name, frame.as_ref()) {
                // The sample is dropped, never truncated; a stack this deep
                // means every future sample of it would fail too.
                core.set_error(err.into());
                settings.disable();
                drop(st);
                break 'sampling;
            }
        }
        drop(st);

        let elapsed = settings.now_us().saturating_sub(t0);
        stats.acc_sampling_time.fetch_add(elapsed, Ordering::AcqRel);
        if settings.debug() {
            log::debug!(
                "sampling iteration {} over {} thread(s) took {elapsed}us",
                stats.sampling_times(),
                frames.len(),
            );
        }
    }

    let end_us = settings.now_us();
    stats.end.store(end_us, Ordering::Release);
    stats
        .life_time
        .store(end_us.saturating_sub(start_us), Ordering::Release);
}
