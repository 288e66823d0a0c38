//! State shared by both sampler variants.
//!
//! `SamplerCore` bundles the host handle, the atomic settings, the counters,
//! and the mutable sampling state (tree + format buffer) behind one mutex.
//! That mutex serializes all tree mutation: the sync worker holds it per
//! iteration, the signal tick claims it with a try-lock, and readers
//! (`dumps`, `save`) simply queue behind whichever is active.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{LabelError, SamplerError};
use crate::host::{FrameView, HostRuntime};
use crate::labeling::{format_stack, LabelBuf, LabelConfig};
use crate::tree::StackTree;

use super::middleware::SamplerMiddleware;
use super::native_trace::NativeTraceHook;
use super::settings::{SamplerStats, Settings};

/// Mutable per-sampler state: the aggregation tree, the preallocated format
/// buffer, and the formatter configuration snapshot.
pub(crate) struct SampleState {
    pub tree: StackTree,
    pub buf: LabelBuf,
    pub label_cfg: LabelConfig,
}

impl SampleState {
    fn new(label_cfg: LabelConfig) -> Self {
        SampleState {
            tree: StackTree::new(),
            buf: LabelBuf::new(),
            label_cfg,
        }
    }
}

/// Everything a sampler variant shares with its worker/tick path and the
/// native-call tracer. Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub(crate) struct SamplerCore {
    pub host: Arc<dyn HostRuntime>,
    pub settings: Arc<Settings>,
    pub stats: Arc<SamplerStats>,
    pub state: Arc<Mutex<SampleState>>,
    middleware: Arc<Mutex<Vec<Arc<dyn SamplerMiddleware>>>>,
    last_error: Arc<Mutex<Option<SamplerError>>>,
}

impl SamplerCore {
    pub fn new(host: Arc<dyn HostRuntime>, settings: Arc<Settings>) -> Self {
        let label_cfg = settings.label_config();
        SamplerCore {
            host,
            settings,
            stats: Arc::new(SamplerStats::default()),
            state: Arc::new(Mutex::new(SampleState::new(label_cfg))),
            middleware: Arc::new(Mutex::new(Vec::new())),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn lock_state(&self) -> MutexGuard<'_, SampleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Folded dump, passed through the middleware pipeline.
    pub fn dumps(&self) -> String {
        let dump = self.lock_state().tree.dumps();
        let middleware = self
            .middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        middleware
            .iter()
            .fold(dump, |dump, m| m.process_dump(dump))
    }

    /// Write the (middleware-processed) folded dump to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SamplerError> {
        let content = self.dumps();
        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(content.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Swap in a fresh tree and reset the sampling counters. Only legal
    /// while stopped.
    pub fn clear(&self) -> Result<(), SamplerError> {
        if self.settings.enabled() {
            return Err(SamplerError::AlreadyRunning);
        }
        let mut st = self.lock_state();
        st.tree = StackTree::new();
        drop(st);
        self.stats.reset_sampling();
        Ok(())
    }

    // --- middleware ------------------------------------------------------

    pub fn register_middleware(&self, middleware: Arc<dyn SamplerMiddleware>) {
        let mut list = self
            .middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !list.iter().any(|m| Arc::ptr_eq(m, &middleware)) {
            list.push(middleware);
        }
    }

    pub fn unregister_middleware(&self, middleware: &Arc<dyn SamplerMiddleware>) {
        self.middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|m| !Arc::ptr_eq(m, middleware));
    }

    pub fn clear_middleware(&self) {
        self.middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn notify_start(&self) {
        let middleware = self
            .middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for m in middleware {
            m.on_start();
        }
    }

    pub fn notify_stop(&self) {
        let middleware = self
            .middleware
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for m in middleware {
            m.on_stop();
        }
    }

    // --- worker error channel --------------------------------------------

    pub fn set_error(&self, err: SamplerError) {
        let mut slot = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // First failure wins.
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn take_error(&self) -> Option<SamplerError> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    // --- native-call tracing ---------------------------------------------

    /// Arm native CALL/RETURN folding. Requires the trace-native flag and a
    /// running sampler.
    pub fn start_trace_native(&self) -> Result<(), SamplerError> {
        if !self.settings.trace_native() {
            return Err(SamplerError::NativeTraceDisabled);
        }
        if !self.settings.enabled() {
            return Err(SamplerError::NotRunning);
        }
        let hook = Arc::new(NativeTraceHook::new(
            self.settings.clone(),
            self.state.clone(),
        ));
        self.host.install_profile_hook(hook);
        Ok(())
    }

    pub fn stop_trace_native(&self) -> Result<(), SamplerError> {
        if !self.settings.trace_native() {
            return Err(SamplerError::NativeTraceDisabled);
        }
        self.host.uninstall_profile_hook();
        Ok(())
    }
}

/// Render one thread's sample (`name;frame;frame;...`) into the state's
/// buffer and fold it into the tree.
///
/// Returns whether anything was folded: a stack whose frames were all
/// filtered away contributes nothing, matching the rule that a bare thread
/// name is not a sample.
pub(crate) fn fold_thread_sample(
    st: &mut SampleState,
    thread_name: &str,
    frame: &dyn FrameView,
) -> Result<bool, LabelError> {
    st.buf.clear();
    write!(st.buf, "{thread_name}").map_err(|_| LabelError::BufferOverflow {
        capacity: st.buf.capacity(),
    })?;
    let mark = st.buf.len();
    format_stack(frame, &st.label_cfg, &mut st.buf)?;
    if st.buf.len() > mark {
        st.tree.insert(st.buf.as_str());
        Ok(true)
    } else {
        Ok(false)
    }
}
