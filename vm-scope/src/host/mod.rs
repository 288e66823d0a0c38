//! Host runtime interfaces.
//!
//! The profiler never talks to a concrete interpreter; everything it needs
//! from the embedding runtime comes through these traits:
//!
//! - [`FrameView`] / [`CodeView`]: introspection over one activation record
//!   and its code object (leaf-first `back()` chain).
//! - [`HostRuntime`]: the process-level surface — frame snapshots, the
//!   thread registry, profile hooks for native calls, and the one-time
//!   standard-library path lookup.
//! - [`ProfileHook`]: receiver for native CALL/RETURN events, installed by
//!   the native-call tracer.
//!
//! Contract notes live on each method; the signal-driven sampler relies on
//! them (in particular `registry_threads` must not run user-level code).

use std::sync::Arc;

use crate::domain::errors::TraceSlotError;
use crate::domain::ThreadId;

/// Introspection over a code object.
pub trait CodeView {
    /// Source file path, or a `<...>` pseudo-name for synthetic code.
    fn filename(&self) -> &str;

    /// Plain function name.
    fn name(&self) -> &str;

    /// Dotted qualified name, when the runtime tracks one.
    fn qualified_name(&self) -> Option<&str> {
        None
    }

    /// First line of the function definition.
    fn first_line(&self) -> u32;
}

/// Introspection over one activation record.
///
/// Frames form a leaf-first chain: `back()` is the caller, `None` at the
/// root. The chain handed to the profiler is a snapshot; it must stay
/// readable for the duration of the sample even if the target thread keeps
/// running.
pub trait FrameView {
    fn back(&self) -> Option<&dyn FrameView>;

    fn code(&self) -> &dyn CodeView;

    /// Line currently executing in this frame.
    fn current_line(&self) -> u32;
}

/// Owned snapshot of a thread's leaf frame.
pub type FrameHandle = Arc<dyn FrameView + Send + Sync>;

/// One entry of the runtime's thread registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    pub id: ThreadId,
    /// Human name registered for the thread (e.g. `MainThread`, `Worker-1`).
    pub name: String,
}

impl ThreadInfo {
    pub fn new(id: ThreadId, name: impl Into<String>) -> Self {
        ThreadInfo {
            id,
            name: name.into(),
        }
    }
}

/// A native (non-interpreted) callee as seen by the runtime's profile hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFunction {
    /// Module the function is bound to, when known.
    pub module: Option<String>,
    pub name: String,
}

impl NativeFunction {
    pub fn new(module: Option<String>, name: impl Into<String>) -> Self {
        NativeFunction {
            module,
            name: name.into(),
        }
    }
}

/// Receiver for native CALL/RETURN events.
///
/// Both callbacks run on the thread executing the native call and may be
/// invoked from deeply nested interpreter activity; they must not re-enter
/// the interpreter.
pub trait ProfileHook: Send + Sync {
    /// A native function is about to run. `frame` is the interpreter frame
    /// issuing the call.
    fn on_call(&self, frame: FrameHandle, function: NativeFunction) -> Result<(), TraceSlotError>;

    /// The matching native function returned.
    fn on_return(
        &self,
        frame: &dyn FrameView,
        function: &NativeFunction,
    ) -> Result<(), TraceSlotError>;
}

/// The embedding runtime, as the profiler sees it.
pub trait HostRuntime: Send + Sync + 'static {
    /// Snapshot of every interpreter thread's leaf frame.
    fn current_frames(&self) -> Vec<(ThreadId, FrameHandle)>;

    /// Public thread enumeration. May allocate and take interpreter-level
    /// locks; only the synchronous sampler calls it.
    fn enumerate_threads(&self) -> Vec<ThreadInfo>;

    /// Active + limbo thread registry entries, read without invoking
    /// user-level code. The signal-driven sampler calls this from its tick,
    /// so implementations must not run arbitrary callbacks or block on locks
    /// target code can hold.
    fn registry_threads(&self) -> Vec<ThreadInfo>;

    /// Interpreter thread id of the calling thread.
    fn current_thread_id(&self) -> ThreadId;

    /// Standard-library directory of the runtime. Looked up once per
    /// sampler, at construction.
    fn stdlib_path(&self) -> String;

    /// Arm native CALL/RETURN delivery. Hosts without a profile hook keep
    /// the default no-op.
    fn install_profile_hook(&self, _hook: Arc<dyn ProfileHook>) {}

    /// Disarm native CALL/RETURN delivery.
    fn uninstall_profile_hook(&self) {}

    /// Advise the runtime to shorten its thread switch interval so samples
    /// interleave fairly. Returns whether an adjustment was applied.
    fn set_switch_interval(&self, _secs: f64) -> bool {
        false
    }
}
