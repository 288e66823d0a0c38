//! Structured error types for vm-scope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("sampler is already running; call stop() first")]
    AlreadyRunning,

    #[error("sampler is not running")]
    NotRunning,

    #[error("native-call tracing was not enabled on this sampler")]
    NativeTraceDisabled,

    #[error("time mode must be \"cpu\" or \"wall\", got {0:?}")]
    InvalidTimeMode(String),

    #[error("native discount factor must be in (0, 1), got {0}")]
    InvalidDiscount(f64),

    #[error("sampling thread panicked")]
    WorkerPanicked,

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while rendering a frame chain into a stack label.
///
/// Both variants mean the sample is discarded, never truncated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelError {
    #[error("stack label exceeded the {capacity}-byte format buffer")]
    BufferOverflow { capacity: usize },

    #[error("frame chain deeper than {max} frames")]
    StackTooDeep { max: usize },
}

/// Failures while claiming a per-thread native-call slot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceSlotError {
    #[error("no thread-state slot available (max {max} threads)")]
    Exhausted { max: usize },

    #[error("return event without a matching call on this thread")]
    EmptyCallStack,
}

/// Failure to enqueue a deferred call on the main thread.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("main-thread queue is closed")]
    Closed,
}
