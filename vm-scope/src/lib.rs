//! # vm-scope — sampling call-stack profiler for embedded interpreter runtimes
//!
//! vm-scope periodically snapshots every interpreter thread's call stack,
//! folds the snapshots into a prefix tree weighted by sample count, and
//! emits the tree in the flamegraph-compatible folded-stack format. The
//! embedding runtime is abstracted behind the [`host`] traits, so the same
//! core drives any interpreter that can enumerate its threads and walk
//! their frame chains.
//!
//! ## Data flow
//!
//! ```text
//! sampler / signal tick ──▶ thread directory ──▶ frame formatter ──▶ stack tree
//!        │                  (tid → name)         (filters, labels)     │
//!        └── native-call tracer (optional, duration-weighted) ─────────┘
//!                                                                      ▼
//!                                                        folded output (dumps/save)
//! ```
//!
//! ## Module structure
//!
//! - [`profiling`]: the two sampler variants and their shared plumbing
//!   - `sampler`: background worker thread (sleep → snapshot → fold)
//!   - `signal_sampler`: externally-driven tick for timer/signal delivery
//!   - `native_trace`: folds native CALL/RETURN durations into the tree
//! - [`tree`]: insertion-ordered, self-adjusting prefix tree of stacks
//! - [`labeling`]: frame-chain → `file:name:line;...` label rendering with
//!   the focus/self/regex/frozen filter pipeline
//! - [`host`]: traits the embedding runtime implements
//! - [`clock`]: monotonic wall and CPU clocks, nanosecond precision
//! - [`trampoline`]: run-on-main-thread queue for out-of-band threads
//! - [`objstats`]: single-pass live-object statistics
//! - [`domain`]: identifier newtypes and structured errors
//!
//! ## Typical usage
//!
//! ```no_run
//! # use std::sync::Arc;
//! # fn embed(host: Arc<dyn vm_scope::host::HostRuntime>) -> anyhow::Result<()> {
//! let sampler = vm_scope::Sampler::builder(host)
//!     .interval_us(1_000)
//!     .ignore_frozen(true)
//!     .build()?;
//! sampler.start()?;
//! // ... let the workload run ...
//! sampler.stop()?;
//! sampler.save("profile.folded")?;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod domain;
pub mod host;
pub mod labeling;
pub mod objstats;
pub mod profiling;
pub mod trampoline;
pub mod tree;

pub use domain::{LabelError, SamplerError, ScheduleError, ThreadId, TimeMode};
pub use objstats::{collect_object_stats, ObjectStats, ObjectView};
pub use profiling::{Sampler, SamplerBuilder, SamplerMiddleware, SignalSampler};
pub use trampoline::{MainThreadHandle, MainThreadQueue};
pub use tree::StackTree;
