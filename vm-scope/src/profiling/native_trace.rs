//! Native-call tracer.
//!
//! When the host delivers CALL/RETURN events for native (non-interpreted)
//! callees, each thread keeps a LIFO of pending calls in a process-wide slot
//! table. On return, the pending call's interpreter stack is formatted with
//! a synthetic `module:function:0` frame appended and folded into the tree
//! with a duration-weighted count, so time spent outside the interpreter is
//! attributed even though the samplers cannot see it.
//!
//! The weight is `floor(duration_us / interval_us * discount)` with the
//! discount strictly below 1 to offset tracer overhead; see
//! [`Settings::set_native_discount`](super::settings::Settings::set_native_discount).

use std::cell::Cell;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::clock;
use crate::domain::errors::TraceSlotError;
use crate::host::{FrameHandle, FrameView, NativeFunction, ProfileHook};
use crate::labeling::format_stack;

use super::core::SampleState;
use super::settings::Settings;

/// Upper bound on threads that may ever issue traced native calls.
pub const MAX_THREAD_NUM: usize = 2048;

/// Fallback module label when the host cannot name the function's module.
const UNKNOWN_MODULE: &str = "<native>";

struct PendingCall {
    function: NativeFunction,
    frame: FrameHandle,
    call_time_cpu_ns: u64,
}

struct Slot {
    claimed: AtomicBool,
    calls: Mutex<Vec<PendingCall>>,
}

struct SlotTable {
    slots: Vec<Slot>,
}

static TABLE: OnceLock<SlotTable> = OnceLock::new();

thread_local! {
    /// Slot index cached after the first claim on this thread.
    static SLOT_IDX: Cell<Option<usize>> = const { Cell::new(None) };
}

fn table() -> &'static SlotTable {
    TABLE.get_or_init(|| {
        let mut slots = Vec::with_capacity(MAX_THREAD_NUM);
        for _ in 0..MAX_THREAD_NUM {
            slots.push(Slot {
                claimed: AtomicBool::new(false),
                calls: Mutex::new(Vec::new()),
            });
        }
        SlotTable { slots }
    })
}

/// Claim (or retrieve) the calling thread's slot.
fn claim_slot() -> Result<usize, TraceSlotError> {
    if let Some(idx) = SLOT_IDX.get() {
        return Ok(idx);
    }
    let table = table();
    for (idx, slot) in table.slots.iter().enumerate() {
        if slot
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            SLOT_IDX.set(Some(idx));
            return Ok(idx);
        }
    }
    Err(TraceSlotError::Exhausted {
        max: MAX_THREAD_NUM,
    })
}

/// Drain every slot and release all claims.
///
/// Call only after the profile hook is uninstalled and target threads have
/// quiesced: a thread that claimed a slot before shutdown still caches its
/// index and would share the slot with whoever claims it next.
pub fn registry_shutdown() {
    let Some(table) = TABLE.get() else {
        return;
    };
    for slot in &table.slots {
        slot.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        slot.claimed.store(false, Ordering::Release);
    }
}

/// [`ProfileHook`] implementation folding native-call durations into a
/// sampler's tree.
pub(crate) struct NativeTraceHook {
    settings: Arc<Settings>,
    state: Arc<Mutex<SampleState>>,
}

impl NativeTraceHook {
    pub fn new(settings: Arc<Settings>, state: Arc<Mutex<SampleState>>) -> Self {
        NativeTraceHook { settings, state }
    }

    fn fold_return(&self, call: &PendingCall, duration_us: u64) {
        let interval = self.settings.interval_us();
        if interval == 0 {
            return;
        }
        let weight =
            (duration_us as f64 / interval as f64 * self.settings.native_discount()).floor() as u64;
        if weight == 0 {
            return;
        }

        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.settings.refresh_label_flags(&mut st.label_cfg);
        st.buf.clear();
        let SampleState { label_cfg, buf, .. } = &mut *st;
        if let Err(err) = format_stack(call.frame.as_ref(), label_cfg, buf) {
            log::warn!("dropping native-call sample: {err}");
            return;
        }
        if st.buf.is_empty() {
            // Every interpreter frame was filtered away; nothing to attach
            // the native frame to.
            return;
        }
        let module = call.function.module.as_deref().unwrap_or(UNKNOWN_MODULE);
        if write!(st.buf, ";{}:{}:0", module, call.function.name).is_err() {
            log::warn!("dropping native-call sample: synthetic frame overflowed buffer");
            return;
        }
        let SampleState { tree, buf, .. } = &mut *st;
        tree.insert_weighted(buf.as_str(), weight);
    }
}

impl ProfileHook for NativeTraceHook {
    fn on_call(&self, frame: FrameHandle, function: NativeFunction) -> Result<(), TraceSlotError> {
        let idx = claim_slot()?;
        table().slots[idx]
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingCall {
                function,
                frame,
                call_time_cpu_ns: clock::thread_cpu_ns(),
            });
        Ok(())
    }

    fn on_return(
        &self,
        _frame: &dyn FrameView,
        _function: &NativeFunction,
    ) -> Result<(), TraceSlotError> {
        let idx = claim_slot()?;
        let call = table().slots[idx]
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .ok_or(TraceSlotError::EmptyCallStack)?;
        let duration_us = clock::thread_cpu_ns().saturating_sub(call.call_time_cpu_ns) / 1_000;

        // Fold only while the sampler is running with tracing armed; the
        // pending node is popped regardless so the LIFO stays balanced.
        if self.settings.enabled() && self.settings.trace_native() {
            self.fold_return(&call, duration_us);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_claim_is_cached_per_thread() {
        let a = claim_slot().unwrap();
        let b = claim_slot().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_threads_get_distinct_slots() {
        let here = claim_slot().unwrap();
        let there = std::thread::spawn(|| claim_slot().unwrap())
            .join()
            .unwrap();
        assert_ne!(here, there);
    }
}
