//! Simulated interpreter runtime for integration tests.
//!
//! `SimHost` implements the host traits over hand-built frame chains, so
//! samplers can be exercised end-to-end without a real interpreter: tests
//! register threads with names and leaf frames, and the host serves frame
//! snapshots, the thread registry, profile-hook installation, and a fake
//! standard-library path.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use vm_scope::domain::ThreadId;
use vm_scope::host::{
    CodeView, FrameHandle, FrameView, HostRuntime, ProfileHook, ThreadInfo,
};

pub const SIM_STDLIB: &str = "/opt/simvm/lib/stdlib";

pub struct SimCode {
    filename: String,
    name: String,
    qualname: Option<String>,
    first_line: u32,
}

impl CodeView for SimCode {
    fn filename(&self) -> &str {
        &self.filename
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn qualified_name(&self) -> Option<&str> {
        self.qualname.as_deref()
    }
    fn first_line(&self) -> u32 {
        self.first_line
    }
}

pub struct SimFrame {
    code: SimCode,
    current_line: u32,
    back: Option<Arc<SimFrame>>,
}

impl FrameView for SimFrame {
    fn back(&self) -> Option<&dyn FrameView> {
        self.back.as_deref().map(|f| f as &dyn FrameView)
    }
    fn code(&self) -> &dyn CodeView {
        &self.code
    }
    fn current_line(&self) -> u32 {
        self.current_line
    }
}

/// Build a frame chain from root to leaf; returns the leaf handle.
/// Each entry is `(filename, name, first_line, current_line)`.
pub fn chain(entries: &[(&str, &str, u32, u32)]) -> FrameHandle {
    let mut frame: Option<Arc<SimFrame>> = None;
    for (filename, name, first_line, current_line) in entries {
        frame = Some(Arc::new(SimFrame {
            code: SimCode {
                filename: (*filename).to_string(),
                name: (*name).to_string(),
                qualname: None,
                first_line: *first_line,
            },
            current_line: *current_line,
            back: frame,
        }));
    }
    frame.expect("chain requires at least one frame")
}

type SnapshotCallback = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
pub struct SimHost {
    threads: Mutex<Vec<ThreadInfo>>,
    frames: Mutex<Vec<(ThreadId, FrameHandle)>>,
    hook: Mutex<Option<Arc<dyn ProfileHook>>>,
    /// Invoked inside `current_frames`, mid-sample; used to provoke
    /// reentrancy.
    snapshot_callback: Mutex<Option<SnapshotCallback>>,
    switch_interval: Mutex<Option<f64>>,
}

impl SimHost {
    pub fn new() -> Arc<Self> {
        Arc::new(SimHost::default())
    }

    /// Register (or replace) a thread with its name and leaf frame.
    pub fn set_thread(&self, tid: ThreadId, name: &str, frame: FrameHandle) {
        let mut threads = self.threads.lock().unwrap();
        threads.retain(|t| t.id != tid);
        threads.push(ThreadInfo::new(tid, name));
        let mut frames = self.frames.lock().unwrap();
        frames.retain(|(id, _)| *id != tid);
        frames.push((tid, frame));
    }

    /// Register a thread in the registry without a frame snapshot entry.
    pub fn set_registry_only(&self, tid: ThreadId, name: &str) {
        let mut threads = self.threads.lock().unwrap();
        threads.retain(|t| t.id != tid);
        threads.push(ThreadInfo::new(tid, name));
    }

    pub fn remove_thread(&self, tid: ThreadId) {
        self.threads.lock().unwrap().retain(|t| t.id != tid);
        self.frames.lock().unwrap().retain(|(id, _)| *id != tid);
    }

    pub fn installed_hook(&self) -> Option<Arc<dyn ProfileHook>> {
        self.hook.lock().unwrap().clone()
    }

    pub fn set_snapshot_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.snapshot_callback.lock().unwrap() = Some(Box::new(callback));
    }

    pub fn clear_snapshot_callback(&self) {
        *self.snapshot_callback.lock().unwrap() = None;
    }

    pub fn last_switch_interval(&self) -> Option<f64> {
        *self.switch_interval.lock().unwrap()
    }
}

impl HostRuntime for SimHost {
    fn current_frames(&self) -> Vec<(ThreadId, FrameHandle)> {
        // Take the callback out while it runs so a re-entrant snapshot does
        // not deadlock on the mutex.
        let callback = self.snapshot_callback.lock().unwrap().take();
        if let Some(callback) = callback {
            callback();
            *self.snapshot_callback.lock().unwrap() = Some(callback);
        }
        self.frames.lock().unwrap().clone()
    }

    fn enumerate_threads(&self) -> Vec<ThreadInfo> {
        self.threads.lock().unwrap().clone()
    }

    fn registry_threads(&self) -> Vec<ThreadInfo> {
        self.threads.lock().unwrap().clone()
    }

    fn current_thread_id(&self) -> ThreadId {
        // Simulated interpreter ids for profiler-owned threads: unique per
        // OS thread, far above the ids tests hand out.
        static NEXT: AtomicU64 = AtomicU64::new(1 << 32);
        thread_local! {
            static SIM_TID: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        }
        ThreadId(SIM_TID.with(|id| *id))
    }

    fn stdlib_path(&self) -> String {
        SIM_STDLIB.to_string()
    }

    fn install_profile_hook(&self, hook: Arc<dyn ProfileHook>) {
        *self.hook.lock().unwrap() = Some(hook);
    }

    fn uninstall_profile_hook(&self) {
        *self.hook.lock().unwrap() = None;
    }

    fn set_switch_interval(&self, secs: f64) -> bool {
        *self.switch_interval.lock().unwrap() = Some(secs);
        true
    }
}

/// Parse a folded dump into `path -> count`.
pub fn parse_folded(dump: &str) -> HashMap<String, u64> {
    dump.lines()
        .map(|line| {
            let (path, count) = line.rsplit_once(' ').expect("folded record");
            (path.to_string(), count.parse().expect("count"))
        })
        .collect()
}
