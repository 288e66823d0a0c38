//! Minimal end-to-end demo: a toy interpreter host with two synthetic
//! threads, profiled for a quarter second, folded output on stdout.
//!
//! ```bash
//! cargo run --example spin-demo
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use vm_scope::domain::ThreadId;
use vm_scope::host::{CodeView, FrameHandle, FrameView, HostRuntime, ThreadInfo};
use vm_scope::Sampler;

struct DemoCode {
    filename: &'static str,
    name: &'static str,
    first_line: u32,
}

impl CodeView for DemoCode {
    fn filename(&self) -> &str {
        self.filename
    }
    fn name(&self) -> &str {
        self.name
    }
    fn first_line(&self) -> u32 {
        self.first_line
    }
}

struct DemoFrame {
    code: DemoCode,
    current_line: u32,
    back: Option<Arc<DemoFrame>>,
}

impl FrameView for DemoFrame {
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

fn frame(
    filename: &'static str,
    name: &'static str,
    first_line: u32,
    back: Option<Arc<DemoFrame>>,
) -> Arc<DemoFrame> {
    Arc::new(DemoFrame {
        code: DemoCode {
            filename,
            name,
            first_line,
        },
        current_line: first_line,
        back,
    })
}

/// A host whose "interpreter" is two hard-coded thread stacks. The worker
/// flips between two leaf frames so the dump shows diverging paths.
struct DemoHost {
    threads: Vec<ThreadInfo>,
    frames: Mutex<Vec<(ThreadId, FrameHandle)>>,
}

impl DemoHost {
    fn new() -> Arc<Self> {
        let main_stack: FrameHandle = frame(
            "demo.py",
            "handle_request",
            20,
            Some(frame("demo.py", "main", 1, None)),
        );
        let worker_stack: FrameHandle = frame(
            "worker.py",
            "checksum",
            42,
            Some(frame("worker.py", "run", 5, None)),
        );
        Arc::new(DemoHost {
            threads: vec![
                ThreadInfo::new(ThreadId(1), "MainThread"),
                ThreadInfo::new(ThreadId(2), "Worker-0"),
            ],
            frames: Mutex::new(vec![
                (ThreadId(1), main_stack),
                (ThreadId(2), worker_stack),
            ]),
        })
    }

    fn swap_worker_leaf(&self) {
        let compress: FrameHandle = frame(
            "worker.py",
            "compress",
            61,
            Some(frame("worker.py", "run", 5, None)),
        );
        self.frames.lock().unwrap()[1] = (ThreadId(2), compress);
    }
}

impl HostRuntime for DemoHost {
    fn current_frames(&self) -> Vec<(ThreadId, FrameHandle)> {
        self.frames.lock().unwrap().clone()
    }

    fn enumerate_threads(&self) -> Vec<ThreadInfo> {
        self.threads.clone()
    }

    fn registry_threads(&self) -> Vec<ThreadInfo> {
        self.threads.clone()
    }

    fn current_thread_id(&self) -> ThreadId {
        // The demo host has no interpreter thread of its own; hand the
        // sampler an id that never collides with the fake threads.
        ThreadId(u64::MAX - 1)
    }

    fn stdlib_path(&self) -> String {
        "/opt/demo-vm/stdlib".to_string()
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let host = DemoHost::new();
    let sampler = Sampler::builder(host.clone()).interval_us(1_000).build()?;

    sampler.start()?;
    std::thread::sleep(Duration::from_millis(150));
    host.swap_worker_leaf();
    std::thread::sleep(Duration::from_millis(100));
    sampler.stop()?;

    println!("# folded stacks ({} samples)", sampler.stats().sampling_times());
    println!("{}", sampler.dumps());
    Ok(())
}
