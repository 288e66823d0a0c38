mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::{chain, parse_folded, SimHost, SIM_STDLIB};
use vm_scope::domain::{LabelError, SamplerError, ThreadId};
use vm_scope::profiling::SamplerMiddleware;
use vm_scope::Sampler;

#[test]
fn test_sampler_liveness() {
    let host = SimHost::new();
    host.set_thread(
        ThreadId(2),
        "Worker",
        chain(&[("spin.py", "run", 1, 4), ("spin.py", "hot_loop", 8, 9)]),
    );

    let sampler = Sampler::builder(host).interval_us(1_000).build().unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(120));
    sampler.stop().unwrap();

    assert!(
        sampler.stats().sampling_times() >= 50,
        "expected at least 50 iterations, got {}",
        sampler.stats().sampling_times()
    );
    let dump = sampler.dumps();
    assert!(dump.contains("spin.py"), "dump: {dump}");
    let folded = parse_folded(&dump);
    let count = folded["Worker;spin.py:run:1;spin.py:hot_loop:8"];
    assert!(count >= 50, "folded count {count}");
}

#[test]
fn test_state_transition_errors() {
    let host = SimHost::new();
    let sampler = Sampler::builder(host).build().unwrap();

    assert!(matches!(sampler.stop(), Err(SamplerError::NotRunning)));
    sampler.start().unwrap();
    assert!(matches!(sampler.start(), Err(SamplerError::AlreadyRunning)));
    assert!(matches!(sampler.clear(), Err(SamplerError::AlreadyRunning)));
    sampler.stop().unwrap();
    assert!(matches!(sampler.stop(), Err(SamplerError::NotRunning)));
}

#[test]
fn test_clear_resets_tree_and_counters() {
    let host = SimHost::new();
    host.set_thread(ThreadId(2), "Worker", chain(&[("app.py", "work", 1, 1)]));

    let sampler = Sampler::builder(host).interval_us(1_000).build().unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    sampler.stop().unwrap();
    assert!(!sampler.dumps().is_empty());
    assert!(sampler.stats().sampling_times() > 0);

    sampler.clear().unwrap();
    assert_eq!(sampler.dumps(), "");
    assert_eq!(sampler.stats().sampling_times(), 0);
    assert_eq!(sampler.stats().acc_sampling_time(), 0);
}

#[test]
fn test_save_matches_dumps() {
    let host = SimHost::new();
    host.set_thread(ThreadId(2), "Worker", chain(&[("app.py", "work", 3, 3)]));

    let sampler = Sampler::builder(host).interval_us(1_000).build().unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    sampler.stop().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profile.folded");
    sampler.save(&path).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), sampler.dumps());
}

#[test]
fn test_filters_subtract_frames() {
    let host = SimHost::new();
    let stdlib_file = format!("{SIM_STDLIB}/json.py");
    host.set_thread(
        ThreadId(2),
        "Worker",
        chain(&[
            ("<frozen importlib._bootstrap>", "_load", 1, 1),
            ("app.py", "main", 5, 6),
            (stdlib_file.as_str(), "loads", 10, 11),
            ("app.py", "parse", 20, 21),
        ]),
    );

    let sampler = Sampler::builder(host)
        .interval_us(1_000)
        .ignore_frozen(true)
        .focus_mode(true)
        .build()
        .unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(40));
    sampler.stop().unwrap();

    let dump = sampler.dumps();
    assert!(!dump.is_empty());
    assert!(!dump.contains("<frozen"), "dump: {dump}");
    assert!(!dump.contains(SIM_STDLIB), "dump: {dump}");
    for path in parse_folded(&dump).keys() {
        assert_eq!(path, "Worker;app.py:main:5;app.py:parse:20");
    }
}

#[test]
fn test_buffer_overflow_stops_sampler_with_error() {
    let host = SimHost::new();
    let specs: Vec<(String, String)> = (0..1_500)
        .map(|i| (format!("very/long/module/path/segment_{i}.py"), format!("frame_{i}")))
        .collect();
    let refs: Vec<(&str, &str, u32, u32)> = specs
        .iter()
        .map(|(f, n)| (f.as_str(), n.as_str(), 1, 1))
        .collect();
    host.set_thread(ThreadId(2), "Deep", chain(&refs));

    let sampler = Sampler::builder(host).interval_us(1_000).build().unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    // The worker hits the overflow on its first sample, parks the error and
    // disables itself.
    assert!(!sampler.enabled());
    match sampler.stop() {
        Err(SamplerError::Label(LabelError::BufferOverflow { .. })) => {}
        other => panic!("expected buffer overflow, got {other:?}"),
    }
    assert_eq!(sampler.dumps(), "");
}

struct RecordingMiddleware {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl SamplerMiddleware for RecordingMiddleware {
    fn on_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
    fn on_stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
    fn process_dump(&self, dump: String) -> String {
        format!("# simvm profile\n{dump}")
    }
}

#[test]
fn test_middleware_lifecycle_and_dump_rewrite() {
    let host = SimHost::new();
    host.set_thread(ThreadId(2), "Worker", chain(&[("app.py", "work", 1, 1)]));

    let sampler = Sampler::builder(host).interval_us(1_000).build().unwrap();
    let middleware = Arc::new(RecordingMiddleware {
        starts: AtomicUsize::new(0),
        stops: AtomicUsize::new(0),
    });
    sampler.register_middleware(middleware.clone());

    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(20));
    sampler.stop().unwrap();

    assert_eq!(middleware.starts.load(Ordering::SeqCst), 1);
    assert_eq!(middleware.stops.load(Ordering::SeqCst), 1);
    assert!(sampler.dumps().starts_with("# simvm profile\n"));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rewritten.folded");
    sampler.save(&path).unwrap();
    assert!(std::fs::read_to_string(&path)
        .unwrap()
        .starts_with("# simvm profile\n"));
}

#[test]
fn test_adjust_advises_host() {
    let host = SimHost::new();
    let sampler = Sampler::builder(host.clone())
        .interval_us(2_000)
        .build()
        .unwrap();
    assert!(sampler.adjust());
    assert_eq!(host.last_switch_interval(), Some(0.002));
}

#[test]
fn test_regex_patterns_filter_at_runtime() {
    let host = SimHost::new();
    host.set_thread(
        ThreadId(2),
        "Worker",
        chain(&[("app.py", "main", 1, 1), ("db.py", "query", 4, 4)]),
    );

    let sampler = Sampler::builder(host)
        .interval_us(1_000)
        .regex_patterns(vec![regex::Regex::new("query").unwrap()])
        .build()
        .unwrap();
    sampler.start().unwrap();
    std::thread::sleep(Duration::from_millis(30));
    sampler.stop().unwrap();

    for path in parse_folded(&sampler.dumps()).keys() {
        assert_eq!(path, "Worker;db.py:query:4");
    }
}
