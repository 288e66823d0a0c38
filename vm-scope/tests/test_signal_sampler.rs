mod common;

use std::sync::Arc;

use common::{chain, parse_folded, SimHost};
use vm_scope::domain::{SamplerError, ThreadId};
use vm_scope::SignalSampler;

#[test]
fn test_tick_folds_main_frame() {
    let host = SimHost::new();
    let sampler = SignalSampler::builder(host).build_signal().unwrap();
    sampler.start().unwrap();

    let main = chain(&[("main.py", "main", 1, 2), ("main.py", "crunch", 9, 12)]);
    for _ in 0..3 {
        sampler.tick(27, Some(main.as_ref()));
    }
    sampler.stop().unwrap();

    assert_eq!(sampler.stats().sampling_times(), 3);
    let folded = parse_folded(&sampler.dumps());
    assert_eq!(folded["MainThread;main.py:main:1;main.py:crunch:9"], 3);
}

#[test]
fn test_tick_samples_registry_threads_and_skips_sampling_tid() {
    let host = SimHost::new();
    host.set_thread(ThreadId(1), "MainThread", chain(&[("main.py", "main", 1, 1)]));
    host.set_thread(ThreadId(2), "Worker-1", chain(&[("job.py", "work", 4, 6)]));

    let sampler = SignalSampler::builder(host).build_signal().unwrap();
    sampler.set_sampling_tid(ThreadId(1));
    sampler.start().unwrap();
    // Explicit tid survives start().
    assert_eq!(sampler.sampling_tid(), Some(ThreadId(1)));

    let main = chain(&[("main.py", "main", 1, 1), ("main.py", "poll", 30, 31)]);
    sampler.tick(27, Some(main.as_ref()));
    sampler.stop().unwrap();

    let folded = parse_folded(&sampler.dumps());
    // The main thread arrives via the tick argument, not the snapshot; its
    // snapshot entry (tid 1) is excluded so it is not double-counted.
    assert_eq!(folded["MainThread;main.py:main:1;main.py:poll:30"], 1);
    assert_eq!(folded["Worker-1;job.py:work:4"], 1);
    assert_eq!(folded.len(), 2);
}

#[test]
fn test_tick_without_start_is_noop() {
    let host = SimHost::new();
    let sampler = SignalSampler::builder(host).build_signal().unwrap();
    let main = chain(&[("main.py", "main", 1, 1)]);
    sampler.tick(27, Some(main.as_ref()));
    assert_eq!(sampler.stats().sampling_times(), 0);
    assert_eq!(sampler.dumps(), "");
}

#[test]
fn test_tick_after_stop_is_noop() {
    let host = SimHost::new();
    let sampler = SignalSampler::builder(host).build_signal().unwrap();
    sampler.start().unwrap();
    sampler.stop().unwrap();

    let main = chain(&[("main.py", "main", 1, 1)]);
    sampler.tick(27, Some(main.as_ref()));
    assert_eq!(sampler.stats().sampling_times(), 0);
    assert_eq!(sampler.dumps(), "");
}

#[test]
fn test_reentrant_tick_is_noop() {
    let host = SimHost::new();
    host.set_thread(ThreadId(2), "Worker", chain(&[("job.py", "work", 1, 1)]));

    let sampler = Arc::new(
        SignalSampler::builder(host.clone())
            .build_signal()
            .unwrap(),
    );
    // Re-enter tick from inside the host's frame snapshot, i.e. while the
    // outer tick still holds the sampling-in-progress guard.
    let reentrant = sampler.clone();
    host.set_snapshot_callback(move || {
        let nested = chain(&[("main.py", "nested", 1, 1)]);
        reentrant.tick(27, Some(nested.as_ref()));
    });

    sampler.start().unwrap();
    let main = chain(&[("main.py", "main", 1, 1)]);
    sampler.tick(27, Some(main.as_ref()));
    sampler.stop().unwrap();

    // Exactly one pass: the nested invocation neither folded nor counted.
    assert_eq!(sampler.stats().sampling_times(), 1);
    let folded = parse_folded(&sampler.dumps());
    assert_eq!(folded["MainThread;main.py:main:1"], 1);
    assert_eq!(folded["Worker;job.py:work:1"], 1);
    assert!(!folded.contains_key("MainThread;main.py:nested:1"));
}

#[test]
fn test_start_stop_transitions() {
    let host = SimHost::new();
    let sampler = SignalSampler::builder(host).build_signal().unwrap();

    assert!(matches!(sampler.stop(), Err(SamplerError::NotRunning)));
    sampler.start().unwrap();
    assert!(matches!(sampler.start(), Err(SamplerError::AlreadyRunning)));
    assert!(sampler.enabled());
    sampler.stop().unwrap();
    assert!(!sampler.enabled());
    assert!(sampler.end_time() >= sampler.start_time());
}

#[test]
fn test_start_defaults_sampling_tid_to_current_thread() {
    let host = SimHost::new();
    let sampler = SignalSampler::builder(host.clone()).build_signal().unwrap();
    assert_eq!(sampler.sampling_tid(), None);
    sampler.start().unwrap();
    assert!(sampler.sampling_tid().is_some());
    sampler.stop().unwrap();
}
