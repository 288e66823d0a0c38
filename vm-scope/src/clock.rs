//! High-precision monotonic time utilities.
//!
//! Three nanosecond clocks: monotonic wall, per-thread CPU, per-process CPU,
//! with microsecond and millisecond variants derived by division. All clocks
//! are non-decreasing across consecutive calls on one thread and never fail;
//! a failed read returns 0.
//!
//! Fallbacks: where per-thread CPU time is unavailable the process CPU clock
//! is substituted, and where no high-resolution monotonic source exists the
//! wall clock stands in for both CPU clocks.

#[cfg(unix)]
fn clock_ns(clock: libc::clockid_t) -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec; clock_gettime only writes it.
    let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
    if rc != 0 {
        return 0;
    }
    (ts.tv_sec as u64).wrapping_mul(1_000_000_000) + ts.tv_nsec as u64
}

/// Monotonic wall clock time in nanoseconds.
///
/// Not affected by system clock adjustments; the starting point is
/// unspecified.
pub fn monotonic_ns() -> u64 {
    #[cfg(unix)]
    {
        clock_ns(libc::CLOCK_MONOTONIC)
    }
    #[cfg(not(unix))]
    {
        fallback::monotonic_ns()
    }
}

/// CPU time consumed by the current thread, in nanoseconds.
pub fn thread_cpu_ns() -> u64 {
    #[cfg(unix)]
    {
        let ns = clock_ns(libc::CLOCK_THREAD_CPUTIME_ID);
        if ns != 0 {
            ns
        } else {
            clock_ns(libc::CLOCK_PROCESS_CPUTIME_ID)
        }
    }
    #[cfg(not(unix))]
    {
        fallback::monotonic_ns()
    }
}

/// CPU time consumed by all threads of the current process, in nanoseconds.
pub fn process_cpu_ns() -> u64 {
    #[cfg(unix)]
    {
        clock_ns(libc::CLOCK_PROCESS_CPUTIME_ID)
    }
    #[cfg(not(unix))]
    {
        fallback::monotonic_ns()
    }
}

/// Monotonic wall clock time in microseconds.
pub fn monotonic_us() -> u64 {
    monotonic_ns() / 1_000
}

/// Monotonic wall clock time in milliseconds.
pub fn monotonic_ms() -> u64 {
    monotonic_ns() / 1_000_000
}

/// Per-thread CPU time in microseconds.
pub fn thread_cpu_us() -> u64 {
    thread_cpu_ns() / 1_000
}

/// Per-process CPU time in microseconds.
pub fn process_cpu_us() -> u64 {
    process_cpu_ns() / 1_000
}

#[cfg(not(unix))]
mod fallback {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    pub fn monotonic_ns() -> u64 {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_nanos() as u64
    }
}
