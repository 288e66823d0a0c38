//! Shared sampler settings and counters.
//!
//! Configuration is a single atomic flag word plus a handful of scalar
//! atomics, so the sampling thread, the signal tick and property setters on
//! other threads never contend on a lock for the hot flags. The regex
//! allowlist is the one exception; it sits behind a mutex and the signal
//! path only touches it at `start()`.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use regex::Regex;

use crate::clock;
use crate::domain::{SamplerError, TimeMode};
use crate::labeling::LabelConfig;

const ENABLED: u32 = 1 << 0;
/// A tick is currently folding samples (reentrancy guard, async path only).
const SAMPLING: u32 = 1 << 1;
const DEBUG: u32 = 1 << 2;
const IGNORE_FROZEN: u32 = 1 << 3;
const IGNORE_SELF: u32 = 1 << 4;
const TREE_MODE: u32 = 1 << 5;
const FOCUS_MODE: u32 = 1 << 6;
const TRACE_NATIVE: u32 = 1 << 7;

/// Default sampling interval: 10 ms.
pub const DEFAULT_INTERVAL_US: u64 = 10_000;

/// Smallest interval accepted outside debug mode.
pub const MIN_INTERVAL_US: u64 = 5;

/// Default discount applied to native-call durations to offset tracer
/// overhead.
pub const DEFAULT_NATIVE_DISCOUNT: f64 = 0.8;

/// Atomic sampler configuration, shared between the owning sampler handle,
/// its worker or tick path, and the native-call tracer.
#[derive(Debug)]
pub struct Settings {
    flags: AtomicU32,
    interval_us: AtomicU64,
    time_mode: AtomicU8,
    native_discount_bits: AtomicU64,
    patterns: Mutex<Option<Arc<Vec<Regex>>>>,
    stdlib_path: String,
    self_markers: Vec<String>,
}

impl Settings {
    pub(crate) fn new(stdlib_path: String, self_markers: Vec<String>) -> Self {
        Settings {
            flags: AtomicU32::new(0),
            interval_us: AtomicU64::new(DEFAULT_INTERVAL_US),
            time_mode: AtomicU8::new(TimeMode::Cpu as u8),
            native_discount_bits: AtomicU64::new(DEFAULT_NATIVE_DISCOUNT.to_bits()),
            patterns: Mutex::new(None),
            stdlib_path,
            self_markers,
        }
    }

    fn flag(&self, bit: u32) -> bool {
        self.flags.load(Ordering::Acquire) & bit != 0
    }

    fn set_flag(&self, bit: u32, on: bool) {
        if on {
            self.flags.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.flags.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    // --- lifecycle -------------------------------------------------------

    pub fn enabled(&self) -> bool {
        self.flag(ENABLED)
    }

    /// Transition disabled -> enabled. False if already enabled.
    pub(crate) fn try_enable(&self) -> bool {
        self.flags.fetch_or(ENABLED, Ordering::AcqRel) & ENABLED == 0
    }

    /// Transition enabled -> disabled. False if not enabled.
    pub(crate) fn disable(&self) -> bool {
        self.flags.fetch_and(!ENABLED, Ordering::AcqRel) & ENABLED != 0
    }

    /// True while a signal tick is folding samples.
    pub fn sampling_in_progress(&self) -> bool {
        self.flag(SAMPLING)
    }

    /// Claim the tick reentrancy guard. False if a tick is already running.
    pub(crate) fn begin_sampling(&self) -> bool {
        self.flags.fetch_or(SAMPLING, Ordering::AcqRel) & SAMPLING == 0
    }

    pub(crate) fn end_sampling(&self) {
        self.flags.fetch_and(!SAMPLING, Ordering::AcqRel);
    }

    // --- boolean properties ----------------------------------------------

    pub fn debug(&self) -> bool {
        self.flag(DEBUG)
    }

    pub fn set_debug(&self, on: bool) {
        self.set_flag(DEBUG, on);
    }

    pub fn ignore_frozen(&self) -> bool {
        self.flag(IGNORE_FROZEN)
    }

    pub fn set_ignore_frozen(&self, on: bool) {
        self.set_flag(IGNORE_FROZEN, on);
    }

    pub fn ignore_self(&self) -> bool {
        self.flag(IGNORE_SELF)
    }

    pub fn set_ignore_self(&self, on: bool) {
        self.set_flag(IGNORE_SELF, on);
    }

    pub fn tree_mode(&self) -> bool {
        self.flag(TREE_MODE)
    }

    pub fn set_tree_mode(&self, on: bool) {
        self.set_flag(TREE_MODE, on);
    }

    pub fn focus_mode(&self) -> bool {
        self.flag(FOCUS_MODE)
    }

    pub fn set_focus_mode(&self, on: bool) {
        self.set_flag(FOCUS_MODE, on);
    }

    pub fn trace_native(&self) -> bool {
        self.flag(TRACE_NATIVE)
    }

    pub fn set_trace_native(&self, on: bool) {
        self.set_flag(TRACE_NATIVE, on);
    }

    // --- scalar properties -----------------------------------------------

    pub fn interval_us(&self) -> u64 {
        self.interval_us.load(Ordering::Acquire)
    }

    /// The interval may be changed while sampling; the worker picks it up on
    /// its next iteration.
    pub fn set_interval_us(&self, us: u64) {
        self.interval_us.store(us, Ordering::Release);
    }

    pub fn time_mode(&self) -> TimeMode {
        match self.time_mode.load(Ordering::Acquire) {
            x if x == TimeMode::Wall as u8 => TimeMode::Wall,
            _ => TimeMode::Cpu,
        }
    }

    pub fn set_time_mode(&self, mode: TimeMode) {
        self.time_mode.store(mode as u8, Ordering::Release);
    }

    pub fn native_discount(&self) -> f64 {
        f64::from_bits(self.native_discount_bits.load(Ordering::Acquire))
    }

    /// The discount must stay strictly below 1 so traced native calls can
    /// never out-weigh the samples they displace.
    pub fn set_native_discount(&self, discount: f64) -> Result<(), SamplerError> {
        if !(discount > 0.0 && discount < 1.0) {
            return Err(SamplerError::InvalidDiscount(discount));
        }
        self.native_discount_bits
            .store(discount.to_bits(), Ordering::Release);
        Ok(())
    }

    pub fn regex_patterns(&self) -> Option<Arc<Vec<Regex>>> {
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_regex_patterns(&self, patterns: Option<Vec<Regex>>) {
        *self
            .patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = patterns.map(Arc::new);
    }

    pub fn stdlib_path(&self) -> &str {
        &self.stdlib_path
    }

    // --- derived views ---------------------------------------------------

    /// Current time in microseconds on the configured timer source.
    pub fn now_us(&self) -> u64 {
        match self.time_mode() {
            TimeMode::Cpu => clock::thread_cpu_us(),
            TimeMode::Wall => clock::monotonic_us(),
        }
    }

    /// Full formatter configuration snapshot. Allocates; not for the tick
    /// path.
    pub(crate) fn label_config(&self) -> LabelConfig {
        LabelConfig {
            tree_mode: self.tree_mode(),
            focus_mode: self.focus_mode(),
            ignore_self: self.ignore_self(),
            ignore_frozen: self.ignore_frozen(),
            stdlib_path: self.stdlib_path.clone(),
            self_markers: self.self_markers.clone(),
            patterns: self.regex_patterns(),
        }
    }

    /// Refresh just the flag-backed fields of an existing config. Lock-free
    /// and allocation-free, safe inside the signal tick.
    pub(crate) fn refresh_label_flags(&self, cfg: &mut LabelConfig) {
        let flags = self.flags.load(Ordering::Acquire);
        cfg.tree_mode = flags & TREE_MODE != 0;
        cfg.focus_mode = flags & FOCUS_MODE != 0;
        cfg.ignore_self = flags & IGNORE_SELF != 0;
        cfg.ignore_frozen = flags & IGNORE_FROZEN != 0;
    }
}

/// Sampler counters, all in the configured time source's microseconds.
#[derive(Debug, Default)]
pub struct SamplerStats {
    pub(crate) sampling_times: AtomicU64,
    pub(crate) acc_sampling_time: AtomicU64,
    pub(crate) life_time: AtomicU64,
    pub(crate) start: AtomicU64,
    pub(crate) end: AtomicU64,
}

impl SamplerStats {
    /// Number of completed sampling iterations.
    pub fn sampling_times(&self) -> u64 {
        self.sampling_times.load(Ordering::Acquire)
    }

    /// Total microseconds spent inside sample acquisition.
    pub fn acc_sampling_time(&self) -> u64 {
        self.acc_sampling_time.load(Ordering::Acquire)
    }

    /// Microseconds between start and stop, 0 while running.
    pub fn life_time(&self) -> u64 {
        self.life_time.load(Ordering::Acquire)
    }

    pub fn start_time(&self) -> u64 {
        self.start.load(Ordering::Acquire)
    }

    pub fn end_time(&self) -> u64 {
        self.end.load(Ordering::Acquire)
    }

    /// Fraction of the sampler's lifetime spent acquiring samples.
    pub fn sampling_time_rate(&self) -> f64 {
        let life = self.life_time();
        if life == 0 {
            return 0.0;
        }
        self.acc_sampling_time() as f64 / life as f64
    }

    pub(crate) fn reset_sampling(&self) {
        self.sampling_times.store(0, Ordering::Release);
        self.acc_sampling_time.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::new("/usr/lib/runtime".to_string(), Vec::new())
    }

    #[test]
    fn test_enable_disable_transitions() {
        let s = settings();
        assert!(!s.enabled());
        assert!(s.try_enable());
        assert!(!s.try_enable());
        assert!(s.enabled());
        assert!(s.disable());
        assert!(!s.disable());
    }

    #[test]
    fn test_each_flag_has_its_own_getter() {
        let s = settings();
        s.set_ignore_frozen(true);
        assert!(s.ignore_frozen());
        assert!(!s.debug());
        assert!(!s.ignore_self());
        s.set_debug(true);
        s.set_ignore_frozen(false);
        assert!(s.debug());
        assert!(!s.ignore_frozen());
    }

    #[test]
    fn test_sampling_guard() {
        let s = settings();
        assert!(s.begin_sampling());
        assert!(!s.begin_sampling());
        s.end_sampling();
        assert!(s.begin_sampling());
    }

    #[test]
    fn test_discount_validation() {
        let s = settings();
        assert!(s.set_native_discount(0.5).is_ok());
        assert_eq!(s.native_discount(), 0.5);
        assert!(matches!(
            s.set_native_discount(1.0),
            Err(SamplerError::InvalidDiscount(_))
        ));
        assert!(matches!(
            s.set_native_discount(0.0),
            Err(SamplerError::InvalidDiscount(_))
        ));
        assert_eq!(s.native_discount(), 0.5);
    }

    #[test]
    fn test_sampling_time_rate() {
        let stats = SamplerStats::default();
        assert_eq!(stats.sampling_time_rate(), 0.0);
        stats.acc_sampling_time.store(25, Ordering::Release);
        stats.life_time.store(100, Ordering::Release);
        assert!((stats.sampling_time_rate() - 0.25).abs() < f64::EPSILON);
    }
}
