//! Sampler construction.
//!
//! One builder serves both variants; `build` produces the worker-thread
//! [`Sampler`], `build_signal` the tick-driven [`SignalSampler`]. The
//! standard-library path is looked up from the host exactly once, here.

use std::sync::Arc;

use regex::Regex;

use crate::domain::{SamplerError, TimeMode};
use crate::host::HostRuntime;
use crate::labeling::LabelConfig;

use super::core::SamplerCore;
use super::sampler::Sampler;
use super::settings::{Settings, DEFAULT_INTERVAL_US, DEFAULT_NATIVE_DISCOUNT, MIN_INTERVAL_US};
use super::signal_sampler::SignalSampler;

pub struct SamplerBuilder {
    host: Arc<dyn HostRuntime>,
    interval_us: u64,
    debug: bool,
    ignore_frozen: bool,
    ignore_self: bool,
    tree_mode: bool,
    focus_mode: bool,
    trace_native: bool,
    time_mode: TimeMode,
    patterns: Option<Vec<Regex>>,
    self_markers: Vec<String>,
    native_discount: f64,
}

impl SamplerBuilder {
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        SamplerBuilder {
            host,
            interval_us: DEFAULT_INTERVAL_US,
            debug: false,
            ignore_frozen: false,
            ignore_self: true,
            tree_mode: false,
            focus_mode: false,
            trace_native: false,
            time_mode: TimeMode::Cpu,
            patterns: None,
            self_markers: LabelConfig::default_self_markers(),
            native_discount: DEFAULT_NATIVE_DISCOUNT,
        }
    }

    /// Sampling interval in microseconds. Values below 5 µs are clamped
    /// unless debug mode is on.
    pub fn interval_us(mut self, us: u64) -> Self {
        self.interval_us = us;
        self
    }

    pub fn debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn ignore_frozen(mut self, on: bool) -> Self {
        self.ignore_frozen = on;
        self
    }

    pub fn ignore_self(mut self, on: bool) -> Self {
        self.ignore_self = on;
        self
    }

    pub fn tree_mode(mut self, on: bool) -> Self {
        self.tree_mode = on;
        self
    }

    pub fn focus_mode(mut self, on: bool) -> Self {
        self.focus_mode = on;
        self
    }

    pub fn trace_native(mut self, on: bool) -> Self {
        self.trace_native = on;
        self
    }

    pub fn time_mode(mut self, mode: TimeMode) -> Self {
        self.time_mode = mode;
        self
    }

    /// Allowlist patterns; frames matching none of them are elided.
    pub fn regex_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Path fragments identifying the profiler's own frames.
    pub fn self_markers(mut self, markers: Vec<String>) -> Self {
        self.self_markers = markers;
        self
    }

    /// Discount applied to native-call durations; must be in (0, 1).
    pub fn native_discount(mut self, discount: f64) -> Self {
        self.native_discount = discount;
        self
    }

    fn into_core(self) -> Result<SamplerCore, SamplerError> {
        let mut interval = self.interval_us;
        if !self.debug && interval < MIN_INTERVAL_US {
            interval = MIN_INTERVAL_US;
        }
        let settings = Settings::new(self.host.stdlib_path(), self.self_markers);
        settings.set_interval_us(interval);
        settings.set_debug(self.debug);
        settings.set_ignore_frozen(self.ignore_frozen);
        settings.set_ignore_self(self.ignore_self);
        settings.set_tree_mode(self.tree_mode);
        settings.set_focus_mode(self.focus_mode);
        settings.set_trace_native(self.trace_native);
        settings.set_time_mode(self.time_mode);
        settings.set_regex_patterns(self.patterns);
        settings.set_native_discount(self.native_discount)?;
        Ok(SamplerCore::new(self.host, Arc::new(settings)))
    }

    pub fn build(self) -> Result<Sampler, SamplerError> {
        Ok(Sampler::from_core(self.into_core()?))
    }

    pub fn build_signal(self) -> Result<SignalSampler, SamplerError> {
        Ok(SignalSampler::from_core(self.into_core()?))
    }
}
