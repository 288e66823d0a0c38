//! Per-frame filter pipeline.
//!
//! Filters are evaluated per frame, not per stack; a stack may contribute
//! any subset of its frames. The order is fixed and deterministic:
//! focus mode, then self-frames, then the regex allowlist, then frozen
//! modules.

use std::sync::Arc;

use regex::Regex;

/// Formatter configuration shared by both samplers and the native tracer.
#[derive(Debug, Clone, Default)]
pub struct LabelConfig {
    /// Key stacks on the currently executing line instead of the function's
    /// first line, so distinct statements become distinct tree nodes.
    pub tree_mode: bool,
    /// Elide standard-library and installed-package frames.
    pub focus_mode: bool,
    /// Elide the profiler's own frames inside the target runtime.
    pub ignore_self: bool,
    /// Elide `<frozen ...>` bootstrap modules.
    pub ignore_frozen: bool,
    /// Cached standard-library directory (focus mode).
    pub stdlib_path: String,
    /// Path fragments that mark the profiler's own frames (ignore_self).
    pub self_markers: Vec<String>,
    /// Allowlist: when non-empty, a frame survives only if its filename or
    /// function name matches at least one pattern.
    pub patterns: Option<Arc<Vec<Regex>>>,
}

impl LabelConfig {
    /// Default markers for frames belonging to this profiler when it is
    /// installed inside the target runtime.
    pub fn default_self_markers() -> Vec<String> {
        vec![
            "/site-packages/vm-scope".to_string(),
            "/bin/vm-scope".to_string(),
        ]
    }

    /// Whether a frame with this filename and function name survives the
    /// filter pipeline.
    pub fn keeps_frame(&self, filename: &str, name: &str) -> bool {
        if self.focus_mode && self.is_stdlib_or_third_party(filename) {
            return false;
        }
        if self.ignore_self
            && self
                .self_markers
                .iter()
                .any(|marker| filename.contains(marker.as_str()))
        {
            return false;
        }
        if !self.matches_patterns(name) && !self.matches_patterns(filename) {
            return false;
        }
        if self.ignore_frozen && filename.starts_with("<frozen") {
            return false;
        }
        true
    }

    fn is_stdlib_or_third_party(&self, filename: &str) -> bool {
        if filename.contains("site-packages/") {
            return true;
        }
        !self.stdlib_path.is_empty() && filename.starts_with(self.stdlib_path.as_str())
    }

    fn matches_patterns(&self, text: &str) -> bool {
        match &self.patterns {
            // No patterns means match everything.
            None => true,
            Some(patterns) if patterns.is_empty() => true,
            Some(patterns) => patterns.iter().any(|p| p.is_match(text)),
        }
    }
}
