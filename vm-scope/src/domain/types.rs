//! Identifier newtypes and small enums shared across the profiler.

use std::fmt;
use std::str::FromStr;

use crate::domain::errors::SamplerError;

/// Interpreter thread identifier.
///
/// This is the id the host runtime uses to key its "current frames of all
/// threads" snapshot. It is distinct from any OS-level thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

impl From<u64> for ThreadId {
    fn from(id: u64) -> Self {
        ThreadId(id)
    }
}

/// Timer source used to measure sample durations and sampler lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    /// Per-thread CPU time.
    #[default]
    Cpu,
    /// Monotonic wall clock.
    Wall,
}

impl TimeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeMode::Cpu => "cpu",
            TimeMode::Wall => "wall",
        }
    }
}

impl FromStr for TimeMode {
    type Err = SamplerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(TimeMode::Cpu),
            "wall" => Ok(TimeMode::Wall),
            other => Err(SamplerError::InvalidTimeMode(other.to_string())),
        }
    }
}

impl fmt::Display for TimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
