//! Thread-directory helpers.
//!
//! Maps interpreter thread ids to the human names the runtime registered
//! for them. Two collection strategies with the same shape:
//!
//! - [`ThreadDirectory::enumerate`] uses the host's public enumeration. It
//!   may allocate and take interpreter-level locks; the synchronous sampler
//!   uses it off the hot path.
//! - [`ThreadDirectory::from_registry`] reads the active and limbo registry
//!   maps directly, without running user-level code, for the signal-driven
//!   sampler.
//!
//! Lookup is a linear scan; thread counts are small and the directory is
//! rebuilt every sampling iteration anyway.

use crate::domain::ThreadId;
use crate::host::{HostRuntime, ThreadInfo};

#[derive(Debug)]
pub struct ThreadDirectory {
    entries: Vec<ThreadInfo>,
}

impl ThreadDirectory {
    /// Synchronous collection via the host's public enumeration.
    pub fn enumerate(host: &dyn HostRuntime) -> Self {
        ThreadDirectory {
            entries: host.enumerate_threads(),
        }
    }

    /// Signal-safe collection from the registry's active + limbo maps.
    pub fn from_registry(host: &dyn HostRuntime) -> Self {
        ThreadDirectory {
            entries: host.registry_threads(),
        }
    }

    /// Human name registered for `tid`, if the thread is known.
    pub fn name_of(&self, tid: ThreadId) -> Option<&str> {
        self.entries
            .iter()
            .find(|t| t.id == tid)
            .map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
