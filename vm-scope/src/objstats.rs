//! Object statistics.
//!
//! One-shot aggregation over a list of live objects the host enumerates:
//! count per type name, and optionally per-type plus total memory. Stable
//! single pass, no sorting, no filtering; presentation is the embedder's
//! problem. The report serializes so embedders can ship it as JSON.

use std::collections::HashMap;

use serde::Serialize;

/// Host-side view of one live object.
pub trait ObjectView {
    /// The object's type name.
    fn type_name(&self) -> &str;

    /// Approximate size in bytes, when the host can measure it. Objects
    /// that cannot report a size are still counted.
    fn size_bytes(&self) -> Option<u64>;
}

/// Aggregated result of one pass over a list of live objects.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObjectStats {
    /// Objects seen per type name.
    pub type_counter: HashMap<String, u64>,
    /// Bytes per type name; `None` when memory accounting was off.
    pub type_memory: Option<HashMap<String, u64>>,
    pub total_objects: u64,
    pub total_memory: u64,
}

/// Aggregate `objects` in a single pass.
pub fn collect_object_stats<O: ObjectView>(objects: &[O], include_memory: bool) -> ObjectStats {
    let mut type_counter: HashMap<String, u64> = HashMap::new();
    let mut type_memory: HashMap<String, u64> = HashMap::new();
    let mut total_memory = 0u64;

    for obj in objects {
        let name = obj.type_name();
        *type_counter.entry(name.to_string()).or_insert(0) += 1;
        if include_memory {
            if let Some(size) = obj.size_bytes() {
                *type_memory.entry(name.to_string()).or_insert(0) += size;
                total_memory += size;
            }
        }
    }

    ObjectStats {
        total_objects: type_counter.values().sum(),
        type_counter,
        type_memory: include_memory.then_some(type_memory),
        total_memory,
    }
}
