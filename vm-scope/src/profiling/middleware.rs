//! Sampler middleware.
//!
//! Observers registered on a sampler. They see lifecycle transitions and
//! get a chance to rewrite the folded dump before it reaches callers (and
//! therefore files written by `save`). All hooks default to no-ops.

/// Hooks into a sampler's lifecycle and output.
pub trait SamplerMiddleware: Send + Sync {
    /// Called after the sampler started successfully.
    fn on_start(&self) {}

    /// Called after the sampler stopped successfully.
    fn on_stop(&self) {}

    /// Rewrite the folded dump. Runs in registration order; each middleware
    /// receives the previous one's output.
    fn process_dump(&self, dump: String) -> String {
        dump
    }
}
