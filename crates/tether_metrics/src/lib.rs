//! Tether Metrics - Counters for registry diagnostics
//!
//! Provides zero-cost abstractions for metrics collection that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use tether_metrics::Counter;
//!
//! let counter = Counter::new();
//! counter.increment("registered", 1);
//! println!("registered: {}", counter.get("registered"));
//! ```
//!
//! In production builds (without `metrics` feature), all instrumentation
//! is compiled out to zero overhead.

#[cfg(feature = "metrics")]
mod counter;

#[cfg(feature = "metrics")]
pub use counter::Counter;

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default)]
pub struct Counter;

#[cfg(not(feature = "metrics"))]
impl Counter {
    pub fn new() -> Self { Self }
    pub fn increment(&self, _name: &'static str, _value: usize) {}
    pub fn set(&self, _name: &'static str, _value: usize) {}
    pub fn get(&self, _name: &str) -> usize { 0 }
    pub fn reset(&self, _name: &'static str) {}
    pub fn reset_all(&self) {}
    pub fn snapshot(&self) -> Vec<(&'static str, usize)> { Vec::new() }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_counter_usable_through_shared_ref() {
        // Same API with and without the metrics feature
        let counter = super::Counter::new();
        counter.increment("registered", 2);
        counter.set("released", 5);
        let _ = counter.get("registered");
        let _ = counter.snapshot();
        counter.reset("released");
        assert_eq!(counter.get("released"), 0);
        counter.reset_all();
        assert_eq!(counter.get("registered"), 0);
    }
}
