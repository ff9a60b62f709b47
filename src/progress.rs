//! Progress-callback trait for per-unit events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`]. A unit is
//! a rendered page during conversion and a text part during summarisation.
//! Events are observational only: nothing the callback does can change the
//! outcome of a run.
//!
//! # Example
//!
//! ```rust
//! use docshift::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ConversionProgressCallback for Counter {
//!     fn on_unit_complete(&self, _unit: usize, _total: usize, _bytes: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each unit.
///
/// All methods default to no-ops. Summarisation runs parts concurrently, so
/// `on_unit_*` may be called from several tasks at once.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first unit, with the number of units.
    fn on_conversion_start(&self, total_units: usize) {
        let _ = total_units;
    }

    /// Called before a unit (1-indexed) is processed.
    fn on_unit_start(&self, unit: usize, total_units: usize) {
        let _ = (unit, total_units);
    }

    /// Called when a unit is produced. `bytes` is the encoded size for
    /// pages and the generated text length for parts.
    fn on_unit_complete(&self, unit: usize, total_units: usize, bytes: usize) {
        let _ = (unit, total_units, bytes);
    }

    /// Called when a unit is skipped or falls back to a placeholder.
    fn on_unit_error(&self, unit: usize, total_units: usize, error: &str) {
        let _ = (unit, total_units, error);
    }

    /// Called once after every unit has been attempted.
    fn on_conversion_complete(&self, total_units: usize, success_count: usize) {
        let _ = (total_units, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Whole-number percentage of `done` out of `total`. An empty run is 100 %.
pub fn percent_complete(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
