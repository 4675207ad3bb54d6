//! Cycle-based speech segmentation.
//!
//! ## Per-cycle algorithm
//!
//! ```text
//! 1. Accumulate frames until one cycle_ms worth of samples is buffered
//! 2. Compute the cycle's average RMS
//! 3. effective_threshold = max(energy_floor, cycle_rms * split_ratio)
//! 4. Scan the trailing search_margin_ms backward in search_step_ms windows;
//!    the first window below the threshold marks the split point
//! 5. Split found  → emit carry + cycle[..p] through the precheck gate,
//!                   keep cycle[p..] as the new carry
//! 6. No split     → append the whole cycle to the carry; force a cut when
//!                   the carry reaches max_segment_ms
//! ```
//!
//! A fixed-size chunker bisects words at arbitrary boundaries; a pure
//! silence-triggered chunker buffers without bound through continuous
//! speech. The hybrid bounds latency to one cycle while preferring a
//! natural pause when one exists near the boundary.

pub mod engine;
pub mod precheck;
pub mod splitter;

pub use engine::{SegmentationEngine, SegmenterDiagnostics, SegmenterSummary};
pub use precheck::{PrecheckGate, PrecheckVerdict};

/// Configuration for the segmentation engine.
///
/// Durations are in milliseconds and converted to sample counts at
/// `sample_rate`; conversions clamp to at least one sample so a degenerate
/// configuration cannot stall the cycle loop.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Samples accumulated before a split search is attempted. Default: 3000 ms.
    pub cycle_ms: u64,
    /// Absolute minimum RMS (raw i16 units) below which audio counts as
    /// silence regardless of local dynamics. Default: 100.0.
    pub energy_floor: f32,
    /// Fraction of a cycle's average RMS used as the relative silence
    /// threshold, in [0, 1]. Default: 0.6.
    pub split_ratio: f32,
    /// Minimum duration for a segment to be forwarded. Default: 300 ms.
    pub min_segment_ms: u64,
    /// How far back from the cycle end the split search may look. Default: 500 ms.
    pub search_margin_ms: u64,
    /// Granularity of the backward energy scan. Default: 20 ms.
    pub search_step_ms: u64,
    /// Carry-over cap: a cut is forced when unresolved audio reaches this
    /// span. Default: 30 000 ms.
    pub max_segment_ms: u64,
    /// Engine sample rate in Hz. Default: 16000.
    pub sample_rate: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 3_000,
            energy_floor: 100.0,
            split_ratio: 0.6,
            min_segment_ms: 300,
            search_margin_ms: 500,
            search_step_ms: 20,
            max_segment_ms: 30_000,
            sample_rate: 16_000,
        }
    }
}

impl SegmenterConfig {
    fn ms_to_samples(&self, ms: u64) -> usize {
        ((ms * self.sample_rate as u64) / 1000).max(1) as usize
    }

    /// One processing cycle, in samples.
    pub fn cycle_samples(&self) -> usize {
        self.ms_to_samples(self.cycle_ms)
    }

    /// Minimum emit length, in samples.
    pub fn min_segment_samples(&self) -> usize {
        self.ms_to_samples(self.min_segment_ms)
    }

    /// Backward search region, in samples.
    pub fn search_margin_samples(&self) -> usize {
        self.ms_to_samples(self.search_margin_ms)
    }

    /// Scan window size, in samples.
    pub fn search_step_samples(&self) -> usize {
        self.ms_to_samples(self.search_step_ms)
    }

    /// Forced-cut threshold for the carry-over, in samples.
    pub fn max_segment_samples(&self) -> usize {
        self.ms_to_samples(self.max_segment_ms)
    }
}
