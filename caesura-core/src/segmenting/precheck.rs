//! Duration/energy gate applied to candidate segments before delivery.

use crate::buffering::segment::AudioSegment;
use crate::segmenting::SegmenterConfig;

/// Outcome of the precheck. Only `Accept` reaches the output channel; the
/// rejecting variants name the cause for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecheckVerdict {
    Accept,
    TooShort,
    TooQuiet,
}

/// Rejects candidates unlikely to carry useful speech, so near-silence never
/// reaches a recognizer that would hallucinate on it.
///
/// The gate is a pure decision; pushing accepted segments (and discarding
/// rejected ones) is the engine's job.
#[derive(Debug, Clone)]
pub struct PrecheckGate {
    min_samples: usize,
    energy_floor: f32,
}

impl PrecheckGate {
    pub fn new(config: &SegmenterConfig) -> Self {
        Self {
            min_samples: config.min_segment_samples(),
            energy_floor: config.energy_floor,
        }
    }

    /// Classify a candidate. Duration is checked before energy so an empty
    /// or tiny candidate never reaches the RMS computation.
    pub fn check(&self, segment: &AudioSegment) -> PrecheckVerdict {
        if segment.len() < self.min_samples {
            return PrecheckVerdict::TooShort;
        }
        if segment.rms() < self.energy_floor {
            return PrecheckVerdict::TooQuiet;
        }
        PrecheckVerdict::Accept
    }
}
