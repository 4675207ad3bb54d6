//! Voice activity detection for delivered segments (consumer side).
//!
//! The `VoiceActivityDetector` trait is the extensibility point: the default
//! [`energy::EnergyZcrVad`] can be swapped for a neural detector without
//! touching the consumer. On top of the per-frame trait sits the majority
//! vote: a segment counts as speech-bearing only when more than half of its
//! 30 ms frames classify as speech.

pub mod energy;

pub use energy::EnergyZcrVad;

use crate::buffering::segment::AudioSegment;

/// Analysis frame length used for the majority vote.
pub const FRAME_MS: u64 = 30;

/// Whether a given audio frame contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Trait for all VAD implementations.
///
/// Implementors may be stateful; `reset` is called before each segment scan
/// so state never bleeds across segments.
pub trait VoiceActivityDetector: Send + 'static {
    /// Classify one analysis frame of mono i16 samples.
    fn classify(&mut self, frame: &[i16], sample_rate: u32) -> VadDecision;

    /// Reset any internal state.
    fn reset(&mut self);
}

/// Fraction of a segment's full 30 ms frames classified as speech.
///
/// Only full frames are judged; a trailing partial frame is ignored. Returns
/// 0.0 when the segment holds less than one full frame.
pub fn speech_frame_ratio(vad: &mut dyn VoiceActivityDetector, segment: &AudioSegment) -> f32 {
    let frame_len = ((segment.sample_rate as u64 * FRAME_MS) / 1000).max(1) as usize;
    let frames = segment.samples.chunks_exact(frame_len);
    let total = frames.len();
    if total == 0 {
        return 0.0;
    }

    vad.reset();
    let speech = frames
        .filter(|frame| vad.classify(frame, segment.sample_rate).is_speech())
        .count();
    speech as f32 / total as f32
}

/// Majority vote over 30 ms frames: strictly more than half must be speech.
pub fn is_speech_bearing(vad: &mut dyn VoiceActivityDetector, segment: &AudioSegment) -> bool {
    speech_frame_ratio(vad, segment) > 0.5
}
