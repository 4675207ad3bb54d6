//! Energy + zero-crossing-rate VAD.
//!
//! ## Algorithm (per 30 ms frame)
//!
//! 1. Compute the frame RMS; below `threshold` the frame is silence.
//! 2. Compute the zero-crossing rate (sign changes per sample pair).
//! 3. Speech requires the ZCR inside a plausible band: voiced speech sits
//!    around 0.02-0.15 crossings/sample, whispered and fricative sounds
//!    reach about 0.35. Steady hums fall below the band, broadband clicks
//!    and hiss above it, so both are rejected even when loud.

use super::{VadDecision, VoiceActivityDetector};
use crate::buffering::segment::rms_i16;

/// An energy plus zero-crossing-rate voice activity detector. Stateless, so
/// every frame is judged independently.
#[derive(Debug, Clone)]
pub struct EnergyZcrVad {
    /// RMS level (raw i16 units) above which a frame may be speech.
    threshold: f32,
    /// Lower edge of the accepted ZCR band.
    zcr_min: f32,
    /// Upper edge of the accepted ZCR band.
    zcr_max: f32,
}

impl EnergyZcrVad {
    /// Create a new detector.
    ///
    /// # Parameters
    /// - `threshold`: RMS level above which a frame can count as speech.
    ///   Default: `200.0` (slightly above the segmenter's energy floor).
    /// - `zcr_min` / `zcr_max`: accepted zero-crossing band.
    ///   Default: `0.02..=0.35`.
    pub fn new(threshold: f32, zcr_min: f32, zcr_max: f32) -> Self {
        Self {
            threshold,
            zcr_min,
            zcr_max,
        }
    }

    /// Zero-crossing rate: sign changes per adjacent sample pair, in [0, 1].
    fn zcr(samples: &[i16]) -> f32 {
        if samples.len() < 2 {
            return 0.0;
        }
        let mut crossings = 0u32;
        for i in 1..samples.len() {
            if (samples[i] >= 0) != (samples[i - 1] >= 0) {
                crossings += 1;
            }
        }
        crossings as f32 / (samples.len() - 1) as f32
    }
}

impl Default for EnergyZcrVad {
    fn default() -> Self {
        Self::new(200.0, 0.02, 0.35)
    }
}

impl VoiceActivityDetector for EnergyZcrVad {
    fn classify(&mut self, frame: &[i16], _sample_rate: u32) -> VadDecision {
        if rms_i16(frame) < self.threshold {
            return VadDecision::Silence;
        }
        let zcr = Self::zcr(frame);
        if zcr >= self.zcr_min && zcr <= self.zcr_max {
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Square wave of the given amplitude flipping sign every `half_period`
    /// samples; ZCR ≈ 1 / half_period.
    fn square_wave(amplitude: i16, half_period: usize, len: usize) -> Vec<i16> {
        (0..len)
            .map(|i| {
                if (i / half_period) % 2 == 0 {
                    amplitude
                } else {
                    -amplitude
                }
            })
            .collect()
    }

    #[test]
    fn zcr_of_constant_signal_is_zero() {
        assert_relative_eq!(EnergyZcrVad::zcr(&[1000; 480]), 0.0);
    }

    #[test]
    fn zcr_of_alternating_signal_is_one() {
        let frame = square_wave(1000, 1, 480);
        assert_relative_eq!(EnergyZcrVad::zcr(&frame), 1.0);
    }

    #[test]
    fn zcr_matches_half_period() {
        let frame = square_wave(1000, 25, 480);
        let zcr = EnergyZcrVad::zcr(&frame);
        assert_relative_eq!(zcr, 19.0 / 479.0, max_relative = 1e-6);
    }

    #[test]
    fn voiced_like_frame_is_speech() {
        let mut vad = EnergyZcrVad::default();
        // ZCR ~0.04, RMS 3000: inside the band and loud enough.
        let frame = square_wave(3000, 25, 480);
        assert_eq!(vad.classify(&frame, 16_000), VadDecision::Speech);
    }

    #[test]
    fn whispered_band_frame_is_speech() {
        let mut vad = EnergyZcrVad::default();
        // ZCR ~0.2 sits in the fricative part of the band.
        let frame = square_wave(3000, 5, 480);
        assert_eq!(vad.classify(&frame, 16_000), VadDecision::Speech);
    }

    #[test]
    fn silence_is_not_speech() {
        let mut vad = EnergyZcrVad::default();
        assert_eq!(vad.classify(&vec![0; 480], 16_000), VadDecision::Silence);
    }

    #[test]
    fn quiet_voiced_frame_fails_the_energy_check() {
        let mut vad = EnergyZcrVad::default();
        let frame = square_wave(50, 25, 480);
        assert_eq!(vad.classify(&frame, 16_000), VadDecision::Silence);
    }

    #[test]
    fn loud_hum_fails_the_zcr_check() {
        let mut vad = EnergyZcrVad::default();
        // One sign change across the whole frame: ZCR far below the band.
        let frame = square_wave(3000, 240, 480);
        assert_eq!(vad.classify(&frame, 16_000), VadDecision::Silence);
    }

    #[test]
    fn loud_click_noise_fails_the_zcr_check() {
        let mut vad = EnergyZcrVad::default();
        // Sign change on every sample: ZCR 1.0, above the band.
        let frame = square_wave(3000, 1, 480);
        assert_eq!(vad.classify(&frame, 16_000), VadDecision::Silence);
    }

    #[test]
    fn empty_frame_is_silence() {
        let mut vad = EnergyZcrVad::default();
        assert_eq!(vad.classify(&[], 16_000), VadDecision::Silence);
    }
}
