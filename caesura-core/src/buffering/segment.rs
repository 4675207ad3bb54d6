//! Typed audio segment passed from the segmentation engine to the consumer.

/// Root-mean-square energy of a block of i16 samples, in raw amplitude units
/// (0..=32767). The engine's thresholds are expressed in the same units.
///
/// Returns 0.0 for an empty slice.
pub fn rms_i16(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let s = sample as f64;
            s * s
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// A contiguous, chronologically ordered block of mono PCM samples proposed
/// for (or delivered by) emission.
///
/// `start_offset` is the absolute position of the first sample in the capture
/// stream, counted from recording start. Together with `samples.len()` it
/// gives the segment's exact time range.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Mono signed 16-bit samples.
    pub samples: Vec<i16>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Absolute offset of `samples[0]` in the capture stream, in samples.
    pub start_offset: u64,
}

impl AudioSegment {
    pub fn new(samples: Vec<i16>, sample_rate: u32, start_offset: u64) -> Self {
        Self {
            samples,
            sample_rate,
            start_offset,
        }
    }

    /// Number of samples in the segment.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the segment contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds at the segment's sample rate.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Start of the segment relative to recording start, in milliseconds.
    pub fn start_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.start_offset * 1000) / self.sample_rate as u64
    }

    /// Average RMS energy of the segment in raw i16 amplitude units.
    pub fn rms(&self) -> f32 {
        rms_i16(&self.samples)
    }
}
