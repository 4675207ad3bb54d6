//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! cpal captures at the device's native rate (commonly 48 kHz). The
//! segmentation engine runs at a fixed 16 kHz, so the pipeline thread
//! bridges the gap here before quantizing to i16. When the rates already
//! match no rubato session is created and `process` is a plain copy.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{CaesuraError, Result};

/// Converts f32 mono audio from one fixed sample rate to another.
pub struct RateConverter {
    /// `None` when capture rate == engine rate (passthrough mode).
    resampler: Option<FastFixedIn<f32>>,
    /// Holds partial input chunks between calls.
    input_buf: Vec<f32>,
    /// Input samples rubato expects per process call.
    chunk_size: usize,
    /// Pre-allocated output buffer: `[1][output_frames_max]`.
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    /// Create a new converter from `capture_rate` to `engine_rate`, fed in
    /// blocks of `chunk_size` input samples.
    ///
    /// # Errors
    /// `CaesuraError::AudioDevice` if rubato fails to initialise.
    pub fn new(capture_rate: u32, engine_rate: u32, chunk_size: usize) -> Result<Self> {
        if capture_rate == engine_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = engine_rate as f64 / capture_rate as f64;

        let resampler = FastFixedIn::<f32>::new(
            ratio,
            1.0, // fixed ratio, no dynamic adjustment
            PolynomialDegree::Cubic,
            chunk_size,
            1, // mono
        )
        .map_err(|e| CaesuraError::AudioDevice(format!("resampler init: {e}")))?;

        let max_out = resampler.output_frames_max();
        let output_buf = vec![vec![0f32; max_out]; 1];

        info!(capture_rate, engine_rate, chunk_size, max_out, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
        })
    }

    /// Process incoming samples, returning resampled output (possibly empty).
    ///
    /// Input accumulates internally until a full `chunk_size` block is
    /// available for rubato; any remainder is kept for the next call. In
    /// passthrough mode the input is returned as-is.
    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return samples.to_vec();
        };

        self.input_buf.extend_from_slice(samples);

        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];

            match resampler.process_into_buffer(&[input_slice], &mut self.output_buf, None) {
                Ok((_consumed, produced)) => {
                    result.extend_from_slice(&self.output_buf[0][..produced]);
                }
                Err(e) => {
                    error!("resampler process error: {e}");
                }
            }

            self.input_buf.drain(..self.chunk_size);
        }

        result
    }

    /// Drain the partial input remainder at stream end by padding it to one
    /// chunk with silence. Returns the trailing resampled samples.
    ///
    /// Without this, up to one chunk of the final utterance (about 20 ms at
    /// the default chunk size) would be silently dropped on stop.
    pub fn flush(&mut self) -> Vec<f32> {
        if self.resampler.is_none() || self.input_buf.is_empty() {
            return Vec::new();
        }
        self.input_buf.resize(self.chunk_size, 0.0);
        self.process(&[])
    }

    /// Returns `true` when capture rate == engine rate (no resampling occurs).
    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }
}
