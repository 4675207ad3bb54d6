//! Append-only full-recording accumulator.
//!
//! Every captured sample lands here regardless of what the segmenter decides,
//! so the complete take can be archived even when most segments were rejected
//! as silence. Shared between the pipeline thread (append) and the host
//! (save after stop).

use std::path::Path;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{CaesuraError, Result};

/// Peak amplitude below which a saved recording is flagged as near-silent.
const NEAR_SILENT_PEAK: i16 = 100;

pub struct RecordingSink {
    samples: Mutex<Vec<i16>>,
    sample_rate: u32,
}

impl RecordingSink {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Append one batch of quantized samples.
    pub fn append(&self, samples: &[i16]) {
        if samples.is_empty() {
            return;
        }
        self.samples.lock().extend_from_slice(samples);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.len() as u64 * 1000) / self.sample_rate as u64
    }

    /// Drain and return everything accumulated so far.
    pub fn take(&self) -> Vec<i16> {
        std::mem::take(&mut *self.samples.lock())
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }

    /// Write the accumulated recording as 16-bit mono PCM WAV.
    ///
    /// The accumulator is left untouched, so a failed write can be retried.
    ///
    /// # Errors
    /// `CaesuraError::RecordingSave` when there is nothing to save or the
    /// container write fails.
    pub fn save_wav(&self, path: &Path) -> Result<()> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return Err(CaesuraError::RecordingSave(
                "no samples captured".to_string(),
            ));
        }

        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        if peak < NEAR_SILENT_PEAK as u16 {
            warn!(peak, "recording is near-silent, saving anyway");
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| CaesuraError::RecordingSave(e.to_string()))?;
        for &sample in samples.iter() {
            writer
                .write_sample(sample)
                .map_err(|e| CaesuraError::RecordingSave(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaesuraError::RecordingSave(e.to_string()))?;

        info!(
            path = %path.display(),
            samples = samples.len(),
            duration_ms = (samples.len() as u64 * 1000) / self.sample_rate.max(1) as u64,
            "recording saved"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("caesura-sink-{}-{}.wav", std::process::id(), name))
    }

    #[test]
    fn append_accumulates_in_order() {
        let sink = RecordingSink::new(16_000);
        sink.append(&[1, 2, 3]);
        sink.append(&[]);
        sink.append(&[4, 5]);
        assert_eq!(sink.len(), 5);
        assert_eq!(sink.take(), vec![1, 2, 3, 4, 5]);
        assert!(sink.is_empty());
    }

    #[test]
    fn duration_reflects_sample_rate() {
        let sink = RecordingSink::new(16_000);
        sink.append(&vec![0; 8_000]);
        assert_eq!(sink.duration_ms(), 500);
    }

    #[test]
    fn save_on_empty_sink_is_an_error() {
        let sink = RecordingSink::new(16_000);
        assert!(sink.save_wav(&temp_wav("empty")).is_err());
    }

    #[test]
    fn saved_wav_round_trips_exactly() {
        let sink = RecordingSink::new(16_000);
        let samples: Vec<i16> = (0..4_000).map(|i| ((i % 700) * 40) as i16).collect();
        sink.append(&samples);

        let path = temp_wav("roundtrip");
        sink.save_wav(&path).expect("save wav");

        let mut reader = hound::WavReader::open(&path).expect("open wav");
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);

        let read_back: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .expect("read samples");
        assert_eq!(read_back, samples);

        // Saving does not drain the accumulator.
        assert_eq!(sink.len(), samples.len());
        let _ = std::fs::remove_file(&path);
    }
}
