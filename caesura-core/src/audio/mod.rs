//! Audio capture via cpal backend.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It **must not**:
//! - Allocate heap memory
//! - Block on a mutex or condvar
//! - Perform I/O
//!
//! The callback therefore only mixes the incoming frame batch down to mono
//! f32 (into a reused scratch buffer) and writes it into the SPSC ring
//! producer, whose `push_slice` is lock-free and allocation-free. Everything
//! else (resampling, quantization, segmentation) happens on the pipeline
//! thread.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on most platforms (COM on Windows, CoreAudio on
//! macOS). `AudioCapture` must be created and dropped on the same thread; the
//! session does this by opening it inside `spawn_blocking`.

pub mod device;
pub mod resample;

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, StreamTrait},
    SampleFormat, SampleRate, Stream, StreamConfig,
};

#[cfg(feature = "audio-cpal")]
use crate::buffering::Producer;
use crate::{
    buffering::CaptureProducer,
    error::{CaesuraError, Result},
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
#[cfg(feature = "audio-cpal")]
use tracing::{error, info, warn};

/// Handle to an active audio capture stream.
///
/// **Not `Send`**: `cpal::Stream` is bound to its creation thread on
/// Windows/macOS. Create and drop this type on the same OS thread.
pub struct AudioCapture {
    /// Kept alive so the stream is not dropped prematurely.
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    /// Shared flag; set to `false` to make the callback a no-op.
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

/// Build an input stream for one concrete sample type, mixing interleaved
/// channels down to mono and pushing into the ring.
///
/// The mix buffer is reused across invocations; after the first few calls the
/// callback performs no allocation.
#[cfg(feature = "audio-cpal")]
fn build_input_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: CaptureProducer,
    running: Arc<AtomicBool>,
    to_f32: fn(T) -> f32,
) -> std::result::Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut mix_buf: Vec<f32> = Vec::new();
    let mut dropped_total: u64 = 0;

    device.build_input_stream(
        config,
        move |data: &[T], _info| {
            if !running.load(Ordering::Relaxed) {
                return;
            }

            let frames = data.len() / channels;
            mix_buf.resize(frames, 0.0);
            if channels == 1 {
                for (dst, sample) in mix_buf.iter_mut().zip(data.iter()) {
                    *dst = to_f32(*sample);
                }
            } else {
                for (frame, dst) in mix_buf.iter_mut().enumerate() {
                    let base = frame * channels;
                    let mut sum = 0f32;
                    for ch in 0..channels {
                        sum += to_f32(data[base + ch]);
                    }
                    *dst = sum / channels as f32;
                }
            }

            let written = producer.push_slice(&mix_buf);
            if written < mix_buf.len() {
                dropped_total += (mix_buf.len() - written) as u64;
                warn!(
                    dropped = mix_buf.len() - written,
                    dropped_total, "ring buffer full, dropping frames"
                );
            }
        },
        |err| error!("audio stream error: {err}"),
        None,
    )
}

impl AudioCapture {
    /// Open an input device by preferred name, otherwise fall back to the
    /// default input device and then the first available device.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        producer: CaptureProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        use cpal::traits::HostTrait;

        let host = cpal::default_host();
        let mut selected_device = None;

        if let Some(preferred_name) = preferred_device_name {
            match host.input_devices() {
                Ok(mut devices) => {
                    selected_device = devices.find(|device| {
                        device
                            .name()
                            .map(|name| name == preferred_name)
                            .unwrap_or(false)
                    });

                    if selected_device.is_none() {
                        warn!(
                            "preferred input device '{}' not found, falling back",
                            preferred_name
                        );
                    }
                }
                Err(e) => {
                    warn!("failed to list input devices while resolving preference: {e}");
                }
            }
        }

        let device = if let Some(device) = selected_device {
            device
        } else if let Some(default) = host.default_input_device() {
            default
        } else {
            let mut devices = host
                .input_devices()
                .map_err(|e| CaesuraError::AudioDevice(e.to_string()))?;
            let fallback = devices.next().ok_or(CaesuraError::NoDefaultInputDevice)?;
            warn!("no default input device, falling back to first available input");
            fallback
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening input device"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| CaesuraError::AudioDevice(e.to_string()))?;

        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels();

        info!(sample_rate, channels, "audio config selected");

        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => {
                build_input_stream::<f32>(&device, &config, producer, Arc::clone(&running), |s| s)
            }
            SampleFormat::I16 => {
                build_input_stream::<i16>(&device, &config, producer, Arc::clone(&running), |s| {
                    s as f32 / 32768.0
                })
            }
            SampleFormat::U8 => {
                build_input_stream::<u8>(&device, &config, producer, Arc::clone(&running), |s| {
                    (s as f32 - 128.0) / 128.0
                })
            }
            fmt => {
                return Err(CaesuraError::AudioStream(format!(
                    "unsupported sample format: {fmt:?}"
                )))
            }
        }
        .map_err(|e| CaesuraError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaesuraError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    /// Open the system default microphone.
    ///
    /// Must be called from the thread that will also drop this value; in
    /// practice that means inside `tokio::task::spawn_blocking`.
    ///
    /// # Errors
    /// `CaesuraError::NoDefaultInputDevice` when no microphone is available,
    /// `CaesuraError::AudioStream` if cpal fails to build the stream.
    #[cfg(feature = "audio-cpal")]
    pub fn open_default(producer: CaptureProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }

    /// Stop: signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Stub when the `audio-cpal` feature is disabled.
#[cfg(not(feature = "audio-cpal"))]
impl AudioCapture {
    pub fn open_with_preference(
        _producer: CaptureProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(CaesuraError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    pub fn open_default(producer: CaptureProducer, running: Arc<AtomicBool>) -> Result<Self> {
        Self::open_with_preference(producer, running, None)
    }
}
