//! # caesura-core
//!
//! Reusable real-time audio segmentation SDK.
//!
//! ## Architecture
//!
//! ```text
//! Microphone → AudioCapture → SPSC RingBuffer → Pipeline(spawn_blocking)
//!                                                    │
//!                                       resample → quantize → sink
//!                                                    │
//!                                            SegmentationEngine
//!                                       (cycle → split search → gate)
//!                                                    │
//!                                      bounded segment queue + sentinel
//!                                                    │
//!                                            consumer thread (VAD)
//! ```
//!
//! The audio callback is zero-alloc. All heap work happens in the pipeline
//! thread. Consumers pull [`AudioSegment`]s from the queue until the
//! end-of-stream sentinel, then classify or forward them as they wish.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod error;
pub mod events;
pub mod outbox;
pub mod segmenting;
pub mod session;
pub mod sink;
pub mod vad;

// Convenience re-exports for downstream crates
pub use buffering::segment::AudioSegment;
pub use error::CaesuraError;
pub use events::{ActivityEvent, SegmentInfo, SessionStatus, StatusEvent};
pub use outbox::{SegmentReceiver, SegmentSender};
pub use segmenting::{SegmentationEngine, SegmenterConfig, SegmenterSummary};
pub use session::{RecordingSession, SessionConfig};
pub use sink::RecordingSink;
pub use vad::{is_speech_bearing, EnergyZcrVad, VadDecision, VoiceActivityDetector};
