//! Host-facing event types broadcast by a recording session.
//!
//! Hosts subscribe via [`crate::session::RecordingSession`]; the serde
//! derives keep the payloads IPC-friendly (camelCase fields, lowercase
//! status tags) for GUI shells that forward them as JSON.

use serde::{Deserialize, Serialize};

use crate::buffering::segment::AudioSegment;

/// Emitted when the session state changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub status: SessionStatus,
    /// Optional human-readable detail (e.g. error message).
    pub detail: Option<String>,
}

/// Current state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created but `start()` not yet called.
    Idle,
    /// Actively capturing and segmenting audio.
    Recording,
    /// Capture stopped; the session may be restarted.
    Stopped,
    /// Device or pipeline failure; see the event detail.
    Error,
}

/// Emitted for each drained audio chunk: a live level meter feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// RMS level of the chunk in raw i16 amplitude units.
    pub rms: f32,
    /// Whether the chunk clears the segmenter's energy floor.
    pub above_floor: bool,
}

/// Metadata describing one delivered segment, for logging and host display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentInfo {
    /// Position of the segment in delivery order, starting at 0.
    pub seq: u64,
    /// Start of the segment relative to recording start, in milliseconds.
    pub start_ms: u64,
    /// Segment length in milliseconds.
    pub duration_ms: u64,
    /// Average RMS in raw i16 amplitude units.
    pub rms: f32,
    /// Majority-vote verdict of the consumer-side speech gate.
    pub speech_bearing: bool,
}

impl SegmentInfo {
    pub fn describe(seq: u64, segment: &AudioSegment, speech_bearing: bool) -> Self {
        Self {
            seq,
            start_ms: segment.start_ms(),
            duration_ms: segment.duration_ms(),
            rms: segment.rms(),
            speech_bearing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_event_serializes_with_lowercase_status() {
        let event = StatusEvent {
            status: SessionStatus::Recording,
            detail: None,
        };

        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["status"], "recording");
        assert_eq!(json["detail"], serde_json::Value::Null);

        let round_trip: StatusEvent =
            serde_json::from_value(json).expect("deserialize status event");
        assert_eq!(round_trip.status, SessionStatus::Recording);
        assert!(round_trip.detail.is_none());
    }

    #[test]
    fn session_status_rejects_non_lowercase_values() {
        let invalid = r#""Recording""#;
        let err = serde_json::from_str::<SessionStatus>(invalid);
        assert!(err.is_err(), "expected invalid casing to fail");
    }

    #[test]
    fn activity_event_serializes_with_camel_case_fields() {
        let event = ActivityEvent {
            seq: 12,
            rms: 412.5,
            above_floor: true,
        };

        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["seq"], 12);
        let rms = json["rms"].as_f64().expect("rms should serialize as number");
        assert!((rms - 412.5).abs() < 1e-3);
        assert_eq!(json["aboveFloor"], true);
    }

    #[test]
    fn segment_info_describe_copies_segment_metadata() {
        let segment = AudioSegment::new(vec![5000; 16_000], 16_000, 32_000);
        let info = SegmentInfo::describe(4, &segment, true);

        assert_eq!(info.seq, 4);
        assert_eq!(info.start_ms, 2_000);
        assert_eq!(info.duration_ms, 1_000);
        assert!(info.speech_bearing);

        let json = serde_json::to_value(&info).expect("serialize segment info");
        assert_eq!(json["startMs"], 2_000);
        assert_eq!(json["durationMs"], 1_000);
        assert_eq!(json["speechBearing"], true);
    }
}
