use thiserror::Error;

/// All errors produced by caesura-core.
#[derive(Debug, Error)]
pub enum CaesuraError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("session is already recording")]
    AlreadyRecording,

    #[error("session is not recording")]
    NotRecording,

    #[error("segment channel disconnected: {0}")]
    ChannelDisconnected(String),

    #[error("recording save failed: {0}")]
    RecordingSave(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CaesuraError>;
