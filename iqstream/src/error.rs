use mirrorbuf::MirrorBufError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IqStreamError {
    #[error("ring buffer error: {0}")]
    Buffer(#[from] MirrorBufError),
    #[error("unsupported stream format '{0}'")]
    UnsupportedFormat(String),
    #[error("output buffer too small: need {needed} bytes, got {got}")]
    OutputTooSmall { needed: usize, got: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("stream read timed out")]
    Timeout,
    #[error("stream already active")]
    AlreadyActive,
    #[error("stream not active")]
    NotActive,
    #[error("producer handle lost after a failed activation")]
    ProducerLost,
    #[error("source thread panicked")]
    SourcePanicked,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IqStreamError>;
