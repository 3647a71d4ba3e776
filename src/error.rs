//! Error types for the capture, decode, and programming paths.

use thiserror::Error;

/// Everything that can go wrong in the core pipeline.
///
/// Most of these are recovered internally (a frame fails validity, the
/// decoder resets and keeps scanning); only the handful that need the
/// outer task's attention are returned from public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("capture event dropped (filter or stream full)")]
    CaptureDropped,

    #[error("decoder holds partial state")]
    DecodeIncomplete,

    #[error("frame assembled but failed validity check")]
    FrameInvalid,

    #[error("write verify failed: readback did not match written tag")]
    WriteVerifyFailed,

    #[error("profile record malformed: {0}")]
    ProfileParseError(String),

    #[error("event stream stopped")]
    StreamStopped,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
