use thiserror::Error;

/// Errors surfaced by capture controllers and backend adapters.
///
/// Zoom never produces one of these; zoom outcomes are plain `bool`s.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no suitable camera device found")]
    NoSuitableDevice,

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("backend unsupported: {0}")]
    BackendUnsupported(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("start failed: {0}")]
    StartFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("timeout")]
    Timeout,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("unknown error: {0}")]
    Unknown(String),
}

/// Failure of a single entry point on the third-party UVC helper.
///
/// `Unsupported` means the entry point does not exist on the loaded library
/// version; callers treat it the same as a missing method.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HelperError {
    #[error("entry point not available: {0}")]
    Unsupported(&'static str),

    #[error("helper fault: {0}")]
    Fault(String),
}

/// Outcome of marshalling a task onto a thread owned by someone else.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("target thread rejected the task")]
    Rejected,

    #[error("task did not complete in time")]
    Timeout,

    #[error("task panicked on the target thread")]
    Panicked,

    #[error("target thread dropped the task")]
    Disconnected,
}

impl From<DispatchError> for CaptureError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Timeout => CaptureError::Timeout,
            other => CaptureError::Unknown(other.to_string()),
        }
    }
}
