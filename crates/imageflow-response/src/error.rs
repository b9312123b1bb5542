//! Error types for the response view

use thiserror::Error;

use crate::runtime::RegionId;

/// Result type for view operations
pub type Result<T> = std::result::Result<T, ViewError>;

/// Errors that can occur while binding or reading a response view
#[derive(Debug, Error)]
pub enum ViewError {
    /// The native call reported `success = false`
    #[error("native call failed: {}", .message.as_deref().unwrap_or("no message"))]
    NativeFailure { message: Option<String> },

    /// Read through a released, untracked or invalidated region
    #[error("memory access fault on region {region}: {reason}")]
    MemoryAccessFault { region: RegionId, reason: &'static str },

    /// Region is smaller than the response layout
    #[error("region {region} is {len} bytes, layout requires {required}")]
    RegionTooSmall {
        region: RegionId,
        len: usize,
        required: usize,
    },

    /// The runtime was shut down before the region could be tracked
    #[error("runtime '{0}' has been shut down")]
    RuntimeShutdown(String),

    /// The runtime could not allocate a block of the requested size
    #[error("cannot allocate a {len} byte region")]
    AllocationFailed { len: usize },

    /// Attempted to track a null pointer
    #[error("cannot track a null region")]
    NullRegion,

    /// The data field is not valid UTF-8
    #[error("data is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    /// No terminator found within the configured limit
    #[error("data exceeds {limit} bytes without a terminator")]
    DataTooLarge { limit: usize },

    /// Invalid runtime configuration
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// JSON deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ViewError {
    /// Whether the error is a fault that must end the current call.
    ///
    /// Faults are not retryable: the memory behind the view is gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ViewError::MemoryAccessFault { .. })
    }
}
