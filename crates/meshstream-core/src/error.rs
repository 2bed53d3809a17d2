//! Error types for Meshstream Core

use thiserror::Error;

/// Result type alias for streaming operations
pub type Result<T> = std::result::Result<T, Error>;

/// Streaming error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("Network error fetching {url}: {detail}")]
    Network { url: String, detail: String },

    // Manifest errors
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    // Segment errors
    #[error("Failed to decode segment {url}: {reason}")]
    SegmentDecode { url: String, reason: String },

    // Synchronization errors
    #[error("Video/mesh mismatch: {mesh_count} mesh segments, {video_frame_count} video frames")]
    SyncMismatch { mesh_count: usize, video_frame_count: u64 },

    // Video errors
    #[error("Video prepare failed: {0}")]
    VideoPrepare(String),

    // Session errors
    #[error("Invalid session state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Session has been torn down")]
    SessionClosed,

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a network error from any transport failure
    pub fn network(url: impl Into<String>, detail: impl ToString) -> Self {
        Error::Network {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// Create a malformed manifest error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedManifest(msg.into())
    }

    /// Create a segment decode error
    pub fn segment_decode(url: impl Into<String>, reason: impl ToString) -> Self {
        Error::SegmentDecode {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error halts the session it occurs in.
    ///
    /// Per-segment decode failures are skipped and a sync mismatch is a
    /// terminal outcome rather than a failure, so neither is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::SegmentDecode { .. } | Error::SyncMismatch { .. }
        )
    }

    /// Returns the error code for telemetry
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Network { .. } => "NETWORK",
            Error::MalformedManifest(_) => "MALFORMED_MANIFEST",
            Error::SegmentDecode { .. } => "SEGMENT_DECODE",
            Error::SyncMismatch { .. } => "SYNC_MISMATCH",
            Error::VideoPrepare(_) => "VIDEO_PREPARE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::SessionClosed => "SESSION_CLOSED",
            Error::Internal(_) => "INTERNAL",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}
