//! Core types for Meshstream

use crate::manifest::VOLUMETRIC_MIME_TYPE;
use crate::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Unique identifier for a stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Segment plan extracted from a manifest. Immutable once parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamPlan {
    /// Mime type of the first representation, empty if absent
    pub mime_type: String,
    /// Frame rate that overrides the video track's native rate
    pub frame_rate_override: Option<u32>,
    /// Absolute mesh segment URLs in manifest order
    pub mesh_segment_urls: Vec<String>,
    /// Absolute URL of the first video track
    pub video_track_url: Option<String>,
}

impl StreamPlan {
    /// A plan that triggers no loading or binding
    pub fn inert(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..Default::default()
        }
    }

    /// Whether this plan describes a volumetric stream
    pub fn is_volumetric(&self) -> bool {
        self.mime_type == VOLUMETRIC_MIME_TYPE
    }

    /// Number of planned mesh segments
    pub fn segment_count(&self) -> usize {
        self.mesh_segment_urls.len()
    }
}

/// Outcome of the sync gate as seen by progress observers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureState {
    /// Sync gate has not evaluated yet
    #[default]
    Unset,
    /// Video frames cover the mesh segments
    Matched,
    /// Video frames do not cover the mesh segments
    Mismatched,
}

/// Load progress counters for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadProgress {
    /// Planned segment count, unknown until the plan is handed to the loader
    pub total_count: Option<usize>,
    /// Segments successfully decoded and appended
    pub current_count: usize,
    /// Every planned segment has been attempted
    pub mesh_loaded: bool,
    /// Sync gate outcome
    pub texture_state: TextureState,
}

impl LoadProgress {
    pub fn is_total_known(&self) -> bool {
        self.total_count.is_some()
    }

    /// Whether the texture track matched the mesh track
    pub fn texture_loaded(&self) -> bool {
        self.texture_state == TextureState::Matched
    }

    /// Segments attempted but not appended. Zero until loading completes.
    pub fn skipped_count(&self) -> usize {
        match self.total_count {
            Some(total) if self.mesh_loaded => total.saturating_sub(self.current_count),
            _ => 0,
        }
    }

    /// Fraction of planned segments loaded (0.0 - 1.0)
    pub fn fraction(&self) -> Option<f64> {
        match self.total_count {
            Some(0) => Some(1.0),
            Some(total) => Some(self.current_count as f64 / total as f64),
            None => None,
        }
    }
}

/// Result of comparing the video frame count with the mesh segment count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub matched: bool,
    pub mesh_count: usize,
    pub video_frame_count: u64,
}

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No manifest requested yet
    Idle,
    /// Fetching and parsing the manifest
    FetchingManifest,
    /// Plan available; also the halt state for non-volumetric plans
    Parsed,
    /// Mesh segments loading while the video track is being bound
    Loading,
    /// Both counts known and compared
    SyncChecked,
    /// Tracks aligned, playback may start
    Ready,
    /// Tracks misaligned, playback blocked
    Mismatched,
    /// Manifest could not be fetched or parsed
    Failed,
}

impl SessionState {
    /// Check if transition to target state is valid
    pub fn can_transition_to(&self, target: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Idle, FetchingManifest) |
            (FetchingManifest, Parsed) | (FetchingManifest, Failed) |
            (Parsed, Loading) |
            (Loading, SyncChecked) |
            (SyncChecked, Ready) | (SyncChecked, Mismatched)
        )
    }

    /// States the session never leaves on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Ready | SessionState::Mismatched | SessionState::Failed)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::FetchingManifest => write!(f, "fetching_manifest"),
            SessionState::Parsed => write!(f, "parsed"),
            SessionState::Loading => write!(f, "loading"),
            SessionState::SyncChecked => write!(f, "sync_checked"),
            SessionState::Ready => write!(f, "ready"),
            SessionState::Mismatched => write!(f, "mismatched"),
            SessionState::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Decoded media
// =============================================================================

/// A decoded mesh, opaque to the core
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    /// Number of primitives making up the mesh
    pub primitive_count: usize,
    /// Geometry payload in the decoder's native layout
    pub data: Bytes,
}

/// Material description handed to the playback driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: Option<String>,
    pub properties: serde_json::Value,
}

/// A texture frame
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

/// Everything decoded from one mesh segment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSegment {
    pub meshes: Vec<Mesh>,
    pub material: Option<Material>,
}

/// Parameters for the playback resource backing the video track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub url: String,
    /// Edge length of the square render target
    pub texture_dimension: u32,
    pub auto_play: bool,
}

// =============================================================================
// Configuration
// =============================================================================

/// Streaming configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Edge length of the video render target in pixels
    pub max_texture_dimension: u32,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Emit telemetry events
    pub events_enabled: bool,
    /// Events retained for `drain()` before the oldest are dropped
    pub event_buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_texture_dimension: 2048,
            request_timeout_ms: 10000,
            events_enabled: true,
            event_buffer_size: 1000,
        }
    }
}

impl StreamConfig {
    /// Parse configuration overrides from JSON; missing fields keep defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: StreamConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_texture_dimension == 0 {
            return Err(Error::InvalidConfig("max_texture_dimension must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::InvalidConfig("request_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        assert!(SessionState::Idle.can_transition_to(SessionState::FetchingManifest));
        assert!(SessionState::FetchingManifest.can_transition_to(SessionState::Failed));
        assert!(SessionState::SyncChecked.can_transition_to(SessionState::Mismatched));

        assert!(!SessionState::Idle.can_transition_to(SessionState::Ready));
        assert!(!SessionState::Parsed.can_transition_to(SessionState::Failed));
        assert!(!SessionState::Mismatched.can_transition_to(SessionState::Ready));
        assert!(!SessionState::Ready.can_transition_to(SessionState::Idle));
    }

    #[test]
    fn test_progress_fraction() {
        let mut progress = LoadProgress::default();
        assert_eq!(progress.fraction(), None);

        progress.total_count = Some(4);
        progress.current_count = 1;
        assert_eq!(progress.fraction(), Some(0.25));
        assert_eq!(progress.skipped_count(), 0);

        progress.current_count = 3;
        progress.mesh_loaded = true;
        assert_eq!(progress.skipped_count(), 1);
    }

    #[test]
    fn test_config_partial_override() {
        let config = StreamConfig::from_json_str(r#"{"request_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.request_timeout_ms, 500);
        assert_eq!(config.max_texture_dimension, 2048);
        assert!(config.events_enabled);

        assert!(StreamConfig::from_json_str(r#"{"max_texture_dimension": 0}"#).is_err());
    }
}
