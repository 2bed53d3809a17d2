//! Mesh/video synchronization gate
//!
//! Playback may only start when the texture video carries more frames
//! than there are mesh segments. The comparison is strict: a video with
//! exactly as many frames as segments is reported as a mismatch.

use crate::progress::ProgressTracker;
use crate::types::{SyncResult, TextureState};
use crate::Result;
use tracing::{error, info, instrument};

/// Compare the two track lengths
pub fn evaluate(mesh_count: usize, video_frame_count: u64) -> SyncResult {
    SyncResult {
        matched: video_frame_count > mesh_count as u64,
        mesh_count,
        video_frame_count,
    }
}

pub struct SyncGate {
    progress: ProgressTracker,
}

impl SyncGate {
    pub fn new(progress: ProgressTracker) -> Self {
        Self { progress }
    }

    /// Wait for the mesh total, then compare it with the prepared video.
    ///
    /// Never evaluates before the loader has published its total. A
    /// mismatch is reported, not returned as an error.
    #[instrument(skip(self))]
    pub async fn await_and_check(&self, video_frame_count: u64) -> Result<SyncResult> {
        let mesh_count = self.progress.wait_for_total().await?;
        let result = evaluate(mesh_count, video_frame_count);

        if result.matched {
            info!(mesh_count, video_frame_count, "Video mesh matched");
            self.progress.set_texture_state(TextureState::Matched);
        } else {
            error!(mesh_count, video_frame_count, "Video mesh mismatch");
            self.progress.set_texture_state(TextureState::Mismatched);
        }

        Ok(result)
    }
}
