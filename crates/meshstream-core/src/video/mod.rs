//! Video track binding
//!
//! The texture track is played by an external video resource. Binding
//! prepares it, then plays, pauses and rewinds it so the first frame is
//! materialised without anything being shown.

#[cfg(feature = "mp4-probe")]
mod mp4;

#[cfg(feature = "mp4-probe")]
pub use mp4::{count_video_samples, Mp4ProbeVideo};

use crate::{Result, StreamConfig, VideoRequest};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

/// External video playback resource
#[async_trait]
pub trait VideoPlayback: Send + Sync {
    /// Create the resource for `request` and resolve once it is prepared.
    ///
    /// A prepare overtaken by `stop` or by a later `prepare` must not
    /// install its track.
    async fn prepare(&self, request: &VideoRequest) -> Result<()>;

    fn play(&self);

    fn pause(&self);

    fn set_frame(&self, frame: u64);

    /// Total frames in the track; only meaningful after `prepare`
    fn frame_count(&self) -> u64;

    /// Stop playback and release the resource
    fn stop(&self);
}

/// Hands the video track to the playback resource
pub struct VideoTrackBinder {
    video: Arc<dyn VideoPlayback>,
    texture_dimension: u32,
}

impl VideoTrackBinder {
    pub fn new(video: Arc<dyn VideoPlayback>, config: &StreamConfig) -> Self {
        Self {
            video,
            texture_dimension: config.max_texture_dimension,
        }
    }

    /// Resource parameters for a track: square max-size target, no autoplay
    pub fn request(&self, url: &str) -> VideoRequest {
        VideoRequest {
            url: url.to_string(),
            texture_dimension: self.texture_dimension,
            auto_play: false,
        }
    }

    /// Prepare the track and park it on frame 0. Returns the frame count.
    pub async fn bind(&self, url: &str) -> Result<u64> {
        self.prepare(url).await?;
        Ok(self.park())
    }

    /// Hand the track to the resource and wait until it is prepared
    #[instrument(skip(self))]
    pub async fn prepare(&self, url: &str) -> Result<()> {
        info!(url, "Loading video");
        self.video.prepare(&self.request(url)).await
    }

    /// Play, pause and rewind a prepared track so frame 0 is materialised.
    /// Returns the frame count.
    pub fn park(&self) -> u64 {
        self.video.play();
        self.video.pause();
        self.video.set_frame(0);

        let frame_count = self.video.frame_count();
        info!(frame_count, "Video prepared");
        frame_count
    }
}
