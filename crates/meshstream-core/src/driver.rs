//! Playback driver interface

use crate::types::Material;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// The component that advances mesh playback frame by frame
pub trait PlaybackDriver: Send + Sync {
    /// Override the video track's native frame rate
    fn set_target_frame_rate(&self, fps: u32);

    /// Material shared by every segment, taken from the first loaded segment
    fn init_material(&self, material: Material);

    /// A video frame is ready to be shown alongside its mesh
    fn on_frame_ready(&self);
}

/// Driver that records what it is told, for headless hosts and tests
#[derive(Debug, Default)]
pub struct RecordingDriver {
    target_fps: Mutex<Option<u32>>,
    material: Mutex<Option<Material>>,
    frames_ready: AtomicU64,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_fps(&self) -> Option<u32> {
        *self.target_fps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn material(&self) -> Option<Material> {
        self.material.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn frames_ready(&self) -> u64 {
        self.frames_ready.load(Ordering::Relaxed)
    }
}

impl PlaybackDriver for RecordingDriver {
    fn set_target_frame_rate(&self, fps: u32) {
        *self.target_fps.lock().unwrap_or_else(PoisonError::into_inner) = Some(fps);
    }

    fn init_material(&self, material: Material) {
        *self.material.lock().unwrap_or_else(PoisonError::into_inner) = Some(material);
    }

    fn on_frame_ready(&self) {
        self.frames_ready.fetch_add(1, Ordering::Relaxed);
    }
}
