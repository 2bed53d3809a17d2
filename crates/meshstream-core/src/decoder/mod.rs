//! Mesh segment decoding

#[cfg(feature = "glb")]
mod glb;

#[cfg(feature = "glb")]
pub use glb::{decode_glb, GlbDecoder};

use crate::{DecodedSegment, Result};
use async_trait::async_trait;

/// Turns one mesh segment URL into decoded meshes.
///
/// Failures are reported as [`crate::Error::SegmentDecode`]; the loader
/// skips the segment and carries on.
#[async_trait]
pub trait MeshDecoder: Send + Sync {
    async fn decode(&self, url: &str) -> Result<DecodedSegment>;
}
