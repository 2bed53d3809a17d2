//! Meshstream Core - Volumetric Video Streaming Library
//!
//! This crate turns a volumetric manifest into a playable stream:
//! - Manifest fetching and namespace-aware parsing
//! - Sequential mesh segment loading into a timeline sink
//! - Texture video track binding
//! - Mesh/video synchronization gate
//! - Session state machine and telemetry events
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Meshstream Core                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐        ┌──────────────┐                       │
//! │  │   Manifest   │───────▶│    Stream    │                       │
//! │  │   Fetcher    │  plan  │   Session    │                       │
//! │  └──────────────┘        └──────┬───────┘                       │
//! │                        ┌────────┴────────┐                      │
//! │                        ▼                 ▼                      │
//! │                 ┌──────────────┐  ┌──────────────┐              │
//! │                 │   Segment    │  │    Video     │              │
//! │                 │   Loader     │  │   Binder     │              │
//! │                 └──────┬───────┘  └──────┬───────┘              │
//! │                        │ total           │ frame count          │
//! │                        └────────┬────────┘                      │
//! │                          ┌──────┴──────┐                        │
//! │                          │  Sync Gate  │                        │
//! │                          └─────────────┘                        │
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │   Segment    │  │   Playback   │  │    Event     │           │
//! │  │    Sink      │  │    Driver    │  │   Emitter    │           │
//! │  └──────────────┘  └──────────────┘  └──────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod decoder;
pub mod driver;
pub mod error;
pub mod events;
pub mod loader;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod session;
pub mod sink;
pub mod sync;
pub mod types;
pub mod video;

pub use decoder::MeshDecoder;
#[cfg(feature = "glb")]
pub use decoder::{decode_glb, GlbDecoder};
pub use driver::{PlaybackDriver, RecordingDriver};
pub use error::{Error, Result};
pub use events::{EventEmitter, StreamEvent, StreamEventRecord};
pub use loader::{LoadReport, SegmentLoader};
pub use manifest::{HttpManifestFetcher, ManifestFetcher, ManifestParser};
pub use orchestrator::StreamOrchestrator;
pub use progress::ProgressTracker;
pub use session::{Collaborators, StreamSession};
pub use sink::{GuardedSink, MeshCollection, SegmentSink};
pub use sync::{evaluate, SyncGate};
pub use types::*;
#[cfg(feature = "mp4-probe")]
pub use video::Mp4ProbeVideo;
pub use video::{VideoPlayback, VideoTrackBinder};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log library initialization
pub fn init() {
    tracing::info!(version = VERSION, "Meshstream Core initialized");
}
