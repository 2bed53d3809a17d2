//! Destination for decoded meshes
//!
//! The scene that renders meshes owns the collection; the core only
//! appends to it and clears it on teardown.

use crate::types::{Mesh, Texture};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::RwLock as AsyncRwLock;

/// Ordered, append-only mesh store owned by the rendering side
pub trait SegmentSink: Send + Sync {
    fn append_mesh(&self, mesh: Mesh);

    /// Texture frames are not produced by the core yet.
    fn append_texture(&self, _texture: Texture) {}

    /// Release every mesh and texture
    fn clear(&self);

    fn mesh_count(&self) -> usize;
}

/// In-memory sink for hosts without a scene graph
#[derive(Debug, Default)]
pub struct MeshCollection {
    meshes: RwLock<Vec<Mesh>>,
    textures: RwLock<Vec<Texture>>,
}

impl MeshCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mesh at a timeline index
    pub fn mesh(&self, index: usize) -> Option<Mesh> {
        self.meshes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    pub fn meshes(&self) -> Vec<Mesh> {
        self.meshes.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl SegmentSink for MeshCollection {
    fn append_mesh(&self, mesh: Mesh) {
        self.meshes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(mesh);
    }

    fn append_texture(&self, texture: Texture) {
        self.textures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(texture);
    }

    fn clear(&self) {
        self.meshes.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.textures.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn mesh_count(&self) -> usize {
        self.meshes.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// A sink that refuses writes once its session is torn down.
///
/// Appends hold the read side of the gate and teardown takes the write
/// side, so a decode that finishes during teardown can never land in a
/// cleared collection.
#[derive(Clone)]
pub struct GuardedSink {
    sink: Arc<dyn SegmentSink>,
    open: Arc<AsyncRwLock<bool>>,
}

impl GuardedSink {
    pub fn new(sink: Arc<dyn SegmentSink>) -> Self {
        Self {
            sink,
            open: Arc::new(AsyncRwLock::new(true)),
        }
    }

    /// Append a mesh; returns false if the sink is closed and the mesh was dropped
    pub async fn append_mesh(&self, mesh: Mesh) -> bool {
        let open = self.open.read().await;
        if !*open {
            return false;
        }
        self.sink.append_mesh(mesh);
        true
    }

    pub async fn is_open(&self) -> bool {
        *self.open.read().await
    }

    /// Close the sink and clear the underlying collection. Idempotent.
    pub async fn close(&self) {
        let mut open = self.open.write().await;
        if *open {
            *open = false;
            self.sink.clear();
        }
    }

    pub fn mesh_count(&self) -> usize {
        self.sink.mesh_count()
    }
}
