//! Binary glTF (GLB) segment decoder
//!
//! Implements just enough of the GLB 2.0 container to hand meshes to a
//! renderer:
//! - 12-byte header (magic, version, total length)
//! - JSON chunk with the `meshes` and `materials` arrays
//! - Optional BIN chunk, shared by every mesh of the segment

use super::MeshDecoder;
use crate::{DecodedSegment, Error, Material, Mesh, Result, StreamConfig};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

#[derive(Debug, Deserialize)]
struct GltfDocument {
    #[serde(default)]
    meshes: Vec<GltfMesh>,
    #[serde(default)]
    materials: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GltfMesh {
    name: Option<String>,
    #[serde(default)]
    primitives: Vec<serde_json::Value>,
}

/// Fetches GLB segments over HTTP and decodes them
pub struct GlbDecoder {
    client: Client,
}

impl GlbDecoder {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MeshDecoder for GlbDecoder {
    #[instrument(skip(self))]
    async fn decode(&self, url: &str) -> Result<DecodedSegment> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::segment_decode(url, e))?;

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::segment_decode(url, e))?;

        debug!(url, bytes = data.len(), "Segment fetched");

        decode_glb(data).map_err(|reason| Error::segment_decode(url, reason))
    }
}

fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    let bytes = data.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Decode a GLB container held in memory
pub fn decode_glb(data: Bytes) -> std::result::Result<DecodedSegment, String> {
    if data.len() < HEADER_LEN {
        return Err(format!("truncated header: {} bytes", data.len()));
    }

    let magic = read_u32(&data, 0).unwrap_or_default();
    if magic != GLB_MAGIC {
        return Err(format!("bad magic 0x{:08x}", magic));
    }

    let version = read_u32(&data, 4).unwrap_or_default();
    if version != GLB_VERSION {
        return Err(format!("unsupported GLB version {}", version));
    }

    let total = read_u32(&data, 8).unwrap_or_default() as usize;
    if total > data.len() || total < HEADER_LEN {
        return Err(format!("declared length {} does not fit {} bytes", total, data.len()));
    }

    let mut json: Option<Bytes> = None;
    let mut bin: Option<Bytes> = None;
    let mut pos = HEADER_LEN;

    while pos + CHUNK_HEADER_LEN <= total {
        let chunk_len = read_u32(&data, pos).unwrap_or_default() as usize;
        let chunk_type = read_u32(&data, pos + 4).unwrap_or_default();
        let start = pos + CHUNK_HEADER_LEN;
        let end = start
            .checked_add(chunk_len)
            .filter(|end| *end <= total)
            .ok_or_else(|| format!("chunk at {} overruns container", pos))?;

        match chunk_type {
            CHUNK_JSON if json.is_none() => {
                if pos != HEADER_LEN {
                    return Err("JSON chunk is not the first chunk".to_string());
                }
                json = Some(data.slice(start..end));
            }
            CHUNK_BIN if bin.is_none() => bin = Some(data.slice(start..end)),
            // Unknown chunk types must be ignored.
            _ => {}
        }

        // Chunks are 4-byte aligned.
        pos = (end + 3) & !3;
    }

    let json = json.ok_or("missing JSON chunk")?;
    let document: GltfDocument =
        serde_json::from_slice(&json).map_err(|e| format!("invalid glTF JSON: {}", e))?;

    let payload = bin.unwrap_or_default();
    let meshes = document
        .meshes
        .into_iter()
        .map(|m| Mesh {
            name: m.name,
            primitive_count: m.primitives.len(),
            data: payload.clone(),
        })
        .collect();

    let material = document.materials.into_iter().next().map(|properties| Material {
        name: properties
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string),
        properties,
    });

    Ok(DecodedSegment { meshes, material })
}
