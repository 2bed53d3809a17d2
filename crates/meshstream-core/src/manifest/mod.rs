//! Volumetric manifest fetching and parsing
//!
//! The manifest is an MPD-flavoured XML document. Only four elements
//! matter, all in the DASH namespace:
//!
//! ```text
//! <MPD xmlns="urn:mpeg:dash:schema:mpd:2011">
//!   <Representation mimeType="video/volumetric-video">
//!     <SEGINFO fps="30"/>
//!     <GLBURL media="mesh/0000.glb"/>
//!     <GLBURL media="mesh/0001.glb"/>
//!     <VAURL media="texture.mp4"/>
//!   </Representation>
//! </MPD>
//! ```

mod fetcher;
mod parser;

pub use fetcher::HttpManifestFetcher;
pub use parser::ManifestParser;

use crate::{Error, Result};
use async_trait::async_trait;
use url::Url;

/// Namespace every manifest element must be bound to
pub const MPD_NAMESPACE: &str = "urn:mpeg:dash:schema:mpd:2011";

/// Mime type announcing a mesh + texture video stream
pub const VOLUMETRIC_MIME_TYPE: &str = "video/volumetric-video";

/// Trait for manifest sources
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch the raw manifest text at `{base_url}/{manifest_name}`
    async fn fetch(&self, base_url: &str, manifest_name: &str) -> Result<String>;
}

/// Join a media path onto the base URL the way the manifest expects.
///
/// This is plain concatenation, not RFC 3986 resolution: a trailing slash
/// on the base produces a double slash, exactly as the server expects.
pub fn resolve_media(base_url: &str, media: &str) -> String {
    format!("{}/{}", base_url, media)
}

/// Validate a manifest location and return the absolute manifest URL
pub fn manifest_url(base_url: &str, manifest_name: &str) -> Result<String> {
    if base_url.is_empty() || manifest_name.is_empty() {
        return Err(Error::InvalidConfig("manifest URL is not set".to_string()));
    }

    let url = resolve_media(base_url, manifest_name);
    Url::parse(&url)
        .map_err(|e| Error::InvalidConfig(format!("invalid manifest URL {}: {}", url, e)))?;

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_url() {
        assert_eq!(
            manifest_url("https://cdn.example.com/vv", "stream.mpd").unwrap(),
            "https://cdn.example.com/vv/stream.mpd"
        );
    }

    #[test]
    fn test_manifest_url_requires_both_parts() {
        assert!(matches!(
            manifest_url("", "stream.mpd"),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            manifest_url("https://cdn.example.com", ""),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_manifest_url_rejects_relative_base() {
        assert!(matches!(
            manifest_url("cdn/vv", "stream.mpd"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_resolve_media_is_concatenation() {
        assert_eq!(resolve_media("http://h/a/", "b.glb"), "http://h/a//b.glb");
    }
}
