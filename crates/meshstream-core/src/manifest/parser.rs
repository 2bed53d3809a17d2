//! Volumetric manifest parser
//!
//! Scans the whole document with a namespace-aware XML reader, so
//! malformed markup is rejected even when the relevant elements come
//! before the error. Elements outside [`MPD_NAMESPACE`] are ignored.

use super::{resolve_media, MPD_NAMESPACE};
use crate::{Error, Result, StreamPlan};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use tracing::{debug, instrument};

/// Parses manifest text into a [`StreamPlan`] with URLs resolved against a base.
#[derive(Debug, Clone)]
pub struct ManifestParser {
    base_url: String,
}

/// Raw element data collected during the scan, before any validation.
/// `Some(None)` means the element exists but lacks the attribute.
#[derive(Debug, Default)]
struct ScannedManifest {
    mime_type: Option<Option<String>>,
    segment_info_fps: Option<Option<String>>,
    mesh_media: Vec<Option<String>>,
    video_media: Option<Option<String>>,
}

impl ManifestParser {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Parse manifest content.
    ///
    /// Non-volumetric manifests produce an inert plan rather than an error.
    #[instrument(skip(self, content), fields(bytes = content.len()))]
    pub fn parse(&self, content: &str) -> Result<StreamPlan> {
        let scanned = scan(content)?;

        let mime_type = scanned.mime_type.clone().flatten().unwrap_or_default();
        let plan = StreamPlan::inert(mime_type);
        if !plan.is_volumetric() {
            debug!(mime_type = %plan.mime_type, "Not a volumetric manifest, plan is inert");
            return Ok(plan);
        }

        self.build_plan(plan, scanned)
    }

    fn build_plan(&self, mut plan: StreamPlan, scanned: ScannedManifest) -> Result<StreamPlan> {
        if let Some(fps) = scanned.segment_info_fps {
            let fps = fps.ok_or_else(|| Error::malformed("SEGINFO element without fps attribute"))?;
            let parsed = fps
                .trim()
                .parse::<u32>()
                .map_err(|_| Error::malformed(format!("non-numeric fps override: {:?}", fps)))?;
            plan.frame_rate_override = Some(parsed);
        }

        plan.mesh_segment_urls = scanned
            .mesh_media
            .into_iter()
            .enumerate()
            .map(|(i, media)| {
                media
                    .map(|m| resolve_media(&self.base_url, &m))
                    .ok_or_else(|| Error::malformed(format!("GLBURL #{} without media attribute", i)))
            })
            .collect::<Result<Vec<_>>>()?;

        // One video track: the first VAURL wins.
        if let Some(media) = scanned.video_media {
            let media = media.ok_or_else(|| Error::malformed("VAURL element without media attribute"))?;
            plan.video_track_url = Some(resolve_media(&self.base_url, &media));
        }

        debug!(
            segments = plan.mesh_segment_urls.len(),
            has_video = plan.video_track_url.is_some(),
            fps = ?plan.frame_rate_override,
            "Manifest parsed"
        );

        Ok(plan)
    }
}

fn scan(content: &str) -> Result<ScannedManifest> {
    let mut reader = NsReader::from_str(content);
    let mut scanned = ScannedManifest::default();
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| Error::malformed(e.to_string()))?;

        match event {
            Event::Start(ref element) | Event::Empty(ref element) => {
                if depth == 0 {
                    if seen_root {
                        return Err(Error::malformed("multiple root elements"));
                    }
                    seen_root = true;
                }
                if in_mpd_namespace(&ns) {
                    visit(element, &mut scanned)?;
                } else {
                    check_attributes(element)?;
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::malformed("unexpected closing tag"))?;
            }
            Event::Text(ref text) if depth == 0 => {
                if !text.iter().all(u8::is_ascii_whitespace) {
                    return Err(Error::malformed("text outside the root element"));
                }
            }
            Event::CData(_) if depth == 0 => {
                return Err(Error::malformed("CDATA outside the root element"));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(Error::malformed("document has no root element"));
    }
    if depth != 0 {
        return Err(Error::malformed("unclosed element at end of document"));
    }

    Ok(scanned)
}

fn in_mpd_namespace(ns: &ResolveResult) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == MPD_NAMESPACE.as_bytes())
}

fn visit(element: &BytesStart, scanned: &mut ScannedManifest) -> Result<()> {
    check_attributes(element)?;

    match element.local_name().as_ref() {
        b"Representation" if scanned.mime_type.is_none() => {
            scanned.mime_type = Some(attribute(element, "mimeType")?);
        }
        b"SEGINFO" if scanned.segment_info_fps.is_none() => {
            scanned.segment_info_fps = Some(attribute(element, "fps")?);
        }
        b"GLBURL" => {
            scanned.mesh_media.push(attribute(element, "media")?);
        }
        b"VAURL" if scanned.video_media.is_none() => {
            scanned.video_media = Some(attribute(element, "media")?);
        }
        _ => {}
    }

    Ok(())
}

/// Reject syntactically broken or duplicated attributes
fn check_attributes(element: &BytesStart) -> Result<()> {
    for attr in element.attributes() {
        attr.map_err(|e| Error::malformed(e.to_string()))?;
    }
    Ok(())
}

fn attribute(element: &BytesStart, name: &str) -> Result<Option<String>> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| Error::malformed(e.to_string()))?;

    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| Error::malformed(format!("invalid {} attribute: {}", name, e)))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/vv";

    fn manifest(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static">
  <Period>
    <AdaptationSet>
      {}
    </AdaptationSet>
  </Period>
</MPD>"#,
            body
        )
    }

    fn parse(content: &str) -> Result<StreamPlan> {
        ManifestParser::new(BASE).parse(content)
    }

    #[test]
    fn test_parse_volumetric_manifest() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="video/volumetric-video">
                 <SEGINFO fps="30"/>
                 <SegmentList>
                   <GLBURL media="mesh/0.glb"/>
                   <GLBURL media="mesh/1.glb"/>
                   <GLBURL media="mesh/2.glb"/>
                 </SegmentList>
                 <VAURL media="texture.mp4"/>
               </Representation>"#,
        ))
        .unwrap();

        assert!(plan.is_volumetric());
        assert_eq!(plan.frame_rate_override, Some(30));
        assert_eq!(
            plan.mesh_segment_urls,
            vec![
                "https://cdn.example.com/vv/mesh/0.glb",
                "https://cdn.example.com/vv/mesh/1.glb",
                "https://cdn.example.com/vv/mesh/2.glb",
            ]
        );
        assert_eq!(
            plan.video_track_url.as_deref(),
            Some("https://cdn.example.com/vv/texture.mp4")
        );
    }

    #[test]
    fn test_other_mime_type_is_inert() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="video/mp4">
                 <GLBURL media="mesh/0.glb"/>
                 <VAURL media="texture.mp4"/>
               </Representation>"#,
        ))
        .unwrap();

        assert_eq!(plan.mime_type, "video/mp4");
        assert!(!plan.is_volumetric());
        assert!(plan.mesh_segment_urls.is_empty());
        assert!(plan.video_track_url.is_none());
    }

    #[test]
    fn test_missing_representation_is_inert() {
        let plan = parse(&manifest(r#"<GLBURL media="mesh/0.glb"/>"#)).unwrap();
        assert_eq!(plan.mime_type, "");
        assert!(plan.mesh_segment_urls.is_empty());
    }

    #[test]
    fn test_only_first_representation_counts() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="audio/mp4"/>
               <Representation mimeType="video/volumetric-video">
                 <GLBURL media="mesh/0.glb"/>
               </Representation>"#,
        ))
        .unwrap();
        assert!(!plan.is_volumetric());
    }

    #[test]
    fn test_first_video_track_wins() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="video/volumetric-video">
                 <VAURL media="first.mp4"/>
                 <VAURL media="second.mp4"/>
               </Representation>"#,
        ))
        .unwrap();
        assert_eq!(
            plan.video_track_url.as_deref(),
            Some("https://cdn.example.com/vv/first.mp4")
        );
        assert!(plan.frame_rate_override.is_none());
        assert!(plan.mesh_segment_urls.is_empty());
    }

    #[test]
    fn test_non_numeric_fps_is_malformed() {
        let err = parse(&manifest(
            r#"<Representation mimeType="video/volumetric-video">
                 <SEGINFO fps="thirty"/>
               </Representation>"#,
        ))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedManifest(_)));
    }

    #[test]
    fn test_fps_is_ignored_for_inert_plans() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="video/mp4">
                 <SEGINFO fps="thirty"/>
               </Representation>"#,
        ))
        .unwrap();
        assert!(plan.frame_rate_override.is_none());
    }

    #[test]
    fn test_elements_outside_namespace_are_ignored() {
        let plan = parse(
            r#"<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" xmlns:x="urn:example:other">
                 <Representation mimeType="video/volumetric-video">
                   <x:GLBURL media="ignored.glb"/>
                   <GLBURL media="kept.glb"/>
                 </Representation>
               </MPD>"#,
        )
        .unwrap();
        assert_eq!(plan.mesh_segment_urls, vec!["https://cdn.example.com/vv/kept.glb"]);
    }

    #[test]
    fn test_wrong_namespace_is_inert() {
        let plan = parse(
            r#"<MPD><Representation mimeType="video/volumetric-video"/></MPD>"#,
        )
        .unwrap();
        assert!(!plan.is_volumetric());
    }

    #[test]
    fn test_malformed_markup() {
        for content in [
            "",
            "not xml at all",
            "<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\"><Representation></MPD>",
            "<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\">",
            "<a/><b/>",
            "<MPD a=\"1\" a=\"2\"/>",
        ] {
            assert!(
                matches!(parse(content), Err(Error::MalformedManifest(_))),
                "expected malformed for {:?}",
                content
            );
        }
    }

    #[test]
    fn test_segment_without_media_is_malformed() {
        let err = parse(&manifest(
            r#"<Representation mimeType="video/volumetric-video">
                 <GLBURL/>
               </Representation>"#,
        ))
        .unwrap_err();
        assert!(matches!(err, Error::MalformedManifest(_)));
    }

    #[test]
    fn test_media_attribute_is_unescaped() {
        let plan = parse(&manifest(
            r#"<Representation mimeType="video/volumetric-video">
                 <GLBURL media="seg.glb?a=1&amp;b=2"/>
               </Representation>"#,
        ))
        .unwrap();
        assert_eq!(
            plan.mesh_segment_urls,
            vec!["https://cdn.example.com/vv/seg.glb?a=1&b=2"]
        );
    }
}
