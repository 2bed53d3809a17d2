//! Headless MP4 video resource
//!
//! Downloads the texture track and reads its frame count from the sample
//! table of the first video track. Nothing is decoded; the playhead is
//! bookkeeping only. Fragmented MP4 (moof) is not supported.

use super::VideoPlayback;
use crate::{Error, Result, StreamConfig, VideoRequest};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument};

type AtomType = [u8; 4];

const MOOV: AtomType = *b"moov";
const TRAK: AtomType = *b"trak";
const MDIA: AtomType = *b"mdia";
const HDLR: AtomType = *b"hdlr";
const MINF: AtomType = *b"minf";
const STBL: AtomType = *b"stbl";
const STSZ: AtomType = *b"stsz";
const STZ2: AtomType = *b"stz2";
const HANDLER_VIDEO: &[u8; 4] = b"vide";

/// Split a buffer into `(type, body)` atoms
fn read_atoms(data: &[u8]) -> std::result::Result<Vec<(AtomType, &[u8])>, String> {
    let mut atoms = Vec::new();
    let mut pos = 0usize;

    while pos + 8 <= data.len() {
        let size = u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as u64;
        let atom_type = [data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]];

        let (actual_size, header_size) = match size {
            // 64-bit extended size
            1 => {
                let ext = data
                    .get(pos + 8..pos + 16)
                    .ok_or_else(|| "truncated extended atom header".to_string())?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(ext);
                (u64::from_be_bytes(buf), 16u64)
            }
            // Atom extends to end of buffer
            0 => ((data.len() - pos) as u64, 8u64),
            _ => (size, 8u64),
        };

        if actual_size < header_size || pos as u64 + actual_size > data.len() as u64 {
            return Err(format!(
                "atom {} at {} has invalid size {}",
                String::from_utf8_lossy(&atom_type),
                pos,
                actual_size
            ));
        }

        let end = pos + actual_size as usize;
        atoms.push((atom_type, &data[pos + header_size as usize..end]));
        pos = end;
    }

    Ok(atoms)
}

fn child<'a>(data: &'a [u8], atom_type: AtomType) -> std::result::Result<Option<&'a [u8]>, String> {
    Ok(read_atoms(data)?
        .into_iter()
        .find(|(t, _)| *t == atom_type)
        .map(|(_, body)| body))
}

/// Sample count of a track if it is a video track
fn video_track_samples(trak: &[u8]) -> std::result::Result<Option<u64>, String> {
    let Some(mdia) = child(trak, MDIA)? else {
        return Ok(None);
    };

    // hdlr: version/flags (4), pre_defined (4), handler_type (4)
    let is_video = child(mdia, HDLR)?
        .and_then(|hdlr| hdlr.get(8..12))
        .map(|handler| handler == HANDLER_VIDEO)
        .unwrap_or(false);
    if !is_video {
        return Ok(None);
    }

    let stbl = match child(mdia, MINF)? {
        Some(minf) => child(minf, STBL)?,
        None => None,
    };
    let Some(stbl) = stbl else {
        return Err("video track has no sample table".to_string());
    };

    // stsz: version/flags (4), sample_size (4), sample_count (4)
    // stz2: version/flags (4), reserved + field_size (4), sample_count (4)
    let table = match child(stbl, STSZ)? {
        Some(stsz) => stsz,
        None => child(stbl, STZ2)?.ok_or_else(|| "video track has no sample sizes".to_string())?,
    };
    let count = table
        .get(8..12)
        .ok_or_else(|| "truncated sample size table".to_string())?;

    Ok(Some(u32::from_be_bytes([count[0], count[1], count[2], count[3]]) as u64))
}

/// Frame count of the first video track in an MP4 file
pub fn count_video_samples(data: &[u8]) -> std::result::Result<u64, String> {
    let moov = child(data, MOOV)?.ok_or_else(|| "no moov atom".to_string())?;

    for (atom_type, body) in read_atoms(moov)? {
        if atom_type != TRAK {
            continue;
        }
        if let Some(samples) = video_track_samples(body)? {
            return Ok(samples);
        }
    }

    Err("no video track".to_string())
}

#[derive(Debug, Default)]
struct ProbeState {
    url: Option<String>,
    data: Option<Bytes>,
    frame_count: u64,
    frame: u64,
    playing: bool,
    /// Bumped by every `prepare` and `stop`; a fetch finishing under an
    /// older generation is discarded
    generation: u64,
}

/// [`VideoPlayback`] for hosts without a video decoder
pub struct Mp4ProbeVideo {
    client: Client,
    state: Mutex<ProbeState>,
}

impl Mp4ProbeVideo {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            state: Mutex::new(ProbeState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_frame(&self) -> u64 {
        self.state().frame
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    /// True when no track is held, before `prepare` or after `stop`
    pub fn is_released(&self) -> bool {
        self.state().data.is_none()
    }

    pub fn url(&self) -> Option<String> {
        self.state().url.clone()
    }
}

#[async_trait]
impl VideoPlayback for Mp4ProbeVideo {
    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn prepare(&self, request: &VideoRequest) -> Result<()> {
        let generation = {
            let mut state = self.state();
            state.generation += 1;
            state.generation
        };

        let response = self
            .client
            .get(&request.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::VideoPrepare(format!("{}: {}", request.url, e)))?;

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::VideoPrepare(format!("{}: {}", request.url, e)))?;

        let frame_count = count_video_samples(&data)
            .map_err(|e| Error::VideoPrepare(format!("{}: {}", request.url, e)))?;

        debug!(bytes = data.len(), frame_count, "Video track probed");

        let mut state = self.state();
        if state.generation != generation {
            debug!("Prepare superseded, discarding track");
            return Err(Error::VideoPrepare(format!(
                "{}: superseded before it completed",
                request.url
            )));
        }
        *state = ProbeState {
            url: Some(request.url.clone()),
            data: Some(data),
            frame_count,
            frame: 0,
            playing: request.auto_play,
            generation,
        };

        Ok(())
    }

    fn play(&self) {
        self.state().playing = true;
    }

    fn pause(&self) {
        self.state().playing = false;
    }

    fn set_frame(&self, frame: u64) {
        let mut state = self.state();
        state.frame = frame.min(state.frame_count.saturating_sub(1));
    }

    fn frame_count(&self) -> u64 {
        self.state().frame_count
    }

    fn stop(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.playing = false;
        state.frame = 0;
        state.data = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn atom(atom_type: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(atom_type);
        out.extend_from_slice(body);
        out
    }

    fn track(handler: &[u8; 4], samples: u32) -> Vec<u8> {
        let mut hdlr = vec![0u8; 8];
        hdlr.extend_from_slice(handler);
        hdlr.extend_from_slice(&[0u8; 12]);

        let mut stsz = vec![0u8; 8];
        stsz.extend_from_slice(&samples.to_be_bytes());

        let stbl = atom(b"stbl", &atom(b"stsz", &stsz));
        let minf = atom(b"minf", &stbl);
        let mut mdia_body = atom(b"hdlr", &hdlr);
        mdia_body.extend(minf);
        atom(b"trak", &atom(b"mdia", &mdia_body))
    }

    fn movie(tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut out = atom(b"ftyp", b"isom\0\0\0\0");
        out.extend(atom(b"moov", &tracks.concat()));
        out.extend(atom(b"mdat", &[0u8; 16]));
        out
    }

    #[test]
    fn test_counts_video_samples() {
        let data = movie(&[track(b"soun", 900), track(b"vide", 120)]);
        assert_eq!(count_video_samples(&data).unwrap(), 120);
    }

    #[test]
    fn test_audio_only_has_no_video_track() {
        let data = movie(&[track(b"soun", 900)]);
        assert_eq!(count_video_samples(&data).unwrap_err(), "no video track");
    }

    #[test]
    fn test_rejects_overrunning_atom() {
        let mut data = movie(&[track(b"vide", 3)]);
        data.truncate(data.len() - 4);
        assert!(count_video_samples(&data).is_err());
    }

    #[tokio::test]
    async fn test_prepare_and_release() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/texture.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(movie(&[track(b"vide", 4)])))
            .mount(&server)
            .await;

        let video = Mp4ProbeVideo::new(&StreamConfig::default()).unwrap();
        assert!(video.is_released());

        let request = VideoRequest {
            url: format!("{}/texture.mp4", server.uri()),
            texture_dimension: 2048,
            auto_play: false,
        };
        video.prepare(&request).await.unwrap();
        assert_eq!(video.frame_count(), 4);
        assert!(!video.is_playing());

        video.play();
        video.set_frame(10);
        assert_eq!(video.current_frame(), 3);

        video.stop();
        assert!(video.is_released());
        assert!(!video.is_playing());
    }

    #[tokio::test]
    async fn test_prepare_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let video = Mp4ProbeVideo::new(&StreamConfig::default()).unwrap();
        let request = VideoRequest {
            url: format!("{}/texture.mp4", server.uri()),
            texture_dimension: 2048,
            auto_play: false,
        };
        assert!(matches!(
            video.prepare(&request).await,
            Err(Error::VideoPrepare(_))
        ));
    }

    fn request(url: String) -> VideoRequest {
        VideoRequest {
            url,
            texture_dimension: 2048,
            auto_play: false,
        }
    }

    async fn slow_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow.mp4"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(movie(&[track(b"vide", 7)]))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fast.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(movie(&[track(b"vide", 99)])))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_stop_during_prepare_stays_released() {
        let server = slow_server().await;
        let video = Mp4ProbeVideo::new(&StreamConfig::default()).unwrap();
        let slow = request(format!("{}/slow.mp4", server.uri()));

        let (prepared, _) = tokio::join!(video.prepare(&slow), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            video.stop();
        });

        assert!(matches!(prepared, Err(Error::VideoPrepare(_))));
        assert!(video.is_released());
        assert_eq!(video.url(), None);
        assert_eq!(video.frame_count(), 0);
    }

    #[tokio::test]
    async fn test_later_prepare_wins_over_slower_one() {
        let server = slow_server().await;
        let video = Mp4ProbeVideo::new(&StreamConfig::default()).unwrap();
        let slow = request(format!("{}/slow.mp4", server.uri()));
        let fast = request(format!("{}/fast.mp4", server.uri()));

        let (stale, current) = tokio::join!(video.prepare(&slow), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            video.prepare(&fast).await
        });

        assert!(stale.is_err());
        current.unwrap();
        assert_eq!(video.url(), Some(fast.url.clone()));
        assert_eq!(video.frame_count(), 99);
    }
}
