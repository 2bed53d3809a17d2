//! Sequential mesh segment loading
//!
//! Segments are decoded one at a time in manifest order, so append order
//! in the sink always equals manifest order. A segment that fails to
//! decode is skipped: the counters do not move, no error escapes, and a
//! `segment_failed` event records what happened.

use crate::decoder::MeshDecoder;
use crate::driver::PlaybackDriver;
use crate::events::{EventEmitter, StreamEvent};
use crate::progress::ProgressTracker;
use crate::sink::GuardedSink;
use crate::{DecodedSegment, Error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of one load pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    /// Segments appended to the sink
    pub loaded: usize,
    /// Indices of segments that failed to decode
    pub failed: Vec<usize>,
    /// Loading stopped early because the session was torn down
    pub aborted: bool,
}

pub struct SegmentLoader {
    decoder: Arc<dyn MeshDecoder>,
    sink: GuardedSink,
    driver: Arc<dyn PlaybackDriver>,
    progress: ProgressTracker,
    events: Arc<EventEmitter>,
}

impl SegmentLoader {
    pub fn new(
        decoder: Arc<dyn MeshDecoder>,
        sink: GuardedSink,
        driver: Arc<dyn PlaybackDriver>,
        progress: ProgressTracker,
        events: Arc<EventEmitter>,
    ) -> Self {
        Self {
            decoder,
            sink,
            driver,
            progress,
            events,
        }
    }

    /// Load every segment in order.
    ///
    /// The total is published before the first decode starts.
    #[instrument(skip_all, fields(segments = urls.len()))]
    pub async fn load(&self, urls: &[String]) -> LoadReport {
        self.progress.begin(urls.len());
        info!(segments = urls.len(), "Loading mesh segments");

        let mut report = LoadReport::default();

        for (index, url) in urls.iter().enumerate() {
            if !self.sink.is_open().await {
                report.aborted = true;
                break;
            }

            let segment = match self.decoder.decode(url).await {
                Ok(segment) => segment,
                Err(e) => {
                    self.skip(index, url, &e, &mut report).await;
                    continue;
                }
            };

            let DecodedSegment { meshes, material } = segment;
            let Some(mesh) = meshes.into_iter().next() else {
                let e = Error::segment_decode(url, "segment contains no meshes");
                self.skip(index, url, &e, &mut report).await;
                continue;
            };

            if !self.sink.append_mesh(mesh).await {
                debug!(index, url = %url, "Session torn down mid-decode, discarding segment");
                report.aborted = true;
                break;
            }

            // First successful segment supplies the material for the whole stream.
            if report.loaded == 0 {
                if let Some(material) = material {
                    self.driver.init_material(material);
                }
            }

            report.loaded += 1;
            self.progress.record_loaded();
            self.events
                .emit(StreamEvent::SegmentLoaded {
                    index,
                    url: url.clone(),
                })
                .await;
        }

        if report.aborted {
            return report;
        }

        self.progress.finish();
        info!(
            loaded = report.loaded,
            failed = report.failed.len(),
            "Segments loaded"
        );
        self.events
            .emit(StreamEvent::SegmentsComplete {
                loaded: report.loaded,
                total: urls.len(),
            })
            .await;

        report
    }

    async fn skip(&self, index: usize, url: &str, error: &Error, report: &mut LoadReport) {
        warn!(index, url, error = %error, "Skipping segment");
        report.failed.push(index);
        self.events
            .emit(StreamEvent::SegmentFailed {
                index,
                url: url.to_string(),
                reason: error.to_string(),
            })
            .await;
    }
}
