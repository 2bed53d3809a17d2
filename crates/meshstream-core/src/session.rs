//! Stream Session - one manifest-to-readiness lifecycle
//!
//! Coordinates:
//! - Manifest fetch and parse
//! - Mesh segment loading and video binding, concurrently
//! - The sync gate verdict
//! - State machine transitions
//! - Telemetry events
//!
//! A session runs once. Loading a new manifest means a new session.

use crate::{
    decoder::MeshDecoder,
    driver::PlaybackDriver,
    events::{EventEmitter, StreamEvent, StreamEventRecord},
    loader::{LoadReport, SegmentLoader},
    manifest::{resolve_media, ManifestFetcher, ManifestParser},
    progress::ProgressTracker,
    sink::{GuardedSink, SegmentSink},
    sync::SyncGate,
    types::*,
    video::{VideoPlayback, VideoTrackBinder},
    Error, Result,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// The external capabilities a session drives
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn ManifestFetcher>,
    pub decoder: Arc<dyn MeshDecoder>,
    pub sink: Arc<dyn SegmentSink>,
    pub video: Arc<dyn VideoPlayback>,
    pub driver: Arc<dyn PlaybackDriver>,
}

#[derive(Debug, Clone, Copy)]
struct Lifecycle {
    state: SessionState,
    closed: bool,
}

/// Stream session managing one manifest
pub struct StreamSession {
    /// Unique session ID
    id: SessionId,
    /// Session configuration
    config: StreamConfig,
    base_url: String,
    manifest_name: String,
    collaborators: Collaborators,
    /// Current state and teardown flag, changed together
    lifecycle: RwLock<Lifecycle>,
    /// State change broadcaster
    state_tx: watch::Sender<SessionState>,
    progress: ProgressTracker,
    /// Sink that refuses writes after teardown
    sink: GuardedSink,
    plan: RwLock<Option<StreamPlan>>,
    sync_result: RwLock<Option<SyncResult>>,
    load_report: RwLock<Option<LoadReport>>,
    /// A video resource was created and must be released on teardown
    video_bound: AtomicBool,
    /// Held while this session drives the video resource
    video_lease: Arc<Mutex<()>>,
    events: Arc<EventEmitter>,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("manifest_name", &self.manifest_name)
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    /// Create a new session for `{base_url}/{manifest_name}`
    pub fn new(
        config: StreamConfig,
        base_url: impl Into<String>,
        manifest_name: impl Into<String>,
        collaborators: Collaborators,
    ) -> Self {
        let id = SessionId::new();
        let (state_tx, _) = watch::channel(SessionState::Idle);

        Self {
            id,
            events: Arc::new(EventEmitter::new(id, &config)),
            config,
            base_url: base_url.into(),
            manifest_name: manifest_name.into(),
            sink: GuardedSink::new(collaborators.sink.clone()),
            collaborators,
            lifecycle: RwLock::new(Lifecycle {
                state: SessionState::Idle,
                closed: false,
            }),
            state_tx,
            progress: ProgressTracker::new(),
            plan: RwLock::new(None),
            sync_result: RwLock::new(None),
            load_report: RwLock::new(None),
            video_bound: AtomicBool::new(false),
            video_lease: Arc::new(Mutex::new(())),
        }
    }

    /// Share a video lease with other sessions driving the same resource.
    ///
    /// Only one of them prepares or parks the track at a time, and a
    /// torn-down session keeps the lease until its in-flight prepare has
    /// resolved and been released.
    pub fn with_video_lease(mut self, lease: Arc<Mutex<()>>) -> Self {
        self.video_lease = lease;
        self
    }

    /// Get session ID
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Get current state
    pub async fn state(&self) -> SessionState {
        self.lifecycle.read().await.state
    }

    /// Subscribe to state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Current load progress
    pub fn progress(&self) -> LoadProgress {
        self.progress.snapshot()
    }

    /// Subscribe to progress changes
    pub fn subscribe_progress(&self) -> watch::Receiver<LoadProgress> {
        self.progress.subscribe()
    }

    /// Subscribe to telemetry events
    pub fn subscribe_events(&self) -> broadcast::Receiver<StreamEventRecord> {
        self.events.subscribe()
    }

    /// Buffered telemetry events
    pub async fn events(&self) -> Vec<StreamEventRecord> {
        self.events.events().await
    }

    pub async fn plan(&self) -> Option<StreamPlan> {
        self.plan.read().await.clone()
    }

    pub async fn sync_result(&self) -> Option<SyncResult> {
        *self.sync_result.read().await
    }

    pub async fn load_report(&self) -> Option<LoadReport> {
        self.load_report.read().await.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.lifecycle.read().await.closed
    }

    /// Tracks are aligned and playback may start
    pub async fn is_ready(&self) -> bool {
        self.state().await == SessionState::Ready
    }

    /// Transition to new state
    async fn set_state(&self, new_state: SessionState) -> Result<()> {
        let mut lifecycle = self.lifecycle.write().await;
        if lifecycle.closed {
            return Err(Error::SessionClosed);
        }

        let current = lifecycle.state;
        if !current.can_transition_to(new_state) {
            return Err(Error::InvalidStateTransition {
                from: current.to_string(),
                to: new_state.to_string(),
            });
        }

        lifecycle.state = new_state;
        drop(lifecycle);
        let _ = self.state_tx.send(new_state);

        info!(session_id = %self.id, from = %current, to = %new_state, "State transition");
        self.events
            .emit(StreamEvent::StateChange {
                from: current,
                to: new_state,
            })
            .await;

        Ok(())
    }

    /// Run the session to completion.
    ///
    /// Returns the state the session settled in: `Parsed` for inert
    /// plans, `Ready` or `Mismatched` once the sync gate has run, or
    /// `Loading` when the plan has no video track to compare against.
    /// Fetch and parse failures leave the session `Failed` and are
    /// returned as errors. Nothing is retried.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn start(&self) -> Result<SessionState> {
        self.set_state(SessionState::FetchingManifest).await?;

        let plan = match self.acquire_plan().await {
            Ok(plan) => plan,
            Err(e) => {
                self.fail(&e).await;
                return Err(e);
            }
        };

        *self.plan.write().await = Some(plan.clone());
        self.set_state(SessionState::Parsed).await?;

        if !plan.is_volumetric() {
            info!(mime_type = %plan.mime_type, "Plan is inert, nothing to load");
            return Ok(SessionState::Parsed);
        }

        if let Some(fps) = plan.frame_rate_override {
            self.collaborators.driver.set_target_frame_rate(fps);
        }

        self.set_state(SessionState::Loading).await?;

        let loader = SegmentLoader::new(
            self.collaborators.decoder.clone(),
            self.sink.clone(),
            self.collaborators.driver.clone(),
            self.progress.clone(),
            self.events.clone(),
        );

        let (report, _) = tokio::join!(
            loader.load(&plan.mesh_segment_urls),
            self.bind_and_check(&plan)
        );
        *self.load_report.write().await = Some(report);

        if self.is_closed().await {
            return Err(Error::SessionClosed);
        }

        Ok(self.state().await)
    }

    /// Start the session on the runtime and return immediately
    pub fn spawn(self: Arc<Self>) -> JoinHandle<Result<SessionState>> {
        tokio::spawn(async move { self.start().await })
    }

    async fn acquire_plan(&self) -> Result<StreamPlan> {
        let content = self
            .collaborators
            .fetcher
            .fetch(&self.base_url, &self.manifest_name)
            .await?;

        info!(bytes = content.len(), "Manifest fetched");
        self.events
            .emit(StreamEvent::ManifestFetched {
                url: resolve_media(&self.base_url, &self.manifest_name),
                bytes: content.len(),
            })
            .await;

        let plan = ManifestParser::new(self.base_url.as_str()).parse(&content)?;

        self.events
            .emit(StreamEvent::PlanParsed {
                mime_type: plan.mime_type.clone(),
                segments: plan.segment_count(),
                has_video: plan.video_track_url.is_some(),
                frame_rate_override: plan.frame_rate_override,
            })
            .await;

        Ok(plan)
    }

    async fn fail(&self, error: &Error) {
        error!(code = error.error_code(), error = %error, "Session failed");
        self.report_error(error).await;

        if let Err(e) = self.set_state(SessionState::Failed).await {
            warn!(error = %e, "Could not mark session failed");
        }
    }

    async fn report_error(&self, error: &Error) {
        self.events
            .emit(StreamEvent::Error {
                code: error.error_code().to_string(),
                message: error.to_string(),
                fatal: error.is_fatal(),
            })
            .await;
    }

    /// Video half of the fan-out: bind the track, then run the sync gate
    async fn bind_and_check(&self, plan: &StreamPlan) {
        let Some(url) = plan.video_track_url.as_deref() else {
            warn!("Plan has no video track, sync gate will not run");
            return;
        };

        let lease = self.video_lease.lock().await;
        if self.is_closed().await {
            return;
        }

        self.video_bound.store(true, Ordering::SeqCst);
        let binder = VideoTrackBinder::new(self.collaborators.video.clone(), &self.config);
        let prepared = binder.prepare(url).await;

        // Teardown needs the write side, so it cannot interleave with parking.
        let lifecycle = self.lifecycle.read().await;
        if lifecycle.closed {
            self.collaborators.video.stop();
            debug!(url, "Video prepared after teardown, released");
            return;
        }

        let frame_count = match prepared {
            Ok(()) => binder.park(),
            Err(e) => {
                drop(lifecycle);
                drop(lease);
                error!(error = %e, "Video track could not be prepared, sync gate will not run");
                self.report_error(&e).await;
                return;
            }
        };
        drop(lifecycle);
        drop(lease);

        self.events
            .emit(StreamEvent::VideoPrepared {
                url: url.to_string(),
                frame_count,
            })
            .await;

        let gate = SyncGate::new(self.progress.clone());
        let result = match gate.await_and_check(frame_count).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Sync gate abandoned");
                return;
            }
        };

        if let Err(e) = self.settle(result).await {
            warn!(error = %e, "Sync verdict arrived after teardown");
        }
    }

    async fn settle(&self, result: SyncResult) -> Result<()> {
        if self.is_closed().await {
            return Err(Error::SessionClosed);
        }

        *self.sync_result.write().await = Some(result);
        self.events.emit(StreamEvent::SyncChecked { result }).await;
        self.set_state(SessionState::SyncChecked).await?;

        if result.matched {
            self.set_state(SessionState::Ready).await
        } else {
            let mismatch = Error::SyncMismatch {
                mesh_count: result.mesh_count,
                video_frame_count: result.video_frame_count,
            };
            self.report_error(&mismatch).await;
            self.set_state(SessionState::Mismatched).await
        }
    }

    /// Forward a frame-ready notification from the video resource to the
    /// playback driver. Ignored unless the session is `Ready`.
    pub async fn notify_frame_ready(&self) -> bool {
        if !self.is_ready().await {
            return false;
        }
        self.collaborators.driver.on_frame_ready();
        true
    }

    /// Tear the session down: clear the sink and release the video resource.
    ///
    /// A decode already in flight finishes, but its mesh is discarded.
    /// Calling this twice is a no-op.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub async fn teardown(&self) {
        let previous = {
            let mut lifecycle = self.lifecycle.write().await;
            if lifecycle.closed {
                return;
            }
            lifecycle.closed = true;
            std::mem::replace(&mut lifecycle.state, SessionState::Idle)
        };
        let _ = self.state_tx.send(SessionState::Idle);

        self.sink.close().await;
        if self.video_bound.load(Ordering::SeqCst) {
            self.collaborators.video.stop();
        }

        info!(state = %previous, "Session torn down");
        self.events
            .emit(StreamEvent::Teardown { state: previous })
            .await;
    }
}
