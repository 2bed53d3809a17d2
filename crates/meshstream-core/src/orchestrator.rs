//! Host-facing entry point
//!
//! Holds the manifest location and the current session. Changing the
//! location tears the old session down; activation starts a fresh one.

use crate::session::{Collaborators, StreamSession};
use crate::{Error, Result, SessionState, StreamConfig};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ManifestLocation {
    base_url: String,
    manifest_name: String,
}

pub struct StreamOrchestrator {
    config: StreamConfig,
    collaborators: Collaborators,
    location: RwLock<Option<ManifestLocation>>,
    session: RwLock<Option<Arc<StreamSession>>>,
    /// Every session shares `collaborators.video`
    video_lease: Arc<Mutex<()>>,
}

impl StreamOrchestrator {
    pub fn new(config: StreamConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            collaborators,
            location: RwLock::new(None),
            session: RwLock::new(None),
            video_lease: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Point at a new manifest. Any running session is torn down.
    #[instrument(skip(self))]
    pub async fn set_manifest_url(&self, base_url: &str, manifest_name: &str) {
        self.teardown().await;

        *self.location.write().await = Some(ManifestLocation {
            base_url: base_url.to_string(),
            manifest_name: manifest_name.to_string(),
        });
        info!(base_url, manifest_name, "Manifest location set");
    }

    /// Current session, if one has been activated
    pub async fn session(&self) -> Option<Arc<StreamSession>> {
        self.session.read().await.clone()
    }

    /// Create a session for the current location and run it in the background.
    ///
    /// A session that is still live for the same location is returned
    /// as-is with no task handle.
    #[instrument(skip(self))]
    pub async fn activate(
        &self,
    ) -> Result<(Arc<StreamSession>, Option<JoinHandle<Result<SessionState>>>)> {
        let location = self
            .location
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::InvalidConfig("manifest location is not set".to_string()))?;

        let mut current = self.session.write().await;
        if let Some(session) = current.as_ref() {
            if !session.is_closed().await {
                return Ok((session.clone(), None));
            }
        }

        let session = Arc::new(
            StreamSession::new(
                self.config.clone(),
                location.base_url,
                location.manifest_name,
                self.collaborators.clone(),
            )
            .with_video_lease(self.video_lease.clone()),
        );
        *current = Some(session.clone());
        drop(current);

        info!(session_id = %session.id(), "Session activated");
        let handle = session.clone().spawn();

        Ok((session, Some(handle)))
    }

    /// Activate and wait for the session to settle
    pub async fn run(&self) -> Result<(Arc<StreamSession>, SessionState)> {
        let (session, handle) = self.activate().await?;
        let state = match handle {
            Some(handle) => handle
                .await
                .map_err(|e| Error::Internal(format!("session task failed: {}", e)))??,
            None => session.state().await,
        };
        Ok((session, state))
    }

    /// Tear down the current session, if any
    pub async fn teardown(&self) {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            session.teardown().await;
        }
    }
}
