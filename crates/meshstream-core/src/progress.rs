//! Shared load progress
//!
//! A watch channel carries the [`LoadProgress`] snapshot. The loader is
//! the only writer of the mesh counters and the sync gate the only
//! writer of the texture state; anyone may subscribe.

use crate::types::{LoadProgress, TextureState};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    tx: Arc<watch::Sender<LoadProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(LoadProgress::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> LoadProgress {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadProgress> {
        self.tx.subscribe()
    }

    /// Reset the mesh counters and publish the planned total.
    ///
    /// The total is set once per session; later calls are ignored.
    pub fn begin(&self, total: usize) {
        let accepted = self.tx.send_if_modified(|p| {
            if p.total_count.is_some() {
                return false;
            }
            p.current_count = 0;
            p.mesh_loaded = false;
            p.total_count = Some(total);
            true
        });

        if !accepted {
            warn!(total, "Segment total already set for this session, ignoring");
        }
    }

    /// Count one more appended segment
    pub fn record_loaded(&self) {
        self.tx.send_modify(|p| p.current_count += 1);
    }

    /// Every planned segment has been attempted
    pub fn finish(&self) {
        self.tx.send_modify(|p| p.mesh_loaded = true);
    }

    pub fn set_texture_state(&self, state: TextureState) {
        self.tx.send_modify(|p| p.texture_state = state);
    }

    /// Wait until the segment total is known and return it. No timeout.
    pub async fn wait_for_total(&self) -> Result<usize> {
        let mut rx = self.tx.subscribe();
        let progress = rx
            .wait_for(LoadProgress::is_total_known)
            .await
            .map_err(|_| Error::SessionClosed)?;

        Ok(progress.total_count.unwrap_or_default())
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_total_is_set_once() {
        let tracker = ProgressTracker::new();
        tracker.begin(3);
        tracker.record_loaded();
        tracker.begin(5);

        let progress = tracker.snapshot();
        assert_eq!(progress.total_count, Some(3));
        assert_eq!(progress.current_count, 1);
    }

    #[tokio::test]
    async fn test_wait_for_total_blocks_until_begin() {
        let tracker = ProgressTracker::new();

        let waiter = tokio::spawn({
            let tracker = tracker.clone();
            async move { tracker.wait_for_total().await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        tracker.begin(7);
        assert_eq!(waiter.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_wait_for_total_when_already_known() {
        let tracker = ProgressTracker::new();
        tracker.begin(0);
        assert_eq!(tracker.wait_for_total().await.unwrap(), 0);
    }

    #[test]
    fn test_unrelated_updates_keep_waiter_pending() {
        let tracker = ProgressTracker::new();
        let mut wait = task::spawn(tracker.wait_for_total());
        assert_pending!(wait.poll());

        tracker.set_texture_state(TextureState::Matched);
        assert!(wait.is_woken());
        assert_pending!(wait.poll());

        tracker.begin(4);
        assert_eq!(assert_ready!(wait.poll()).unwrap(), 4);
    }
}
