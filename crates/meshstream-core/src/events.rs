//! Stream telemetry events
//!
//! Everything the session reports to its host goes through here:
//! - State transitions
//! - Per-segment outcomes, including skipped segments
//! - Video preparation and the sync verdict
//! - Fatal errors

use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Telemetry event types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    /// State change
    StateChange {
        from: SessionState,
        to: SessionState,
    },

    /// Manifest text retrieved
    ManifestFetched {
        url: String,
        bytes: usize,
    },

    /// Manifest turned into a plan
    PlanParsed {
        mime_type: String,
        segments: usize,
        has_video: bool,
        frame_rate_override: Option<u32>,
    },

    /// Mesh segment decoded and appended
    SegmentLoaded {
        index: usize,
        url: String,
    },

    /// Mesh segment skipped after a decode failure
    SegmentFailed {
        index: usize,
        url: String,
        reason: String,
    },

    /// Every planned segment attempted
    SegmentsComplete {
        loaded: usize,
        total: usize,
    },

    /// Video track prepared and parked on frame 0
    VideoPrepared {
        url: String,
        frame_count: u64,
    },

    /// Sync gate verdict
    SyncChecked {
        result: SyncResult,
    },

    /// Error occurred
    Error {
        code: String,
        message: String,
        fatal: bool,
    },

    /// Session torn down
    Teardown {
        state: SessionState,
    },
}

/// Event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamEventRecord {
    /// Unique event ID
    pub id: Uuid,
    /// Session ID
    pub session_id: SessionId,
    /// Timestamp
    pub timestamp: DateTime<Utc>,
    /// Sequence number
    pub sequence: u64,
    /// The event
    #[serde(flatten)]
    pub event: StreamEvent,
}

#[derive(Debug, Default)]
struct EventLog {
    next_sequence: u64,
    records: VecDeque<StreamEventRecord>,
}

/// Event emitter for one session
pub struct EventEmitter {
    session_id: SessionId,
    enabled: bool,
    /// Sequence counter and buffered records, updated together
    log: RwLock<EventLog>,
    max_buffer_size: usize,
    event_tx: broadcast::Sender<StreamEventRecord>,
}

impl EventEmitter {
    pub fn new(session_id: SessionId, config: &StreamConfig) -> Self {
        let capacity = config.event_buffer_size.max(1);
        let (event_tx, _) = broadcast::channel(capacity);

        Self {
            session_id,
            enabled: config.events_enabled,
            log: RwLock::new(EventLog::default()),
            max_buffer_size: capacity,
            event_tx,
        }
    }

    /// Subscribe to live events
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEventRecord> {
        self.event_tx.subscribe()
    }

    /// Emit an event
    pub async fn emit(&self, event: StreamEvent) {
        if !self.enabled {
            return;
        }

        // Held across numbering, buffering and publishing: buffer and
        // broadcast order always follow sequence order.
        let mut log = self.log.write().await;
        log.next_sequence += 1;

        let record = StreamEventRecord {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            timestamp: Utc::now(),
            sequence: log.next_sequence,
            event,
        };

        debug!(
            session_id = %record.session_id,
            sequence = record.sequence,
            event = ?record.event,
            "Stream event"
        );

        if log.records.len() >= self.max_buffer_size {
            log.records.pop_front();
        }
        log.records.push_back(record.clone());

        // No subscribers is fine.
        let _ = self.event_tx.send(record);
    }

    /// Get all buffered events
    pub async fn events(&self) -> Vec<StreamEventRecord> {
        self.log.read().await.records.iter().cloned().collect()
    }

    /// Take all buffered events
    pub async fn drain(&self) -> Vec<StreamEventRecord> {
        self.log.write().await.records.drain(..).collect()
    }
}
