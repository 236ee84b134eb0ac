//! In-memory call session store
//!
//! Sessions are keyed by correlation id. The map lock is only held to find,
//! insert or evict an entry; each session has its own mutex which callers
//! hold for the whole handling of one event, so deliveries for the same call
//! are serialized while different calls proceed in parallel.

use crate::domain::call::session::CallSession;
use crate::domain::shared::value_objects::{CorrelationId, ServerCallId};
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Shared handle to one call's session
pub type SessionHandle = Arc<Mutex<CallSession>>;

/// Recording locations kept for download
const MAX_TRACKED_RECORDINGS: usize = 256;

/// Correlation ids of evicted calls remembered to drop their late events
const MAX_TOMBSTONES: usize = 1024;

/// Recording storage locations, independent of session lifetime
#[derive(Debug, Default)]
struct RecordingIndex {
    by_server_call: HashMap<ServerCallId, String>,
    order: VecDeque<ServerCallId>,
    latest: Option<String>,
}

impl RecordingIndex {
    fn record(&mut self, server_call_id: Option<ServerCallId>, location: String) {
        if let Some(server_call_id) = server_call_id {
            if self
                .by_server_call
                .insert(server_call_id.clone(), location.clone())
                .is_none()
            {
                self.order.push_back(server_call_id);
            }
            while self.order.len() > MAX_TRACKED_RECORDINGS {
                if let Some(oldest) = self.order.pop_front() {
                    self.by_server_call.remove(&oldest);
                }
            }
        }
        self.latest = Some(location);
    }
}

/// Recently evicted calls, oldest first
#[derive(Debug, Default)]
struct Tombstones {
    ids: HashSet<CorrelationId>,
    order: VecDeque<CorrelationId>,
}

impl Tombstones {
    fn bury(&mut self, correlation_id: CorrelationId) {
        if self.ids.insert(correlation_id.clone()) {
            self.order.push_back(correlation_id);
        }
        while self.order.len() > MAX_TOMBSTONES {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<CorrelationId, SessionHandle>>,
    ended: RwLock<Tombstones>,
    recordings: RwLock<RecordingIndex>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ended: RwLock::new(Tombstones::default()),
            recordings: RwLock::new(RecordingIndex::default()),
        }
    }

    /// Insert a session unless one already exists for its correlation id.
    ///
    /// Returns the stored handle and whether it was newly inserted, or `None`
    /// when the call was already evicted.
    pub async fn insert(&self, session: CallSession) -> Option<(SessionHandle, bool)> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(session.correlation_id()) {
            return Some((existing.clone(), false));
        }
        if self.ended.read().await.ids.contains(session.correlation_id()) {
            debug!(correlation_id = %session.correlation_id(), "Session for an ended call not created");
            return None;
        }

        let correlation_id = session.correlation_id().clone();
        let handle = Arc::new(Mutex::new(session));
        sessions.insert(correlation_id.clone(), handle.clone());
        debug!(correlation_id = %correlation_id, "Session created");
        Some((handle, true))
    }

    pub async fn get(&self, correlation_id: &CorrelationId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(correlation_id).cloned()
    }

    /// Remove a session; returns false if it was already gone.
    ///
    /// The correlation id is remembered so late events for the call can be
    /// recognized with [`SessionStore::has_ended`].
    pub async fn evict(&self, correlation_id: &CorrelationId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(correlation_id).is_some();
        if removed {
            self.ended.write().await.bury(correlation_id.clone());
            debug!(correlation_id = %correlation_id, "Session evicted");
        }
        removed
    }

    /// Whether the call was evicted recently
    pub async fn has_ended(&self, correlation_id: &CorrelationId) -> bool {
        let ended = self.ended.read().await;
        ended.ids.contains(correlation_id)
    }

    /// Most recently active session matching `predicate`.
    ///
    /// Sessions are locked one at a time after the map lock is released.
    pub async fn most_recent<F>(&self, predicate: F) -> Option<(CorrelationId, SessionHandle)>
    where
        F: Fn(&CallSession) -> bool,
    {
        let snapshot = self.snapshot().await;

        let mut best: Option<(chrono::DateTime<Utc>, CorrelationId, SessionHandle)> = None;
        for (correlation_id, handle) in snapshot {
            let session = handle.lock().await;
            if !predicate(&session) {
                continue;
            }
            let last_activity = *session.last_activity();
            drop(session);

            if best
                .as_ref()
                .map_or(true, |(current, _, _)| last_activity > *current)
            {
                best = Some((last_activity, correlation_id, handle));
            }
        }

        best.map(|(_, correlation_id, handle)| (correlation_id, handle))
    }

    /// Evict sessions idle for longer than `max_idle`; busy sessions are skipped
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let max_idle = match chrono::Duration::from_std(max_idle) {
            Ok(max_idle) => max_idle,
            Err(_) => return 0,
        };
        let cutoff = Utc::now() - max_idle;
        let is_stale = |handle: &SessionHandle| {
            handle
                .try_lock()
                .map_or(false, |session| *session.last_activity() < cutoff)
        };

        let stale: Vec<CorrelationId> = self
            .snapshot()
            .await
            .into_iter()
            .filter(|(_, handle)| is_stale(handle))
            .map(|(correlation_id, _)| correlation_id)
            .collect();

        let mut evicted = 0;
        if !stale.is_empty() {
            // Re-checked under the map lock; a delivery may have taken the
            // session since the scan
            let mut sessions = self.sessions.write().await;
            let mut ended = self.ended.write().await;
            for correlation_id in stale {
                if sessions.get(&correlation_id).map_or(false, |handle| is_stale(handle)) {
                    sessions.remove(&correlation_id);
                    ended.bury(correlation_id);
                    evicted += 1;
                }
            }
        }

        if evicted > 0 {
            info!("Swept {} idle call sessions", evicted);
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remember where a finished recording is stored
    pub async fn record_location(&self, server_call_id: Option<ServerCallId>, location: String) {
        let mut recordings = self.recordings.write().await;
        recordings.record(server_call_id, location);
    }

    pub async fn latest_recording_location(&self) -> Option<String> {
        let recordings = self.recordings.read().await;
        recordings.latest.clone()
    }

    pub async fn recording_location(&self, server_call_id: &ServerCallId) -> Option<String> {
        let recordings = self.recordings.read().await;
        recordings.by_server_call.get(server_call_id).cloned()
    }

    async fn snapshot(&self) -> Vec<(CorrelationId, SessionHandle)> {
        let sessions = self.sessions.read().await;
        sessions
            .iter()
            .map(|(id, handle)| (id.clone(), handle.clone()))
            .collect()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
