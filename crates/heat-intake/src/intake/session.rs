//! Per-visitor wizard sessions for the hosted service.
//!
//! Each session owns one [`IntakeWizard`] behind a mutex plus its own
//! [`SubmissionPipeline`], so the in-flight gate is scoped to a visitor rather
//! than to the whole service. Sessions leave memory after a successful
//! submission or once idle past the registry's window; an idle session's draft
//! stays in its store and is picked up again when the id is reopened.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::draft::{DraftStore, FileDraftBackend, MemoryDraftBackend};
use super::events::{TracingListener, WizardSnapshot};
use super::referral::{ReferralBatch, ReferralError};
use super::submission::payload::{Provenance, SubmissionContext};
use super::submission::pipeline::{SubmissionError, SubmissionPipeline, SubmissionReceipt};
use super::submission::relay::{RelayAck, RelayTransport};
use super::wizard::IntakeWizard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| SessionError::NotFound(value.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("intake session {0} not found")]
    NotFound(String),
}

/// Hands each session its own draft slot.
pub trait DraftStoreFactory: Send + Sync {
    fn store_for(&self, session: &SessionId) -> DraftStore;
}

/// Drafts under `<root>/<session id>/`.
#[derive(Debug, Clone)]
pub struct FileDraftFactory {
    root: PathBuf,
}

impl FileDraftFactory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DraftStoreFactory for FileDraftFactory {
    fn store_for(&self, session: &SessionId) -> DraftStore {
        let dir = self.root.join(session.to_string());
        DraftStore::new(Arc::new(FileDraftBackend::new(dir)))
    }
}

/// Process-local drafts; a reopened session id sees the same backend.
#[derive(Debug, Default)]
pub struct MemoryDraftFactory {
    backends: Mutex<HashMap<SessionId, Arc<MemoryDraftBackend>>>,
}

impl MemoryDraftFactory {
    pub fn backend(&self, session: &SessionId) -> Option<Arc<MemoryDraftBackend>> {
        let guard = self.backends.lock().expect("draft factory mutex poisoned");
        guard.get(session).cloned()
    }
}

impl DraftStoreFactory for MemoryDraftFactory {
    fn store_for(&self, session: &SessionId) -> DraftStore {
        let mut guard = self.backends.lock().expect("draft factory mutex poisoned");
        let backend = guard.entry(*session).or_default().clone();
        DraftStore::new(backend)
    }
}

#[derive(Debug)]
pub struct IntakeSession {
    id: SessionId,
    wizard: Mutex<IntakeWizard>,
    pipeline: SubmissionPipeline,
    last_seen: Mutex<Instant>,
}

impl IntakeSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    fn touch(&self) {
        *self.last_seen.lock().expect("session clock mutex poisoned") = Instant::now();
    }

    /// A session with a submission pending is never idle.
    fn idle_for(&self, now: Instant) -> Option<Duration> {
        if self.is_submitting() {
            return None;
        }
        let last_seen = *self.last_seen.lock().expect("session clock mutex poisoned");
        Some(now.saturating_duration_since(last_seen))
    }

    /// Run a synchronous operation against the wizard.
    pub fn with_wizard<R>(&self, operation: impl FnOnce(&mut IntakeWizard) -> R) -> R {
        let mut guard = self.wizard.lock().expect("wizard mutex poisoned");
        operation(&mut guard)
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        self.with_wizard(|wizard| wizard.snapshot())
    }

    pub fn is_submitting(&self) -> bool {
        self.pipeline.is_in_flight()
    }

    pub async fn submit(&self, user_agent: &str) -> Result<SubmissionReceipt, SubmissionError> {
        self.pipeline.submit(&self.wizard, user_agent).await
    }
}

/// Registry of live sessions plus the shared relay wiring.
pub struct IntakeSessions {
    sessions: Mutex<HashMap<SessionId, Arc<IntakeSession>>>,
    drafts: Arc<dyn DraftStoreFactory>,
    transport: Arc<dyn RelayTransport>,
    access_key: Option<String>,
    idle_ttl: Duration,
}

impl fmt::Debug for IntakeSessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntakeSessions")
            .field("sessions", &self.len())
            .field("configured", &self.access_key.is_some())
            .field("idle_ttl", &self.idle_ttl)
            .finish_non_exhaustive()
    }
}

/// How long an untouched session stays in memory unless configured otherwise.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(30 * 60);

impl IntakeSessions {
    pub fn new(
        drafts: Arc<dyn DraftStoreFactory>,
        transport: Arc<dyn RelayTransport>,
        access_key: Option<String>,
    ) -> Self {
        let access_key = access_key.filter(|key| !key.trim().is_empty());
        Self {
            sessions: Mutex::new(HashMap::new()),
            drafts,
            transport,
            access_key,
            idle_ttl: DEFAULT_SESSION_IDLE,
        }
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = idle_ttl;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the live session for `requested`, or build one whose wizard
    /// resumes from that id's stored draft. Provenance only applies to new sessions.
    pub fn open(&self, requested: Option<SessionId>, provenance: Provenance) -> Arc<IntakeSession> {
        let id = requested.unwrap_or_else(SessionId::generate);
        let mut guard = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        self.sweep(&mut guard);
        if let Some(existing) = guard.get(&id) {
            existing.touch();
            return existing.clone();
        }

        let mut wizard = IntakeWizard::new(self.drafts.store_for(&id), provenance);
        wizard.subscribe(TracingListener {
            session: id.to_string(),
        });
        info!(session = %id, step = %wizard.step(), "intake session opened");

        let session = Arc::new(IntakeSession {
            id,
            wizard: Mutex::new(wizard),
            pipeline: SubmissionPipeline::new(self.transport.clone(), self.access_key.clone()),
            last_seen: Mutex::new(Instant::now()),
        });
        guard.insert(id, session.clone());
        session
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<IntakeSession>, SessionError> {
        let guard = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        let session = guard
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.touch();
        Ok(session)
    }

    /// Drop a session from memory, e.g. once its submission went through.
    pub fn release(&self, id: &SessionId) -> bool {
        let mut guard = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        let released = guard.remove(id).is_some();
        if released {
            info!(session = %id, "intake session released");
        }
        released
    }

    /// Drop every session idle past the window; returns how many went.
    pub fn evict_idle(&self) -> usize {
        let mut guard = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned");
        self.sweep(&mut guard)
    }

    fn sweep(&self, sessions: &mut HashMap<SessionId, Arc<IntakeSession>>) -> usize {
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| {
            session
                .idle_for(now)
                .map_or(true, |idle| idle < self.idle_ttl)
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "idle intake sessions evicted");
        }
        evicted
    }

    pub async fn submit_referrals(
        &self,
        batch: &mut ReferralBatch,
        user_agent: &str,
    ) -> Result<RelayAck, ReferralError> {
        // Each referral form post is its own form instance with its own gate.
        let pipeline = SubmissionPipeline::new(self.transport.clone(), self.access_key.clone());
        let context = SubmissionContext::now(user_agent);
        pipeline.submit_referrals(batch, &context).await
    }
}
