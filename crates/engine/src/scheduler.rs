// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turn scheduler — creates sessions, runs turns, drains deferred work, and
//! owns the per-session event logs.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use substrat_core::tools::DeferredWork;
use substrat_core::{Session, SessionId, SessionState};
use substrat_providers::{collect_response, AgentProvider, LoggedSession, ProviderSession};
use substrat_storage::{EventLog, LogEntry, SessionStore};

use crate::error::{MuxError, SchedulerError};
use crate::mux::SessionMux;

/// Cheaply-cloneable handle onto a scheduler's per-session log table.
///
/// Lets a caller emit events without holding a `&mut TurnScheduler` — used
/// to wire a [`substrat_core::tools::LogCallback`] into a tool handler
/// while the scheduler itself is borrowed elsewhere.
#[derive(Clone)]
pub struct LogSink(Arc<Mutex<HashMap<SessionId, EventLog>>>);

impl LogSink {
    /// Best-effort: silently does nothing if no log is registered for `id`.
    pub fn log(&self, id: SessionId, event: &str, data: Option<Value>) {
        if let Some(log) = self.0.lock().get_mut(&id) {
            let _ = log.log(event, data);
        }
    }
}

/// Owns the in-memory session cache, per-session event logs, and the
/// deferred-callback queue. Does not own the agent tree or inboxes — those
/// belong to the orchestrator that drives this scheduler.
pub struct TurnScheduler {
    store: Arc<SessionStore>,
    providers: HashMap<String, Arc<dyn AgentProvider>>,
    log_root: Option<PathBuf>,
    mux: SessionMux,
    sessions: HashMap<SessionId, Session>,
    logs: Arc<Mutex<HashMap<SessionId, EventLog>>>,
    deferred: VecDeque<DeferredWork>,
}

impl TurnScheduler {
    pub fn new(store: Arc<SessionStore>, max_slots: usize) -> Self {
        let logs: Arc<Mutex<HashMap<SessionId, EventLog>>> = Arc::new(Mutex::new(HashMap::new()));
        let logs_for_evict = logs.clone();
        let mux = SessionMux::new(store.clone(), max_slots).with_on_evict(Arc::new(
            move |id, state_size| {
                if let Some(log) = logs_for_evict.lock().get_mut(&id) {
                    let _ = log.log("suspend.result", Some(json!({"state_size": state_size})));
                }
            },
        ));
        Self {
            store,
            providers: HashMap::new(),
            log_root: None,
            mux,
            sessions: HashMap::new(),
            logs,
            deferred: VecDeque::new(),
        }
    }

    /// Root directory under which `<session-hex>/events.jsonl` logs are
    /// opened. Without one, sessions run without event logging.
    pub fn with_log_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.log_root = Some(root.into());
        self
    }

    pub fn register_provider(&mut self, provider: Arc<dyn AgentProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn mux(&self) -> &SessionMux {
        &self.mux
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Shared handle for emitting events without a `&mut TurnScheduler`.
    pub fn log_sink(&self) -> LogSink {
        LogSink(self.logs.clone())
    }

    /// Read a session's persisted event log directly from disk, bypassing
    /// the in-memory cache. Used by recovery, before a session has been
    /// restored into the scheduler.
    pub fn read_session_log(&self, id: SessionId) -> Result<Vec<LogEntry>, SchedulerError> {
        let Some(path) = self.log_path(id) else {
            return Ok(Vec::new());
        };
        Ok(substrat_storage::read_log(&path)?)
    }

    fn provider(&self, name: &str) -> Result<Arc<dyn AgentProvider>, SchedulerError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownProvider(name.to_string()))
    }

    fn log_path(&self, id: SessionId) -> Option<PathBuf> {
        self.log_root
            .as_ref()
            .map(|root| root.join(id.hex()).join("events.jsonl"))
    }

    fn open_log(&self, id: SessionId) -> Result<(), SchedulerError> {
        let Some(path) = self.log_path(id) else {
            return Ok(());
        };
        let mut context = BTreeMap::new();
        context.insert("session_id".to_string(), id.hex());
        let mut log = EventLog::new(path, context);
        log.open()?;
        self.logs.lock().insert(id, log);
        Ok(())
    }

    /// Best-effort event emission for the scheduler's own lifecycle events.
    /// Silently does nothing when no log root is configured, matching the
    /// provider-session instrumentation's own tolerant logging.
    fn emit(&self, id: SessionId, event: &str, data: Option<Value>) {
        if let Some(log) = self.logs.lock().get_mut(&id) {
            let _ = log.log(event, data);
        }
    }

    /// Emit a structured event for external callers (the orchestrator).
    /// Unlike [`Self::emit`], fails if no log exists for this identifier.
    pub fn log_event(&self, id: SessionId, event: &str, data: Option<Value>) -> Result<(), SchedulerError> {
        let mut logs = self.logs.lock();
        let log = logs.get_mut(&id).ok_or(SchedulerError::NotFound(id))?;
        log.log(event, data)?;
        Ok(())
    }

    /// Enqueue a unit of work to run after the current turn releases its
    /// mux slot.
    pub fn defer(&mut self, work: DeferredWork) {
        self.deferred.push_back(work);
    }

    async fn drain_deferred(&mut self) {
        while let Some(work) = self.deferred.pop_front() {
            work.await;
        }
    }

    /// Wrap a freshly created/restored provider session with the per-session
    /// logging decorator, if a log is registered for this session.
    fn wrap(&self, id: SessionId, raw: Box<dyn ProviderSession>) -> Result<Box<dyn ProviderSession>, SchedulerError> {
        let logs = self.logs.lock();
        match logs.get(&id) {
            Some(log) => Ok(Box::new(LoggedSession::new(raw, log.reopen()?))),
            None => Ok(raw),
        }
    }

    pub async fn create_session(
        &mut self,
        provider_name: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<Session, SchedulerError> {
        let provider = self.provider(provider_name)?;
        let mut session = Session::new(provider_name, model);
        let id = session.id;

        self.open_log(id)?;

        let raw = provider.create(model, system_prompt).await?;
        let ps = self.wrap(id, raw)?;

        self.mux.put(id, ps).await?;
        session.activate()?;
        self.store.save(&session)?;
        self.mux.release(id);

        self.sessions.insert(id, session.clone());
        self.emit(id, "session.created", None);

        Ok(session)
    }

    /// Drive one turn against an already-created session. Always releases
    /// the mux slot before returning, including on failure; deferred work is
    /// only drained when the turn succeeds.
    pub async fn send_turn(&mut self, session_id: SessionId, prompt: &str) -> Result<String, SchedulerError> {
        let mut session = self
            .sessions
            .get(&session_id)
            .cloned()
            .ok_or(SchedulerError::NotFound(session_id))?;
        let provider = self.provider(&session.provider_name)?;

        self.emit(session_id, "turn.start", Some(json!({"prompt": prompt})));

        if !self.mux.contains(session_id) {
            session = self.store.load(session_id)?;
            self.sessions.insert(session_id, session.clone());
        }

        let restored = self.acquire(&mut session, &provider).await?;
        self.sessions.insert(session_id, session.clone());
        if restored {
            self.emit(session_id, "session.restored", None);
        }

        let send_result = {
            let ps = self
                .mux
                .session_mut(session_id)
                .ok_or(SchedulerError::NotFound(session_id))?;
            ps.send(prompt).await
        };

        // Slot is released whether the send succeeded or raised.
        self.mux.release(session_id);

        let chunks = send_result?;
        let response = collect_response(chunks).await;

        self.emit(session_id, "turn.complete", Some(json!({"response": response})));
        self.drain_deferred().await;

        Ok(response)
    }

    /// `acquire` folded into the scheduler: promote an already-slotted
    /// session, or restore a suspended one through its provider. Returns
    /// whether a restore actually happened.
    async fn acquire(
        &mut self,
        session: &mut Session,
        provider: &Arc<dyn AgentProvider>,
    ) -> Result<bool, SchedulerError> {
        if self.mux.promote(session.id) {
            return Ok(false);
        }
        if session.state != SessionState::Suspended {
            return Err(MuxError::NotSuspended(session.id).into());
        }
        let raw = provider.restore(&session.provider_state).await?;
        let ps = self.wrap(session.id, raw)?;
        self.mux.put(session.id, ps).await?;
        session.activate()?;
        self.store.save(session)?;
        Ok(true)
    }

    pub async fn terminate_session(&mut self, id: SessionId) -> Result<(), SchedulerError> {
        self.mux.remove(id).await;

        let mut session = match self.sessions.get(&id) {
            Some(s) => s.clone(),
            None => self.store.load(id)?,
        };
        session.terminate()?;
        self.store.save(&session)?;
        self.sessions.remove(&id);

        if let Some(mut log) = self.logs.lock().remove(&id) {
            log.close();
        }
        Ok(())
    }

    /// Install a recovered session into the cache and open its event log,
    /// without creating a provider session. The provider session is
    /// restored lazily on the next `send_turn`.
    pub fn restore_session(&mut self, session: Session) -> Result<(), SchedulerError> {
        let id = session.id;
        self.open_log(id)?;
        self.sessions.insert(id, session);
        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
