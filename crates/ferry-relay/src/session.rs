// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user platform sessions and their health monitor.
//!
//! Each session owns one worker task that drains the client's event stream
//! and hands events to the [`InboundHandler`] one at a time, which keeps a
//! user's messages in order while different users run in parallel.
//!
//! Lifecycle:
//! - `start` serializes on a per-user lock, tears down any stale session,
//!   connects with bounded retries, verifies authorization and only then
//!   publishes the session.
//! - The health monitor checks every session on a fixed interval and
//!   reconnects failed ones with progressive backoff, honoring an exact
//!   platform wait when one was reported.
//! - An authentication failure is terminal: the session is dropped, the
//!   credential invalidated, and the owner notified. No reconnect follows
//!   until the user signs in again.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ferry_config::model::SessionConfig;
use ferry_core::types::{ChatEvent, Credential, UserId};
use ferry_core::{ChatClient, ChatClientFactory, FerryError, Notifier, Store};

/// What a handler needs to act on behalf of one session.
#[derive(Clone)]
pub struct SessionContext {
    pub user: UserId,
    pub client: Arc<dyn ChatClient>,
}

impl SessionContext {
    pub fn new(user: UserId, client: Arc<dyn ChatClient>) -> Self {
        Self { user, client }
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.user)
            .field("client", &self.client.name())
            .finish()
    }
}

/// Consumes the events of every session.
#[async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    /// Called once a session is connected and authorized, before any event.
    async fn on_session_started(&self, ctx: &SessionContext) -> Result<(), FerryError>;

    /// Handles one event. Called sequentially per session.
    async fn handle(&self, ctx: &SessionContext, event: ChatEvent);

    /// Called after a session was torn down for good.
    async fn on_session_ended(&self, _user: UserId) {}
}

struct Session {
    ctx: SessionContext,
    cancel: CancellationToken,
    /// Set when the event stream ended on its own.
    closed: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Stops the worker and disconnects. Returns the worker to await.
    async fn stop(&self) -> Option<JoinHandle<()>> {
        self.cancel.cancel();
        if let Err(e) = self.ctx.client.disconnect().await {
            debug!(user_id = %self.ctx.user, error = %e, "disconnect failed");
        }
        self.worker.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Backoff {
    failures: u32,
    /// Exact wait reported by the platform for the next attempt.
    next_wait: Option<Duration>,
}

/// Owns one session per authenticated user.
pub struct SessionManager {
    factory: Arc<dyn ChatClientFactory>,
    store: Arc<dyn Store>,
    notifier: Option<Arc<dyn Notifier>>,
    handler: Arc<dyn InboundHandler>,
    config: SessionConfig,
    sessions: RwLock<HashMap<UserId, Arc<Session>>>,
    start_locks: DashMap<UserId, Arc<tokio::sync::Mutex<()>>>,
    backoff: DashMap<UserId, Backoff>,
    reconnecting: Mutex<HashSet<UserId>>,
    cancel: CancellationToken,
}

impl SessionManager {
    pub fn new(
        factory: Arc<dyn ChatClientFactory>,
        store: Arc<dyn Store>,
        notifier: Option<Arc<dyn Notifier>>,
        handler: Arc<dyn InboundHandler>,
        config: SessionConfig,
    ) -> Self {
        Self {
            factory,
            store,
            notifier,
            handler,
            config,
            sessions: RwLock::new(HashMap::new()),
            start_locks: DashMap::new(),
            backoff: DashMap::new(),
            reconnecting: Mutex::new(HashSet::new()),
            cancel: CancellationToken::new(),
        }
    }

    fn reconnecting(&self) -> MutexGuard<'_, HashSet<UserId>> {
        self.reconnecting.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Starts (or restarts) `user`'s session.
    pub async fn start(
        &self,
        user: UserId,
        credential: &Credential,
    ) -> Result<SessionContext, FerryError> {
        let lock = Arc::clone(self.start_locks.entry(user).or_default().value());
        let _guard = lock.lock().await;
        if self.cancel.is_cancelled() {
            return Err(FerryError::Internal("session manager is shut down".into()));
        }

        let stale = self.sessions.write().await.remove(&user);
        if let Some(stale) = stale {
            debug!(user_id = %user, "replacing stale session");
            if let Some(worker) = stale.stop().await {
                worker.abort();
            }
        }
        if self.sessions.read().await.len() >= self.config.max_sessions {
            return Err(FerryError::Validation(format!(
                "session limit of {} reached",
                self.config.max_sessions
            )));
        }

        let client = self.factory.create(user);
        let ctx = SessionContext::new(user, Arc::clone(&client));
        let events = match self.open(&ctx, credential).await {
            Ok(events) => events,
            Err(e) => {
                if let Err(de) = client.disconnect().await {
                    debug!(user_id = %user, error = %de, "disconnect after failed start");
                }
                if e.is_terminal_auth() {
                    self.terminate(user, &e).await;
                } else if let Err(se) = self
                    .store
                    .set_session_health(user, false, Some(&e.to_string()))
                    .await
                {
                    warn!(user_id = %user, error = %se, "failed to record session health");
                }
                return Err(e);
            }
        };

        let cancel = self.cancel.child_token();
        let closed = Arc::new(AtomicBool::new(false));
        let worker = tokio::spawn(run_worker(
            ctx.clone(),
            events,
            Arc::clone(&self.handler),
            cancel.clone(),
            Arc::clone(&closed),
        ));
        let session = Arc::new(Session {
            ctx: ctx.clone(),
            cancel,
            closed,
            worker: Mutex::new(Some(worker)),
        });
        // Shutdown cancels before draining under this lock, so a session that
        // connected meanwhile is either drained by it or never published.
        let published = {
            let mut sessions = self.sessions.write().await;
            let live = !self.cancel.is_cancelled();
            if live {
                sessions.insert(user, Arc::clone(&session));
            }
            live
        };
        if !published {
            debug!(user_id = %user, "shut down while connecting, dropping session");
            if let Some(worker) = session.stop().await {
                worker.abort();
            }
            return Err(FerryError::Internal("session manager is shut down".into()));
        }
        if let Err(e) = self.store.set_session_health(user, true, None).await {
            warn!(user_id = %user, error = %e, "failed to record session health");
        }
        info!(user_id = %user, "session started");
        Ok(ctx)
    }

    /// Connects, verifies authorization and runs the start hook.
    async fn open(
        &self,
        ctx: &SessionContext,
        credential: &Credential,
    ) -> Result<mpsc::Receiver<ChatEvent>, FerryError> {
        self.connect_with_retry(ctx, credential).await?;
        if !ctx.client.is_authorized().await? {
            return Err(FerryError::Auth {
                message: "session is not authorized".into(),
            });
        }
        let events = ctx.client.events().await?;
        self.handler.on_session_started(ctx).await?;
        Ok(events)
    }

    async fn connect_with_retry(
        &self,
        ctx: &SessionContext,
        credential: &Credential,
    ) -> Result<(), FerryError> {
        let attempts = self.config.connect_attempts.max(1);
        let mut attempt = 0;
        loop {
            match ctx.client.connect(credential).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if e.is_terminal_auth() || !e.is_retryable() || attempt >= attempts {
                        return Err(e);
                    }
                    let wait = self.wait_after(&e, attempt - 1);
                    warn!(
                        user_id = %ctx.user,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "connect failed, retrying"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Delay before retry `attempt` (zero-based) after `error`.
    fn wait_after(&self, error: &FerryError, attempt: u32) -> Duration {
        match error.retry_after() {
            Some(wait) => wait + self.config.rate_limit_buffer(),
            None => self.backoff_delay(attempt),
        }
    }

    fn backoff_delay(&self, failures: u32) -> Duration {
        self.config
            .backoff_base()
            .saturating_mul(2u32.saturating_pow(failures))
            .min(self.config.backoff_max())
    }

    /// Drops the session for good after an authentication failure.
    async fn terminate(&self, user: UserId, cause: &FerryError) {
        error!(user_id = %user, error = %cause, "credential rejected, session terminated");
        let session = self.sessions.write().await.remove(&user);
        if let Some(session) = session {
            let _ = session.stop().await;
        }
        self.backoff.remove(&user);
        let detail = cause.to_string();
        if let Err(e) = self.store.set_session_health(user, false, Some(&detail)).await {
            warn!(user_id = %user, error = %e, "failed to record session health");
        }
        if let Err(e) = self.store.invalidate_credential(user).await {
            warn!(user_id = %user, error = %e, "failed to invalidate credential");
        }
        if let Some(notifier) = &self.notifier {
            let text = format!(
                "Your session was signed out ({detail}). Sign in again to resume forwarding."
            );
            if let Err(e) = notifier.notify_failure(user, &text).await {
                warn!(user_id = %user, error = %e, "failed to notify session owner");
            }
        }
        self.handler.on_session_ended(user).await;
    }

    /// Whether `user` has a live, authorized session.
    ///
    /// A session found unauthorized is terminated as a side effect.
    pub async fn health_check(&self, user: UserId) -> bool {
        let session = self.sessions.read().await.get(&user).cloned();
        let Some(session) = session else {
            return false;
        };
        let failure = if session.closed.load(Ordering::SeqCst) {
            FerryError::network("event stream closed")
        } else {
            match session.ctx.client.is_authorized().await {
                Ok(true) => return true,
                Ok(false) => FerryError::Auth {
                    message: "session is no longer authorized".into(),
                },
                Err(e) => e,
            }
        };
        if failure.is_terminal_auth() {
            self.terminate(user, &failure).await;
        } else {
            warn!(user_id = %user, error = %failure, "session unhealthy");
            if let Err(e) = self
                .store
                .set_session_health(user, false, Some(&failure.to_string()))
                .await
            {
                warn!(user_id = %user, error = %e, "failed to record session health");
            }
        }
        false
    }

    /// One reconnect round for `user`, after the current backoff delay.
    pub async fn reconnect(&self, user: UserId) -> Result<(), FerryError> {
        let state = self.backoff.get(&user).map(|b| *b).unwrap_or_default();
        let delay = state
            .next_wait
            .unwrap_or_else(|| self.backoff_delay(state.failures));
        info!(
            user_id = %user,
            failures = state.failures,
            delay_ms = delay.as_millis() as u64,
            "reconnecting session"
        );
        tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(FerryError::Internal("session manager is shut down".into()));
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let Some(credential) = self.store.get_credential(user).await? else {
            self.backoff.remove(&user);
            return Err(FerryError::NotFound {
                kind: "credential",
                id: user.to_string(),
            });
        };
        match self.start(user, &credential).await {
            Ok(_) => {
                self.backoff.remove(&user);
                Ok(())
            }
            Err(e) => {
                if !e.is_terminal_auth() {
                    let mut entry = self.backoff.entry(user).or_default();
                    entry.failures = entry.failures.saturating_add(1);
                    entry.next_wait = e.retry_after().map(|w| w + self.config.rate_limit_buffer());
                }
                Err(e)
            }
        }
    }

    fn spawn_reconnect(self: &Arc<Self>, user: UserId) {
        if !self.reconnecting().insert(user) {
            return;
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let result = manager.reconnect(user).await;
            manager.reconnecting().remove(&user);
            if let Err(e) = result {
                warn!(user_id = %user, error = %e, "reconnect failed");
            }
        });
    }

    /// Checks every session once and schedules reconnects where needed.
    pub async fn check_all(self: &Arc<Self>) {
        let users: Vec<UserId> = self.sessions.read().await.keys().copied().collect();
        let mut unhealthy = Vec::new();
        for user in users {
            if !self.health_check(user).await {
                unhealthy.push(user);
            }
        }

        let valid: HashSet<UserId> = match self.store.valid_credentials().await {
            Ok(list) => list.into_iter().map(|(user, _)| user).collect(),
            Err(e) => {
                warn!(error = %e, "failed to list credentials");
                return;
            }
        };
        let live: HashSet<UserId> = self.sessions.read().await.keys().copied().collect();
        for user in valid {
            if unhealthy.contains(&user) || !live.contains(&user) {
                self.spawn_reconnect(user);
            }
        }
    }

    /// Runs health checks every `health_interval` until `cancel` fires.
    pub async fn run_health_monitor(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.health_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        info!(interval_secs = self.config.health_interval_secs, "health monitor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => self.check_all().await,
            }
        }
        debug!("health monitor stopped");
    }

    /// The context of `user`'s live session.
    pub async fn context(&self, user: UserId) -> Option<SessionContext> {
        self.sessions.read().await.get(&user).map(|s| s.ctx.clone())
    }

    pub async fn active_users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.sessions.read().await.keys().copied().collect();
        users.sort();
        users
    }

    /// Stops every session and waits for their workers.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let sessions: Vec<Arc<Session>> =
            self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            if let Some(worker) = session.stop().await {
                if let Err(e) = worker.await {
                    if !e.is_cancelled() {
                        warn!(user_id = %session.ctx.user, error = %e, "session worker panicked");
                    }
                }
            }
        }
        info!("all sessions stopped");
    }
}

async fn run_worker(
    ctx: SessionContext,
    mut events: mpsc::Receiver<ChatEvent>,
    handler: Arc<dyn InboundHandler>,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => handler.handle(&ctx, event).await,
                None => {
                    warn!(user_id = %ctx.user, "event stream closed");
                    closed.store(true, Ordering::SeqCst);
                    break;
                }
            }
        }
    }
    debug!(user_id = %ctx.user, "session worker stopped");
}
