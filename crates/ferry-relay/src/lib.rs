// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay engine for the Ferry message forwarder.
//!
//! The [`Relay`] is the central coordinator that:
//! - Keeps one platform session per authenticated user and heals it
//! - Routes every inbound message through the user's matching tasks
//! - Filters, transforms and delivers to each target independently
//! - Holds messages for manual approval and replays them once approved
//! - Mirrors source edits and deletions onto delivered copies

pub mod album;
pub mod approval;
pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod filter;
pub mod media_cache;
pub mod post_action;
pub mod session;
pub mod shutdown;
pub mod sync;
pub mod task_index;
pub mod transform;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use ferry_config::model::FerryConfig;
use ferry_core::types::{ResolveOutcome, UserId};
use ferry_core::{
    ApprovalHandler, ChatClientFactory, FerryError, MediaProcessor, Notifier, Store, Translator,
};

pub use approval::{ApprovalQueue, Resolution};
pub use dispatcher::Dispatcher;
pub use engine::{DeliveryReport, ForwardingEngine};
pub use session::{InboundHandler, SessionContext, SessionManager};
pub use sync::{SyncCoordinator, SyncReport};
pub use task_index::TaskIndex;

use crate::shutdown::{install_signal_handler, with_grace};

/// External collaborators the relay is built from.
pub struct Collaborators {
    pub store: Arc<dyn Store>,
    pub clients: Arc<dyn ChatClientFactory>,
    pub processor: Arc<dyn MediaProcessor>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub translator: Option<Arc<dyn Translator>>,
}

/// Wires sessions, the dispatcher and the forwarding engine together.
pub struct Relay {
    sessions: Arc<SessionManager>,
    engine: Arc<ForwardingEngine>,
    store: Arc<dyn Store>,
    shutdown_grace: Duration,
}

impl Relay {
    pub fn new(config: &FerryConfig, parts: Collaborators) -> Arc<Self> {
        let tasks = Arc::new(TaskIndex::new(Arc::clone(&parts.store)));
        let engine = Arc::new(ForwardingEngine::new(
            config,
            tasks,
            Arc::clone(&parts.store),
            parts.processor,
            parts.notifier.clone(),
            parts.translator,
        ));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&engine)));
        let sessions = Arc::new(SessionManager::new(
            parts.clients,
            Arc::clone(&parts.store),
            parts.notifier,
            dispatcher,
            config.session.clone(),
        ));
        info!(relay_name = config.relay.name.as_str(), "relay initialized");
        Arc::new(Self {
            sessions,
            engine,
            store: parts.store,
            shutdown_grace: Duration::from_secs(config.relay.shutdown_grace_secs),
        })
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn engine(&self) -> &Arc<ForwardingEngine> {
        &self.engine
    }

    /// Starts a session for every user with a valid credential.
    ///
    /// Returns the number of sessions that came up.
    pub async fn start_sessions(&self) -> Result<usize, FerryError> {
        let credentials = self.store.valid_credentials().await?;
        let total = credentials.len();
        let results = join_all(
            credentials
                .iter()
                .map(|(user, credential)| self.sessions.start(*user, credential)),
        )
        .await;

        let mut started = 0;
        for ((user, _), result) in credentials.iter().zip(results) {
            match result {
                Ok(_) => started += 1,
                Err(e) => warn!(user_id = %user, error = %e, "session failed to start"),
            }
        }
        info!(started, total, "sessions started");
        Ok(started)
    }

    /// Re-reads `user`'s tasks after they were changed externally.
    pub async fn refresh_tasks(&self, user: UserId) -> Result<usize, FerryError> {
        let ctx = self
            .sessions
            .context(user)
            .await
            .ok_or_else(|| FerryError::NotFound {
                kind: "session",
                id: user.to_string(),
            })?;
        self.engine.tasks().refresh(user, ctx.client.as_ref()).await
    }

    /// Runs until `cancel` fires or the process receives SIGINT/SIGTERM.
    pub async fn run_until_signal(
        self: Arc<Self>,
        cancel: &CancellationToken,
    ) -> Result<(), FerryError> {
        let token = install_signal_handler(cancel);
        self.run(token).await
    }

    /// Runs until `cancel` fires, then tears everything down.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) -> Result<(), FerryError> {
        self.start_sessions().await?;
        let monitor = tokio::spawn(Arc::clone(&self.sessions).run_health_monitor(cancel.clone()));

        cancel.cancelled().await;
        info!("shutting down relay");
        self.engine.albums().shutdown();
        self.engine.post_actions().shutdown();
        let sessions = Arc::clone(&self.sessions);
        with_grace(self.shutdown_grace, async move {
            sessions.shutdown().await;
        })
        .await;
        monitor.abort();

        if let Err(e) = self.store.shutdown().await {
            warn!(error = %e, "store shutdown failed");
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalHandler for Relay {
    async fn resolve_approval(
        &self,
        actor: UserId,
        id: &str,
        approved: bool,
    ) -> Result<ResolveOutcome, FerryError> {
        // Approving replays delivery through the owner's session, so it
        // must be online before the item is marked.
        let ctx = if approved {
            let ctx = self.sessions.context(actor).await.ok_or_else(|| {
                FerryError::network(format!("session of user {actor} is offline"))
            })?;
            Some(ctx)
        } else {
            None
        };

        match self.engine.approvals().resolve(Some(actor), id, approved).await? {
            Resolution::AlreadyResolved(status) => Ok(ResolveOutcome::AlreadyResolved(status)),
            Resolution::Rejected { pending } => Ok(ResolveOutcome::Resolved(pending.status)),
            Resolution::Approved {
                pending,
                task,
                payload,
            } => {
                let routed = self.engine.tasks().task(task.owner, task.id);
                match (ctx, routed) {
                    (Some(ctx), Some(routed)) => {
                        let report = self.engine.deliver_approved(&ctx, &routed, &payload).await;
                        info!(
                            approval_id = %id,
                            delivered = report.delivered,
                            failed = report.failed,
                            "approved message delivered"
                        );
                    }
                    _ => warn!(
                        approval_id = %id,
                        task_id = %task.id,
                        "task no longer active, approved message not delivered"
                    ),
                }
                Ok(ResolveOutcome::Resolved(pending.status))
            }
        }
    }
}
