// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pin, button attachment and auto-delete after a successful delivery.
//!
//! Deferred actions run as background tasks whose handles live in a map
//! keyed by the target message, so a later schedule replaces an in-flight
//! one and `cancel` aborts it without leaking the task.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use strum::Display;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use ferry_core::types::{MessageMapping, MessageRef};
use ferry_core::{Notifier, Store};

use crate::session::SessionContext;
use crate::task_index::RoutedTask;

/// Kind of deferred action on a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PostActionKind {
    Delete,
    AttachButtons,
}

type Key = (MessageRef, PostActionKind);

/// Tracks cancelable deferred actions per target message.
pub struct PostActionScheduler {
    handles: Mutex<HashMap<Key, (u64, JoinHandle<()>)>>,
    next_id: AtomicU64,
    store: Arc<dyn Store>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl PostActionScheduler {
    pub fn new(store: Arc<dyn Store>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            handles: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            store,
            notifier,
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<Key, (u64, JoinHandle<()>)>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs `action` after `delay`, replacing any pending action of the same
    /// kind on `target`.
    pub fn schedule<F>(
        self: &Arc<Self>,
        target: MessageRef,
        kind: PostActionKind,
        delay: Duration,
        action: F,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = (target, kind);
        let scheduler = Arc::downgrade(self);
        // Hold the lock across the spawn so the task cannot observe the map
        // before its own entry is in it.
        let mut handles = self.handles();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
            if let Some(scheduler) = scheduler.upgrade() {
                let mut handles = scheduler.handles();
                if handles.get(&key).is_some_and(|(current, _)| *current == id) {
                    handles.remove(&key);
                }
            }
        });
        if let Some((_, previous)) = handles.insert(key, (id, handle)) {
            previous.abort();
            debug!(target = %target, kind = %kind, "replaced pending post action");
        }
    }

    /// Cancels every pending action on `target`. Returns how many were cancelled.
    pub fn cancel(&self, target: MessageRef) -> usize {
        let mut handles = self.handles();
        let keys: Vec<Key> = handles.keys().filter(|(r, _)| *r == target).copied().collect();
        for key in &keys {
            if let Some((_, handle)) = handles.remove(key) {
                handle.abort();
            }
        }
        keys.len()
    }

    pub fn pending_count(&self) -> usize {
        self.handles().len()
    }

    /// Aborts every pending action.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.handles().drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "cancelling pending post actions");
        }
        for (_, (_, handle)) in drained {
            handle.abort();
        }
    }

    /// Applies the task's post-delivery options to one target's new messages.
    ///
    /// `mappings` are the messages just delivered into a single target chat,
    /// in order; the first one is pinned and receives buttons.
    pub async fn after_delivery(
        self: &Arc<Self>,
        ctx: &SessionContext,
        task: &RoutedTask,
        mappings: &[MessageMapping],
    ) {
        let Some(first) = mappings.first() else {
            return;
        };
        let forwarding = &task.task.settings.forwarding;

        if forwarding.pin {
            if let Err(e) = ctx.client.pin_message(first.target(), forwarding.pin_silent).await {
                warn!(
                    task_id = %task.id(),
                    target = %first.target_chat_id,
                    error = %e,
                    "pin failed"
                );
            }
        }

        let buttons = &task.task.settings.formatting.buttons;
        if !buttons.is_empty() {
            if let Some(notifier) = self.notifier.clone() {
                let target = first.target();
                let buttons = buttons.clone();
                let task_id = task.id();
                self.schedule(target, PostActionKind::AttachButtons, Duration::ZERO, async move {
                    if let Err(e) = notifier.attach_buttons(target, &buttons).await {
                        warn!(
                            task_id = %task_id,
                            target = %target,
                            error = %e,
                            "attaching buttons failed"
                        );
                    }
                });
            }
        }

        if let Some(secs) = forwarding.auto_delete_secs {
            for mapping in mappings {
                let mapping = *mapping;
                let client = Arc::clone(&ctx.client);
                let store = Arc::clone(&self.store);
                self.schedule(
                    mapping.target(),
                    PostActionKind::Delete,
                    Duration::from_secs(secs),
                    async move {
                        let target = mapping.target();
                        match client
                            .delete_messages(target.chat_id, &[target.message_id])
                            .await
                        {
                            Ok(()) => {
                                debug!(target = %target, "auto-deleted delivered message");
                                if let Err(e) = store.delete_mapping(&mapping).await {
                                    warn!(target = %target, error = %e, "failed to drop mapping");
                                }
                            }
                            Err(e) => warn!(target = %target, error = %e, "auto-delete failed"),
                        }
                    },
                );
            }
        }
    }
}

impl Drop for PostActionScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
