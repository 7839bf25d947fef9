// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Manual-approval queue.
//!
//! Messages of tasks in manual mode are stored as pending items and the
//! owner is asked to decide. Resolution is a compare-and-set in the store,
//! so concurrent or repeated decisions act at most once.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use ferry_core::types::{ApprovalStatus, InboundMessage, PendingApproval, Task, UserId};
use ferry_core::{FerryError, Notifier, Store};

use crate::filter::FilterFlags;
use crate::transform;

const PREVIEW_CHARS: usize = 200;

/// What is needed to replay delivery after approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalPayload {
    pub message: InboundMessage,
    pub flags: FilterFlags,
    pub global_copy: bool,
}

/// Outcome of [`ApprovalQueue::resolve`].
#[derive(Debug)]
pub enum Resolution {
    /// This call approved the item; delivery should be replayed.
    Approved {
        pending: PendingApproval,
        task: Task,
        payload: ApprovalPayload,
    },
    /// This call rejected the item.
    Rejected { pending: PendingApproval },
    /// Someone else already decided; nothing was done.
    AlreadyResolved(ApprovalStatus),
}

/// Stores held messages and resolves owner decisions.
pub struct ApprovalQueue {
    store: Arc<dyn Store>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl ApprovalQueue {
    pub fn new(store: Arc<dyn Store>, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self { store, notifier }
    }

    /// Holds `message` for `task` and asks the owner to decide.
    ///
    /// A failed notification is logged; the item stays pending and can still
    /// be resolved from the command line.
    pub async fn submit(
        &self,
        task: &Task,
        message: &InboundMessage,
        flags: FilterFlags,
        global_copy: bool,
    ) -> Result<String, FerryError> {
        let payload = ApprovalPayload {
            message: message.clone(),
            flags,
            global_copy,
        };
        let payload =
            serde_json::to_string(&payload).map_err(|e| FerryError::Internal(e.to_string()))?;
        let pending = PendingApproval {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task.id,
            source: message.reference(),
            payload,
            status: ApprovalStatus::Pending,
            created_at: Utc::now().to_rfc3339(),
        };
        self.store.insert_pending(&pending).await?;
        info!(
            task_id = %task.id,
            source = %pending.source,
            approval_id = %pending.id,
            "message held for approval"
        );

        if let Some(notifier) = &self.notifier {
            let preview = match message.text.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => transform::preview(text, PREVIEW_CHARS),
                _ => format!("[{}]", message.kind()),
            };
            if let Err(e) = notifier.notify_approval(task.owner, &pending, &preview).await {
                warn!(approval_id = %pending.id, error = %e, "approval notification failed");
            }
        }
        Ok(pending.id)
    }

    /// Moves a pending item to approved or rejected.
    ///
    /// With an `actor`, only the task's owner may decide. `None` is the
    /// operator acting locally. Deciding an already decided item is a no-op
    /// reported as [`Resolution::AlreadyResolved`].
    pub async fn resolve(
        &self,
        actor: Option<UserId>,
        id: &str,
        approved: bool,
    ) -> Result<Resolution, FerryError> {
        let pending = self
            .store
            .get_pending(id)
            .await?
            .ok_or_else(|| FerryError::NotFound {
                kind: "approval",
                id: id.to_string(),
            })?;
        let task = self
            .store
            .get_task(pending.task_id)
            .await?
            .ok_or_else(|| FerryError::NotFound {
                kind: "task",
                id: pending.task_id.to_string(),
            })?;
        if let Some(actor) = actor {
            if actor != task.owner {
                return Err(FerryError::Permission {
                    chat: pending.source.chat_id.0,
                    message: format!("user {actor} does not own task {}", task.id),
                });
            }
        }
        if pending.status.is_terminal() {
            return Ok(Resolution::AlreadyResolved(pending.status));
        }

        let to = if approved {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        if !self.store.transition_pending(id, to).await? {
            let status = self
                .store
                .get_pending(id)
                .await?
                .map_or(ApprovalStatus::Rejected, |p| p.status);
            return Ok(Resolution::AlreadyResolved(status));
        }
        info!(approval_id = %id, task_id = %task.id, status = %to, "approval resolved");

        let pending = PendingApproval {
            status: to,
            ..pending
        };
        if !approved {
            return Ok(Resolution::Rejected { pending });
        }
        let payload: ApprovalPayload = serde_json::from_str(&pending.payload)
            .map_err(|e| FerryError::Internal(format!("corrupt approval payload {id}: {e}")))?;
        Ok(Resolution::Approved {
            pending,
            task,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_test_utils::{MemoryStore, MessageBuilder, RecordingNotifier, TaskBuilder};

    async fn setup() -> (ApprovalQueue, Arc<MemoryStore>, Arc<RecordingNotifier>, Task) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let task = TaskBuilder::new(UserId(1), "-100", &["-200"]).id(3).build();
        store.save_task(&task).await.unwrap();
        let queue = ApprovalQueue::new(store.clone(), Some(notifier.clone() as Arc<dyn Notifier>));
        (queue, store, notifier, task)
    }

    #[tokio::test]
    async fn submit_stores_and_notifies_owner() {
        let (queue, store, notifier, task) = setup().await;
        let msg = MessageBuilder::text(-100, 7, "breaking news").build();
        let id = queue
            .submit(&task, &msg, FilterFlags::default(), false)
            .await
            .unwrap();

        let pending = store.get_pending(&id).await.unwrap().unwrap();
        assert_eq!(pending.status, ApprovalStatus::Pending);
        let approvals = notifier.approvals().await;
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].0, UserId(1));
        assert_eq!(approvals[0].2, "breaking news");
    }

    #[tokio::test]
    async fn second_resolve_is_a_no_op() {
        let (queue, _store, _notifier, task) = setup().await;
        let msg = MessageBuilder::text(-100, 7, "x").build();
        let id = queue.submit(&task, &msg, FilterFlags::default(), true).await.unwrap();

        match queue.resolve(Some(UserId(1)), &id, true).await.unwrap() {
            Resolution::Approved { payload, task, .. } => {
                assert_eq!(payload.message, msg);
                assert!(payload.global_copy);
                assert_eq!(task.id.0, 3);
            }
            other => panic!("expected approval, got {other:?}"),
        }
        assert!(matches!(
            queue.resolve(Some(UserId(1)), &id, false).await.unwrap(),
            Resolution::AlreadyResolved(ApprovalStatus::Approved)
        ));
    }

    #[tokio::test]
    async fn only_the_owner_may_decide() {
        let (queue, store, _notifier, task) = setup().await;
        let msg = MessageBuilder::text(-100, 7, "x").build();
        let id = queue.submit(&task, &msg, FilterFlags::default(), false).await.unwrap();

        let err = queue.resolve(Some(UserId(2)), &id, true).await.unwrap_err();
        assert!(matches!(err, FerryError::Permission { .. }));
        assert_eq!(
            store.get_pending(&id).await.unwrap().unwrap().status,
            ApprovalStatus::Pending
        );
        assert!(matches!(
            queue.resolve(None, &id, false).await.unwrap(),
            Resolution::Rejected { .. }
        ));
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (queue, ..) = setup().await;
        assert!(matches!(
            queue.resolve(None, "missing", true).await,
            Err(FerryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_resolves_act_once() {
        let (queue, _store, _notifier, task) = setup().await;
        let queue = Arc::new(queue);
        let msg = MessageBuilder::text(-100, 7, "x").build();
        let id = queue.submit(&task, &msg, FilterFlags::default(), false).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let queue = Arc::clone(&queue);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                queue.resolve(None, &id, i % 2 == 0).await.unwrap()
            }));
        }
        let mut acted = 0;
        for handle in handles {
            if !matches!(handle.await.unwrap(), Resolution::AlreadyResolved(_)) {
                acted += 1;
            }
        }
        assert_eq!(acted, 1);
    }
}
