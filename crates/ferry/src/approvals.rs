// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ferry approvals` subcommands.

use std::sync::Arc;

use ferry_core::types::{ApprovalStatus, PendingApproval};
use ferry_core::{FerryError, Store};
use ferry_relay::approval::{ApprovalQueue, Resolution};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApprovalRow {
    pub id: String,
    pub task_id: i64,
    pub source: String,
    pub status: String,
    pub created_at: String,
}

impl From<&PendingApproval> for ApprovalRow {
    fn from(p: &PendingApproval) -> Self {
        Self {
            id: p.id.clone(),
            task_id: p.task_id.0,
            source: p.source.to_string(),
            status: p.status.to_string(),
            created_at: p.created_at.clone(),
        }
    }
}

/// Lists approvals, only pending ones unless `all` is set.
pub async fn run_list(store: &dyn Store, all: bool, json: bool) -> Result<(), FerryError> {
    let filter = (!all).then_some(ApprovalStatus::Pending);
    let rows: Vec<ApprovalRow> = store
        .list_pending(filter)
        .await?
        .iter()
        .map(ApprovalRow::from)
        .collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }
    if rows.is_empty() {
        println!("no approvals");
        return Ok(());
    }
    for row in &rows {
        println!(
            "{}  task {:<5} {:<9} {}  {}",
            row.id, row.task_id, row.status, row.source, row.created_at
        );
    }
    Ok(())
}

/// Rejects a held message as the local operator.
///
/// Returns the status the item ended in.
pub async fn reject(store: Arc<dyn Store>, id: &str) -> Result<ApprovalStatus, FerryError> {
    let queue = ApprovalQueue::new(store, None);
    match queue.resolve(None, id, false).await? {
        Resolution::Rejected { .. } => Ok(ApprovalStatus::Rejected),
        Resolution::AlreadyResolved(status) => Ok(status),
        Resolution::Approved { .. } => Err(FerryError::Internal(
            "reject resolved to approved".to_string(),
        )),
    }
}

/// Run the `ferry approvals reject` command.
pub async fn run_reject(store: Arc<dyn Store>, id: &str) -> Result<(), FerryError> {
    match reject(store, id).await? {
        ApprovalStatus::Rejected => println!("{id}: rejected"),
        status => println!("{id}: already {status}, nothing to do"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::types::UserId;
    use ferry_relay::filter::FilterFlags;
    use ferry_test_utils::{MemoryStore, MessageBuilder, TaskBuilder};

    async fn held(store: &Arc<MemoryStore>) -> String {
        let task = TaskBuilder::new(UserId(1), "-100", &["-200"])
            .id(5)
            .settings(|s| s.forwarding.manual_approval = true)
            .build();
        store.save_task(&task).await.unwrap();
        let queue = ApprovalQueue::new(store.clone(), None);
        queue
            .submit(
                &task,
                &MessageBuilder::text(-100, 3, "review me").build(),
                FilterFlags::default(),
                false,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reject_marks_item_once() {
        let store = Arc::new(MemoryStore::new());
        let id = held(&store).await;

        assert_eq!(
            reject(store.clone(), &id).await.unwrap(),
            ApprovalStatus::Rejected
        );
        assert_eq!(
            reject(store.clone(), &id).await.unwrap(),
            ApprovalStatus::Rejected
        );
        let pending = store
            .list_pending(Some(ApprovalStatus::Pending))
            .await
            .unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn reject_unknown_id_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = reject(store, "missing").await.unwrap_err();
        assert!(matches!(err, FerryError::NotFound { kind: "approval", .. }));
    }

    #[tokio::test]
    async fn rows_carry_source_and_status() {
        let store = Arc::new(MemoryStore::new());
        held(&store).await;
        let all = store.list_pending(None).await.unwrap();
        let row = ApprovalRow::from(&all[0]);
        assert_eq!(row.task_id, 5);
        assert_eq!(row.status, "pending");
        assert_eq!(row.source, "-100/3");
    }
}
