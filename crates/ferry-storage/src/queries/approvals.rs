// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pending-approval operations.
//!
//! The status column only ever moves out of `pending`. The transition is a
//! compare-and-set on the current status, so two resolvers racing on the
//! same item see exactly one winner even across processes.

use std::str::FromStr;

use ferry_core::FerryError;
use ferry_core::types::{ApprovalStatus, ChatId, MessageId, MessageRef, PendingApproval, TaskId};
use rusqlite::{Row, params};

use crate::database::{Database, column_error, map_tr_err};

fn pending_from_row(row: &Row<'_>) -> rusqlite::Result<PendingApproval> {
    let status: String = row.get(5)?;
    Ok(PendingApproval {
        id: row.get(0)?,
        task_id: TaskId(row.get(1)?),
        source: MessageRef::new(ChatId(row.get(2)?), MessageId(row.get(3)?)),
        payload: row.get(4)?,
        status: ApprovalStatus::from_str(&status).map_err(|e| column_error(5, e))?,
        created_at: row.get(6)?,
    })
}

pub async fn insert_pending(db: &Database, pending: &PendingApproval) -> Result<(), FerryError> {
    let pending = pending.clone();
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT INTO pending_approvals
                    (id, task_id, source_chat_id, source_message_id, payload, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    pending.id,
                    pending.task_id.0,
                    pending.source.chat_id.0,
                    pending.source.message_id.0,
                    pending.payload,
                    pending.status.to_string(),
                    pending.created_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_pending(db: &Database, id: &str) -> Result<Option<PendingApproval>, FerryError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<PendingApproval>, rusqlite::Error> {
            let result = conn.query_row(
                "SELECT id, task_id, source_chat_id, source_message_id, payload, status, created_at
                 FROM pending_approvals WHERE id = ?1",
                params![id],
                pending_from_row,
            );
            match result {
                Ok(pending) => Ok(Some(pending)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// List approvals, oldest first, optionally filtered by status.
pub async fn list_pending(
    db: &Database,
    status: Option<ApprovalStatus>,
) -> Result<Vec<PendingApproval>, FerryError> {
    let status = status.map(|s| s.to_string());
    db.connection()
        .call(move |conn| -> Result<Vec<PendingApproval>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, source_chat_id, source_message_id, payload, status, created_at
                 FROM pending_approvals
                 WHERE ?1 IS NULL OR status = ?1
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt
                .query_map(params![status], pending_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a pending item to a terminal status. Returns `true` if this call won.
pub async fn transition_pending(
    db: &Database,
    id: &str,
    to: ApprovalStatus,
) -> Result<bool, FerryError> {
    if !to.is_terminal() {
        return Err(FerryError::Validation(format!(
            "approval {id} cannot transition back to {to}"
        )));
    }
    let id = id.to_string();
    let to = to.to_string();
    db.connection()
        .call(move |conn| -> Result<bool, rusqlite::Error> {
            let changed = conn.execute(
                "UPDATE pending_approvals
                 SET status = ?1, resolved_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'pending'",
                params![to, id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}
