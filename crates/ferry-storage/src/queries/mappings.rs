// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source-to-target message mappings used for edit and delete sync.

use ferry_core::FerryError;
use ferry_core::types::{ChatId, MessageId, MessageMapping, TaskId};
use rusqlite::params;

use crate::database::{Database, map_tr_err};

/// Record a delivery. Re-inserting an existing mapping is a no-op.
pub async fn insert_mapping(db: &Database, mapping: &MessageMapping) -> Result<(), FerryError> {
    let m = *mapping;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "INSERT OR IGNORE INTO message_mappings
                    (task_id, source_chat_id, source_message_id, target_chat_id, target_message_id,
                     decorated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    m.task_id.0,
                    m.source_chat_id.0,
                    m.source_message_id.0,
                    m.target_chat_id.0,
                    m.target_message_id.0,
                    m.decorated,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All target messages a source message was delivered as, for one task.
pub async fn mappings_for_source(
    db: &Database,
    task: TaskId,
    chat: ChatId,
    message: MessageId,
) -> Result<Vec<MessageMapping>, FerryError> {
    db.connection()
        .call(move |conn| -> Result<Vec<MessageMapping>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT target_chat_id, target_message_id, decorated FROM message_mappings
                 WHERE task_id = ?1 AND source_chat_id = ?2 AND source_message_id = ?3
                 ORDER BY target_chat_id, target_message_id",
            )?;
            let rows = stmt
                .query_map(params![task.0, chat.0, message.0], |row| {
                    Ok(MessageMapping {
                        task_id: task,
                        source_chat_id: chat,
                        source_message_id: message,
                        target_chat_id: ChatId(row.get(0)?),
                        target_message_id: MessageId(row.get(1)?),
                        decorated: row.get(2)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn delete_mapping(db: &Database, mapping: &MessageMapping) -> Result<(), FerryError> {
    let m = *mapping;
    db.connection()
        .call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute(
                "DELETE FROM message_mappings
                 WHERE task_id = ?1 AND source_chat_id = ?2 AND source_message_id = ?3
                   AND target_chat_id = ?4 AND target_message_id = ?5",
                params![
                    m.task_id.0,
                    m.source_chat_id.0,
                    m.source_message_id.0,
                    m.target_chat_id.0,
                    m.target_message_id.0,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
