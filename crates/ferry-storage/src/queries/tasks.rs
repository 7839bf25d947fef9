// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Task CRUD operations.

use std::str::FromStr;

use ferry_core::FerryError;
use ferry_core::types::{ChatRef, ForwardMode, Task, TaskId, UserId};
use rusqlite::{Row, params};

use crate::database::{Database, column_error, map_tr_err};

const TASK_COLUMNS: &str = "id, owner, name, source, targets, forward_mode, active, settings";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let targets: String = row.get(4)?;
    let targets: Vec<String> = serde_json::from_str(&targets).map_err(|e| column_error(4, e))?;
    let mode: String = row.get(5)?;
    let settings: String = row.get(7)?;

    Ok(Task {
        id: TaskId(row.get(0)?),
        owner: UserId(row.get(1)?),
        name: row.get(2)?,
        source: ChatRef::new(row.get::<_, String>(3)?),
        targets: targets.into_iter().map(ChatRef::new).collect(),
        forward_mode: ForwardMode::from_str(&mode).map_err(|e| column_error(5, e))?,
        active: row.get(6)?,
        settings: serde_json::from_str(&settings).map_err(|e| column_error(7, e))?,
    })
}

/// List tasks, optionally restricted to one owner, ordered by id.
pub async fn list_tasks(db: &Database, owner: Option<UserId>) -> Result<Vec<Task>, FerryError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Task>, rusqlite::Error> {
            let tasks = match owner {
                Some(owner) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {TASK_COLUMNS} FROM tasks WHERE owner = ?1 ORDER BY id"
                    ))?;
                    stmt.query_map(params![owner.0], task_from_row)?
                        .collect::<Result<Vec<_>, _>>()?
                }
                None => {
                    let mut stmt =
                        conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id"))?;
                    stmt.query_map([], task_from_row)?
                        .collect::<Result<Vec<_>, _>>()?
                }
            };
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// Active tasks of one owner.
pub async fn active_tasks(db: &Database, owner: UserId) -> Result<Vec<Task>, FerryError> {
    db.connection()
        .call(move |conn| -> Result<Vec<Task>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE owner = ?1 AND active = 1 ORDER BY id"
            ))?;
            let tasks = stmt
                .query_map(params![owner.0], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })
        .await
        .map_err(map_tr_err)
}

/// Get a task by id.
pub async fn get_task(db: &Database, id: TaskId) -> Result<Option<Task>, FerryError> {
    db.connection()
        .call(move |conn| -> Result<Option<Task>, rusqlite::Error> {
            let result = conn.query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.0],
                task_from_row,
            );
            match result {
                Ok(task) => Ok(Some(task)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Insert a task (id `0`) or update an existing one. Returns the task id.
pub async fn save_task(db: &Database, task: &Task) -> Result<TaskId, FerryError> {
    let targets: Vec<&str> = task.targets.iter().map(|t| t.0.as_str()).collect();
    let targets = serde_json::to_string(&targets).map_err(FerryError::storage)?;
    let settings = serde_json::to_string(&task.settings).map_err(FerryError::storage)?;
    let id = task.id.0;
    let owner = task.owner.0;
    let name = task.name.clone();
    let source = task.source.0.clone();
    let mode = task.forward_mode.to_string();
    let active = task.active;

    db.connection()
        .call(move |conn| -> Result<TaskId, rusqlite::Error> {
            if id == 0 {
                conn.execute(
                    "INSERT INTO tasks (owner, name, source, targets, forward_mode, active, settings)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![owner, name, source, targets, mode, active, settings],
                )?;
                Ok(TaskId(conn.last_insert_rowid()))
            } else {
                conn.execute(
                    "INSERT INTO tasks (id, owner, name, source, targets, forward_mode, active, settings)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(id) DO UPDATE SET
                        owner = excluded.owner,
                        name = excluded.name,
                        source = excluded.source,
                        targets = excluded.targets,
                        forward_mode = excluded.forward_mode,
                        active = excluded.active,
                        settings = excluded.settings,
                        updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                    params![id, owner, name, source, targets, mode, active, settings],
                )?;
                Ok(TaskId(id))
            }
        })
        .await
        .map_err(map_tr_err)
}
