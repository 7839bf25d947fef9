// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ferry status` and `ferry tasks` command implementations.
//!
//! Both read the store directly, so they work whether or not a relay
//! process is running against the same database.

use ferry_core::types::{ApprovalStatus, Task, UserId};
use ferry_core::{FerryError, Store};
use serde::Serialize;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub relay: String,
    pub sessions_healthy: usize,
    pub sessions_unhealthy: usize,
    pub credentials_invalid: usize,
    pub tasks_total: usize,
    pub tasks_active: usize,
    pub pending_approvals: usize,
}

/// One row of `ferry tasks`.
#[derive(Debug, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub owner: i64,
    pub name: String,
    pub source: String,
    pub targets: Vec<String>,
    pub mode: String,
    pub active: bool,
    pub manual_approval: bool,
}

impl From<&Task> for TaskRow {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.0,
            owner: task.owner.0,
            name: task.name.clone(),
            source: task.source.to_string(),
            targets: task.targets.iter().map(ToString::to_string).collect(),
            mode: task.forward_mode.to_string(),
            active: task.active,
            manual_approval: task.settings.forwarding.manual_approval,
        }
    }
}

/// Collects session, task and approval counts from the store.
pub async fn gather_status(store: &dyn Store, relay: &str) -> Result<StatusResponse, FerryError> {
    let health = store.session_health().await?;
    let tasks = store.list_tasks(None).await?;
    let pending = store.list_pending(Some(ApprovalStatus::Pending)).await?;

    Ok(StatusResponse {
        relay: relay.to_string(),
        sessions_healthy: health
            .iter()
            .filter(|h| h.credential_valid && h.healthy)
            .count(),
        sessions_unhealthy: health
            .iter()
            .filter(|h| h.credential_valid && !h.healthy)
            .count(),
        credentials_invalid: health.iter().filter(|h| !h.credential_valid).count(),
        tasks_total: tasks.len(),
        tasks_active: tasks.iter().filter(|t| t.active).count(),
        pending_approvals: pending.len(),
    })
}

/// Run the `ferry status` command.
pub async fn run_status(store: &dyn Store, relay: &str, json: bool) -> Result<(), FerryError> {
    let status = gather_status(store, relay).await?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).unwrap_or_else(|_| "{}".to_string())
        );
        return Ok(());
    }

    println!();
    println!("  {} status", status.relay);
    println!("  {}", "-".repeat(35));
    println!(
        "    Sessions:  {} healthy, {} unhealthy, {} signed out",
        status.sessions_healthy, status.sessions_unhealthy, status.credentials_invalid
    );
    println!(
        "    Tasks:     {} active of {}",
        status.tasks_active, status.tasks_total
    );
    println!("    Approvals: {} pending", status.pending_approvals);
    println!();
    Ok(())
}

/// Run the `ferry tasks` command.
pub async fn run_tasks(
    store: &dyn Store,
    owner: Option<i64>,
    json: bool,
) -> Result<(), FerryError> {
    let tasks = store.list_tasks(owner.map(UserId)).await?;
    let rows: Vec<TaskRow> = tasks.iter().map(TaskRow::from).collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_else(|_| "[]".to_string())
        );
        return Ok(());
    }
    if rows.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for row in &rows {
        let state = if row.active { "active" } else { "paused" };
        let approval = if row.manual_approval { ", manual approval" } else { "" };
        println!(
            "{:>5}  {}  [{} {}{}]  {} -> {}",
            row.id,
            row.name,
            state,
            row.mode,
            approval,
            row.source,
            row.targets.join(", ")
        );
    }
    Ok(())
}
