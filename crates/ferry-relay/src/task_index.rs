// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user cache of active tasks, keyed by resolved source chat.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use ferry_core::types::{ChatId, ChatRef, Task, TaskId, UserId};
use ferry_core::{ChatClient, FerryError, Store};

/// A task whose chat references have been resolved to ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedTask {
    pub task: Task,
    pub source: ChatId,
    pub targets: Vec<ChatId>,
}

impl RoutedTask {
    pub fn id(&self) -> TaskId {
        self.task.id
    }
}

type Routes = HashMap<ChatId, Vec<Arc<RoutedTask>>>;

/// In-memory index of every user's active tasks.
pub struct TaskIndex {
    store: Arc<dyn Store>,
    users: RwLock<HashMap<UserId, Routes>>,
}

impl TaskIndex {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            users: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Routes>> {
        self.users.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, Routes>> {
        self.users.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Reloads `user`'s active tasks and resolves their chats through `client`.
    ///
    /// Tasks with a malformed or unresolvable reference are skipped; an
    /// authentication failure aborts the refresh. Returns the number of
    /// tasks indexed.
    pub async fn refresh(
        &self,
        user: UserId,
        client: &dyn ChatClient,
    ) -> Result<usize, FerryError> {
        let mut tasks = self.store.active_tasks(user).await?;
        tasks.sort_by_key(|t| t.id);

        let mut resolved: HashMap<ChatRef, ChatId> = HashMap::new();
        let mut routes = Routes::new();
        let mut count = 0;
        for task in tasks {
            match route(&task, client, &mut resolved).await {
                Ok(routed) => {
                    routes
                        .entry(routed.source)
                        .or_default()
                        .push(Arc::new(routed));
                    count += 1;
                }
                Err(e) if e.is_terminal_auth() => return Err(e),
                Err(e) => {
                    warn!(
                        user_id = %user,
                        task_id = %task.id,
                        error = %e,
                        "skipping task with unusable chat reference"
                    );
                }
            }
        }

        self.write().insert(user, routes);
        info!(user_id = %user, tasks = count, "task index refreshed");
        Ok(count)
    }

    /// Tasks of `user` watching `chat`, in task-id order.
    pub fn tasks_for_source(&self, user: UserId, chat: ChatId) -> Vec<Arc<RoutedTask>> {
        self.read()
            .get(&user)
            .and_then(|routes| routes.get(&chat))
            .cloned()
            .unwrap_or_default()
    }

    /// Every indexed task of `user`, in task-id order.
    pub fn tasks_for_user(&self, user: UserId) -> Vec<Arc<RoutedTask>> {
        let mut all: Vec<Arc<RoutedTask>> = self
            .read()
            .get(&user)
            .map(|routes| routes.values().flatten().cloned().collect())
            .unwrap_or_default();
        all.sort_by_key(|t| t.id());
        all
    }

    pub fn task(&self, user: UserId, id: TaskId) -> Option<Arc<RoutedTask>> {
        self.read()
            .get(&user)?
            .values()
            .flatten()
            .find(|t| t.id() == id)
            .cloned()
    }

    /// Drops `user`'s tasks, e.g. when their session ends.
    pub fn invalidate(&self, user: UserId) {
        if self.write().remove(&user).is_some() {
            debug!(user_id = %user, "task index dropped");
        }
    }
}

async fn route(
    task: &Task,
    client: &dyn ChatClient,
    resolved: &mut HashMap<ChatRef, ChatId>,
) -> Result<RoutedTask, FerryError> {
    if task.targets.is_empty() {
        return Err(FerryError::Validation(format!("task {} has no targets", task.id)));
    }
    let source = resolve(&task.source, client, resolved).await?;
    let mut targets = Vec::with_capacity(task.targets.len());
    for target in &task.targets {
        let id = resolve(target, client, resolved).await?;
        if id != source && !targets.contains(&id) {
            targets.push(id);
        }
    }
    if targets.is_empty() {
        return Err(FerryError::Validation(format!(
            "task {} only targets its own source",
            task.id
        )));
    }
    Ok(RoutedTask {
        task: task.clone(),
        source,
        targets,
    })
}

async fn resolve(
    chat: &ChatRef,
    client: &dyn ChatClient,
    resolved: &mut HashMap<ChatRef, ChatId>,
) -> Result<ChatId, FerryError> {
    if let Some(id) = resolved.get(chat) {
        return Ok(*id);
    }
    if !chat.is_well_formed() {
        return Err(FerryError::Validation(format!("malformed chat reference {chat:?}")));
    }
    let id = match chat.as_id() {
        Some(id) => id,
        None => client.resolve(chat).await?.id,
    };
    resolved.insert(chat.clone(), id);
    Ok(id)
}
