// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `Store` for engine tests that do not need SQLite.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use ferry_core::types::{
    AdapterType, ApprovalStatus, ChatId, Credential, HealthStatus, MessageId, MessageMapping,
    PendingApproval, SessionHealth, Task, TaskId, UserId,
};
use ferry_core::{FerryError, PluginAdapter, Store};

struct CredentialRow {
    value: String,
    valid: bool,
    healthy: bool,
    detail: Option<String>,
}

#[derive(Default)]
struct Inner {
    tasks: BTreeMap<TaskId, Task>,
    next_task: i64,
    credentials: BTreeMap<UserId, CredentialRow>,
    pending: Vec<PendingApproval>,
    mappings: Vec<MessageMapping>,
}

/// A `Store` held entirely in memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every stored mapping, in insertion order.
    pub fn all_mappings(&self) -> Vec<MessageMapping> {
        self.inner().mappings.clone()
    }

    /// Whether `user` still holds a valid credential.
    pub fn credential_valid(&self, user: UserId) -> bool {
        self.inner()
            .credentials
            .get(&user)
            .is_some_and(|row| row.valid)
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_tasks(&self, owner: Option<UserId>) -> Result<Vec<Task>, FerryError> {
        Ok(self
            .inner()
            .tasks
            .values()
            .filter(|t| owner.is_none_or(|o| t.owner == o))
            .cloned()
            .collect())
    }

    async fn active_tasks(&self, owner: UserId) -> Result<Vec<Task>, FerryError> {
        Ok(self
            .inner()
            .tasks
            .values()
            .filter(|t| t.owner == owner && t.active)
            .cloned()
            .collect())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, FerryError> {
        Ok(self.inner().tasks.get(&id).cloned())
    }

    async fn save_task(&self, task: &Task) -> Result<TaskId, FerryError> {
        let mut inner = self.inner();
        let mut task = task.clone();
        if task.id.0 == 0 {
            inner.next_task += 1;
            task.id = TaskId(inner.next_task);
        } else {
            inner.next_task = inner.next_task.max(task.id.0);
        }
        let id = task.id;
        inner.tasks.insert(id, task);
        Ok(id)
    }

    async fn valid_credentials(&self) -> Result<Vec<(UserId, Credential)>, FerryError> {
        Ok(self
            .inner()
            .credentials
            .iter()
            .filter(|(_, row)| row.valid)
            .map(|(user, row)| (*user, Credential::new(row.value.clone())))
            .collect())
    }

    async fn get_credential(&self, user: UserId) -> Result<Option<Credential>, FerryError> {
        Ok(self
            .inner()
            .credentials
            .get(&user)
            .filter(|row| row.valid)
            .map(|row| Credential::new(row.value.clone())))
    }

    async fn save_credential(
        &self,
        user: UserId,
        credential: &Credential,
    ) -> Result<(), FerryError> {
        let mut inner = self.inner();
        let row = inner.credentials.entry(user).or_insert(CredentialRow {
            value: String::new(),
            valid: true,
            healthy: false,
            detail: None,
        });
        row.value = credential.expose().to_string();
        row.valid = true;
        Ok(())
    }

    async fn invalidate_credential(&self, user: UserId) -> Result<(), FerryError> {
        if let Some(row) = self.inner().credentials.get_mut(&user) {
            row.valid = false;
            row.healthy = false;
        }
        Ok(())
    }

    async fn set_session_health(
        &self,
        user: UserId,
        healthy: bool,
        detail: Option<&str>,
    ) -> Result<(), FerryError> {
        if let Some(row) = self.inner().credentials.get_mut(&user) {
            row.healthy = healthy;
            row.detail = detail.map(str::to_string);
        }
        Ok(())
    }

    async fn session_health(&self) -> Result<Vec<SessionHealth>, FerryError> {
        let now = Utc::now().to_rfc3339();
        Ok(self
            .inner()
            .credentials
            .iter()
            .map(|(user, row)| SessionHealth {
                user: *user,
                healthy: row.healthy,
                credential_valid: row.valid,
                detail: row.detail.clone(),
                updated_at: now.clone(),
            })
            .collect())
    }

    async fn insert_pending(&self, pending: &PendingApproval) -> Result<(), FerryError> {
        let mut inner = self.inner();
        if inner.pending.iter().any(|p| p.id == pending.id) {
            return Err(FerryError::Validation(format!(
                "approval {} already exists",
                pending.id
            )));
        }
        inner.pending.push(pending.clone());
        Ok(())
    }

    async fn get_pending(&self, id: &str) -> Result<Option<PendingApproval>, FerryError> {
        Ok(self.inner().pending.iter().find(|p| p.id == id).cloned())
    }

    async fn list_pending(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PendingApproval>, FerryError> {
        Ok(self
            .inner()
            .pending
            .iter()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect())
    }

    async fn transition_pending(&self, id: &str, to: ApprovalStatus) -> Result<bool, FerryError> {
        if !to.is_terminal() {
            return Err(FerryError::Validation(format!(
                "approval {id} cannot transition back to {to}"
            )));
        }
        let mut inner = self.inner();
        match inner
            .pending
            .iter_mut()
            .find(|p| p.id == id && p.status == ApprovalStatus::Pending)
        {
            Some(item) => {
                item.status = to;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError> {
        let mut inner = self.inner();
        if !inner.mappings.contains(mapping) {
            inner.mappings.push(*mapping);
        }
        Ok(())
    }

    async fn mappings_for_source(
        &self,
        task: TaskId,
        chat: ChatId,
        message: MessageId,
    ) -> Result<Vec<MessageMapping>, FerryError> {
        Ok(self
            .inner()
            .mappings
            .iter()
            .filter(|m| {
                m.task_id == task && m.source_chat_id == chat && m.source_message_id == message
            })
            .copied()
            .collect())
    }

    async fn delete_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError> {
        self.inner().mappings.retain(|m| m != mapping);
        Ok(())
    }
}

/// Mappings grouped by target chat.
pub fn mappings_by_target(mappings: &[MessageMapping]) -> HashMap<ChatId, Vec<MessageMapping>> {
    let mut grouped: HashMap<ChatId, Vec<MessageMapping>> = HashMap::new();
    for m in mappings {
        grouped.entry(m.target_chat_id).or_default().push(*m);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::types::MessageRef;

    #[tokio::test]
    async fn transition_only_moves_out_of_pending_once() {
        let store = MemoryStore::new();
        store
            .insert_pending(&PendingApproval {
                id: "p".to_string(),
                task_id: TaskId(1),
                source: MessageRef::new(ChatId(1), MessageId(1)),
                payload: "{}".to_string(),
                status: ApprovalStatus::Pending,
                created_at: String::new(),
            })
            .await
            .unwrap();

        assert!(store.transition_pending("p", ApprovalStatus::Rejected).await.unwrap());
        assert!(!store.transition_pending("p", ApprovalStatus::Approved).await.unwrap());
        assert!(store.transition_pending("p", ApprovalStatus::Pending).await.is_err());
    }

    #[tokio::test]
    async fn save_task_allocates_ids() {
        let store = MemoryStore::new();
        let task = crate::builders::TaskBuilder::new(UserId(1), "-100", &["-200"]).build();
        let a = store.save_task(&task).await.unwrap();
        let b = store.save_task(&task).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.list_tasks(Some(UserId(1))).await.unwrap().len(), 2);
    }
}
