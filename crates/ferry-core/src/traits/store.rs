// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Store trait for tasks, credentials, approvals and message mappings.

use async_trait::async_trait;

use crate::error::FerryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ApprovalStatus, ChatId, Credential, MessageId, MessageMapping, PendingApproval,
    SessionHealth, Task, TaskId, UserId,
};

/// Persistence used by the relay core.
#[async_trait]
pub trait Store: PluginAdapter {
    // --- Tasks ---

    /// Lists tasks, optionally restricted to one owner.
    async fn list_tasks(&self, owner: Option<UserId>) -> Result<Vec<Task>, FerryError>;

    /// Active tasks of one owner.
    async fn active_tasks(&self, owner: UserId) -> Result<Vec<Task>, FerryError>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, FerryError>;

    /// Inserts or replaces a task. A task id of `0` allocates a new id.
    async fn save_task(&self, task: &Task) -> Result<TaskId, FerryError>;

    // --- Credentials and session health ---

    /// Users holding a valid credential.
    async fn valid_credentials(&self) -> Result<Vec<(UserId, Credential)>, FerryError>;

    /// The user's credential if it is still valid.
    async fn get_credential(&self, user: UserId) -> Result<Option<Credential>, FerryError>;

    async fn save_credential(&self, user: UserId, credential: &Credential)
    -> Result<(), FerryError>;

    /// Marks the credential unusable until the user re-authenticates.
    async fn invalidate_credential(&self, user: UserId) -> Result<(), FerryError>;

    async fn set_session_health(
        &self,
        user: UserId,
        healthy: bool,
        detail: Option<&str>,
    ) -> Result<(), FerryError>;

    async fn session_health(&self) -> Result<Vec<SessionHealth>, FerryError>;

    // --- Pending approvals ---

    async fn insert_pending(&self, pending: &PendingApproval) -> Result<(), FerryError>;

    async fn get_pending(&self, id: &str) -> Result<Option<PendingApproval>, FerryError>;

    async fn list_pending(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PendingApproval>, FerryError>;

    /// Moves a pending item to `to`, only if it is still pending.
    ///
    /// Returns `true` when this call performed the transition.
    async fn transition_pending(&self, id: &str, to: ApprovalStatus) -> Result<bool, FerryError>;

    // --- Message mappings ---

    /// Records a delivery. Inserting the same mapping twice is a no-op.
    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError>;

    async fn mappings_for_source(
        &self,
        task: TaskId,
        chat: ChatId,
        message: MessageId,
    ) -> Result<Vec<MessageMapping>, FerryError>;

    async fn delete_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError>;
}
