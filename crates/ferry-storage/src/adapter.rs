// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the Store trait.

use async_trait::async_trait;
use tracing::debug;

use ferry_config::model::StorageConfig;
use ferry_core::types::{
    ApprovalStatus, ChatId, Credential, MessageId, MessageMapping, PendingApproval,
    SessionHealth, Task, TaskId, UserId,
};
use ferry_core::{AdapterType, FerryError, HealthStatus, PluginAdapter, Store};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed store.
///
/// Wraps a [`Database`] handle and delegates all query operations to the
/// typed query modules.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Open the database described by `config`, running migrations.
    pub async fn open(config: &StorageConfig) -> Result<Self, FerryError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(Self { db })
    }

    pub fn from_database(db: Database) -> Self {
        Self { db }
    }

    pub async fn in_memory() -> Result<Self, FerryError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Store
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        self.db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        self.db.checkpoint().await?;
        debug!("shutdown: WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl Store for SqliteStore {
    // --- Tasks ---

    async fn list_tasks(&self, owner: Option<UserId>) -> Result<Vec<Task>, FerryError> {
        queries::tasks::list_tasks(&self.db, owner).await
    }

    async fn active_tasks(&self, owner: UserId) -> Result<Vec<Task>, FerryError> {
        queries::tasks::active_tasks(&self.db, owner).await
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>, FerryError> {
        queries::tasks::get_task(&self.db, id).await
    }

    async fn save_task(&self, task: &Task) -> Result<TaskId, FerryError> {
        queries::tasks::save_task(&self.db, task).await
    }

    // --- Credentials and session health ---

    async fn valid_credentials(&self) -> Result<Vec<(UserId, Credential)>, FerryError> {
        queries::credentials::valid_credentials(&self.db).await
    }

    async fn get_credential(&self, user: UserId) -> Result<Option<Credential>, FerryError> {
        queries::credentials::get_credential(&self.db, user).await
    }

    async fn save_credential(
        &self,
        user: UserId,
        credential: &Credential,
    ) -> Result<(), FerryError> {
        queries::credentials::save_credential(&self.db, user, credential).await
    }

    async fn invalidate_credential(&self, user: UserId) -> Result<(), FerryError> {
        queries::credentials::invalidate_credential(&self.db, user).await
    }

    async fn set_session_health(
        &self,
        user: UserId,
        healthy: bool,
        detail: Option<&str>,
    ) -> Result<(), FerryError> {
        queries::credentials::set_session_health(&self.db, user, healthy, detail).await
    }

    async fn session_health(&self) -> Result<Vec<SessionHealth>, FerryError> {
        queries::credentials::session_health(&self.db).await
    }

    // --- Pending approvals ---

    async fn insert_pending(&self, pending: &PendingApproval) -> Result<(), FerryError> {
        queries::approvals::insert_pending(&self.db, pending).await
    }

    async fn get_pending(&self, id: &str) -> Result<Option<PendingApproval>, FerryError> {
        queries::approvals::get_pending(&self.db, id).await
    }

    async fn list_pending(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<PendingApproval>, FerryError> {
        queries::approvals::list_pending(&self.db, status).await
    }

    async fn transition_pending(&self, id: &str, to: ApprovalStatus) -> Result<bool, FerryError> {
        queries::approvals::transition_pending(&self.db, id, to).await
    }

    // --- Message mappings ---

    async fn insert_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError> {
        queries::mappings::insert_mapping(&self.db, mapping).await
    }

    async fn mappings_for_source(
        &self,
        task: TaskId,
        chat: ChatId,
        message: MessageId,
    ) -> Result<Vec<MessageMapping>, FerryError> {
        queries::mappings::mappings_for_source(&self.db, task, chat, message).await
    }

    async fn delete_mapping(&self, mapping: &MessageMapping) -> Result<(), FerryError> {
        queries::mappings::delete_mapping(&self.db, mapping).await
    }
}
