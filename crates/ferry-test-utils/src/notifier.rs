// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notifier double recording everything sent through it.

use async_trait::async_trait;
use tokio::sync::Mutex;

use ferry_core::settings::Button;
use ferry_core::types::{AdapterType, HealthStatus, MessageRef, PendingApproval, UserId};
use ferry_core::{FerryError, Notifier, PluginAdapter};

#[derive(Default)]
struct Log {
    approvals: Vec<(UserId, PendingApproval, String)>,
    buttons: Vec<(MessageRef, Vec<Vec<Button>>)>,
    failures: Vec<(UserId, String)>,
}

#[derive(Default)]
pub struct RecordingNotifier {
    log: Mutex<Log>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(owner, pending item, preview)` for every approval prompt.
    pub async fn approvals(&self) -> Vec<(UserId, PendingApproval, String)> {
        self.log.lock().await.approvals.clone()
    }

    pub async fn buttons(&self) -> Vec<(MessageRef, Vec<Vec<Button>>)> {
        self.log.lock().await.buttons.clone()
    }

    pub async fn failures(&self) -> Vec<(UserId, String)> {
        self.log.lock().await.failures.clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingNotifier {
    fn name(&self) -> &str {
        "recording-notifier"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        Ok(())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_approval(
        &self,
        owner: UserId,
        pending: &PendingApproval,
        preview: &str,
    ) -> Result<(), FerryError> {
        self.log
            .lock()
            .await
            .approvals
            .push((owner, pending.clone(), preview.to_string()));
        Ok(())
    }

    async fn attach_buttons(
        &self,
        target: MessageRef,
        buttons: &[Vec<Button>],
    ) -> Result<(), FerryError> {
        self.log
            .lock()
            .await
            .buttons
            .push((target, buttons.to_vec()));
        Ok(())
    }

    async fn notify_failure(&self, owner: UserId, text: &str) -> Result<(), FerryError> {
        self.log
            .lock()
            .await
            .failures
            .push((owner, text.to_string()));
        Ok(())
    }
}
