// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification and secondary-client surface.

use async_trait::async_trait;

use crate::error::FerryError;
use crate::settings::Button;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MessageRef, PendingApproval, ResolveOutcome, UserId};

/// Out-of-band channel to task owners and to delivered messages.
#[async_trait]
pub trait Notifier: PluginAdapter {
    /// Asks the owner to approve or reject a held message.
    async fn notify_approval(
        &self,
        owner: UserId,
        pending: &PendingApproval,
        preview: &str,
    ) -> Result<(), FerryError>;

    /// Attaches URL buttons to an already delivered message.
    async fn attach_buttons(
        &self,
        target: MessageRef,
        buttons: &[Vec<Button>],
    ) -> Result<(), FerryError>;

    /// Tells the owner about a failure that needs their action.
    async fn notify_failure(&self, owner: UserId, text: &str) -> Result<(), FerryError>;
}

/// Receives approval decisions coming back from the notification surface.
#[async_trait]
pub trait ApprovalHandler: Send + Sync + 'static {
    /// Resolves a pending approval on behalf of `actor`.
    async fn resolve_approval(
        &self,
        actor: UserId,
        id: &str,
        approved: bool,
    ) -> Result<ResolveOutcome, FerryError>;
}
