// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Propagation of source edits and deletions to delivered copies.
//!
//! Only copies are edited: a native forward cannot be changed by the
//! forwarder, and a forward-mode task whose content would still be
//! forwarded is skipped. Deletions apply regardless of mode.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use ferry_core::types::{
    ChatId, EditRequest, ForwardMode, InboundMessage, MessageId, MessageMapping,
};

use crate::delivery::send_with_retry;
use crate::engine::{ForwardingEngine, SourceBytes, copy_forced};
use crate::filter::FilterFlags;
use crate::session::SessionContext;
use crate::task_index::RoutedTask;

/// Counts of target messages touched by one sync event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Applies edits and deletions using the recorded message mappings.
pub struct SyncCoordinator {
    engine: Arc<ForwardingEngine>,
}

impl SyncCoordinator {
    pub fn new(engine: Arc<ForwardingEngine>) -> Self {
        Self { engine }
    }

    /// Re-renders an edited source message into every copy made from it.
    pub async fn on_edit(&self, ctx: &SessionContext, msg: &InboundMessage) -> SyncReport {
        let mut report = SyncReport::default();
        let tasks = self.engine.tasks().tasks_for_source(ctx.user, msg.chat_id);
        // The send-time copy decision was made with the first task's cleaning
        // rules, whether or not that task itself syncs edits.
        let Some(first) = tasks.first() else {
            return report;
        };
        let global_copy = copy_forced(first, msg);
        for task in &tasks {
            if !task.task.settings.forwarding.sync_edits {
                continue;
            }
            let mappings = match self
                .engine
                .store()
                .mappings_for_source(task.id(), msg.chat_id, msg.message_id)
                .await
            {
                Ok(mappings) => mappings,
                Err(e) => {
                    warn!(task_id = %task.id(), error = %e, "failed to load mappings for edit");
                    report.failed += 1;
                    continue;
                }
            };
            if mappings.is_empty() {
                continue;
            }
            match self.edit_copies(ctx, task, msg, global_copy, &mappings).await {
                Some((edited, failed)) => {
                    report.updated += edited;
                    report.failed += failed;
                }
                None => report.skipped += mappings.len(),
            }
        }
        if report.updated > 0 {
            info!(
                chat_id = %msg.chat_id,
                message_id = %msg.message_id,
                updated = report.updated,
                "edit propagated"
            );
        }
        report
    }

    /// Returns (edited, failed), or `None` when the task forwards natively.
    async fn edit_copies(
        &self,
        ctx: &SessionContext,
        task: &RoutedTask,
        msg: &InboundMessage,
        global_copy: bool,
        mappings: &[MessageMapping],
    ) -> Option<(usize, usize)> {
        let source = SourceBytes::new(ctx, msg);
        let flags = FilterFlags::for_message(&task.task, msg);
        let decorate = mappings.iter().any(|m| m.decorated);
        let plan = self
            .engine
            .prepare(task, msg, flags, global_copy, &source, decorate)
            .await;
        if plan.mode == ForwardMode::Forward {
            debug!(task_id = %task.id(), "forwarded copies cannot be edited, skipping");
            return None;
        }

        let media = match (&msg.media, &plan.processed) {
            (Some(info), Some(processed)) => {
                match self
                    .engine
                    .upload(ctx, &processed.bytes, &info.upload_name())
                    .await
                {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        warn!(task_id = %task.id(), error = %e, "failed to upload edited media");
                        None
                    }
                }
            }
            _ => None,
        };
        let edit = EditRequest {
            text: Some(plan.text),
            media,
        };

        let client = ctx.client.as_ref();
        let (mut edited, mut failed) = (0, 0);
        for mapping in mappings {
            let target = mapping.target();
            let edit = &edit;
            let result = send_with_retry(self.engine.retry(), target.chat_id, move || {
                client.edit_message(target, edit)
            })
            .await;
            match result {
                Ok(()) => edited += 1,
                Err(e) => {
                    warn!(
                        task_id = %task.id(),
                        target = %target,
                        error = %e,
                        "failed to edit copy"
                    );
                    failed += 1;
                }
            }
        }
        Some((edited, failed))
    }

    /// Deletes the copies of deleted source messages.
    ///
    /// Without a chat id every task of the user is consulted, each with its
    /// own source chat.
    pub async fn on_delete(
        &self,
        ctx: &SessionContext,
        chat: Option<ChatId>,
        ids: &[MessageId],
    ) -> SyncReport {
        let tasks = match chat {
            Some(chat) => self.engine.tasks().tasks_for_source(ctx.user, chat),
            None => self.engine.tasks().tasks_for_user(ctx.user),
        };
        let mut report = SyncReport::default();
        for task in tasks {
            if !task.task.settings.forwarding.sync_deletes {
                continue;
            }
            let report_for_task = self.delete_copies(ctx, &task, ids).await;
            report.updated += report_for_task.updated;
            report.failed += report_for_task.failed;
        }
        if report.updated > 0 {
            info!(user_id = %ctx.user, deleted = report.updated, "deletion propagated");
        }
        report
    }

    async fn delete_copies(
        &self,
        ctx: &SessionContext,
        task: &RoutedTask,
        ids: &[MessageId],
    ) -> SyncReport {
        let store = self.engine.store();
        let mut by_target: BTreeMap<ChatId, Vec<MessageMapping>> = BTreeMap::new();
        for &id in ids {
            match store.mappings_for_source(task.id(), task.source, id).await {
                Ok(mappings) => {
                    for mapping in mappings {
                        by_target.entry(mapping.target_chat_id).or_default().push(mapping);
                    }
                }
                Err(e) => {
                    warn!(
                        task_id = %task.id(),
                        message_id = %id,
                        error = %e,
                        "failed to load mappings for delete"
                    );
                }
            }
        }

        let client = ctx.client.as_ref();
        let mut report = SyncReport::default();
        for (target, mappings) in by_target {
            let delivered: Vec<MessageId> =
                mappings.iter().map(|m| m.target_message_id).collect();
            let delivered = &delivered[..];
            let result = send_with_retry(self.engine.retry(), target, move || {
                client.delete_messages(target, delivered)
            })
            .await;
            match result {
                Ok(()) => {
                    for mapping in &mappings {
                        self.engine.post_actions().cancel(mapping.target());
                        if let Err(e) = store.delete_mapping(mapping).await {
                            warn!(task_id = %task.id(), error = %e, "failed to drop message mapping");
                        }
                    }
                    report.updated += mappings.len();
                }
                Err(e) => {
                    warn!(
                        task_id = %task.id(),
                        target = %target,
                        error = %e,
                        "failed to delete copies"
                    );
                    report.failed += mappings.len();
                }
            }
        }
        report
    }
}
