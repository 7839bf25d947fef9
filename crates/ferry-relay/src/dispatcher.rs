// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routes session events to the forwarding engine and the sync coordinator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use ferry_core::types::{ChatEvent, UserId};
use ferry_core::FerryError;

use crate::engine::ForwardingEngine;
use crate::session::{InboundHandler, SessionContext};
use crate::sync::SyncCoordinator;
use crate::task_index::TaskIndex;

/// The [`InboundHandler`] wired into every session.
pub struct Dispatcher {
    tasks: Arc<TaskIndex>,
    engine: Arc<ForwardingEngine>,
    sync: SyncCoordinator,
}

impl Dispatcher {
    pub fn new(engine: Arc<ForwardingEngine>) -> Self {
        Self {
            tasks: Arc::clone(engine.tasks()),
            sync: SyncCoordinator::new(Arc::clone(&engine)),
            engine,
        }
    }
}

#[async_trait]
impl InboundHandler for Dispatcher {
    async fn on_session_started(&self, ctx: &SessionContext) -> Result<(), FerryError> {
        self.tasks.refresh(ctx.user, ctx.client.as_ref()).await?;
        Ok(())
    }

    async fn handle(&self, ctx: &SessionContext, event: ChatEvent) {
        match event {
            ChatEvent::NewMessage(msg) => {
                let report = self.engine.on_message(ctx, &msg).await;
                debug!(
                    user_id = %ctx.user,
                    chat_id = %msg.chat_id,
                    message_id = %msg.message_id,
                    ?report,
                    "message handled"
                );
            }
            ChatEvent::EditedMessage(msg) => {
                self.sync.on_edit(ctx, &msg).await;
            }
            ChatEvent::Deleted {
                chat_id,
                message_ids,
            } => {
                self.sync.on_delete(ctx, chat_id, &message_ids).await;
            }
        }
    }

    async fn on_session_ended(&self, user: UserId) {
        for task in self.tasks.tasks_for_user(user) {
            self.engine.forget_task(task.id());
        }
        self.tasks.invalidate(user);
    }
}
