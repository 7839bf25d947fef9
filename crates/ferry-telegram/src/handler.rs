// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyboards, prompt text, and the callback loop for approval buttons.
//!
//! Button presses are turned into [`ApprovalCommand`]s and handed to the
//! relay's [`ApprovalHandler`]. The outcome is shown to the presser and
//! written back into the prompt, which also drops its keyboard so the
//! decision cannot be pressed again.

use std::sync::Arc;

use ferry_core::settings::Button;
use ferry_core::types::{ApprovalStatus, PendingApproval, ResolveOutcome, UserId};
use ferry_core::{ApprovalHandler, FerryError};
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::callback::ApprovalCommand;

/// Approve / Reject keyboard for one pending item.
pub fn approval_keyboard(id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[
        InlineKeyboardButton::callback(
            "Approve",
            ApprovalCommand::Approve(id.to_string()).to_string(),
        ),
        InlineKeyboardButton::callback(
            "Reject",
            ApprovalCommand::Reject(id.to_string()).to_string(),
        ),
    ]])
}

/// URL keyboard from a task's button rows. Empty rows are dropped.
pub fn url_keyboard(rows: &[Vec<Button>]) -> Result<InlineKeyboardMarkup, FerryError> {
    let mut keyboard = Vec::with_capacity(rows.len());
    for row in rows {
        let mut buttons = Vec::with_capacity(row.len());
        for button in row {
            let url = reqwest::Url::parse(&button.url).map_err(|e| {
                FerryError::Validation(format!("invalid button url {:?}: {e}", button.url))
            })?;
            buttons.push(InlineKeyboardButton::url(button.text.clone(), url));
        }
        if !buttons.is_empty() {
            keyboard.push(buttons);
        }
    }
    Ok(InlineKeyboardMarkup::new(keyboard))
}

/// Text of the prompt sent to a task owner.
pub fn prompt_text(pending: &PendingApproval, preview: &str) -> String {
    format!(
        "Approval needed for task {}\nSource: {}\n\n{}",
        pending.task_id, pending.source, preview
    )
}

/// Short text shown to whoever pressed a button.
pub fn outcome_text(result: &Result<ResolveOutcome, FerryError>) -> String {
    match result {
        Ok(ResolveOutcome::Resolved(ApprovalStatus::Approved)) => "Approved and sent".to_string(),
        Ok(ResolveOutcome::Resolved(status)) => format!("Marked {status}"),
        Ok(ResolveOutcome::AlreadyResolved(status)) => format!("Already {status}"),
        Err(FerryError::Permission { .. }) => "Only the task owner can decide".to_string(),
        Err(FerryError::NotFound { .. }) => "This request no longer exists".to_string(),
        Err(e) => format!("Could not resolve: {e}"),
    }
}

/// Runs the callback-query loop until `cancel` fires.
pub async fn run_callbacks(
    bot: Bot,
    handler: Arc<dyn ApprovalHandler>,
    cancel: CancellationToken,
) {
    let schema = Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let handler = Arc::clone(&handler);
        async move {
            on_callback(&bot, &q, handler.as_ref()).await;
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, schema)
        .default_handler(|_| async {})
        .build();
    let token = dispatcher.shutdown_token();
    tokio::spawn(async move {
        cancel.cancelled().await;
        match token.shutdown() {
            Ok(done) => done.await,
            Err(e) => debug!(error = %e, "callback dispatcher was idle at shutdown"),
        }
    });

    info!("listening for approval callbacks");
    dispatcher.dispatch().await;
    debug!("approval callback loop stopped");
}

async fn on_callback(bot: &Bot, q: &CallbackQuery, handler: &dyn ApprovalHandler) {
    let Some(command) = q.data.as_deref().and_then(ApprovalCommand::parse) else {
        debug!(data = ?q.data, "ignoring unknown callback");
        if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
            debug!(error = %e, "failed to answer callback");
        }
        return;
    };

    let actor = UserId(q.from.id.0 as i64);
    let result = handler
        .resolve_approval(actor, command.id(), command.approved())
        .await;
    let reply = outcome_text(&result);
    match &result {
        Ok(outcome) => info!(
            approval_id = command.id(),
            user_id = %actor,
            ?outcome,
            "approval callback handled"
        ),
        Err(e) => warn!(
            approval_id = command.id(),
            user_id = %actor,
            error = %e,
            "approval callback failed"
        ),
    }

    if let Err(e) = bot
        .answer_callback_query(q.id.clone())
        .text(reply.clone())
        .await
    {
        debug!(error = %e, "failed to answer callback");
    }

    // Only a decided item loses its keyboard; errors leave it pressable.
    if result.is_err() {
        return;
    }
    if let Some(message) = q.message.as_ref().and_then(|m| m.regular_message()) {
        let text = format!("{}\n\n{reply}", message.text().unwrap_or_default());
        if let Err(e) = bot.edit_message_text(message.chat.id, message.id, text).await {
            warn!(approval_id = command.id(), error = %e, "failed to update approval prompt");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::types::{ChatId, MessageId, MessageRef, TaskId};
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn approval_keyboard_carries_both_commands() {
        let keyboard = approval_keyboard("p-1");
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        let data: Vec<String> = keyboard.inline_keyboard[0]
            .iter()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(data, vec!["approve:p-1", "reject:p-1"]);
    }

    #[test]
    fn url_keyboard_keeps_rows_and_rejects_bad_urls() {
        let rows = vec![
            vec![Button {
                text: "Site".into(),
                url: "https://example.com".into(),
            }],
            vec![],
        ];
        assert_eq!(url_keyboard(&rows).unwrap().inline_keyboard.len(), 1);

        let bad = vec![vec![Button {
            text: "Broken".into(),
            url: "not a url".into(),
        }]];
        assert!(matches!(url_keyboard(&bad), Err(FerryError::Validation(_))));
    }

    #[test]
    fn prompt_names_task_and_source() {
        let pending = PendingApproval {
            id: "p-1".into(),
            task_id: TaskId(4),
            source: MessageRef::new(ChatId(-100), MessageId(9)),
            payload: String::new(),
            status: ApprovalStatus::Pending,
            created_at: String::new(),
        };
        let text = prompt_text(&pending, "hello");
        assert!(text.contains("task 4"));
        assert!(text.contains("-100/9"));
        assert!(text.ends_with("hello"));
    }

    #[test]
    fn outcome_texts() {
        assert_eq!(
            outcome_text(&Ok(ResolveOutcome::AlreadyResolved(ApprovalStatus::Rejected))),
            "Already rejected"
        );
        assert_eq!(
            outcome_text(&Err(FerryError::Permission {
                chat: 1,
                message: "x".into()
            })),
            "Only the task owner can decide"
        );
    }
}
