// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram bot surface for the Ferry relay.
//!
//! Implements [`Notifier`] for the Telegram Bot API via teloxide: approval
//! prompts with inline Approve/Reject buttons, out-of-band URL buttons on
//! delivered messages, and failure notices. [`handler::run_callbacks`]
//! feeds button presses back into the relay.

pub mod callback;
pub mod handler;

use async_trait::async_trait;
use ferry_config::model::TelegramConfig;
use ferry_core::settings::Button;
use ferry_core::traits::{Notifier, PluginAdapter};
use ferry_core::types::{AdapterType, HealthStatus, MessageRef, PendingApproval, UserId};
use ferry_core::FerryError;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use tracing::{debug, info, warn};

pub use callback::ApprovalCommand;
pub use handler::run_callbacks;

use teloxide::types::ChatId as TgChatId;
use teloxide::types::MessageId as TgMessageId;

/// Telegram notifier implementing [`Notifier`].
///
/// Owners talk to the bot in a private chat, whose id equals their user id.
pub struct TelegramNotifier {
    bot: Bot,
    admin_chat: Option<TgChatId>,
}

impl TelegramNotifier {
    /// Creates a notifier. Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, FerryError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            FerryError::Config("telegram.bot_token is required for the bot surface".into())
        })?;
        if token.trim().is_empty() {
            return Err(FerryError::Config("telegram.bot_token cannot be empty".into()));
        }
        Ok(Self {
            bot: Bot::new(token),
            admin_chat: config.admin_chat_id.map(TgChatId),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

/// Maps a Bot API failure onto the relay's error taxonomy.
fn map_request_error(e: RequestError, chat: i64) -> FerryError {
    match e {
        RequestError::RetryAfter(wait) => FerryError::RateLimited {
            retry_after: wait.duration(),
        },
        RequestError::Api(ApiError::InvalidToken) => FerryError::Auth {
            message: "bot token rejected".into(),
        },
        RequestError::Api(api) => FerryError::Permission {
            chat,
            message: api.to_string(),
        },
        other => FerryError::network(format!("telegram request failed: {other}")),
    }
}

#[async_trait]
impl PluginAdapter for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notifier
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        debug!("Telegram notifier shutting down");
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify_approval(
        &self,
        owner: UserId,
        pending: &PendingApproval,
        preview: &str,
    ) -> Result<(), FerryError> {
        self.bot
            .send_message(TgChatId(owner.0), handler::prompt_text(pending, preview))
            .reply_markup(handler::approval_keyboard(&pending.id))
            .await
            .map_err(|e| map_request_error(e, owner.0))?;
        info!(user_id = %owner, approval_id = %pending.id, "approval prompt sent");
        Ok(())
    }

    async fn attach_buttons(
        &self,
        target: MessageRef,
        buttons: &[Vec<Button>],
    ) -> Result<(), FerryError> {
        let keyboard = handler::url_keyboard(buttons)?;
        let message_id = i32::try_from(target.message_id.0).map_err(|_| {
            FerryError::Validation(format!("message id {} out of range", target.message_id))
        })?;
        let result = self
            .bot
            .edit_message_reply_markup(TgChatId(target.chat_id.0), TgMessageId(message_id))
            .reply_markup(keyboard)
            .await;
        match result {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(map_request_error(e, target.chat_id.0)),
        }
    }

    async fn notify_failure(&self, owner: UserId, text: &str) -> Result<(), FerryError> {
        let mut chats = vec![TgChatId(owner.0)];
        if let Some(admin) = self.admin_chat {
            if admin != chats[0] {
                chats.push(admin);
            }
        }
        let mut first_error = None;
        for chat in chats {
            if let Err(e) = self.bot.send_message(chat, text).await {
                warn!(chat_id = chat.0, error = %e, "failure notice not delivered");
                first_error.get_or_insert(map_request_error(e, chat.0));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
