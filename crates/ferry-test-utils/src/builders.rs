// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for tasks and inbound messages.

use chrono::{DateTime, TimeZone, Utc};

use ferry_core::settings::TaskSettings;
use ferry_core::types::{
    ChatId, ChatKind, ChatRef, ForwardMode, InboundMessage, MediaInfo, MediaKind, MessageId,
    Task, TaskId, UserId,
};

/// Fluent builder for [`Task`].
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(owner: UserId, source: &str, targets: &[&str]) -> Self {
        Self {
            task: Task {
                id: TaskId(0),
                owner,
                name: format!("{source} mirror"),
                source: ChatRef::new(source),
                targets: targets.iter().map(|t| ChatRef::new(*t)).collect(),
                forward_mode: ForwardMode::Forward,
                active: true,
                settings: TaskSettings::default(),
            },
        }
    }

    pub fn id(mut self, id: i64) -> Self {
        self.task.id = TaskId(id);
        self
    }

    pub fn copy(mut self) -> Self {
        self.task.forward_mode = ForwardMode::Copy;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.task.active = false;
        self
    }

    /// Adjust the task's settings in place.
    pub fn settings(mut self, f: impl FnOnce(&mut TaskSettings)) -> Self {
        f(&mut self.task.settings);
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

/// A fixed instant (Monday 2026-01-05 12:00 UTC) used as the default post date.
pub fn fixed_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Fluent builder for [`InboundMessage`].
pub struct MessageBuilder {
    msg: InboundMessage,
}

impl MessageBuilder {
    pub fn text(chat: i64, id: i64, text: &str) -> Self {
        Self {
            msg: InboundMessage {
                chat_id: ChatId(chat),
                chat_kind: ChatKind::Channel,
                message_id: MessageId(id),
                sender_id: None,
                author_signature: None,
                text: Some(text.to_string()),
                media: None,
                media_group_id: None,
                has_buttons: false,
                is_forwarded: false,
                date: fixed_date(),
                edited_at: None,
            },
        }
    }

    /// A media message with a caption.
    pub fn media(chat: i64, id: i64, kind: MediaKind, caption: &str) -> Self {
        let mut builder = Self::text(chat, id, caption);
        if caption.is_empty() {
            builder.msg.text = None;
        }
        builder.msg.media = Some(MediaInfo {
            kind,
            unique_id: format!("file-{chat}-{id}"),
            file_name: None,
            mime_type: None,
            size: None,
        });
        builder
    }

    pub fn album(mut self, group: &str) -> Self {
        self.msg.media_group_id = Some(group.to_string());
        self
    }

    pub fn group(mut self, sender: i64) -> Self {
        self.msg.chat_kind = ChatKind::Group;
        self.msg.sender_id = Some(UserId(sender));
        self
    }

    pub fn signed(mut self, signature: &str) -> Self {
        self.msg.author_signature = Some(signature.to_string());
        self
    }

    pub fn with_buttons(mut self) -> Self {
        self.msg.has_buttons = true;
        self
    }

    pub fn unique_id(mut self, unique_id: &str) -> Self {
        if let Some(media) = self.msg.media.as_mut() {
            media.unique_id = unique_id.to_string();
        }
        self
    }

    /// Mark the message as edited at `at`.
    pub fn edited(mut self, at: DateTime<Utc>) -> Self {
        self.msg.edited_at = Some(at);
        self
    }

    pub fn date(mut self, date: DateTime<Utc>) -> Self {
        self.msg.date = date;
        self
    }

    pub fn build(self) -> InboundMessage {
        self.msg
    }
}
