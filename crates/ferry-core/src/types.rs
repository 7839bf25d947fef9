// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across collaborator traits and the relay engine.

use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::settings::TaskSettings;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Platform user id of an end user running a session.
    UserId
);
numeric_id!(
    /// Platform chat id (channel, group or private chat).
    ChatId
);
numeric_id!(
    /// Platform message id, unique within its chat.
    MessageId
);
numeric_id!(
    /// Identifier of a configured forwarding task.
    TaskId
);

/// A stable reference to one message in one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self {
            chat_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.message_id)
    }
}

/// A chat reference as entered by a user: `@username`, a `t.me` link, or a numeric id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatRef(pub String);

impl ChatRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The numeric chat id, when the reference is one.
    pub fn as_id(&self) -> Option<ChatId> {
        self.0.trim().parse::<i64>().ok().map(ChatId)
    }

    /// The bare username, when the reference names a public chat.
    ///
    /// Accepts `@name`, `t.me/name` and `https://t.me/name`. Returns `None`
    /// for numeric ids and for strings that are not valid usernames.
    pub fn username(&self) -> Option<&str> {
        let raw = self.0.trim();
        let name = raw
            .strip_prefix('@')
            .or_else(|| raw.strip_prefix("https://t.me/"))
            .or_else(|| raw.strip_prefix("http://t.me/"))
            .or_else(|| raw.strip_prefix("t.me/"))
            .unwrap_or(raw);
        let name = name.trim_end_matches('/');
        let valid = name.len() >= 4
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        valid.then_some(name)
    }

    /// Whether the reference is well-formed enough to be resolved.
    pub fn is_well_formed(&self) -> bool {
        self.as_id().is_some() || self.username().is_some()
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ChatId> for ChatRef {
    fn from(id: ChatId) -> Self {
        Self(id.0.to_string())
    }
}

/// Kind of chat a message was posted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChatKind {
    /// Broadcast channel; posts may carry an author signature.
    Channel,
    /// Group or supergroup; posts carry a sender id.
    Group,
    /// One-to-one chat.
    Private,
}

/// A resolved chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntity {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}

/// Content type of a message, used by the media-type allow-list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MediaKind {
    Text,
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
}

impl MediaKind {
    /// Whether this kind may be part of a multi-item album send.
    pub fn is_album_capable(self) -> bool {
        matches!(
            self,
            MediaKind::Photo | MediaKind::Video | MediaKind::Document | MediaKind::Audio
        )
    }
}

/// Kind of expensive transformation applied to media bytes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingKind {
    ImageWatermark,
    VideoWatermark,
    AudioTags,
}

/// Media attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub kind: MediaKind,
    /// Platform-stable identifier of the file content.
    pub unique_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

impl MediaInfo {
    /// File name to use when uploading processed bytes.
    pub fn upload_name(&self) -> String {
        if let Some(name) = self.file_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        let ext = match self.kind {
            MediaKind::Photo => "jpg",
            MediaKind::Video | MediaKind::Animation | MediaKind::VideoNote => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Voice => "ogg",
            MediaKind::Sticker => "webp",
            MediaKind::Document | MediaKind::Text => "bin",
        };
        format!("{}.{ext}", self.unique_id)
    }
}

/// A message observed in a watched source chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub chat_kind: ChatKind,
    pub message_id: MessageId,
    /// Numeric sender, present for group-style chats.
    pub sender_id: Option<UserId>,
    /// Author signature, present for signed channel posts.
    pub author_signature: Option<String>,
    /// Message text, or the caption of a media message.
    pub text: Option<String>,
    pub media: Option<MediaInfo>,
    /// Album group id shared by multi-part media messages.
    pub media_group_id: Option<String>,
    /// Whether the message carries an inline keyboard.
    pub has_buttons: bool,
    /// Whether the message is itself a forward from elsewhere.
    pub is_forwarded: bool,
    pub date: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl InboundMessage {
    pub fn reference(&self) -> MessageRef {
        MessageRef::new(self.chat_id, self.message_id)
    }

    /// The content kind; plain text when no media is attached.
    pub fn kind(&self) -> MediaKind {
        self.media.as_ref().map_or(MediaKind::Text, |m| m.kind)
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Monotonic content revision: zero for the original post, the edit
    /// timestamp afterwards.
    pub fn revision(&self) -> i64 {
        self.edited_at.map_or(0, |t| t.timestamp_millis())
    }
}

/// An event delivered by a session's client.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    NewMessage(InboundMessage),
    EditedMessage(InboundMessage),
    /// Some platforms omit the chat for deletions outside channels.
    Deleted {
        chat_id: Option<ChatId>,
        message_ids: Vec<MessageId>,
    },
}

/// How a message is delivered to a target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ForwardMode {
    /// Native forward referencing the original post.
    #[default]
    Forward,
    /// Freshly composed message.
    Copy,
}

/// A configured source-to-targets forwarding rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner: UserId,
    pub name: String,
    pub source: ChatRef,
    pub targets: Vec<ChatRef>,
    pub forward_mode: ForwardMode,
    pub active: bool,
    #[serde(default)]
    pub settings: TaskSettings,
}

/// A session credential (serialized platform session or bot token).
///
/// The value is never printed by `Debug`.
pub struct Credential(SecretString);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// Persisted health of a user's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHealth {
    pub user: UserId,
    pub healthy: bool,
    pub credential_valid: bool,
    pub detail: Option<String>,
    pub updated_at: String,
}

/// Lifecycle of a pending approval. Monotonic: terminal once non-pending.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

/// A message held for manual accept/reject before delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApproval {
    pub id: String,
    pub task_id: TaskId,
    pub source: MessageRef,
    /// JSON-serialized delivery payload.
    pub payload: String,
    pub status: ApprovalStatus,
    pub created_at: String,
}

/// Result of resolving a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// This call moved the item to the given terminal state.
    Resolved(ApprovalStatus),
    /// The item was already terminal; nothing was done.
    AlreadyResolved(ApprovalStatus),
}

/// Link between a source message and one delivered target copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageMapping {
    pub task_id: TaskId,
    pub source_chat_id: ChatId,
    pub source_message_id: MessageId,
    pub target_chat_id: ChatId,
    pub target_message_id: MessageId,
    /// The copy carries the task's header and footer. False for album
    /// members after the first.
    pub decorated: bool,
}

impl MessageMapping {
    pub fn target(&self) -> MessageRef {
        MessageRef::new(self.target_chat_id, self.target_message_id)
    }
}

/// Opaque platform handle for bytes already uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UploadHandle(pub String);

/// One element of a multi-item album send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumItem {
    pub handle: UploadHandle,
    pub kind: MediaKind,
    pub caption: Option<String>,
}

/// Requested change to a delivered target message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditRequest {
    pub text: Option<String>,
    pub media: Option<UploadHandle>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Identifies the role of an external collaborator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    ChatClient,
    Store,
    MediaProcessor,
    Notifier,
    Translator,
}
