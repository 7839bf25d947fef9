// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat client trait for the messaging platform connection of one user.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::FerryError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AlbumItem, ChatEntity, ChatEvent, ChatId, ChatRef, Credential, EditRequest, MediaKind,
    MessageId, MessageRef, UploadHandle, UserId,
};

/// One authenticated platform connection.
///
/// Implementations map platform failures onto [`FerryError`]: invalid
/// credentials as `Auth`, flood waits as `RateLimited` with the exact
/// duration, missing rights as `Permission`, unknown chats as `Validation`.
#[async_trait]
pub trait ChatClient: PluginAdapter {
    /// Connects using the stored credential.
    async fn connect(&self, credential: &Credential) -> Result<(), FerryError>;

    /// Drops the connection. Safe to call on a disconnected client.
    async fn disconnect(&self) -> Result<(), FerryError>;

    /// Whether the connected session is authorized.
    async fn is_authorized(&self) -> Result<bool, FerryError>;

    /// Resolves a user-entered chat reference.
    async fn resolve(&self, chat: &ChatRef) -> Result<ChatEntity, FerryError>;

    /// Takes the stream of new, edited and deleted message events.
    ///
    /// Each connect produces a fresh stream; it ends when the connection drops.
    async fn events(&self) -> Result<mpsc::Receiver<ChatEvent>, FerryError>;

    /// Downloads the media attached to a message.
    async fn download_media(&self, message: MessageRef) -> Result<Vec<u8>, FerryError>;

    /// Uploads bytes once, returning a handle reusable in later sends.
    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<UploadHandle, FerryError>;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, FerryError>;

    async fn send_file(
        &self,
        chat: ChatId,
        file: &UploadHandle,
        kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<MessageId, FerryError>;

    /// Sends several media items as one grouped post.
    async fn send_album(
        &self,
        chat: ChatId,
        items: &[AlbumItem],
    ) -> Result<Vec<MessageId>, FerryError>;

    /// Native forward keeping the original attribution.
    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, FerryError>;

    /// Sends a fresh copy of a message, keeping its media.
    ///
    /// `caption` replaces the original caption when given.
    async fn copy_message(
        &self,
        to: ChatId,
        source: MessageRef,
        caption: Option<&str>,
    ) -> Result<MessageId, FerryError>;

    async fn edit_message(&self, target: MessageRef, edit: &EditRequest)
    -> Result<(), FerryError>;

    async fn delete_messages(&self, chat: ChatId, ids: &[MessageId]) -> Result<(), FerryError>;

    async fn pin_message(&self, target: MessageRef, silent: bool) -> Result<(), FerryError>;
}

/// Creates a fresh, unconnected client for a user.
pub trait ChatClientFactory: Send + Sync + 'static {
    fn create(&self, user: UserId) -> Arc<dyn ChatClient>;
}
