// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat client for deterministic testing.
//!
//! `MockChatClient` implements `ChatClient` with scripted connect results,
//! injectable events, captured outbound calls and per-chat send failures.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use ferry_core::types::{
    AdapterType, AlbumItem, ChatEntity, ChatEvent, ChatId, ChatKind, ChatRef, Credential,
    EditRequest, HealthStatus, MediaKind, MessageId, MessageRef, UploadHandle, UserId,
};
use ferry_core::{ChatClient, ChatClientFactory, FerryError, PluginAdapter};

/// One captured outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text {
        chat: ChatId,
        text: String,
        id: MessageId,
    },
    File {
        chat: ChatId,
        handle: UploadHandle,
        kind: MediaKind,
        caption: Option<String>,
        id: MessageId,
    },
    Album {
        chat: ChatId,
        items: Vec<AlbumItem>,
        ids: Vec<MessageId>,
    },
    Forward {
        to: ChatId,
        from: ChatId,
        source_ids: Vec<MessageId>,
        ids: Vec<MessageId>,
    },
    Copy {
        to: ChatId,
        source: MessageRef,
        caption: Option<String>,
        id: MessageId,
    },
}

impl Outbound {
    /// The chat the call delivered into.
    pub fn chat(&self) -> ChatId {
        match self {
            Outbound::Text { chat, .. }
            | Outbound::File { chat, .. }
            | Outbound::Album { chat, .. } => *chat,
            Outbound::Forward { to, .. } | Outbound::Copy { to, .. } => *to,
        }
    }

    pub fn is_forward(&self) -> bool {
        matches!(self, Outbound::Forward { .. })
    }
}

/// Failure injected into sends towards one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    Permission,
    Transient,
    RateLimited(Duration),
}

impl SendFailure {
    fn to_error(self, chat: ChatId) -> FerryError {
        match self {
            SendFailure::Permission => FerryError::Permission {
                chat: chat.0,
                message: "not an admin".to_string(),
            },
            SendFailure::Transient => FerryError::network("connection reset"),
            SendFailure::RateLimited(retry_after) => FerryError::RateLimited { retry_after },
        }
    }
}

#[derive(Default)]
struct Recorded {
    outbound: Vec<Outbound>,
    uploads: Vec<(String, usize)>,
    edits: Vec<(MessageRef, EditRequest)>,
    deletes: Vec<(ChatId, Vec<MessageId>)>,
    pins: Vec<(MessageRef, bool)>,
}

/// A mock platform client.
pub struct MockChatClient {
    chats: StdMutex<HashMap<String, ChatEntity>>,
    connect_failures: StdMutex<VecDeque<FerryError>>,
    send_failures: StdMutex<HashMap<ChatId, (SendFailure, usize)>>,
    media: StdMutex<HashMap<MessageRef, Vec<u8>>>,
    events_tx: Mutex<Option<mpsc::Sender<ChatEvent>>>,
    recorded: Mutex<Recorded>,
    authorized: AtomicBool,
    connected: AtomicBool,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    downloads: AtomicUsize,
    next_id: AtomicI64,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            chats: StdMutex::new(HashMap::new()),
            connect_failures: StdMutex::new(VecDeque::new()),
            send_failures: StdMutex::new(HashMap::new()),
            media: StdMutex::new(HashMap::new()),
            events_tx: Mutex::new(None),
            recorded: Mutex::new(Recorded::default()),
            authorized: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            next_id: AtomicI64::new(1000),
        }
    }

    /// Register a username so `resolve` can map it to a chat.
    ///
    /// Numeric references resolve to themselves without registration.
    pub fn with_chat(self, username: &str, id: ChatId, kind: ChatKind) -> Self {
        self.lock_chats().insert(
            username.trim_start_matches('@').to_lowercase(),
            ChatEntity {
                id,
                kind,
                title: Some(username.to_string()),
            },
        );
        self
    }

    /// Queue an error returned by the next `connect` call.
    pub fn push_connect_error(&self, error: FerryError) {
        lock(&self.connect_failures).push_back(error);
    }

    /// Fail the next `times` sends into `chat`. `usize::MAX` fails forever.
    pub fn fail_sends(&self, chat: ChatId, failure: SendFailure, times: usize) {
        lock(&self.send_failures).insert(chat, (failure, times));
    }

    /// Bytes returned by `download_media` for one message.
    pub fn set_media(&self, message: MessageRef, bytes: Vec<u8>) {
        lock(&self.media).insert(message, bytes);
    }

    pub fn set_authorized(&self, authorized: bool) {
        self.authorized.store(authorized, Ordering::SeqCst);
    }

    /// Push an event into the currently open stream.
    ///
    /// Returns `false` when no stream is open.
    pub async fn emit(&self, event: ChatEvent) -> bool {
        let tx = self.events_tx.lock().await.clone();
        match tx {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    /// Close the event stream as if the connection dropped.
    pub async fn drop_connection(&self) {
        self.events_tx.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
    }

    pub async fn outbound(&self) -> Vec<Outbound> {
        self.recorded.lock().await.outbound.clone()
    }

    /// Outbound calls into one chat.
    pub async fn outbound_to(&self, chat: ChatId) -> Vec<Outbound> {
        self.outbound()
            .await
            .into_iter()
            .filter(|o| o.chat() == chat)
            .collect()
    }

    /// `(file name, byte length)` of every upload.
    pub async fn uploads(&self) -> Vec<(String, usize)> {
        self.recorded.lock().await.uploads.clone()
    }

    pub async fn edits(&self) -> Vec<(MessageRef, EditRequest)> {
        self.recorded.lock().await.edits.clone()
    }

    pub async fn deletes(&self) -> Vec<(ChatId, Vec<MessageId>)> {
        self.recorded.lock().await.deletes.clone()
    }

    pub async fn pins(&self) -> Vec<(MessageRef, bool)> {
        self.recorded.lock().await.pins.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn lock_chats(&self) -> std::sync::MutexGuard<'_, HashMap<String, ChatEntity>> {
        lock(&self.chats)
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check_send(&self, chat: ChatId) -> Result<(), FerryError> {
        let mut failures = lock(&self.send_failures);
        if let Some((failure, remaining)) = failures.get_mut(&chat) {
            if *remaining > 0 {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                return Err(failure.to_error(chat));
            }
        }
        Ok(())
    }

    fn check_connected(&self) -> Result<(), FerryError> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(FerryError::network("not connected"))
        }
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl PluginAdapter for MockChatClient {
    fn name(&self) -> &str {
        "mock-client"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ChatClient
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        Ok(())
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn connect(&self, _credential: &Credential) -> Result<(), FerryError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.connect_failures).pop_front() {
            return Err(error);
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FerryError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.drop_connection().await;
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, FerryError> {
        self.check_connected()?;
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn resolve(&self, chat: &ChatRef) -> Result<ChatEntity, FerryError> {
        if let Some(id) = chat.as_id() {
            return Ok(ChatEntity {
                id,
                kind: ChatKind::Channel,
                title: None,
            });
        }
        let name = chat.username().map(str::to_lowercase).unwrap_or_default();
        self.lock_chats()
            .get(&name)
            .cloned()
            .ok_or_else(|| FerryError::Validation(format!("cannot resolve chat {chat}")))
    }

    async fn events(&self) -> Result<mpsc::Receiver<ChatEvent>, FerryError> {
        self.check_connected()?;
        let (tx, rx) = mpsc::channel(64);
        *self.events_tx.lock().await = Some(tx);
        Ok(rx)
    }

    async fn download_media(&self, message: MessageRef) -> Result<Vec<u8>, FerryError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let bytes = lock(&self.media)
            .get(&message)
            .cloned()
            .unwrap_or_else(|| format!("media-{}-{}", message.chat_id, message.message_id).into_bytes());
        Ok(bytes)
    }

    async fn upload(&self, bytes: &[u8], file_name: &str) -> Result<UploadHandle, FerryError> {
        let mut recorded = self.recorded.lock().await;
        recorded.uploads.push((file_name.to_string(), bytes.len()));
        Ok(UploadHandle(format!("upload-{}", recorded.uploads.len())))
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageId, FerryError> {
        self.check_send(chat)?;
        let id = self.next_message_id();
        self.recorded.lock().await.outbound.push(Outbound::Text {
            chat,
            text: text.to_string(),
            id,
        });
        Ok(id)
    }

    async fn send_file(
        &self,
        chat: ChatId,
        file: &UploadHandle,
        kind: MediaKind,
        caption: Option<&str>,
    ) -> Result<MessageId, FerryError> {
        self.check_send(chat)?;
        let id = self.next_message_id();
        self.recorded.lock().await.outbound.push(Outbound::File {
            chat,
            handle: file.clone(),
            kind,
            caption: caption.map(str::to_string),
            id,
        });
        Ok(id)
    }

    async fn send_album(
        &self,
        chat: ChatId,
        items: &[AlbumItem],
    ) -> Result<Vec<MessageId>, FerryError> {
        self.check_send(chat)?;
        let ids: Vec<MessageId> = items.iter().map(|_| self.next_message_id()).collect();
        self.recorded.lock().await.outbound.push(Outbound::Album {
            chat,
            items: items.to_vec(),
            ids: ids.clone(),
        });
        Ok(ids)
    }

    async fn forward_messages(
        &self,
        to: ChatId,
        from: ChatId,
        ids: &[MessageId],
    ) -> Result<Vec<MessageId>, FerryError> {
        self.check_send(to)?;
        let new_ids: Vec<MessageId> = ids.iter().map(|_| self.next_message_id()).collect();
        self.recorded.lock().await.outbound.push(Outbound::Forward {
            to,
            from,
            source_ids: ids.to_vec(),
            ids: new_ids.clone(),
        });
        Ok(new_ids)
    }

    async fn copy_message(
        &self,
        to: ChatId,
        source: MessageRef,
        caption: Option<&str>,
    ) -> Result<MessageId, FerryError> {
        self.check_send(to)?;
        let id = self.next_message_id();
        self.recorded.lock().await.outbound.push(Outbound::Copy {
            to,
            source,
            caption: caption.map(str::to_string),
            id,
        });
        Ok(id)
    }

    async fn edit_message(
        &self,
        target: MessageRef,
        edit: &EditRequest,
    ) -> Result<(), FerryError> {
        self.check_send(target.chat_id)?;
        self.recorded
            .lock()
            .await
            .edits
            .push((target, edit.clone()));
        Ok(())
    }

    async fn delete_messages(&self, chat: ChatId, ids: &[MessageId]) -> Result<(), FerryError> {
        self.check_send(chat)?;
        self.recorded
            .lock()
            .await
            .deletes
            .push((chat, ids.to_vec()));
        Ok(())
    }

    async fn pin_message(&self, target: MessageRef, silent: bool) -> Result<(), FerryError> {
        self.check_send(target.chat_id)?;
        self.recorded.lock().await.pins.push((target, silent));
        Ok(())
    }
}

/// Hands out one shared [`MockChatClient`] per user.
#[derive(Default)]
pub struct MockClientFactory {
    clients: StdMutex<HashMap<UserId, Arc<MockChatClient>>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client for `user`.
    pub fn register(&self, user: UserId, client: MockChatClient) -> Arc<MockChatClient> {
        let client = Arc::new(client);
        lock(&self.clients).insert(user, Arc::clone(&client));
        client
    }

    /// The client for `user`, creating a default one on first use.
    pub fn client(&self, user: UserId) -> Arc<MockChatClient> {
        Arc::clone(lock(&self.clients).entry(user).or_default())
    }
}

impl ChatClientFactory for MockClientFactory {
    fn create(&self, user: UserId) -> Arc<dyn ChatClient> {
        self.client(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn numeric_refs_resolve_without_registration() {
        let client = MockChatClient::new();
        let entity = client.resolve(&ChatRef::new("-1001")).await.unwrap();
        assert_eq!(entity.id, ChatId(-1001));
        assert!(client.resolve(&ChatRef::new("@unknown_chat")).await.is_err());
    }

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let client = MockChatClient::new();
        client.push_connect_error(FerryError::network("down"));
        assert!(client.connect(&Credential::new("c")).await.is_err());
        client.connect(&Credential::new("c")).await.unwrap();
        assert_eq!(client.connect_count(), 2);

        client.fail_sends(ChatId(5), SendFailure::Transient, 1);
        assert!(client.send_message(ChatId(5), "a").await.is_err());
        client.send_message(ChatId(5), "b").await.unwrap();
        assert_eq!(client.outbound_to(ChatId(5)).await.len(), 1);
    }

    #[tokio::test]
    async fn events_flow_until_disconnect() {
        let client = MockChatClient::new();
        client.connect(&Credential::new("c")).await.unwrap();
        let mut rx = client.events().await.unwrap();
        let event = ChatEvent::Deleted {
            chat_id: None,
            message_ids: vec![MessageId(1)],
        };
        assert!(client.emit(event.clone()).await);
        assert_eq!(rx.recv().await, Some(event));

        client.disconnect().await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn factory_returns_the_same_client_per_user() {
        let factory = MockClientFactory::new();
        let a = factory.client(UserId(1));
        let b = factory.client(UserId(1));
        assert!(Arc::ptr_eq(&a, &b));
    }
}
