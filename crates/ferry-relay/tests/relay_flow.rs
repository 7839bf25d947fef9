// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end relay flows over mock sessions.

use std::sync::Arc;
use std::time::Duration;

use ferry_config::model::FerryConfig;
use ferry_core::types::{
    ApprovalStatus, ChatEvent, ChatId, Credential, MediaKind, MessageId, MessageRef,
    ResolveOutcome, TaskId, UserId,
};
use ferry_core::{ApprovalHandler, FerryError, Notifier, Store};
use ferry_relay::{Collaborators, Relay};
use ferry_storage::SqliteStore;
use ferry_test_utils::{
    CountingProcessor, MemoryStore, MessageBuilder, MockChatClient, MockClientFactory, Outbound,
    RecordingNotifier, SendFailure, TaskBuilder, mappings_by_target,
};
use tokio_util::sync::CancellationToken;

const OWNER: UserId = UserId(7);

struct Harness {
    relay: Arc<Relay>,
    store: Arc<MemoryStore>,
    clients: Arc<MockClientFactory>,
    notifier: Arc<RecordingNotifier>,
    processor: Arc<CountingProcessor>,
}

impl Harness {
    async fn new(tasks: Vec<TaskBuilder>) -> Self {
        let store = Arc::new(MemoryStore::new());
        for (i, task) in tasks.into_iter().enumerate() {
            store.save_task(&task.id(i as i64 + 1).build()).await.unwrap();
        }
        store
            .save_credential(OWNER, &Credential::new("session-string"))
            .await
            .unwrap();
        let clients = Arc::new(MockClientFactory::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let processor = Arc::new(CountingProcessor::new());
        let relay = Relay::new(
            &FerryConfig::default(),
            Collaborators {
                store: store.clone(),
                clients: clients.clone(),
                processor: processor.clone(),
                notifier: Some(notifier.clone() as Arc<dyn Notifier>),
                translator: None,
            },
        );
        Self {
            relay,
            store,
            clients,
            notifier,
            processor,
        }
    }

    fn client(&self) -> Arc<MockChatClient> {
        self.clients.client(OWNER)
    }

    async fn emit(&self, event: ChatEvent) {
        assert!(self.client().emit(event).await, "session stream is not open");
    }
}

fn task() -> TaskBuilder {
    TaskBuilder::new(OWNER, "-100", &["-200", "-300"])
}

/// Polls `check` on the paused clock until it holds.
async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn copy_task_delivers_once_per_target() {
    let h = Harness::new(vec![task().copy()]).await;
    assert_eq!(h.relay.start_sessions().await.unwrap(), 1);

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::text(-100, 1, "hello").build(),
    ))
    .await;
    let client = &h.client();
    eventually(move || async move { client.outbound().await.len() == 2 }).await;

    let outbound = client.outbound().await;
    assert!(outbound.iter().all(|o| matches!(o, Outbound::Text { .. })));
    let by_target = mappings_by_target(&h.store.all_mappings());
    assert_eq!(by_target.len(), 2);
    assert!(by_target.values().all(|m| m.len() == 1));
}

#[tokio::test(start_paused = true)]
async fn shared_processing_runs_once_across_tasks() {
    let watermark = |b: TaskBuilder| b.settings(|s| s.media.image_watermark = true);
    let h = Harness::new(vec![
        watermark(task()),
        watermark(TaskBuilder::new(OWNER, "-100", &["-400"])),
    ])
    .await;
    h.relay.start_sessions().await.unwrap();

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::media(-100, 3, MediaKind::Photo, "sunset").build(),
    ))
    .await;
    let client = &h.client();
    eventually(move || async move { client.outbound().await.len() == 3 }).await;

    assert_eq!(h.processor.calls(), 1);
    assert_eq!(client.download_count(), 1);
    assert_eq!(client.uploads().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn untouched_task_forwards_original_while_sibling_gets_processed_file() {
    let h = Harness::new(vec![
        TaskBuilder::new(OWNER, "-100", &["-200"]).settings(|s| s.media.image_watermark = true),
        TaskBuilder::new(OWNER, "-100", &["-400"]),
    ])
    .await;
    h.relay.start_sessions().await.unwrap();
    let client = &h.client();
    client.set_media(MessageRef::new(ChatId(-100), MessageId(3)), b"raw".to_vec());

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::media(-100, 3, MediaKind::Photo, "sunset").build(),
    ))
    .await;
    eventually(move || async move { client.outbound().await.len() == 2 }).await;

    assert_eq!(h.processor.calls(), 1);
    match &client.outbound_to(ChatId(-200)).await[..] {
        [Outbound::File { kind, caption, .. }] => {
            assert_eq!(*kind, MediaKind::Photo);
            assert_eq!(caption.as_deref(), Some("sunset"));
        }
        other => panic!("unexpected sends {other:?}"),
    }
    let uploads = client.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].1 > b"raw".len());
    match &client.outbound_to(ChatId(-400)).await[..] {
        [Outbound::Forward { from, source_ids, .. }] => {
            assert_eq!(*from, ChatId(-100));
            assert_eq!(source_ids, &vec![MessageId(3)]);
        }
        other => panic!("unexpected sends {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn album_is_sent_once_per_target() {
    let h = Harness::new(vec![task().copy()]).await;
    h.relay.start_sessions().await.unwrap();

    for id in [12, 10, 11] {
        h.emit(ChatEvent::NewMessage(
            MessageBuilder::media(-100, id, MediaKind::Photo, if id == 10 { "trip" } else { "" })
                .album("g-1")
                .build(),
        ))
        .await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    tokio::time::sleep(Duration::from_secs(3)).await;

    let client = &h.client();
    let outbound = client.outbound().await;
    assert_eq!(outbound.len(), 2);
    for out in &outbound {
        match out {
            Outbound::Album { items, .. } => {
                assert_eq!(items.len(), 3);
                assert_eq!(items[0].caption.as_deref(), Some("trip"));
            }
            other => panic!("expected an album, got {other:?}"),
        }
    }
    assert_eq!(h.store.all_mappings().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn approval_delivers_exactly_once() {
    let h = Harness::new(vec![
        task().settings(|s| s.forwarding.manual_approval = true),
    ])
    .await;
    h.relay.start_sessions().await.unwrap();

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::text(-100, 4, "needs review").build(),
    ))
    .await;
    let notifier = &h.notifier;
    eventually(move || async move { notifier.approvals().await.len() == 1 }).await;
    let client = &h.client();
    assert!(client.outbound().await.is_empty());

    let id = h.notifier.approvals().await[0].1.id.clone();
    let err = h
        .relay
        .resolve_approval(UserId(99), &id, false)
        .await
        .unwrap_err();
    assert!(matches!(err, FerryError::Permission { .. }));

    assert_eq!(
        h.relay.resolve_approval(OWNER, &id, true).await.unwrap(),
        ResolveOutcome::Resolved(ApprovalStatus::Approved)
    );
    assert_eq!(
        h.relay.resolve_approval(OWNER, &id, true).await.unwrap(),
        ResolveOutcome::AlreadyResolved(ApprovalStatus::Approved)
    );
    assert_eq!(client.outbound().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_target_does_not_block_the_other() {
    let h = Harness::new(vec![task()]).await;
    h.relay.start_sessions().await.unwrap();
    let client = &h.client();
    client.fail_sends(ChatId(-200), SendFailure::Permission, usize::MAX);

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::text(-100, 5, "news").build(),
    ))
    .await;
    eventually(move || async move { client.outbound().await.len() == 1 }).await;

    let mappings = h.store.all_mappings();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].target_chat_id, ChatId(-300));
}

#[tokio::test(start_paused = true)]
async fn edits_and_deletes_follow_the_source() {
    let h = Harness::new(vec![task().copy()]).await;
    h.relay.start_sessions().await.unwrap();
    let client = &h.client();

    h.emit(ChatEvent::NewMessage(
        MessageBuilder::text(-100, 6, "draft").build(),
    ))
    .await;
    let store = &h.store;
    eventually(move || async move { store.all_mappings().len() == 2 }).await;

    h.emit(ChatEvent::EditedMessage(
        MessageBuilder::text(-100, 6, "final")
            .edited(ferry_test_utils::fixed_date())
            .build(),
    ))
    .await;
    eventually(move || async move { client.edits().await.len() == 2 }).await;
    assert!(
        client
            .edits()
            .await
            .iter()
            .all(|(_, edit)| edit.text.as_deref() == Some("final"))
    );

    h.emit(ChatEvent::Deleted {
        chat_id: None,
        message_ids: vec![MessageId(6)],
    })
    .await;
    eventually(move || async move { client.deletes().await.len() == 2 }).await;
    assert!(h.store.all_mappings().is_empty());
}

#[tokio::test(start_paused = true)]
async fn revoked_session_invalidates_credential() {
    let h = Harness::new(vec![task()]).await;
    h.clients
        .register(OWNER, MockChatClient::new())
        .set_authorized(false);

    assert_eq!(h.relay.start_sessions().await.unwrap(), 0);
    assert!(!h.store.credential_valid(OWNER));
    assert_eq!(h.notifier.failures().await.len(), 1);
    assert!(h.relay.sessions().active_users().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_stops_sessions_on_cancel() {
    let h = Harness::new(vec![task()]).await;
    let cancel = CancellationToken::new();
    let relay = Arc::clone(&h.relay);
    let running = tokio::spawn(relay.run(cancel.clone()));

    let client = &h.client();
    eventually(move || async move { client.is_connected() }).await;
    cancel.cancel();
    running.await.unwrap().unwrap();

    assert!(!client.is_connected());
    assert!(h.relay.sessions().active_users().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_until_signal_honours_the_parent_token() {
    let h = Harness::new(vec![task()]).await;
    let parent = CancellationToken::new();
    let relay = Arc::clone(&h.relay);
    let token = parent.clone();
    let running = tokio::spawn(async move { relay.run_until_signal(&token).await });

    let client = &h.client();
    eventually(move || async move { client.is_connected() }).await;
    parent.cancel();
    running.await.unwrap().unwrap();
    assert!(!client.is_connected());
}

#[tokio::test]
async fn sqlite_store_records_and_sync_clears_mappings() {
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());
    let id = store.save_task(&task().copy().build()).await.unwrap();
    store
        .save_credential(OWNER, &Credential::new("session-string"))
        .await
        .unwrap();
    let clients = Arc::new(MockClientFactory::new());
    let relay = Relay::new(
        &FerryConfig::default(),
        Collaborators {
            store: store.clone(),
            clients: clients.clone(),
            processor: Arc::new(CountingProcessor::new()),
            notifier: None,
            translator: None,
        },
    );
    assert_eq!(relay.start_sessions().await.unwrap(), 1);
    let client = clients.client(OWNER);

    client
        .emit(ChatEvent::NewMessage(
            MessageBuilder::text(-100, 8, "persisted").build(),
        ))
        .await;
    let (store_ref, client_ref) = (&store, &client);
    eventually(move || async move {
        store_ref
            .mappings_for_source(id, ChatId(-100), MessageId(8))
            .await
            .unwrap()
            .len()
            == 2
    })
    .await;
    assert_eq!(client_ref.outbound().await.len(), 2);

    client
        .emit(ChatEvent::Deleted {
            chat_id: Some(ChatId(-100)),
            message_ids: vec![MessageId(8)],
        })
        .await;
    eventually(move || async move {
        store_ref
            .mappings_for_source(id, ChatId(-100), MessageId(8))
            .await
            .unwrap()
            .is_empty()
    })
    .await;
    assert_ne!(id, TaskId(0));
}
