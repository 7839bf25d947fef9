// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the SQLite store against a real database file.

use std::sync::Arc;

use ferry_core::Store;
use ferry_core::settings::TaskSettings;
use ferry_core::types::{
    ApprovalStatus, ChatId, ChatRef, Credential, ForwardMode, MessageId, MessageMapping,
    MessageRef, PendingApproval, Task, TaskId, UserId,
};
use ferry_storage::{Database, SqliteStore};
use tempfile::TempDir;

async fn temp_store() -> (TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let db = Database::open(path.to_str().unwrap(), true).await.unwrap();
    (dir, SqliteStore::from_database(db))
}

fn task(owner: i64, name: &str, source: &str, targets: &[&str]) -> Task {
    Task {
        id: TaskId(0),
        owner: UserId(owner),
        name: name.to_string(),
        source: ChatRef::new(source),
        targets: targets.iter().map(|t| ChatRef::new(*t)).collect(),
        forward_mode: ForwardMode::Forward,
        active: true,
        settings: TaskSettings::default(),
    }
}

fn pending(id: &str) -> PendingApproval {
    PendingApproval {
        id: id.to_string(),
        task_id: TaskId(1),
        source: MessageRef::new(ChatId(-100), MessageId(7)),
        payload: r#"{"message":null}"#.to_string(),
        status: ApprovalStatus::Pending,
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

#[tokio::test]
async fn task_round_trip_preserves_settings() {
    let (_dir, store) = temp_store().await;

    let mut t = task(1, "news", "@news_feed", &["-1001", "@mirror_one"]);
    t.forward_mode = ForwardMode::Copy;
    t.settings.forwarding.manual_approval = true;
    t.settings.filters.keywords.enabled = true;
    t.settings.filters.keywords.deny = vec!["spam".to_string()];
    t.settings.formatting.footer = Some("via ferry".to_string());

    let id = store.save_task(&t).await.unwrap();
    assert!(id.0 > 0);

    let loaded = store.get_task(id).await.unwrap().expect("task should exist");
    t.id = id;
    assert_eq!(loaded, t);
}

#[tokio::test]
async fn save_task_with_id_updates_in_place() {
    let (_dir, store) = temp_store().await;

    let id = store
        .save_task(&task(1, "a", "@source_chan", &["-1001"]))
        .await
        .unwrap();
    let mut updated = store.get_task(id).await.unwrap().unwrap();
    updated.active = false;
    updated.name = "renamed".to_string();
    assert_eq!(store.save_task(&updated).await.unwrap(), id);

    let all = store.list_tasks(None).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "renamed");
    assert!(!all[0].active);
}

#[tokio::test]
async fn active_tasks_filter_by_owner_and_flag() {
    let (_dir, store) = temp_store().await;

    store.save_task(&task(1, "a", "@chan_a", &["-1"])).await.unwrap();
    let mut inactive = task(1, "b", "@chan_b", &["-2"]);
    inactive.active = false;
    store.save_task(&inactive).await.unwrap();
    store.save_task(&task(2, "c", "@chan_c", &["-3"])).await.unwrap();

    let active = store.active_tasks(UserId(1)).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].name, "a");

    assert_eq!(store.list_tasks(Some(UserId(1))).await.unwrap().len(), 2);
    assert_eq!(store.list_tasks(None).await.unwrap().len(), 3);
    assert!(store.get_task(TaskId(999)).await.unwrap().is_none());
}

#[tokio::test]
async fn invalidated_credentials_are_not_returned() {
    let (_dir, store) = temp_store().await;

    store
        .save_credential(UserId(1), &Credential::new("one"))
        .await
        .unwrap();
    store
        .save_credential(UserId(2), &Credential::new("two"))
        .await
        .unwrap();
    store.invalidate_credential(UserId(1)).await.unwrap();

    let valid = store.valid_credentials().await.unwrap();
    assert_eq!(valid.len(), 1);
    assert_eq!(valid[0].0, UserId(2));
    assert_eq!(valid[0].1.expose(), "two");
    assert!(store.get_credential(UserId(1)).await.unwrap().is_none());

    // Re-authenticating revalidates.
    store
        .save_credential(UserId(1), &Credential::new("one-again"))
        .await
        .unwrap();
    let cred = store.get_credential(UserId(1)).await.unwrap().unwrap();
    assert_eq!(cred.expose(), "one-again");
}

#[tokio::test]
async fn session_health_reports_latest_check() {
    let (_dir, store) = temp_store().await;

    store
        .save_credential(UserId(3), &Credential::new("c"))
        .await
        .unwrap();
    store
        .set_session_health(UserId(3), false, Some("reconnecting"))
        .await
        .unwrap();

    let health = store.session_health().await.unwrap();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].user, UserId(3));
    assert!(!health[0].healthy);
    assert!(health[0].credential_valid);
    assert_eq!(health[0].detail.as_deref(), Some("reconnecting"));

    store.set_session_health(UserId(3), true, None).await.unwrap();
    let health = store.session_health().await.unwrap();
    assert!(health[0].healthy);
    assert!(health[0].detail.is_none());
}

#[tokio::test]
async fn pending_transition_is_compare_and_set() {
    let (_dir, store) = temp_store().await;
    store.insert_pending(&pending("p1")).await.unwrap();

    assert!(
        store
            .transition_pending("p1", ApprovalStatus::Approved)
            .await
            .unwrap()
    );
    assert!(
        !store
            .transition_pending("p1", ApprovalStatus::Rejected)
            .await
            .unwrap()
    );

    let item = store.get_pending("p1").await.unwrap().unwrap();
    assert_eq!(item.status, ApprovalStatus::Approved);
}

#[tokio::test]
async fn transition_back_to_pending_is_rejected() {
    let (_dir, store) = temp_store().await;
    store.insert_pending(&pending("p1")).await.unwrap();
    assert!(
        store
            .transition_pending("p1", ApprovalStatus::Pending)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn concurrent_resolvers_see_one_winner() {
    let (_dir, store) = temp_store().await;
    let store = Arc::new(store);
    store.insert_pending(&pending("race")).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let to = if i % 2 == 0 {
            ApprovalStatus::Approved
        } else {
            ApprovalStatus::Rejected
        };
        handles.push(tokio::spawn(async move {
            store.transition_pending("race", to).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn list_pending_filters_by_status() {
    let (_dir, store) = temp_store().await;
    store.insert_pending(&pending("a")).await.unwrap();
    store.insert_pending(&pending("b")).await.unwrap();
    store
        .transition_pending("b", ApprovalStatus::Rejected)
        .await
        .unwrap();

    let open = store
        .list_pending(Some(ApprovalStatus::Pending))
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "a");
    assert_eq!(store.list_pending(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn mapping_insert_is_idempotent() {
    let (_dir, store) = temp_store().await;
    let mapping = MessageMapping {
        task_id: TaskId(1),
        source_chat_id: ChatId(-100),
        source_message_id: MessageId(10),
        target_chat_id: ChatId(-200),
        target_message_id: MessageId(55),
        decorated: false,
    };

    store.insert_mapping(&mapping).await.unwrap();
    store.insert_mapping(&mapping).await.unwrap();

    let found = store
        .mappings_for_source(TaskId(1), ChatId(-100), MessageId(10))
        .await
        .unwrap();
    assert_eq!(found, vec![mapping]);

    // Other tasks do not see the mapping.
    assert!(
        store
            .mappings_for_source(TaskId(2), ChatId(-100), MessageId(10))
            .await
            .unwrap()
            .is_empty()
    );

    store.delete_mapping(&mapping).await.unwrap();
    assert!(
        store
            .mappings_for_source(TaskId(1), ChatId(-100), MessageId(10))
            .await
            .unwrap()
            .is_empty()
    );
}
