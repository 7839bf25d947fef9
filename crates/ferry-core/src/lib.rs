// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Ferry relay.
//!
//! This crate provides the error taxonomy, the domain types shared by every
//! crate in the workspace, and the traits for the external collaborators the
//! relay engine talks to: the platform chat client, the store, the media
//! processor, the notification surface and the translator.

pub mod error;
pub mod settings;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FerryError;
pub use settings::TaskSettings;
pub use types::{
    AdapterType, ChatEvent, ChatId, ChatRef, ForwardMode, HealthStatus, InboundMessage,
    MessageId, MessageRef, Task, TaskId, UserId,
};

pub use traits::{
    ApprovalHandler, ChatClient, ChatClientFactory, MediaProcessor, Notifier, PluginAdapter,
    ProcessingRequest, Store, Translator,
};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::{ApprovalStatus, Credential, MediaInfo, MediaKind};

    #[test]
    fn ferry_error_classifies_retryable_variants() {
        assert!(FerryError::network("reset").is_retryable());
        assert!(
            FerryError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .is_retryable()
        );
        assert!(
            FerryError::Timeout {
                duration: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(
            !FerryError::Permission {
                chat: -100,
                message: "no rights".into()
            }
            .is_retryable()
        );
        assert!(
            !FerryError::Auth {
                message: "expired".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn rate_limit_reports_exact_wait() {
        let err = FerryError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));
        assert_eq!(FerryError::network("x").retry_after(), None);
    }

    #[test]
    fn already_resolved_mentions_status() {
        let err = FerryError::AlreadyResolved {
            id: "p1".into(),
            status: ApprovalStatus::Rejected,
        };
        assert_eq!(err.to_string(), "approval p1 already resolved as rejected");
    }

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        let variants = [
            AdapterType::ChatClient,
            AdapterType::Store,
            AdapterType::MediaProcessor,
            AdapterType::Notifier,
            AdapterType::Translator,
        ];
        for variant in &variants {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn chat_ref_parsing() {
        assert_eq!(ChatRef::new("-1001234").as_id(), Some(ChatId(-1001234)));
        assert_eq!(ChatRef::new("@news_feed").username(), Some("news_feed"));
        assert_eq!(
            ChatRef::new("https://t.me/news_feed/").username(),
            Some("news_feed")
        );
        assert_eq!(ChatRef::new("-1001234").username(), None);
        assert!(!ChatRef::new("not a chat").is_well_formed());
        assert!(!ChatRef::new("@ab").is_well_formed());
    }

    #[test]
    fn inbound_message_kind_and_revision() {
        let mut msg = InboundMessage {
            chat_id: ChatId(-100),
            chat_kind: types::ChatKind::Channel,
            message_id: MessageId(7),
            sender_id: None,
            author_signature: None,
            text: None,
            media: None,
            media_group_id: None,
            has_buttons: false,
            is_forwarded: false,
            date: chrono::Utc::now(),
            edited_at: None,
        };
        assert_eq!(msg.kind(), MediaKind::Text);
        assert_eq!(msg.revision(), 0);
        assert_eq!(msg.reference().to_string(), "-100/7");

        msg.media = Some(MediaInfo {
            kind: MediaKind::Photo,
            unique_id: "AQAD".into(),
            file_name: None,
            mime_type: None,
            size: None,
        });
        msg.edited_at = Some(chrono::Utc::now());
        assert_eq!(msg.kind(), MediaKind::Photo);
        assert!(msg.revision() > 0);
    }

    #[test]
    fn credential_debug_is_redacted() {
        let cred = Credential::new("1BVtsOK4Bu0secret");
        assert_eq!(format!("{cred:?}"), "Credential([REDACTED])");
        assert_eq!(cred.expose(), "1BVtsOK4Bu0secret");
    }

    #[test]
    fn approval_status_terminality() {
        assert!(!ApprovalStatus::Pending.is_terminal());
        assert!(ApprovalStatus::Approved.is_terminal());
        assert!(ApprovalStatus::Rejected.is_terminal());
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_chat_client<T: ChatClient>() {}
        fn _assert_store<T: Store>() {}
        fn _assert_media_processor<T: MediaProcessor>() {}
        fn _assert_notifier<T: Notifier>() {}
        fn _assert_translator<T: Translator>() {}
        fn _assert_approval_handler<T: ApprovalHandler>() {}
    }
}
