// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! All collaborators extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod client;
pub mod media;
pub mod notifier;
pub mod store;
pub mod translator;

pub use adapter::PluginAdapter;
pub use client::{ChatClient, ChatClientFactory};
pub use media::{MediaProcessor, ProcessingRequest};
pub use notifier::{ApprovalHandler, Notifier};
pub use store::Store;
pub use translator::Translator;
