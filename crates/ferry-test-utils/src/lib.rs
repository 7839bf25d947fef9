// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Ferry integration tests.
//!
//! Provides in-memory doubles for every external collaborator so the relay
//! engine can be exercised deterministically without a platform or database.
//!
//! # Components
//!
//! - [`MockChatClient`] - scripted events, captured sends, injectable failures
//! - [`MemoryStore`] - `Store` held in memory
//! - [`CountingProcessor`] / [`PrefixTranslator`] - collaborators that count calls
//! - [`RecordingNotifier`] - captures approval prompts, buttons and failure notices
//! - [`TaskBuilder`] / [`MessageBuilder`] - fixtures

pub mod builders;
pub mod memory_store;
pub mod mock_client;
pub mod notifier;
pub mod processor;

pub use builders::{MessageBuilder, TaskBuilder, fixed_date};
pub use memory_store::{MemoryStore, mappings_by_target};
pub use mock_client::{MockChatClient, MockClientFactory, Outbound, SendFailure};
pub use notifier::RecordingNotifier;
pub use processor::{CountingProcessor, PrefixTranslator};
