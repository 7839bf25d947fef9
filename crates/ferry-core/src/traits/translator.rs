// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translator trait for copy-mode translation.

use async_trait::async_trait;

use crate::error::FerryError;
use crate::traits::adapter::PluginAdapter;

#[async_trait]
pub trait Translator: PluginAdapter {
    /// Translates `text` into the language identified by `target`.
    async fn translate(&self, text: &str, target: &str) -> Result<String, FerryError>;
}
