// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media processor trait for watermarking and audio tagging.

use async_trait::async_trait;

use crate::error::FerryError;
use crate::settings::MediaSettings;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProcessingKind, TaskId};

/// Input to one processing call.
#[derive(Debug, Clone, Copy)]
pub struct ProcessingRequest<'a> {
    pub bytes: &'a [u8],
    pub file_name: &'a str,
    pub kind: ProcessingKind,
    pub settings: &'a MediaSettings,
    pub task_id: TaskId,
}

/// Transforms media bytes. Must be deterministic for identical input and
/// settings so results can be cached.
#[async_trait]
pub trait MediaProcessor: PluginAdapter {
    async fn process(&self, request: ProcessingRequest<'_>) -> Result<Vec<u8>, FerryError>;
}
