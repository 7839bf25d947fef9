// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media processor and translator doubles that count their calls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use ferry_core::types::{AdapterType, HealthStatus};
use ferry_core::{FerryError, MediaProcessor, PluginAdapter, ProcessingRequest, Translator};

/// Appends `+<kind>` to the input bytes and counts invocations.
#[derive(Default)]
pub struct CountingProcessor {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
}

impl CountingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call, to widen race windows.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail with a processing error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for CountingProcessor {
    fn name(&self) -> &str {
        "counting-processor"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::MediaProcessor
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        Ok(())
    }
}

#[async_trait]
impl MediaProcessor for CountingProcessor {
    async fn process(&self, request: ProcessingRequest<'_>) -> Result<Vec<u8>, FerryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(FerryError::processing("encoder crashed"));
        }
        let mut out = request.bytes.to_vec();
        out.extend_from_slice(format!("+{}", request.kind).as_bytes());
        Ok(out)
    }
}

/// Prefixes text with `[<target>] ` and counts invocations.
#[derive(Default)]
pub struct PrefixTranslator {
    calls: AtomicUsize,
}

impl PrefixTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginAdapter for PrefixTranslator {
    fn name(&self) -> &str {
        "prefix-translator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Translator
    }

    async fn health_check(&self) -> Result<HealthStatus, FerryError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FerryError> {
        Ok(())
    }
}

#[async_trait]
impl Translator for PrefixTranslator {
    async fn translate(&self, text: &str, target: &str) -> Result<String, FerryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("[{target}] {text}"))
    }
}
