// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Once-per-key media processing and upload-handle reuse.
//!
//! Both caches hand out a shared [`OnceCell`] per key, so concurrent callers
//! for the same key wait on a single in-flight computation instead of racing
//! to fill the entry. Entries are bounded by capacity (oldest evicted first)
//! and, for processed media, by age.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

use ferry_config::model::CacheConfig;
use ferry_core::settings::MediaSettings;
use ferry_core::types::{ChatId, MessageId, ProcessingKind, TaskId, UploadHandle, UserId};
use ferry_core::{ChatClient, FerryError, MediaProcessor, ProcessingRequest};

/// Identity of one processing result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaKey {
    pub chat: ChatId,
    pub message: MessageId,
    /// Edit revision of the source message.
    pub revision: i64,
    pub kind: ProcessingKind,
    /// Digest of the media settings that shape the output.
    pub fingerprint: String,
}

impl MediaKey {
    pub fn new(
        chat: ChatId,
        message: MessageId,
        revision: i64,
        kind: ProcessingKind,
        settings: &MediaSettings,
    ) -> Self {
        Self {
            chat,
            message,
            revision,
            kind,
            fingerprint: settings_fingerprint(kind, settings),
        }
    }
}

/// Stable digest of the settings relevant to `kind`.
pub fn settings_fingerprint(kind: ProcessingKind, settings: &MediaSettings) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.to_string().as_bytes());
    hasher.update(settings.params.to_string().as_bytes());
    hex::encode(&hasher.finalize()[..8])
}

/// Hex SHA-256 of a byte buffer.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Bytes to deliver for one key.
#[derive(Debug, Clone)]
pub struct ProcessedMedia {
    pub bytes: Arc<[u8]>,
    /// False when processing failed and the original bytes stand in.
    pub transformed: bool,
}

struct Entry<V> {
    cell: Arc<OnceCell<V>>,
    inserted: Instant,
    seq: u64,
}

/// Bounded map of per-key once-cells.
struct OnceMap<K, V> {
    entries: DashMap<K, Entry<V>>,
    capacity: usize,
    ttl: Option<Duration>,
    next_seq: AtomicU64,
}

impl<K, V> OnceMap<K, V>
where
    K: std::hash::Hash + Eq + Clone,
{
    fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            ttl,
            next_seq: AtomicU64::new(0),
        }
    }

    /// The cell for `key`, creating it after making room.
    fn cell(&self, key: &K) -> Arc<OnceCell<V>> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if self.ttl.is_none_or(|ttl| now.duration_since(entry.inserted) < ttl) {
                return Arc::clone(&entry.cell);
            }
        }
        self.evict(now);
        let entry = self.entries.entry(key.clone()).or_insert_with(|| Entry {
            cell: Arc::new(OnceCell::new()),
            inserted: now,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        });
        Arc::clone(&entry.cell)
    }

    /// Drops expired and then oldest entries. Capacity eviction skips cells
    /// still being computed, so the map may briefly exceed its capacity.
    fn evict(&self, now: Instant) {
        if let Some(ttl) = self.ttl {
            self.entries
                .retain(|_, e| now.duration_since(e.inserted) < ttl);
        }
        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .filter(|e| e.value().cell.initialized())
                .min_by_key(|e| e.value().seq)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drops `key` if its cell was never filled.
    fn forget_pending(&self, key: &K) {
        self.entries.remove_if(key, |_, e| !e.cell.initialized());
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Processes each distinct [`MediaKey`] at most once.
pub struct MediaCache {
    processor: Arc<dyn MediaProcessor>,
    results: OnceMap<MediaKey, ProcessedMedia>,
}

impl MediaCache {
    pub fn new(processor: Arc<dyn MediaProcessor>, config: &CacheConfig) -> Self {
        Self {
            processor,
            results: OnceMap::new(config.media_capacity, Some(config.media_ttl())),
        }
    }

    /// Returns the processed bytes for `key`, computing them on first use.
    ///
    /// A processing failure is not an error: the original bytes are stored
    /// and returned with `transformed == false`, so the processor is not
    /// retried for the same key.
    pub async fn process_once(
        &self,
        key: &MediaKey,
        original: &Arc<[u8]>,
        file_name: &str,
        settings: &MediaSettings,
        task_id: TaskId,
    ) -> ProcessedMedia {
        let cell = self.results.cell(key);
        if let Some(done) = cell.get() {
            debug!(
                chat_id = %key.chat,
                message_id = %key.message,
                kind = %key.kind,
                "media cache hit"
            );
            return done.clone();
        }
        cell.get_or_init(|| async {
            let request = ProcessingRequest {
                bytes: original,
                file_name,
                kind: key.kind,
                settings,
                task_id,
            };
            match self.processor.process(request).await {
                Ok(bytes) => ProcessedMedia {
                    bytes: Arc::from(bytes),
                    transformed: true,
                },
                Err(e) => {
                    warn!(
                        chat_id = %key.chat,
                        message_id = %key.message,
                        kind = %key.kind,
                        error = %e,
                        "media processing failed, using original bytes"
                    );
                    ProcessedMedia {
                        bytes: Arc::clone(original),
                        transformed: false,
                    }
                }
            }
        })
        .await
        .clone()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Remembers upload handles by (session user, content hash).
///
/// Handles are scoped to the session that uploaded them.
pub struct UploadCache {
    handles: OnceMap<(UserId, String), UploadHandle>,
}

impl UploadCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            handles: OnceMap::new(config.upload_capacity, None),
        }
    }

    /// Uploads `bytes` through `client` unless identical bytes were already
    /// uploaded by this user.
    pub async fn get_or_upload(
        &self,
        user: UserId,
        client: &dyn ChatClient,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<UploadHandle, FerryError> {
        let key = (user, content_hash(bytes));
        let cell = self.handles.cell(&key);
        match cell
            .get_or_try_init(|| async { client.upload(bytes, file_name).await })
            .await
        {
            Ok(handle) => Ok(handle.clone()),
            Err(e) => {
                self.handles.forget_pending(&key);
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_test_utils::{CountingProcessor, MockChatClient};

    fn config(capacity: usize) -> CacheConfig {
        CacheConfig {
            media_capacity: capacity,
            media_ttl_secs: 60,
            upload_capacity: capacity,
        }
    }

    fn key(message: i64) -> MediaKey {
        MediaKey::new(
            ChatId(-100),
            MessageId(message),
            0,
            ProcessingKind::ImageWatermark,
            &MediaSettings::default(),
        )
    }

    fn original() -> Arc<[u8]> {
        Arc::from(b"jpeg".to_vec())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_computation() {
        let processor = Arc::new(CountingProcessor::with_delay(Duration::from_millis(20)));
        let cache = Arc::new(MediaCache::new(processor.clone(), &config(16)));
        let settings = MediaSettings::default();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let settings = settings.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .process_once(&key(1), &original(), "a.jpg", &settings, TaskId(1))
                    .await
            }));
        }
        for handle in handles {
            let out = handle.await.unwrap();
            assert!(out.transformed);
            assert_eq!(&*out.bytes, b"jpeg+image_watermark");
        }
        assert_eq!(processor.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_keeps_computation_in_progress() {
        let processor = Arc::new(CountingProcessor::with_delay(Duration::from_millis(50)));
        let cache = Arc::new(MediaCache::new(processor.clone(), &config(1)));
        let run = |message: i64| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .process_once(
                        &key(message),
                        &original(),
                        "a.jpg",
                        &MediaSettings::default(),
                        TaskId(1),
                    )
                    .await
            })
        };

        let first = run(1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let other = run(2);
        tokio::time::sleep(Duration::from_millis(10)).await;
        let again = run(1);

        assert!(first.await.unwrap().transformed);
        assert!(other.await.unwrap().transformed);
        assert!(again.await.unwrap().transformed);
        assert_eq!(processor.calls(), 2);
    }

    #[tokio::test]
    async fn failure_falls_back_once() {
        let processor = Arc::new(CountingProcessor::new());
        processor.set_failing(true);
        let cache = MediaCache::new(processor.clone(), &config(16));
        let settings = MediaSettings::default();
        let bytes = original();

        let first = cache
            .process_once(&key(1), &bytes, "a.jpg", &settings, TaskId(1))
            .await;
        let second = cache
            .process_once(&key(1), &bytes, "a.jpg", &settings, TaskId(2))
            .await;
        assert!(!first.transformed);
        assert!(Arc::ptr_eq(&first.bytes, &bytes));
        assert!(!second.transformed);
        assert_eq!(processor.calls(), 1);
    }

    #[test]
    fn distinct_settings_produce_distinct_keys() {
        let mut custom = MediaSettings::default();
        custom.params = serde_json::json!({"text": "@mirror"});
        let kind = ProcessingKind::ImageWatermark;
        let base = MediaSettings::default();
        let a = MediaKey::new(ChatId(1), MessageId(1), 0, kind, &base);
        let b = MediaKey::new(ChatId(1), MessageId(1), 0, kind, &custom);
        let edited = MediaKey::new(ChatId(1), MessageId(1), 5, kind, &base);
        assert_ne!(a, b);
        assert_ne!(a, edited);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let processor = Arc::new(CountingProcessor::new());
        let cache = MediaCache::new(processor.clone(), &config(2));
        let settings = MediaSettings::default();
        for m in 1..=3 {
            cache
                .process_once(&key(m), &original(), "a.jpg", &settings, TaskId(1))
                .await;
        }
        assert_eq!(cache.len(), 2);
        // Key 1 was evicted, so it is computed again.
        cache
            .process_once(&key(1), &original(), "a.jpg", &settings, TaskId(1))
            .await;
        assert_eq!(processor.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let processor = Arc::new(CountingProcessor::new());
        let cache = MediaCache::new(processor.clone(), &config(16));
        let settings = MediaSettings::default();

        cache
            .process_once(&key(1), &original(), "a.jpg", &settings, TaskId(1))
            .await;
        tokio::time::advance(Duration::from_secs(61)).await;
        cache
            .process_once(&key(1), &original(), "a.jpg", &settings, TaskId(1))
            .await;
        assert_eq!(processor.calls(), 2);
    }

    #[tokio::test]
    async fn identical_bytes_upload_once_per_user() {
        let client = MockChatClient::new();
        let uploads = UploadCache::new(&config(16));

        let a = uploads
            .get_or_upload(UserId(1), &client, b"same", "a.jpg")
            .await
            .unwrap();
        let b = uploads
            .get_or_upload(UserId(1), &client, b"same", "b.jpg")
            .await
            .unwrap();
        let c = uploads
            .get_or_upload(UserId(2), &client, b"same", "a.jpg")
            .await
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(client.uploads().await.len(), 2);
    }
}
