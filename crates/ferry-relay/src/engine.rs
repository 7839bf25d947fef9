// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The forwarding engine.
//!
//! For each inbound message the engine finds the user's tasks watching the
//! source chat, runs the filter chain per task, and then either holds the
//! message for approval, buffers it as part of an album, or delivers it to
//! every target. Failures are isolated per target: one rejected send never
//! stops the siblings of the same task or the other tasks.
//!
//! Media is downloaded at most once per message and processed at most once
//! per (message, processing kind, settings) through the [`MediaCache`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use ferry_config::model::FerryConfig;
use ferry_core::types::{
    AlbumItem, ChatId, ForwardMode, InboundMessage, MessageId, MessageMapping, TaskId,
    UploadHandle,
};
use ferry_core::{FerryError, MediaProcessor, Notifier, Store, Translator};

use crate::album::{AlbumBatcher, AlbumKey, AlbumPart, AlbumSink, ReadyAlbum};
use crate::approval::{ApprovalPayload, ApprovalQueue};
use crate::delivery::{RetryPolicy, send_with_retry};
use crate::filter::{FilterChain, FilterFlags, Verdict};
use crate::media_cache::{MediaCache, MediaKey, ProcessedMedia, UploadCache};
use crate::post_action::PostActionScheduler;
use crate::session::SessionContext;
use crate::task_index::{RoutedTask, TaskIndex};
use crate::transform::{self, SideEffects};

/// Per-message tally of what happened, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Tasks whose filter chain denied the message.
    pub filtered: usize,
    /// Tasks that held the message for approval.
    pub held: usize,
    /// Tasks that buffered the message into an album.
    pub batched: usize,
    /// Successful (task, target) deliveries.
    pub delivered: usize,
    /// Failed (task, target) deliveries.
    pub failed: usize,
}

impl DeliveryReport {
    fn absorb(&mut self, other: DeliveryReport) {
        self.filtered += other.filtered;
        self.held += other.held;
        self.batched += other.batched;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Original media bytes of one message, downloaded on first use.
pub(crate) struct SourceBytes<'a> {
    ctx: &'a SessionContext,
    message: &'a InboundMessage,
    bytes: OnceCell<Arc<[u8]>>,
}

impl<'a> SourceBytes<'a> {
    pub(crate) fn new(ctx: &'a SessionContext, message: &'a InboundMessage) -> Self {
        Self {
            ctx,
            message,
            bytes: OnceCell::new(),
        }
    }

    pub(crate) async fn get(&self) -> Result<Arc<[u8]>, FerryError> {
        let bytes = self
            .bytes
            .get_or_try_init(|| async {
                let bytes = self
                    .ctx
                    .client
                    .download_media(self.message.reference())
                    .await?;
                Ok::<_, FerryError>(Arc::from(bytes))
            })
            .await?;
        Ok(Arc::clone(bytes))
    }
}

/// How one message is sent to every target of one task.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub mode: ForwardMode,
    /// Final text or caption.
    pub text: String,
    /// Present only when processing actually changed the media.
    pub processed: Option<ProcessedMedia>,
}

/// Orchestrates filtering, batching, approval and delivery.
pub struct ForwardingEngine {
    tasks: Arc<TaskIndex>,
    filters: FilterChain,
    media: MediaCache,
    uploads: UploadCache,
    albums: Arc<AlbumBatcher>,
    approvals: Arc<ApprovalQueue>,
    post: Arc<PostActionScheduler>,
    store: Arc<dyn Store>,
    translator: Option<Arc<dyn Translator>>,
    retry: RetryPolicy,
}

impl ForwardingEngine {
    pub fn new(
        config: &FerryConfig,
        tasks: Arc<TaskIndex>,
        store: Arc<dyn Store>,
        processor: Arc<dyn MediaProcessor>,
        notifier: Option<Arc<dyn Notifier>>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Self {
        Self {
            tasks,
            filters: FilterChain::new(config.relay.utc_offset_minutes),
            media: MediaCache::new(processor, &config.cache),
            uploads: UploadCache::new(&config.cache),
            albums: Arc::new(AlbumBatcher::new(&config.album)),
            approvals: Arc::new(ApprovalQueue::new(Arc::clone(&store), notifier.clone())),
            post: Arc::new(PostActionScheduler::new(Arc::clone(&store), notifier)),
            store,
            translator,
            retry: RetryPolicy::from_config(&config.delivery, &config.session),
        }
    }

    pub fn tasks(&self) -> &Arc<TaskIndex> {
        &self.tasks
    }

    pub fn approvals(&self) -> &Arc<ApprovalQueue> {
        &self.approvals
    }

    pub fn albums(&self) -> &Arc<AlbumBatcher> {
        &self.albums
    }

    pub fn post_actions(&self) -> &Arc<PostActionScheduler> {
        &self.post
    }

    /// Drops the filter ledgers kept for `task`.
    pub fn forget_task(&self, task: TaskId) {
        self.filters.forget_task(task);
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Routes one new message through every matching task.
    pub async fn on_message(
        self: &Arc<Self>,
        ctx: &SessionContext,
        msg: &InboundMessage,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let candidates = self.tasks.tasks_for_source(ctx.user, msg.chat_id);
        if candidates.is_empty() {
            return report;
        }

        let now = Utc::now();
        let mut accepted = Vec::with_capacity(candidates.len());
        for task in candidates {
            match self.filters.evaluate(&task.task, msg, now) {
                Verdict::Allow(flags) => accepted.push((task, flags)),
                Verdict::Deny { stage, reason } => {
                    debug!(
                        task_id = %task.id(),
                        chat_id = %msg.chat_id,
                        message_id = %msg.message_id,
                        stage = %stage,
                        reason = %reason,
                        "message filtered"
                    );
                    report.filtered += 1;
                }
            }
        }
        let Some((first, _)) = accepted.first() else {
            return report;
        };

        let global_copy = copy_forced(first, msg);

        let source = SourceBytes::new(ctx, msg);
        for (task, flags) in accepted {
            let forwarding = &task.task.settings.forwarding;
            if forwarding.manual_approval {
                match self.approvals.submit(&task.task, msg, flags, global_copy).await {
                    Ok(_) => report.held += 1,
                    Err(e) => {
                        warn!(task_id = %task.id(), error = %e, "failed to hold message for approval");
                        report.failed += task.targets.len();
                    }
                }
                continue;
            }

            if let Some(group) = album_group(&task, msg) {
                let key = AlbumKey {
                    task: task.id(),
                    chat: msg.chat_id,
                    group,
                };
                let part = AlbumPart {
                    ctx: ctx.clone(),
                    task: Arc::clone(&task),
                    message: msg.clone(),
                    flags,
                    global_copy,
                };
                let sink: Arc<dyn AlbumSink> = Arc::clone(self) as Arc<dyn AlbumSink>;
                if self.albums.collect(key, part, sink) {
                    report.batched += 1;
                }
                continue;
            }

            report.absorb(self.dispatch(ctx, &task, msg, flags, global_copy, &source).await);
        }
        report
    }

    /// Delivers a message whose approval was just granted.
    pub async fn deliver_approved(
        &self,
        ctx: &SessionContext,
        task: &RoutedTask,
        payload: &ApprovalPayload,
    ) -> DeliveryReport {
        let source = SourceBytes::new(ctx, &payload.message);
        self.dispatch(
            ctx,
            task,
            &payload.message,
            payload.flags,
            payload.global_copy,
            &source,
        )
        .await
    }

    /// Sends one message to every target of one task.
    async fn dispatch(
        &self,
        ctx: &SessionContext,
        task: &RoutedTask,
        msg: &InboundMessage,
        flags: FilterFlags,
        global_copy: bool,
        source: &SourceBytes<'_>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let plan = self.prepare(task, msg, flags, global_copy, source, true).await;
        for &target in &task.targets {
            match self.send_one(ctx, msg, &plan, target).await {
                Ok(ids) => {
                    let mappings = self.record(task, &[msg.message_id], target, &ids).await;
                    self.post.after_delivery(ctx, task, &mappings).await;
                    report.delivered += 1;
                }
                Err(e) => {
                    log_target_failure(task, target, &e);
                    report.failed += 1;
                }
            }
        }
        if report.delivered > 0 {
            info!(
                task_id = %task.id(),
                message_id = %msg.message_id,
                mode = %plan.mode,
                delivered = report.delivered,
                failed = report.failed,
                "message delivered"
            );
        }
        report
    }

    /// Computes text, media and send mode of `msg` for `task`.
    ///
    /// `decorate` adds the header and footer; album items other than the
    /// first go without them.
    pub(crate) async fn prepare(
        &self,
        task: &RoutedTask,
        msg: &InboundMessage,
        flags: FilterFlags,
        global_copy: bool,
        source: &SourceBytes<'_>,
        decorate: bool,
    ) -> Plan {
        let settings = &task.task.settings;
        let format = &settings.formatting;
        let original = msg.text_or_empty();
        let cleaned = transform::clean_text(original, format);
        // Translation only applies to copies; forward mode keeps the source text.
        let translate = task.task.forward_mode == ForwardMode::Copy && !cleaned.trim().is_empty();
        let body = match (&format.translate_to, &self.translator) {
            (Some(lang), Some(translator)) if translate => {
                match translator.translate(&cleaned, lang).await {
                    Ok(translated) => translated,
                    Err(e) => {
                        warn!(task_id = %task.id(), error = %e, "translation failed, sending untranslated");
                        cleaned
                    }
                }
            }
            _ => cleaned,
        };
        let text = if decorate {
            transform::decorate(&body, format)
        } else {
            body.clone()
        };

        let processed = self.process_media(task, msg, source).await;
        let effects = SideEffects {
            text_changed: global_copy || body != original,
            decorated: text != body,
            buttons: !format.buttons.is_empty(),
            media_changed: processed.is_some(),
            strip_forward_header: flags.strip_forward_header,
            strip_buttons: flags.strip_buttons,
        };
        let mode = transform::send_mode(task.task.forward_mode, &effects);

        Plan {
            mode,
            text,
            processed,
        }
    }

    /// The processed media for `task`, if processing applies and changed it.
    async fn process_media(
        &self,
        task: &RoutedTask,
        msg: &InboundMessage,
        source: &SourceBytes<'_>,
    ) -> Option<ProcessedMedia> {
        let media = msg.media.as_ref()?;
        let settings = &task.task.settings.media;
        let kind = settings.processing_for(media.kind)?;
        let original = match source.get().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    task_id = %task.id(),
                    message_id = %msg.message_id,
                    error = %e,
                    "media download failed, sending original"
                );
                return None;
            }
        };
        let key = MediaKey::new(msg.chat_id, msg.message_id, msg.revision(), kind, settings);
        let processed = self
            .media
            .process_once(&key, &original, &media.upload_name(), settings, task.id())
            .await;
        processed.transformed.then_some(processed)
    }

    /// Uploads processed bytes once per session and content.
    pub(crate) async fn upload(
        &self,
        ctx: &SessionContext,
        bytes: &[u8],
        file_name: &str,
    ) -> Result<UploadHandle, FerryError> {
        self.uploads
            .get_or_upload(ctx.user, ctx.client.as_ref(), bytes, file_name)
            .await
    }

    /// Sends `msg` to one target according to `plan`.
    async fn send_one(
        &self,
        ctx: &SessionContext,
        msg: &InboundMessage,
        plan: &Plan,
        target: ChatId,
    ) -> Result<Vec<MessageId>, FerryError> {
        let client = ctx.client.as_ref();
        let retry = &self.retry;
        if plan.mode == ForwardMode::Forward {
            let ids = [msg.message_id];
            let from = msg.chat_id;
            let ids = &ids[..];
            return send_with_retry(retry, target, move || {
                client.forward_messages(target, from, ids)
            })
            .await;
        }

        match (&msg.media, &plan.processed) {
            (Some(media), Some(processed)) => {
                let handle = self.upload(ctx, &processed.bytes, &media.upload_name()).await?;
                let handle = &handle;
                let kind = media.kind;
                let caption = non_empty(&plan.text);
                let id = send_with_retry(retry, target, move || {
                    client.send_file(target, handle, kind, caption)
                })
                .await?;
                Ok(vec![id])
            }
            (Some(_), None) => {
                let source = msg.reference();
                let caption = (plan.text != msg.text_or_empty()).then_some(plan.text.as_str());
                let id = send_with_retry(retry, target, move || {
                    client.copy_message(target, source, caption)
                })
                .await?;
                Ok(vec![id])
            }
            (None, _) => {
                if plan.text.trim().is_empty() {
                    return Err(FerryError::Validation("nothing left to send".into()));
                }
                let text = plan.text.as_str();
                let id =
                    send_with_retry(retry, target, move || client.send_message(target, text))
                        .await?;
                Ok(vec![id])
            }
        }
    }

    /// Persists one mapping per delivered message. Store failures are logged.
    ///
    /// Only the first of `sources` was rendered with the header and footer.
    async fn record(
        &self,
        task: &RoutedTask,
        sources: &[MessageId],
        target: ChatId,
        delivered: &[MessageId],
    ) -> Vec<MessageMapping> {
        let mut mappings = Vec::with_capacity(delivered.len());
        for (i, (source, delivered)) in sources.iter().zip(delivered).enumerate() {
            let mapping = MessageMapping {
                task_id: task.id(),
                source_chat_id: task.source,
                source_message_id: *source,
                target_chat_id: target,
                target_message_id: *delivered,
                decorated: i == 0,
            };
            if let Err(e) = self.store.insert_mapping(&mapping).await {
                warn!(
                    task_id = %task.id(),
                    target = %target,
                    error = %e,
                    "failed to record message mapping"
                );
            }
            mappings.push(mapping);
        }
        mappings
    }

    /// Builds the album items of a copy-mode album, uploading each once.
    async fn album_items(
        &self,
        ctx: &SessionContext,
        messages: &[InboundMessage],
        sources: &[SourceBytes<'_>],
        plans: &[Plan],
    ) -> Result<Vec<AlbumItem>, FerryError> {
        let mut items = Vec::with_capacity(messages.len());
        for ((msg, source), plan) in messages.iter().zip(sources).zip(plans) {
            let Some(media) = &msg.media else {
                continue;
            };
            let bytes = match &plan.processed {
                Some(processed) => Arc::clone(&processed.bytes),
                None => source.get().await?,
            };
            let handle = self.upload(ctx, &bytes, &media.upload_name()).await?;
            items.push(AlbumItem {
                handle,
                kind: media.kind,
                caption: non_empty(&plan.text).map(str::to_string),
            });
        }
        Ok(items)
    }
}

#[async_trait]
impl AlbumSink for ForwardingEngine {
    async fn deliver_album(&self, album: ReadyAlbum) {
        let ReadyAlbum {
            ctx,
            task,
            messages,
            flags,
            global_copy,
            ..
        } = album;

        let sources: Vec<SourceBytes<'_>> =
            messages.iter().map(|m| SourceBytes::new(&ctx, m)).collect();
        let mut plans = Vec::with_capacity(messages.len());
        for (i, (msg, source)) in messages.iter().zip(&sources).enumerate() {
            plans.push(
                self.prepare(&task, msg, flags, global_copy, source, i == 0)
                    .await,
            );
        }
        let copy = plans.iter().any(|p| p.mode == ForwardMode::Copy);
        let ids: Vec<MessageId> = messages.iter().map(|m| m.message_id).collect();

        let items = if copy {
            match self.album_items(&ctx, &messages, &sources, &plans).await {
                Ok(items) => Some(items),
                Err(e) => {
                    warn!(task_id = %task.id(), error = %e, "failed to prepare album");
                    return;
                }
            }
        } else {
            None
        };

        let client = ctx.client.as_ref();
        let mut delivered = 0;
        for &target in &task.targets {
            let result = match &items {
                Some(items) => {
                    let items = &items[..];
                    send_with_retry(&self.retry, target, move || client.send_album(target, items))
                        .await
                }
                None => {
                    let from = task.source;
                    let ids = &ids[..];
                    send_with_retry(&self.retry, target, move || {
                        client.forward_messages(target, from, ids)
                    })
                    .await
                }
            };
            match result {
                Ok(sent) => {
                    let mappings = self.record(&task, &ids, target, &sent).await;
                    self.post.after_delivery(&ctx, &task, &mappings).await;
                    delivered += 1;
                }
                Err(e) => log_target_failure(&task, target, &e),
            }
        }
        info!(
            task_id = %task.id(),
            items = messages.len(),
            targets = task.targets.len(),
            delivered,
            copy,
            "album delivered"
        );
    }
}

/// Whether cleaning `msg` with `first`'s rules changes its text.
///
/// Cleaning is judged once per message with the first matching task; when
/// it changes the text every task copies instead of forwarding.
pub(crate) fn copy_forced(first: &RoutedTask, msg: &InboundMessage) -> bool {
    let original = msg.text_or_empty();
    transform::clean_text(original, &first.task.settings.formatting) != original
}

/// The album group `msg` should be buffered under, if any.
fn album_group(task: &RoutedTask, msg: &InboundMessage) -> Option<String> {
    if !task.task.settings.forwarding.album_batching {
        return None;
    }
    if !msg.kind().is_album_capable() {
        return None;
    }
    msg.media_group_id.clone()
}

fn non_empty(text: &str) -> Option<&str> {
    (!text.trim().is_empty()).then_some(text)
}

fn log_target_failure(task: &RoutedTask, target: ChatId, error: &FerryError) {
    match error {
        FerryError::Permission { .. } => warn!(
            task_id = %task.id(),
            target = %target,
            error = %error,
            "missing rights on target, skipped"
        ),
        _ => warn!(
            task_id = %task.id(),
            target = %target,
            error = %error,
            "delivery to target failed"
        ),
    }
}
