// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Album collection with a resettable settle timer.
//!
//! Items sharing a media group id are buffered per (task, chat, group).
//! Every new item restarts the timer; when it fires, the whole buffer is
//! handed to the [`AlbumSink`] once and the group is marked processed so
//! late or repeated items are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use ferry_config::model::AlbumConfig;
use ferry_core::types::{ChatId, InboundMessage, TaskId};

use crate::filter::FilterFlags;
use crate::session::SessionContext;
use crate::task_index::RoutedTask;

/// Identity of one album buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlbumKey {
    pub task: TaskId,
    pub chat: ChatId,
    pub group: String,
}

/// One buffered album item with the context it was accepted under.
#[derive(Clone)]
pub struct AlbumPart {
    pub ctx: SessionContext,
    pub task: Arc<RoutedTask>,
    pub message: InboundMessage,
    pub flags: FilterFlags,
    pub global_copy: bool,
}

/// A settled album, ready for delivery.
pub struct ReadyAlbum {
    pub key: AlbumKey,
    pub ctx: SessionContext,
    pub task: Arc<RoutedTask>,
    /// Items in source message order.
    pub messages: Vec<InboundMessage>,
    pub flags: FilterFlags,
    pub global_copy: bool,
}

/// Receives settled albums.
#[async_trait]
pub trait AlbumSink: Send + Sync + 'static {
    async fn deliver_album(&self, album: ReadyAlbum);
}

struct Buffer {
    parts: Vec<AlbumPart>,
    generation: u64,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct State {
    buffers: HashMap<AlbumKey, Buffer>,
    /// Settled groups whose delivery is still running, by their timer task.
    delivering: HashMap<AlbumKey, JoinHandle<()>>,
    processed: HashMap<AlbumKey, Instant>,
    next_generation: u64,
}

/// Buffers album items until their group settles.
pub struct AlbumBatcher {
    settle: Duration,
    processed_ttl: Duration,
    state: Mutex<State>,
}

impl AlbumBatcher {
    pub fn new(config: &AlbumConfig) -> Self {
        Self {
            settle: config.settle(),
            processed_ttl: config.processed_ttl(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Buffers `part` and restarts the settle timer for its group.
    ///
    /// Returns `false` when the group was already delivered and the item is
    /// dropped.
    pub fn collect(
        self: &Arc<Self>,
        key: AlbumKey,
        part: AlbumPart,
        sink: Arc<dyn AlbumSink>,
    ) -> bool {
        let now = Instant::now();
        let mut state = self.state();
        let ttl = self.processed_ttl;
        state.processed.retain(|_, at| now.duration_since(*at) < ttl);
        if state.processed.contains_key(&key) {
            debug!(
                task_id = %key.task,
                group = %key.group,
                message_id = %part.message.message_id,
                "dropping item of an already delivered album"
            );
            return false;
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let batcher = Arc::clone(self);
        let timer_key = key.clone();
        let settle = self.settle;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            batcher.fire(timer_key, generation, sink).await;
        });

        match state.buffers.get_mut(&key) {
            Some(buffer) => {
                buffer.timer.abort();
                buffer.timer = timer;
                buffer.generation = generation;
                let id = part.message.message_id;
                match buffer.parts.iter_mut().find(|p| p.message.message_id == id) {
                    Some(existing) => *existing = part,
                    None => buffer.parts.push(part),
                }
            }
            None => {
                state.buffers.insert(
                    key,
                    Buffer {
                        parts: vec![part],
                        generation,
                        timer,
                    },
                );
            }
        }
        true
    }

    /// Delivers the buffer for `key` if `generation` is still current.
    async fn fire(&self, key: AlbumKey, generation: u64, sink: Arc<dyn AlbumSink>) {
        let mut parts = {
            let mut state = self.state();
            if state.processed.contains_key(&key) {
                state.buffers.remove(&key);
                return;
            }
            match state.buffers.get(&key) {
                Some(buffer) if buffer.generation == generation => {}
                _ => return,
            }
            let Some(buffer) = state.buffers.remove(&key) else {
                return;
            };
            state.processed.insert(key.clone(), Instant::now());
            state.delivering.insert(key.clone(), buffer.timer);
            buffer.parts
        };

        parts.sort_by_key(|p| p.message.message_id);
        let Some(first) = parts.first().cloned() else {
            self.state().delivering.remove(&key);
            return;
        };
        let global_copy = parts.iter().any(|p| p.global_copy);
        info!(
            task_id = %key.task,
            chat_id = %key.chat,
            group = %key.group,
            items = parts.len(),
            "album settled"
        );
        let album = ReadyAlbum {
            key: key.clone(),
            ctx: first.ctx,
            task: first.task,
            messages: parts.into_iter().map(|p| p.message).collect(),
            flags: first.flags,
            global_copy,
        };
        sink.deliver_album(album).await;
        self.state().delivering.remove(&key);
    }

    /// Drops a buffered group without delivering it.
    pub fn cancel(&self, key: &AlbumKey) -> bool {
        match self.state().buffers.remove(key) {
            Some(buffer) => {
                buffer.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Number of groups still waiting for their timer.
    pub fn pending(&self) -> usize {
        self.state().buffers.len()
    }

    /// Number of settled groups still being delivered.
    pub fn delivering(&self) -> usize {
        self.state().delivering.len()
    }

    /// Aborts every settle timer and running delivery and drops all buffers.
    pub fn shutdown(&self) {
        let mut state = self.state();
        for (_, buffer) in state.buffers.drain() {
            buffer.timer.abort();
        }
        for (key, delivery) in state.delivering.drain() {
            debug!(task_id = %key.task, group = %key.group, "aborting album delivery");
            delivery.abort();
        }
    }
}
