// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Near-duplicate suppression over a per-task time window.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};

use ferry_core::settings::DuplicateFilter;
use ferry_core::types::{InboundMessage, TaskId};

/// Upper bound on remembered fingerprints per task.
const MAX_RECORDS_PER_TASK: usize = 2_048;

struct Record {
    words: HashSet<String>,
    media_hash: Option<String>,
    seen_at: DateTime<Utc>,
}

/// Per-task ledger of recently seen content fingerprints.
#[derive(Default)]
pub struct DuplicateLedger {
    tasks: Mutex<HashMap<TaskId, VecDeque<Record>>>,
}

impl DuplicateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Denies content similar to a record inside the window and refreshes
    /// that record; otherwise records the message.
    pub fn check(
        &self,
        task: TaskId,
        filter: &DuplicateFilter,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let words = if filter.check_text {
            word_set(msg.text_or_empty())
        } else {
            HashSet::new()
        };
        let media_hash = if filter.check_media {
            msg.media.as_ref().map(|m| hex::encode(Sha256::digest(m.unique_id.as_bytes())))
        } else {
            None
        };
        if words.is_empty() && media_hash.is_none() {
            return Ok(());
        }

        let window = i64::try_from(filter.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let cutoff = now.checked_sub_signed(window).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let records = tasks.entry(task).or_default();
        records.retain(|r| r.seen_at > cutoff);

        for record in records.iter_mut() {
            let same_media = media_hash.is_some() && record.media_hash == media_hash;
            let score = word_similarity(&words, &record.words);
            if same_media || (!words.is_empty() && score >= filter.threshold) {
                record.seen_at = now;
                return Err(if same_media {
                    "same media seen recently".to_string()
                } else {
                    format!("similar to a recent message (score {score:.2})")
                });
            }
        }

        if records.len() >= MAX_RECORDS_PER_TASK {
            records.pop_front();
        }
        records.push_back(Record {
            words,
            media_hash,
            seen_at: now,
        });
        Ok(())
    }

    pub fn forget(&self, task: TaskId) {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&task);
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Word-set overlap ratio (Jaccard index) in `[0, 1]`.
///
/// Two empty sets score zero so blank messages never count as duplicates.
pub fn word_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    let total = a.union(b).count();
    shared as f64 / total as f64
}
