// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered, short-circuiting filter chain.
//!
//! Stages run in a fixed order: media type, keywords, admin, duplicates,
//! language, day of week, working hours, length, rate limit. The first
//! stage that denies ends evaluation. The duplicate and rate stages keep
//! per-task ledgers, so a message that is denied early never touches them.
//!
//! Evaluation is synchronous CPU work; callers pass the current instant so
//! tests can drive time explicitly.

mod admin;
mod duplicate;
mod keyword;
mod language;
mod length;
mod media;
mod rate;
mod schedule;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use ferry_core::types::{InboundMessage, Task, TaskId};

pub use duplicate::{DuplicateLedger, word_similarity};
pub use language::detect_language;
pub use rate::RateLedger;

/// Side-effect flags produced by an allowing chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterFlags {
    /// Inline buttons of the source must not be carried over.
    pub strip_buttons: bool,
    /// The "forwarded from" header must not be shown.
    pub strip_forward_header: bool,
}

impl FilterFlags {
    /// The flags `task`'s settings imply for `msg`.
    pub fn for_message(task: &Task, msg: &InboundMessage) -> Self {
        Self {
            strip_buttons: task.settings.filters.strip_buttons && msg.has_buttons,
            strip_forward_header: task.settings.forwarding.hide_forward_header,
        }
    }
}

/// Filter stages, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Media,
    Keyword,
    Admin,
    Duplicate,
    Language,
    Day,
    Hours,
    Length,
    Rate,
}

/// Outcome of running the chain for one (task, message) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow(FilterFlags),
    Deny { stage: Stage, reason: String },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow(_))
    }
}

/// The filter chain with its per-task ledgers.
pub struct FilterChain {
    offset: FixedOffset,
    duplicates: DuplicateLedger,
    rates: RateLedger,
}

impl FilterChain {
    /// Creates a chain evaluating day and hour rules at the given UTC offset.
    ///
    /// Offsets of a full day or more fall back to UTC.
    pub fn new(utc_offset_minutes: i32) -> Self {
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            duplicates: DuplicateLedger::new(),
            rates: RateLedger::new(),
        }
    }

    /// Runs every stage in order for `task`, stopping at the first denial.
    pub fn evaluate(&self, task: &Task, msg: &InboundMessage, now: DateTime<Utc>) -> Verdict {
        match self.run_stages(task, msg, now) {
            Ok(()) => Verdict::Allow(FilterFlags::for_message(task, msg)),
            Err((stage, reason)) => Verdict::Deny { stage, reason },
        }
    }

    fn run_stages(
        &self,
        task: &Task,
        msg: &InboundMessage,
        now: DateTime<Utc>,
    ) -> Result<(), (Stage, String)> {
        let filters = &task.settings.filters;
        let local = now.with_timezone(&self.offset);

        media::check(&filters.media, msg).map_err(|r| (Stage::Media, r))?;
        keyword::check(&filters.keywords, msg.text_or_empty()).map_err(|r| (Stage::Keyword, r))?;
        admin::check(&filters.admins, msg).map_err(|r| (Stage::Admin, r))?;
        if filters.duplicates.enabled {
            self.duplicates
                .check(task.id, &filters.duplicates, msg, now)
                .map_err(|r| (Stage::Duplicate, r))?;
        }
        language::check(&filters.language, msg.text_or_empty())
            .map_err(|r| (Stage::Language, r))?;
        schedule::check_day(&filters.days, &local).map_err(|r| (Stage::Day, r))?;
        schedule::check_hours(&filters.hours, &local).map_err(|r| (Stage::Hours, r))?;
        length::check(&filters.length, msg.text_or_empty()).map_err(|r| (Stage::Length, r))?;
        if filters.rate.enabled {
            self.rates
                .check(task.id, &filters.rate, now)
                .map_err(|r| (Stage::Rate, r))?;
        }
        Ok(())
    }

    /// Drops the ledgers of a task that no longer exists.
    pub fn forget_task(&self, task: TaskId) {
        self.duplicates.forget(task);
        self.rates.forget(task);
    }
}
