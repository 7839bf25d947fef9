// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sliding-window delivery budget per task.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use ferry_core::settings::RateLimit;
use ferry_core::types::TaskId;

#[derive(Default)]
pub struct RateLedger {
    windows: Mutex<HashMap<TaskId, VecDeque<DateTime<Utc>>>>,
}

impl RateLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now` unless that would exceed `limit.count` accepted
    /// messages within the trailing window.
    pub fn check(&self, task: TaskId, limit: &RateLimit, now: DateTime<Utc>) -> Result<(), String> {
        let window = i64::try_from(limit.window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let stamps = windows.entry(task).or_default();

        if let Some(cutoff) = now.checked_sub_signed(window) {
            while stamps.front().is_some_and(|t| *t <= cutoff) {
                stamps.pop_front();
            }
        }

        let budget = usize::try_from(limit.count).unwrap_or(usize::MAX);
        if stamps.len() >= budget {
            return Err(format!(
                "rate limit of {} per {}s reached",
                limit.count, limit.window_secs
            ));
        }
        stamps.push_back(now);
        Ok(())
    }

    pub fn forget(&self, task: TaskId) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn limit(count: u32, window_secs: u64) -> RateLimit {
        RateLimit {
            enabled: true,
            count,
            window_secs,
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_800_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn budget_plus_one_is_denied_until_window_advances() {
        let ledger = RateLedger::new();
        let l = limit(3, 60);
        for t in 0..3 {
            assert!(ledger.check(TaskId(1), &l, at(t)).is_ok());
        }
        assert!(ledger.check(TaskId(1), &l, at(10)).is_err());
        // Oldest accepted message (t=0) leaves the window at t=60.
        assert!(ledger.check(TaskId(1), &l, at(59)).is_err());
        assert!(ledger.check(TaskId(1), &l, at(60)).is_ok());
    }

    #[test]
    fn denied_messages_do_not_consume_budget() {
        let ledger = RateLedger::new();
        let l = limit(1, 10);
        assert!(ledger.check(TaskId(1), &l, at(0)).is_ok());
        for t in 1..10 {
            assert!(ledger.check(TaskId(1), &l, at(t)).is_err());
        }
        assert!(ledger.check(TaskId(1), &l, at(10)).is_ok());
    }

    #[test]
    fn tasks_have_independent_budgets() {
        let ledger = RateLedger::new();
        let l = limit(1, 60);
        assert!(ledger.check(TaskId(1), &l, at(0)).is_ok());
        assert!(ledger.check(TaskId(2), &l, at(0)).is_ok());
    }

    proptest! {
        #[test]
        fn never_more_than_budget_in_any_window(
            count in 1u32..6,
            window in 1u64..30,
            mut offsets in proptest::collection::vec(0i64..120, 1..60),
        ) {
            offsets.sort_unstable();
            let ledger = RateLedger::new();
            let l = limit(count, window);
            let accepted: Vec<i64> = offsets
                .iter()
                .copied()
                .filter(|t| ledger.check(TaskId(1), &l, at(*t)).is_ok())
                .collect();
            for (i, start) in accepted.iter().enumerate() {
                let in_window = accepted[i..]
                    .iter()
                    .take_while(|t| **t < start + window as i64)
                    .count();
                prop_assert!(in_window <= count as usize);
            }
        }
    }
}
