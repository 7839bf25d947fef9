// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Day-of-week and working-hours stages, evaluated in local time.

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use ferry_core::settings::{DayFilter, HoursFilter, HoursMode};

pub(crate) fn check_day(filter: &DayFilter, now: &DateTime<FixedOffset>) -> Result<(), String> {
    if !filter.enabled {
        return Ok(());
    }
    let day = now.weekday();
    if filter.disallowed.contains(&day) {
        Err(format!("delivery disabled on {day}"))
    } else {
        Ok(())
    }
}

/// An empty hour set places no restriction.
pub(crate) fn check_hours(
    filter: &HoursFilter,
    now: &DateTime<FixedOffset>,
) -> Result<(), String> {
    if !filter.enabled || filter.hours.is_empty() {
        return Ok(());
    }
    let hour = now.hour();
    let listed = filter.hours.iter().any(|h| u32::from(*h) == hour);
    match (filter.mode, listed) {
        (HoursMode::WorkHours, false) => Err(format!("hour {hour} is outside working hours")),
        (HoursMode::SleepHours, true) => Err(format!("hour {hour} is within sleep hours")),
        _ => Ok(()),
    }
}
