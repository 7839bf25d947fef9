// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use ferry_core::settings::{LengthFilter, ListMode};

/// Length is counted in characters, not bytes.
///
/// Without a range both modes reduce to a cap at `max`; with a range,
/// `block` rejects exactly what `allow` accepts.
pub(crate) fn check(filter: &LengthFilter, text: &str) -> Result<(), String> {
    if !filter.enabled {
        return Ok(());
    }
    let len = text.chars().count();
    let in_range = (filter.min..=filter.max).contains(&len);
    let accepted = match (filter.mode, filter.range_enabled) {
        (ListMode::Allow, true) => in_range,
        (ListMode::Block, true) => !in_range,
        (_, false) => len <= filter.max,
    };
    if accepted {
        Ok(())
    } else {
        Err(format!("length {len} rejected by {} rule", filter.mode))
    }
}
