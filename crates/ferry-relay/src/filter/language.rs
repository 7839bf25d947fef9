// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Script-ratio language heuristic.
//!
//! Letters are bucketed by Unicode script and the dominant script names the
//! language. Scripts shared by several languages use marker letters: kana
//! separates Japanese from Chinese, Persian-only letters separate Persian
//! from Arabic. Latin is reported as English.

use ferry_core::settings::{Language, LanguageFilter, ListMode};

/// Fewer letters than this are not classified.
const MIN_LETTERS: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Cyrillic,
    Arabic,
    Hebrew,
    Greek,
    Devanagari,
    Thai,
    Hangul,
    Kana,
    Han,
}

const SCRIPTS: [Script; 10] = [
    Script::Latin,
    Script::Cyrillic,
    Script::Arabic,
    Script::Hebrew,
    Script::Greek,
    Script::Devanagari,
    Script::Thai,
    Script::Hangul,
    Script::Kana,
    Script::Han,
];

fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x41..=0x5A | 0x61..=0x7A | 0xC0..=0x24F => Script::Latin,
        0x370..=0x3FF => Script::Greek,
        0x400..=0x4FF => Script::Cyrillic,
        0x590..=0x5FF => Script::Hebrew,
        0x600..=0x6FF | 0x750..=0x77F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => Script::Arabic,
        0x900..=0x97F => Script::Devanagari,
        0xE00..=0xE7F => Script::Thai,
        0x1100..=0x11FF | 0x3130..=0x318F | 0xAC00..=0xD7AF => Script::Hangul,
        0x3040..=0x30FF => Script::Kana,
        0x3400..=0x4DBF | 0x4E00..=0x9FFF => Script::Han,
        _ => return None,
    };
    Some(script)
}

fn is_persian_marker(c: char) -> bool {
    matches!(c, 'پ' | 'چ' | 'ژ' | 'گ' | 'ک' | 'ی')
}

/// Classifies the dominant language of `text`, if any.
pub fn detect_language(text: &str) -> Option<Language> {
    let mut counts = [0usize; SCRIPTS.len()];
    let mut persian_markers = false;
    for c in text.chars() {
        if let Some(script) = script_of(c) {
            if let Some(i) = SCRIPTS.iter().position(|s| *s == script) {
                counts[i] += 1;
            }
            persian_markers |= is_persian_marker(c);
        }
    }

    let count = |script: Script| {
        SCRIPTS
            .iter()
            .position(|s| *s == script)
            .map_or(0, |i| counts[i])
    };
    let kana = count(Script::Kana);
    let han = count(Script::Han);
    let total: usize = counts.iter().sum();
    if total < MIN_LETTERS {
        return None;
    }

    // Kana and Han count together as one CJK bucket.
    let mut best = (Script::Han, kana + han);
    for script in SCRIPTS {
        if matches!(script, Script::Kana | Script::Han) {
            continue;
        }
        let n = count(script);
        if n > best.1 {
            best = (script, n);
        }
    }

    let language = match best.0 {
        Script::Latin => Language::English,
        Script::Cyrillic => Language::Russian,
        Script::Arabic if persian_markers => Language::Persian,
        Script::Arabic => Language::Arabic,
        Script::Hebrew => Language::Hebrew,
        Script::Greek => Language::Greek,
        Script::Devanagari => Language::Hindi,
        Script::Thai => Language::Thai,
        Script::Hangul => Language::Korean,
        Script::Kana | Script::Han if kana > 0 => Language::Japanese,
        Script::Kana | Script::Han => Language::Chinese,
    };
    Some(language)
}

pub(crate) fn check(filter: &LanguageFilter, text: &str) -> Result<(), String> {
    if !filter.enabled || filter.languages.is_empty() {
        return Ok(());
    }
    let Some(language) = detect_language(text) else {
        return Ok(());
    };
    let listed = filter.languages.contains(&language);
    match (filter.mode, listed) {
        (ListMode::Allow, false) => Err(format!("language {language} is not allowed")),
        (ListMode::Block, true) => Err(format!("language {language} is blocked")),
        _ => Ok(()),
    }
}
