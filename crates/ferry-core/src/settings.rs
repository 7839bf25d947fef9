// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-task filter, formatting, forwarding and media settings.
//!
//! Settings are authored by the external management surface and stored
//! alongside each task as JSON. Every field has a default so partially
//! written settings deserialize cleanly.

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{MediaKind, ProcessingKind, UserId};

/// All settings attached to a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    pub filters: FilterSettings,
    pub formatting: FormatSettings,
    pub forwarding: ForwardSettings,
    pub media: MediaSettings,
}

/// Settings for every stage of the filter chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub media: MediaFilter,
    pub keywords: KeywordFilter,
    pub admins: AdminFilter,
    pub duplicates: DuplicateFilter,
    pub language: LanguageFilter,
    pub days: DayFilter,
    pub hours: HoursFilter,
    pub length: LengthFilter,
    pub rate: RateLimit,
    /// Remove inline keyboards from delivered copies.
    pub strip_buttons: bool,
}

/// Whether a list names what is accepted or what is rejected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ListMode {
    #[default]
    Allow,
    Block,
}

/// Media-type allow-list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaFilter {
    pub enabled: bool,
    pub allowed: Vec<MediaKind>,
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed: vec![
                MediaKind::Text,
                MediaKind::Photo,
                MediaKind::Video,
                MediaKind::Animation,
                MediaKind::Document,
                MediaKind::Audio,
                MediaKind::Voice,
                MediaKind::VideoNote,
                MediaKind::Sticker,
            ],
        }
    }
}

/// Keyword allow/deny lists over message text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordFilter {
    pub enabled: bool,
    /// When non-empty, text must contain at least one of these.
    pub allow: Vec<String>,
    /// Text containing any of these is denied.
    pub deny: Vec<String>,
    pub case_sensitive: bool,
}

/// How an admin rule's signature is compared.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchKind {
    #[default]
    Exact,
    /// Case-insensitive substring.
    Partial,
}

/// One configured admin entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRule {
    /// Channel author signature to match.
    #[serde(default)]
    pub signature: Option<String>,
    /// Group sender to match.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub matching: MatchKind,
    #[serde(default)]
    pub action: ListMode,
}

/// Admin/author filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminFilter {
    pub enabled: bool,
    pub rules: Vec<AdminRule>,
}

/// Near-duplicate suppression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateFilter {
    pub enabled: bool,
    /// Word-set similarity at or above which a message is a duplicate.
    pub threshold: f64,
    pub window_secs: u64,
    pub check_text: bool,
    pub check_media: bool,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.85,
            window_secs: 86_400,
            check_text: true,
            check_media: true,
        }
    }
}

/// Languages the script-ratio heuristic can tell apart.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum Language {
    #[serde(rename = "en")]
    #[strum(serialize = "en")]
    English,
    #[serde(rename = "ru")]
    #[strum(serialize = "ru")]
    Russian,
    #[serde(rename = "ar")]
    #[strum(serialize = "ar")]
    Arabic,
    #[serde(rename = "fa")]
    #[strum(serialize = "fa")]
    Persian,
    #[serde(rename = "zh")]
    #[strum(serialize = "zh")]
    Chinese,
    #[serde(rename = "ja")]
    #[strum(serialize = "ja")]
    Japanese,
    #[serde(rename = "ko")]
    #[strum(serialize = "ko")]
    Korean,
    #[serde(rename = "he")]
    #[strum(serialize = "he")]
    Hebrew,
    #[serde(rename = "el")]
    #[strum(serialize = "el")]
    Greek,
    #[serde(rename = "hi")]
    #[strum(serialize = "hi")]
    Hindi,
    #[serde(rename = "th")]
    #[strum(serialize = "th")]
    Thai,
}

/// Language allow/block filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageFilter {
    pub enabled: bool,
    pub mode: ListMode,
    pub languages: Vec<Language>,
}

/// Day-of-week filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayFilter {
    pub enabled: bool,
    pub disallowed: Vec<Weekday>,
}

/// Interpretation of the hour set of the working-hours filter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HoursMode {
    /// Deliver only during the listed hours.
    #[default]
    WorkHours,
    /// Deliver only outside the listed hours.
    SleepHours,
}

/// Working-hours filter over local hours `0..24`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoursFilter {
    pub enabled: bool,
    pub mode: HoursMode,
    pub hours: Vec<u8>,
}

/// Character-length filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthFilter {
    pub enabled: bool,
    pub mode: ListMode,
    pub min: usize,
    pub max: usize,
    /// When false only `max` is used.
    pub range_enabled: bool,
}

impl Default for LengthFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: ListMode::Allow,
            min: 0,
            max: 4096,
            range_enabled: false,
        }
    }
}

/// Per-task delivery budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimit {
    pub enabled: bool,
    pub count: u32,
    pub window_secs: u64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            enabled: false,
            count: 20,
            window_secs: 60,
        }
    }
}

/// A text replacement rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
    /// Treat `pattern` as a regular expression instead of a literal.
    #[serde(default)]
    pub regex: bool,
}

/// An inline URL button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    pub text: String,
    pub url: String,
}

/// Content-changing formatting applied in copy mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    pub replacements: Vec<Replacement>,
    pub remove_links: bool,
    pub remove_mentions: bool,
    pub remove_hashtags: bool,
    pub header: Option<String>,
    pub footer: Option<String>,
    /// Rows of buttons attached after delivery.
    pub buttons: Vec<Vec<Button>>,
    /// Target language code; applies in copy mode only.
    pub translate_to: Option<String>,
}

/// Delivery behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwardSettings {
    pub hide_forward_header: bool,
    /// Hold messages for manual approval before delivery.
    pub manual_approval: bool,
    pub album_batching: bool,
    pub pin: bool,
    pub pin_silent: bool,
    pub auto_delete_secs: Option<u64>,
    pub sync_edits: bool,
    pub sync_deletes: bool,
}

impl Default for ForwardSettings {
    fn default() -> Self {
        Self {
            hide_forward_header: false,
            manual_approval: false,
            album_batching: true,
            pin: false,
            pin_silent: true,
            auto_delete_secs: None,
            sync_edits: true,
            sync_deletes: true,
        }
    }
}

/// Media transformation settings handed to the media processor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSettings {
    pub image_watermark: bool,
    pub video_watermark: bool,
    pub audio_tags: bool,
    /// Processor-specific parameters (watermark text, position, tag values).
    pub params: serde_json::Value,
}

impl MediaSettings {
    /// The processing a message of `kind` needs under these settings.
    pub fn processing_for(&self, kind: MediaKind) -> Option<ProcessingKind> {
        match kind {
            MediaKind::Photo if self.image_watermark => Some(ProcessingKind::ImageWatermark),
            MediaKind::Video | MediaKind::Animation if self.video_watermark => {
                Some(ProcessingKind::VideoWatermark)
            }
            MediaKind::Audio if self.audio_tags => Some(ProcessingKind::AudioTags),
            _ => None,
        }
    }
}
