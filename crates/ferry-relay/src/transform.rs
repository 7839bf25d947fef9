// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-task text transforms and the forward-versus-copy decision.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use ferry_core::settings::FormatSettings;
use ferry_core::types::ForwardMode;

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:https?://|www\.|t\.me/)\S+").unwrap());
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)@\w{4,}").unwrap());
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?:^|\s)#\w+").unwrap());
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Applies replacement rules and link, mention and hashtag removal.
///
/// Invalid regex rules are skipped with a warning.
pub fn clean_text(text: &str, format: &FormatSettings) -> String {
    let mut out = text.to_string();
    for rule in &format.replacements {
        if rule.pattern.is_empty() {
            continue;
        }
        if rule.regex {
            match Regex::new(&rule.pattern) {
                Ok(re) => out = re.replace_all(&out, rule.replacement.as_str()).into_owned(),
                Err(e) => warn!(pattern = %rule.pattern, error = %e, "skipping invalid replacement"),
            }
        } else {
            out = out.replace(&rule.pattern, &rule.replacement);
        }
    }

    let mut removed = false;
    for (enabled, re) in [
        (format.remove_links, &*LINK_RE),
        (format.remove_mentions, &*MENTION_RE),
        (format.remove_hashtags, &*HASHTAG_RE),
    ] {
        if enabled && re.is_match(&out) {
            out = re.replace_all(&out, "").into_owned();
            removed = true;
        }
    }
    if removed {
        out = SPACES_RE.replace_all(&out, " ").trim().to_string();
    }
    out
}

/// Wraps text in the task's header and footer, separated by blank lines.
pub fn decorate(text: &str, format: &FormatSettings) -> String {
    let parts: Vec<&str> = [format.header.as_deref(), Some(text), format.footer.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    parts.join("\n\n")
}

/// Content-changing effects a delivery needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideEffects {
    /// Replacement or removal rules changed the text.
    pub text_changed: bool,
    /// A header or footer is added.
    pub decorated: bool,
    /// Custom buttons are attached after delivery.
    pub buttons: bool,
    /// Processed media replaces the original.
    pub media_changed: bool,
    /// The "forwarded from" header is hidden.
    pub strip_forward_header: bool,
    /// Source buttons are dropped.
    pub strip_buttons: bool,
}

impl SideEffects {
    pub fn requires_copy(&self) -> bool {
        self.text_changed
            || self.decorated
            || self.buttons
            || self.media_changed
            || self.strip_forward_header
            || self.strip_buttons
    }
}

/// The final send mode: copy whenever content changes, otherwise the task's mode.
pub fn send_mode(task_mode: ForwardMode, effects: &SideEffects) -> ForwardMode {
    if effects.requires_copy() {
        ForwardMode::Copy
    } else {
        task_mode
    }
}

/// Short plain-text preview for approval prompts.
pub fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    let mut out: String = trimmed.chars().take(max_chars).collect();
    if trimmed.chars().count() > max_chars {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::settings::Replacement;

    fn format() -> FormatSettings {
        FormatSettings::default()
    }

    #[test]
    fn literal_and_regex_replacements() {
        let mut f = format();
        f.replacements = vec![
            Replacement {
                pattern: "@source".to_string(),
                replacement: "@mirror".to_string(),
                regex: false,
            },
            Replacement {
                pattern: r"\d{3}-\d{4}".to_string(),
                replacement: "[phone]".to_string(),
                regex: true,
            },
        ];
        assert_eq!(
            clean_text("Call 555-1234 via @source", &f),
            "Call [phone] via @mirror"
        );
    }

    #[test]
    fn invalid_regex_is_skipped() {
        let mut f = format();
        f.replacements = vec![Replacement {
            pattern: "(".to_string(),
            replacement: "x".to_string(),
            regex: true,
        }];
        assert_eq!(clean_text("keep (this)", &f), "keep (this)");
    }

    #[test]
    fn removes_links_mentions_and_hashtags() {
        let mut f = format();
        f.remove_links = true;
        f.remove_mentions = true;
        f.remove_hashtags = true;
        assert_eq!(
            clean_text("Read https://example.com/a?b=1 by @author_name #news #daily", &f),
            "Read by"
        );
    }

    #[test]
    fn untouched_text_is_identical() {
        let mut f = format();
        f.remove_links = true;
        assert_eq!(clean_text("no  links here", &f), "no  links here");
    }

    #[test]
    fn decorate_skips_blank_parts() {
        let mut f = format();
        f.header = Some("HEADER".to_string());
        f.footer = Some("  ".to_string());
        assert_eq!(decorate("body", &f), "HEADER\n\nbody");
        assert_eq!(decorate("", &f), "HEADER");
        assert_eq!(decorate("body", &format()), "body");
    }

    #[test]
    fn any_effect_forces_copy() {
        let none = SideEffects::default();
        assert_eq!(send_mode(ForwardMode::Forward, &none), ForwardMode::Forward);
        assert_eq!(send_mode(ForwardMode::Copy, &none), ForwardMode::Copy);

        let hidden_header = SideEffects {
            strip_forward_header: true,
            ..SideEffects::default()
        };
        assert_eq!(
            send_mode(ForwardMode::Forward, &hidden_header),
            ForwardMode::Copy
        );
    }

    #[test]
    fn preview_truncates_on_characters() {
        assert_eq!(preview("  short  ", 10), "short");
        assert_eq!(preview("привет мир", 6), "привет…");
    }
}
