// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use ferry_core::settings::KeywordFilter;

/// Deny words always win; a non-empty allow list requires at least one hit.
pub(crate) fn check(filter: &KeywordFilter, text: &str) -> Result<(), String> {
    if !filter.enabled {
        return Ok(());
    }
    let haystack = fold(text, filter.case_sensitive);
    let contains = |word: &String| {
        let needle = fold(word.trim(), filter.case_sensitive);
        !needle.is_empty() && haystack.contains(&needle)
    };

    if let Some(word) = filter.deny.iter().find(|w| contains(w)) {
        return Err(format!("contains blocked keyword {word:?}"));
    }
    if !filter.allow.is_empty() && !filter.allow.iter().any(contains) {
        return Err("no required keyword present".to_string());
    }
    Ok(())
}

fn fold(text: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        text.to_string()
    } else {
        text.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(allow: &[&str], deny: &[&str]) -> KeywordFilter {
        KeywordFilter {
            enabled: true,
            allow: allow.iter().map(|s| s.to_string()).collect(),
            deny: deny.iter().map(|s| s.to_string()).collect(),
            case_sensitive: false,
        }
    }

    #[test]
    fn deny_list_blocks_case_insensitively() {
        let f = filter(&[], &["casino"]);
        assert!(check(&f, "Best CASINO offers").is_err());
        assert!(check(&f, "Weather report").is_ok());
    }

    #[test]
    fn allow_list_requires_a_hit() {
        let f = filter(&["release", "update"], &[]);
        assert!(check(&f, "New release is out").is_ok());
        assert_eq!(
            check(&f, "Good morning").unwrap_err(),
            "no required keyword present"
        );
    }

    #[test]
    fn deny_beats_allow() {
        let f = filter(&["release"], &["beta"]);
        assert!(check(&f, "beta release").is_err());
    }

    #[test]
    fn case_sensitive_matching() {
        let mut f = filter(&[], &["NSFW"]);
        f.case_sensitive = true;
        assert!(check(&f, "nsfw").is_ok());
        assert!(check(&f, "NSFW").is_err());
    }

    #[test]
    fn blank_keywords_are_ignored() {
        let f = filter(&["  "], &[""]);
        assert!(check(&f, "anything").is_err());
        let f = filter(&[], &[" "]);
        assert!(check(&f, "anything").is_ok());
    }
}
