// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use ferry_core::settings::{AdminFilter, AdminRule, ListMode, MatchKind};
use ferry_core::types::{ChatKind, InboundMessage};

/// Channel posts are matched by author signature, group posts by sender id.
///
/// For signatures an exact rule decides on its own; partial rules are only
/// consulted when no exact rule matched, and then any partial block denies.
/// Anything unmatched is allowed.
pub(crate) fn check(filter: &AdminFilter, msg: &InboundMessage) -> Result<(), String> {
    if !filter.enabled || filter.rules.is_empty() {
        return Ok(());
    }
    match msg.chat_kind {
        ChatKind::Channel => match msg.author_signature.as_deref() {
            Some(signature) => check_signature(&filter.rules, signature),
            None => Ok(()),
        },
        ChatKind::Group | ChatKind::Private => {
            let Some(sender) = msg.sender_id else {
                return Ok(());
            };
            match filter.rules.iter().find(|r| r.user_id == Some(sender)) {
                Some(rule) if rule.action == ListMode::Block => {
                    Err(format!("sender {sender} is blocked"))
                }
                _ => Ok(()),
            }
        }
    }
}

fn check_signature(rules: &[AdminRule], signature: &str) -> Result<(), String> {
    let signature = signature.trim();
    let with_signature = || {
        rules
            .iter()
            .filter_map(|r| r.signature.as_deref().map(|s| (r, s.trim())))
            .filter(|(_, s)| !s.is_empty())
    };

    let exact = with_signature().find(|(r, s)| r.matching == MatchKind::Exact && *s == signature);
    if let Some((rule, _)) = exact {
        return match rule.action {
            ListMode::Allow => Ok(()),
            ListMode::Block => Err(format!("author {signature:?} is blocked")),
        };
    }

    let lowered = signature.to_lowercase();
    let partial_block = with_signature().find(|(r, s)| {
        r.matching == MatchKind::Partial
            && r.action == ListMode::Block
            && lowered.contains(&s.to_lowercase())
    });
    match partial_block {
        Some((_, s)) => Err(format!("author {signature:?} matches blocked {s:?}")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::types::UserId;
    use ferry_test_utils::MessageBuilder;

    fn sig_rule(signature: &str, matching: MatchKind, action: ListMode) -> AdminRule {
        AdminRule {
            signature: Some(signature.to_string()),
            user_id: None,
            matching,
            action,
        }
    }

    fn filter(rules: Vec<AdminRule>) -> AdminFilter {
        AdminFilter {
            enabled: true,
            rules,
        }
    }

    fn signed(signature: &str) -> InboundMessage {
        MessageBuilder::text(1, 1, "post").signed(signature).build()
    }

    #[test]
    fn exact_block_does_not_catch_longer_signatures() {
        let f = filter(vec![sig_rule("Editor", MatchKind::Exact, ListMode::Block)]);
        assert!(check(&f, &signed("Editor")).is_err());
        assert!(check(&f, &signed("Editor-in-chief")).is_ok());
    }

    #[test]
    fn exact_allow_overrides_partial_block() {
        let f = filter(vec![
            sig_rule("bot", MatchKind::Partial, ListMode::Block),
            sig_rule("Newsbot Official", MatchKind::Exact, ListMode::Allow),
        ]);
        assert!(check(&f, &signed("Newsbot Official")).is_ok());
        assert!(check(&f, &signed("Spambot")).is_err());
    }

    #[test]
    fn partial_match_is_case_insensitive() {
        let f = filter(vec![sig_rule("intern", MatchKind::Partial, ListMode::Block)]);
        assert!(check(&f, &signed("Summer INTERN")).is_err());
        assert!(check(&f, &signed("Editor")).is_ok());
    }

    #[test]
    fn unsigned_channel_posts_pass() {
        let f = filter(vec![sig_rule("x", MatchKind::Partial, ListMode::Block)]);
        assert!(check(&f, &MessageBuilder::text(1, 1, "hi").build()).is_ok());
    }

    #[test]
    fn group_messages_match_sender_id() {
        let f = filter(vec![AdminRule {
            signature: None,
            user_id: Some(UserId(42)),
            matching: MatchKind::Exact,
            action: ListMode::Block,
        }]);
        let blocked = MessageBuilder::text(1, 1, "hi").group(42).build();
        let unknown = MessageBuilder::text(1, 2, "hi").group(7).build();
        assert!(check(&f, &blocked).is_err());
        assert!(check(&f, &unknown).is_ok());
    }

    #[test]
    fn group_messages_ignore_signature_rules() {
        let f = filter(vec![sig_rule("Editor", MatchKind::Exact, ListMode::Block)]);
        let msg = MessageBuilder::text(1, 1, "hi")
            .group(5)
            .signed("Editor")
            .build();
        assert!(check(&f, &msg).is_ok());
    }
}
