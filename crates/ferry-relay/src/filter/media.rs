// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use ferry_core::settings::MediaFilter;
use ferry_core::types::InboundMessage;

pub(crate) fn check(filter: &MediaFilter, msg: &InboundMessage) -> Result<(), String> {
    if !filter.enabled {
        return Ok(());
    }
    let kind = msg.kind();
    if filter.allowed.contains(&kind) {
        Ok(())
    } else {
        Err(format!("{kind} messages are not allowed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::types::MediaKind;
    use ferry_test_utils::MessageBuilder;

    #[test]
    fn disabled_filter_allows_everything() {
        let filter = MediaFilter {
            enabled: false,
            allowed: vec![],
        };
        assert!(check(&filter, &MessageBuilder::text(1, 1, "hi").build()).is_ok());
    }

    #[test]
    fn only_listed_kinds_pass() {
        let filter = MediaFilter {
            enabled: true,
            allowed: vec![MediaKind::Text, MediaKind::Photo],
        };
        let photo = MessageBuilder::media(1, 1, MediaKind::Photo, "").build();
        let voice = MessageBuilder::media(1, 2, MediaKind::Voice, "").build();
        assert!(check(&filter, &photo).is_ok());
        assert_eq!(
            check(&filter, &voice).unwrap_err(),
            "voice messages are not allowed"
        );
    }
}
