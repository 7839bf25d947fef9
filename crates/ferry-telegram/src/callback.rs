// SPDX-FileCopyrightText: 2026 Ferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Callback data carried by approval buttons.
//!
//! Telegram limits callback data to 64 bytes; `approve:` plus a hyphenated
//! UUID is 44.

use std::fmt;

/// A decision pressed on an approval prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalCommand {
    Approve(String),
    Reject(String),
}

impl ApprovalCommand {
    /// Parses `approve:<id>` or `reject:<id>`. Anything else is `None`.
    pub fn parse(data: &str) -> Option<Self> {
        let (verb, id) = data.split_once(':')?;
        let id = id.trim();
        if id.is_empty() {
            return None;
        }
        match verb {
            "approve" => Some(Self::Approve(id.to_string())),
            "reject" => Some(Self::Reject(id.to_string())),
            _ => None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Approve(id) | Self::Reject(id) => id,
        }
    }

    pub fn approved(&self) -> bool {
        matches!(self, Self::Approve(_))
    }
}

impl fmt::Display for ApprovalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve(id) => write!(f, "approve:{id}"),
            Self::Reject(id) => write!(f, "reject:{id}"),
        }
    }
}
