// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Rentmarket Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Message safety filter.
//!
//! A pure function pipeline that scores a single message and produces a
//! redacted version. No state, no I/O, no randomness, no time dependence:
//! identical input always yields identical output.
//!
//! # Checks
//!
//! | Check | Deduction | Content effect |
//! |-------|-----------|----------------|
//! | Profanity | −30 | each matched token masked with asterisks |
//! | Personal info (phone/ZIP/email/SSN) | −40 | entire message replaced |
//! | Aggressive language | −20 | none |
//! | Length > 500 chars | −10 | none |
//!
//! Deductions stack and the score floors at 0. All checks run against the
//! *original* text; mutation is applied afterwards, profanity masking first
//! and then the personal-info full replacement, so a message tripping both
//! ends up fully redacted. The partial-vs-total redaction asymmetry is
//! deliberate: a masked curse still reads as a conversation, a shared phone
//! number must not survive in any form.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Replacement text for a message that contained personal information.
pub const REDACTION_NOTICE: &str =
    "[Message removed: sharing personal contact details is not allowed]";

/// Messages longer than this many characters take a readability deduction.
pub const MAX_COMFORTABLE_LENGTH: usize = 500;

const PROFANITY_TERMS: &[&str] = &[
    "damn", "hell", "crap", "stupid", "idiot", "jerk", "moron", "sucks",
];

const AGGRESSIVE_TERMS: &[&str] = &[
    "hate",
    "kill",
    "hurt",
    "threat",
    "threaten",
    "threatening",
    "fight",
    "attack",
    "violence",
];

static PROFANITY: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b({})\b", PROFANITY_TERMS.join("|"));
    Regex::new(&pattern).expect("profanity pattern is valid")
});

static AGGRESSIVE: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(r"(?i)\b({})\b", AGGRESSIVE_TERMS.join("|"));
    Regex::new(&pattern).expect("aggressive pattern is valid")
});

/// Phone (`555-123-4567` and separator variants), ZIP (`12345`, `12345-6789`),
/// email, and SSN (`123-45-6789`).
static PERSONAL_INFO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \b\d{3}[-.\s]?\d{3}[-.\s]?\d{4}\b
        | \b\d{3}-\d{2}-\d{4}\b
        | [A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}
        | \b\d{5}(?:-\d{4})?\b
        ",
    )
    .expect("personal-info pattern is valid")
});

/// Risk signals detected in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFlag {
    Profanity,
    PersonalInfo,
    AggressiveLanguage,
    LongMessage,
}

/// Result of filtering one message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOutcome {
    /// The text both parties will see; possibly masked or fully redacted.
    pub content: String,
    /// 0–100. Starts at 100, decremented per detected signal.
    pub safety_score: u8,
    pub flags: Vec<MessageFlag>,
}

/// Scores and redacts a single message.
///
/// Total over all string input, including the empty string; never panics.
pub fn filter(content: &str) -> FilterOutcome {
    let mut score: i32 = 100;
    let mut flags = Vec::new();

    let has_profanity = PROFANITY.is_match(content);
    let has_personal_info = PERSONAL_INFO.is_match(content);
    let has_aggression = AGGRESSIVE.is_match(content);
    let too_long = content.chars().count() > MAX_COMFORTABLE_LENGTH;

    if has_profanity {
        score -= 30;
        flags.push(MessageFlag::Profanity);
    }
    if has_personal_info {
        score -= 40;
        flags.push(MessageFlag::PersonalInfo);
    }
    if has_aggression {
        score -= 20;
        flags.push(MessageFlag::AggressiveLanguage);
    }
    if too_long {
        score -= 10;
        flags.push(MessageFlag::LongMessage);
    }

    let mut filtered = if has_profanity {
        PROFANITY
            .replace_all(content, |caps: &regex::Captures<'_>| {
                "*".repeat(caps[0].chars().count())
            })
            .into_owned()
    } else {
        content.to_string()
    };
    if has_personal_info {
        filtered = REDACTION_NOTICE.to_string();
    }

    FilterOutcome {
        content: filtered,
        safety_score: score.max(0) as u8,
        flags,
    }
}
