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

//! Support-ticket escalation.
//!
//! Classifies a free-text issue into a priority by case-insensitive
//! substring match (the same matching contract the message filter uses for
//! its term lists) and forwards the assembled ticket to a notification
//! sink. Email delivery, dashboards, and the like live behind the sink
//! trait.

use crate::base::UserId;
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticket priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Urgent,
    High,
    Normal,
    Low,
}

/// Maps an issue description to a priority.
///
/// Keywords are checked in severity order, case-insensitively, as plain
/// substrings: urgent/emergency/broken → `Urgent`; payment/refund/dispute →
/// `High`; technical/login/error → `Normal`; anything else → `Low`.
pub fn classify_priority(issue: &str) -> TicketPriority {
    let issue = issue.to_lowercase();
    let contains_any = |terms: &[&str]| terms.iter().any(|t| issue.contains(t));

    if contains_any(&["urgent", "emergency", "broken"]) {
        TicketPriority::Urgent
    } else if contains_any(&["payment", "refund", "dispute"]) {
        TicketPriority::High
    } else if contains_any(&["technical", "login", "error"]) {
        TicketPriority::Normal
    } else {
        TicketPriority::Low
    }
}

/// Who wrote a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSender {
    User,
    Assistant,
}

/// One line of the support conversation attached to a ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub sender: TranscriptSender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An escalated support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportTicket {
    pub session_id: String,
    pub user_id: UserId,
    pub user_name: String,
    pub issue: String,
    pub priority: TicketPriority,
    pub chat_history: Vec<TranscriptEntry>,
    pub opened_at: DateTime<Utc>,
}

/// Delivery seam for escalated tickets.
pub trait NotificationSink {
    fn deliver(&self, ticket: &SupportTicket) -> Result<(), MarketError>;
}

/// Sink that records tickets to the log stream only.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, ticket: &SupportTicket) -> Result<(), MarketError> {
        tracing::info!(
            session = %ticket.session_id,
            user = %ticket.user_id,
            priority = ?ticket.priority,
            "support ticket escalated"
        );
        Ok(())
    }
}

/// Builds tickets and forwards them to the configured sink.
pub struct SupportEscalation<S: NotificationSink> {
    sink: S,
}

impl<S: NotificationSink> SupportEscalation<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Classifies the issue, assembles the ticket, and delivers it.
    ///
    /// # Errors
    ///
    /// [`MarketError::EmptyIssue`] for a blank issue; sink errors propagate
    /// unchanged.
    pub fn escalate(
        &self,
        session_id: &str,
        user_id: UserId,
        user_name: &str,
        issue: &str,
        chat_history: Vec<TranscriptEntry>,
    ) -> Result<SupportTicket, MarketError> {
        if issue.trim().is_empty() {
            return Err(MarketError::EmptyIssue);
        }

        let ticket = SupportTicket {
            session_id: session_id.to_string(),
            user_id,
            user_name: user_name.to_string(),
            issue: issue.to_string(),
            priority: classify_priority(issue),
            chat_history,
            opened_at: Utc::now(),
        };
        self.sink.deliver(&ticket)?;
        Ok(ticket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingSink {
        delivered: Mutex<Vec<SupportTicket>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    impl NotificationSink for &RecordingSink {
        fn deliver(&self, ticket: &SupportTicket) -> Result<(), MarketError> {
            self.delivered.lock().unwrap().push(ticket.clone());
            Ok(())
        }
    }

    #[test]
    fn classifies_by_severity_order() {
        assert_eq!(classify_priority("URGENT: canopy broken"), TicketPriority::Urgent);
        assert_eq!(classify_priority("refund please"), TicketPriority::High);
        assert_eq!(classify_priority("login error"), TicketPriority::Normal);
        assert_eq!(classify_priority("how do I list an item?"), TicketPriority::Low);
    }

    #[test]
    fn urgent_keywords_win_over_lower_tiers() {
        // Contains both "payment" (High) and "broken" (Urgent).
        assert_eq!(
            classify_priority("payment page is broken"),
            TicketPriority::Urgent
        );
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        assert_eq!(classify_priority("EMERGENCY!!"), TicketPriority::Urgent);
        assert_eq!(classify_priority("my PaYmEnT failed"), TicketPriority::High);
    }

    #[test]
    fn escalate_delivers_classified_ticket() {
        let sink = RecordingSink::new();
        let escalation = SupportEscalation::new(&sink);
        let ticket = escalation
            .escalate(
                "sess-1",
                UserId(9),
                "Dana",
                "refund for the damaged tent",
                vec![TranscriptEntry {
                    sender: TranscriptSender::User,
                    text: "the tent arrived damaged".to_string(),
                    timestamp: Utc::now(),
                }],
            )
            .unwrap();

        assert_eq!(ticket.priority, TicketPriority::High);
        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].session_id, "sess-1");
    }

    #[test]
    fn blank_issue_is_rejected_before_delivery() {
        let sink = RecordingSink::new();
        let escalation = SupportEscalation::new(&sink);
        let result = escalation.escalate("sess-2", UserId(9), "Dana", "   ", Vec::new());
        assert_eq!(result, Err(MarketError::EmptyIssue));
        assert!(sink.delivered.lock().unwrap().is_empty());
    }
}
