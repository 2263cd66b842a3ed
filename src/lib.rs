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

//! # Rentmarket
//!
//! Core engine for a peer-to-peer party-rental marketplace: tiered platform
//! fees with owner payouts, an append-only commission ledger with affiliate
//! payouts, and a family-safe chat pipeline with message moderation.
//!
//! ## Core Components
//!
//! - [`FeeEngine`]: per-user fee tiers, admin overrides, clamped fee math
//! - [`CommissionLedger`]: completed-rental and affiliate commission records
//! - [`filter::filter`]: pure message scoring and redaction
//! - [`ChatEngine`]: rooms, messages, read receipts, reports, and blocks
//! - [`SupportEscalation`]: keyword-classified support tickets
//!
//! ## Example
//!
//! ```
//! use rentmarket::{FeeEngine, UserId};
//!
//! let fees = FeeEngine::new();
//!
//! // A new user rents out a bounce house for $100.00.
//! let quote = fees.calculate_fees(UserId(1), 10_000, 0).unwrap();
//! assert_eq!(quote.platform_fee, 2_200);
//! assert_eq!(quote.owner_payout, 7_800);
//! ```
//!
//! ## Thread Safety
//!
//! All engines are safe to share behind an `Arc`: keyed state lives in
//! concurrent maps and per-entity interior state is mutex-guarded, so
//! operations on different users or rooms proceed in parallel.

pub mod analytics;
mod base;
pub mod chat;
pub mod error;
pub mod fees;
pub mod filter;
pub mod ledger;
pub mod money;
pub mod support;

pub use analytics::{FeeAnalytics, TierBreakdown};
pub use base::{AffiliateId, Cents, CommissionId, MessageId, RoomId, UserId};
pub use chat::{
    ChatEngine, ChatMessage, ChatRoom, MessageReport, MessageType, ModerationStatus,
    RoomSafetyStatus, RoomSnapshot, UserChatProfile,
};
pub use error::{ErrorKind, MarketError};
pub use fees::{FeeCalculation, FeeEngine, FeeTier, UserFeeStructure};
pub use filter::{FilterOutcome, MessageFlag};
pub use ledger::{
    AffiliateCommission, AffiliateInfo, AffiliateStatus, AffiliateTier, CommissionInput,
    CommissionLedger, CommissionRecord, CommissionStats, CommissionStatus,
};
pub use support::{
    LogSink, NotificationSink, SupportEscalation, SupportTicket, TicketPriority, TranscriptEntry,
    TranscriptSender,
};
