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

//! Error types for marketplace operations.
//!
//! Every error classifies into one of three kinds: `Validation` (caller can
//! fix the input and retry; state untouched), `NotFound` (a referenced entity
//! does not exist), or `Transient` (retryable infrastructure failure —
//! never raised by the in-memory engines themselves, reserved for
//! store-backed deployments).

use crate::base::{CommissionId, MessageId, RoomId, UserId};
use thiserror::Error;

/// Broad classification of a [`MarketError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input to a mutating operation. State is never touched.
    Validation,
    /// A referenced entity does not exist where existence is required.
    NotFound,
    /// Retryable infrastructure failure.
    Transient,
}

/// Marketplace core errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Rental amount or deposit is negative
    #[error("amount must not be negative")]
    NegativeAmount,

    /// Special fee rate outside the valid range
    #[error("special rate must be between 0 and 1")]
    RateOutOfRange,

    /// Audit reason missing for an operation that requires one
    #[error("a non-empty reason is required")]
    MissingReason,

    /// A required commission field is empty
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Record status cannot move from its current state
    #[error("invalid status transition")]
    InvalidStatusTransition,

    /// Message sender has no chat profile
    #[error("sender profile not found: {0}")]
    SenderNotFound(UserId),

    /// Referenced chat room does not exist
    #[error("chat room not found: {0}")]
    RoomNotFound(RoomId),

    /// Sender is not a participant of the addressed room
    #[error("sender is not a participant of this room")]
    NotRoomParticipant,

    /// Referenced message does not exist
    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    /// Referenced commission record does not exist
    #[error("commission record not found: {0}")]
    RecordNotFound(CommissionId),

    /// Receiver has blocked the sender
    #[error("receiver has blocked this sender")]
    SenderBlocked,

    /// Support issue text is empty
    #[error("issue description must not be empty")]
    EmptyIssue,

    /// Backing store is unavailable (store-backed deployments only)
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),
}

impl MarketError {
    /// Classifies the error per the Validation / NotFound / Transient
    /// taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NegativeAmount
            | Self::RateOutOfRange
            | Self::MissingReason
            | Self::MissingField(_)
            | Self::InvalidStatusTransition
            | Self::NotRoomParticipant
            | Self::SenderBlocked
            | Self::EmptyIssue => ErrorKind::Validation,
            Self::SenderNotFound(_)
            | Self::RoomNotFound(_)
            | Self::MessageNotFound(_)
            | Self::RecordNotFound(_) => ErrorKind::NotFound,
            Self::StoreUnavailable(_) => ErrorKind::Transient,
        }
    }

    /// Whether a caller may retry the operation unchanged.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}
