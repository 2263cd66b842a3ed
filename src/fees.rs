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

//! Tiered platform-fee engine.
//!
//! The [`FeeEngine`] determines the platform's cut of a rental transaction
//! and the owner's net payout, honoring per-user tiering and admin overrides,
//! with hard floor/ceiling bounds on the commission.
//!
//! # Fee Resolution
//!
//! | Source | Rate |
//! |--------|------|
//! | Admin special rate | any value in `[0, 1]`, bypasses tiering |
//! | `NewUser` tier | 0.22 |
//! | `ExperiencedUser` tier (≥ 10 completed rentals) | 0.18 |
//!
//! The computed fee is always clamped to `[200, 5000]` cents regardless of
//! the rate in effect.
//!
//! # Thread Safety
//!
//! Fee structures live in a [`DashMap`] keyed by user; the entry API
//! serializes read-modify-write sequences per user, so concurrent count
//! updates or rate overrides for the same user cannot lose writes.

use crate::base::{Cents, UserId};
use crate::error::MarketError;
use crate::money;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Completed-rental count at which a user is promoted to
/// [`FeeTier::ExperiencedUser`].
pub const EXPERIENCED_RENTAL_THRESHOLD: u32 = 10;

/// Smallest commission the platform takes on any transaction, in cents.
pub const MIN_COMMISSION: Cents = 200;

/// Largest commission the platform takes on any transaction, in cents.
pub const MAX_COMMISSION: Cents = 5000;

/// Markup assumed for a traditional rental shop, used for the savings
/// comparison shown at checkout.
pub fn traditional_markup() -> Decimal {
    dec!(0.40)
}

/// A user's fee bracket, driven by completed-rental count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeTier {
    NewUser,
    ExperiencedUser,
}

impl FeeTier {
    /// The tier's standard rate, applied when no special rate is set.
    pub fn standard_rate(self) -> Decimal {
        match self {
            FeeTier::NewUser => dec!(0.22),
            FeeTier::ExperiencedUser => dec!(0.18),
        }
    }
}

/// Per-user fee state. Created lazily on first lookup, never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFeeStructure {
    pub user_id: UserId,
    /// Current effective rate. Kept in sync with tier and special rate.
    pub fee_percentage: Decimal,
    /// Completed-rental counter. Replaced, not incremented, by updates.
    pub rental_count: u32,
    pub tier: FeeTier,
    pub last_updated: DateTime<Utc>,
    /// Admin override rate. Supersedes tier pricing while set.
    pub special_rate: Option<Decimal>,
    /// Audit reason, required whenever a special rate is set.
    pub special_rate_reason: Option<String>,
}

impl UserFeeStructure {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            fee_percentage: FeeTier::NewUser.standard_rate(),
            rental_count: 0,
            tier: FeeTier::NewUser,
            last_updated: Utc::now(),
            special_rate: None,
            special_rate_reason: None,
        }
    }

    /// The rate applied to this user's next rental: special rate if set,
    /// tier rate otherwise.
    pub fn effective_rate(&self) -> Decimal {
        self.special_rate
            .unwrap_or_else(|| self.tier.standard_rate())
    }
}

/// Display strings summarizing a fee calculation for checkout UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub platform_fee: String,
    pub owner_payout: String,
    pub savings: String,
}

/// Immutable fee calculation for one rental transaction.
///
/// Not persisted on its own; on payment success it is fed to
/// [`crate::ledger::CommissionLedger::record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCalculation {
    pub rental_amount: Cents,
    /// Platform commission after clamping to `[MIN_COMMISSION, MAX_COMMISSION]`.
    pub platform_fee: Cents,
    /// The rate actually applied, pre-clamp.
    pub platform_fee_percentage: Decimal,
    /// `rental_amount - platform_fee`. Goes negative when the clamp floor
    /// exceeds a very small rental amount; callers wanting a floor apply it
    /// at the edge.
    pub owner_payout: Cents,
    /// `rental_amount + security_deposit`.
    pub total_with_fees: Cents,
    pub savings_vs_traditional: Cents,
    /// Rounded percentage saved against the traditional price; 0 when the
    /// traditional price is 0.
    pub savings_percentage: i64,
    pub fee_breakdown: FeeBreakdown,
}

/// Rounds a decimal value to whole cents, half away from zero.
///
/// Saturates at `Cents::MAX` for values beyond the i64 range.
pub(crate) fn round_cents(value: Decimal) -> Cents {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(Cents::MAX)
}

/// Fee engine managing per-user fee structures.
pub struct FeeEngine {
    /// Fee structures indexed by user ID.
    structures: DashMap<UserId, UserFeeStructure>,
}

impl FeeEngine {
    /// Creates an engine with no fee structures.
    pub fn new() -> Self {
        FeeEngine {
            structures: DashMap::new(),
        }
    }

    /// Returns the user's fee structure, creating and persisting the default
    /// (`NewUser` tier, zero rentals) on first lookup. Always succeeds.
    pub fn user_fee_structure(&self, user_id: UserId) -> UserFeeStructure {
        self.structures
            .entry(user_id)
            .or_insert_with(|| UserFeeStructure::new(user_id))
            .clone()
    }

    /// Returns a snapshot of every known fee structure.
    pub fn all_user_fee_structures(&self) -> Vec<UserFeeStructure> {
        self.structures.iter().map(|r| r.value().clone()).collect()
    }

    /// Replaces the user's completed-rental count with the caller-supplied
    /// authoritative value.
    ///
    /// Crossing [`EXPERIENCED_RENTAL_THRESHOLD`] promotes a `NewUser` to
    /// `ExperiencedUser` and re-resolves the effective rate. Promotion is
    /// one-way: a later, smaller count never demotes. Decreasing counts are
    /// last-write-wins and otherwise undefined.
    pub fn update_user_rental_count(&self, user_id: UserId, new_count: u32) -> UserFeeStructure {
        let mut entry = self
            .structures
            .entry(user_id)
            .or_insert_with(|| UserFeeStructure::new(user_id));

        entry.rental_count = new_count;
        entry.last_updated = Utc::now();

        if new_count >= EXPERIENCED_RENTAL_THRESHOLD && entry.tier == FeeTier::NewUser {
            entry.tier = FeeTier::ExperiencedUser;
            entry.fee_percentage = entry
                .special_rate
                .unwrap_or_else(|| FeeTier::ExperiencedUser.standard_rate());
            tracing::debug!(user = %user_id, count = new_count, "user promoted to experienced tier");
        }

        entry.clone()
    }

    /// Computes the fee breakdown for a rental.
    ///
    /// Resolves the user's effective rate (creating the default structure if
    /// needed), rounds `rental_amount × rate` to whole cents, and clamps the
    /// fee to `[MIN_COMMISSION, MAX_COMMISSION]`. The clamp bounds are
    /// absolute: a 0-cent rental still pays the 200-cent floor.
    ///
    /// # Errors
    ///
    /// [`MarketError::NegativeAmount`] if the rental amount or deposit is
    /// negative.
    pub fn calculate_fees(
        &self,
        user_id: UserId,
        rental_amount: Cents,
        security_deposit: Cents,
    ) -> Result<FeeCalculation, MarketError> {
        if rental_amount < 0 || security_deposit < 0 {
            return Err(MarketError::NegativeAmount);
        }

        let structure = self.user_fee_structure(user_id);
        let rate = structure.effective_rate();

        let raw_fee = round_cents(Decimal::from(rental_amount) * rate);
        let platform_fee = raw_fee.clamp(MIN_COMMISSION, MAX_COMMISSION);
        let owner_payout = rental_amount - platform_fee;
        let total_with_fees = rental_amount + security_deposit;

        let traditional_price =
            round_cents(Decimal::from(rental_amount) * (Decimal::ONE + traditional_markup()));
        let savings_vs_traditional = traditional_price - total_with_fees;
        let savings_percentage = if traditional_price == 0 {
            0
        } else {
            round_cents(
                Decimal::from(savings_vs_traditional) / Decimal::from(traditional_price)
                    * dec!(100),
            )
        };

        let fee_breakdown = FeeBreakdown {
            platform_fee: format!(
                "Platform fee ({}): {}",
                money::format_rate(rate),
                money::format_cents(platform_fee)
            ),
            owner_payout: format!("Owner receives {}", money::format_cents(owner_payout)),
            savings: format!(
                "Save {} ({}%) vs traditional rental",
                money::format_cents(savings_vs_traditional),
                savings_percentage
            ),
        };

        tracing::debug!(
            user = %user_id,
            amount = rental_amount,
            fee = platform_fee,
            "calculated rental fees"
        );

        Ok(FeeCalculation {
            rental_amount,
            platform_fee,
            platform_fee_percentage: rate,
            owner_payout,
            total_with_fees,
            savings_vs_traditional,
            savings_percentage,
            fee_breakdown,
        })
    }

    /// Sets an admin override rate that supersedes tier pricing until
    /// removed.
    ///
    /// # Errors
    ///
    /// - [`MarketError::RateOutOfRange`] if `rate` is outside `[0, 1]`.
    /// - [`MarketError::MissingReason`] if `reason` is empty or blank —
    ///   the reason is mandatory audit metadata.
    pub fn set_special_fee_rate(
        &self,
        user_id: UserId,
        rate: Decimal,
        reason: &str,
    ) -> Result<UserFeeStructure, MarketError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(MarketError::RateOutOfRange);
        }
        if reason.trim().is_empty() {
            return Err(MarketError::MissingReason);
        }

        let mut entry = self
            .structures
            .entry(user_id)
            .or_insert_with(|| UserFeeStructure::new(user_id));

        entry.special_rate = Some(rate);
        entry.special_rate_reason = Some(reason.trim().to_string());
        entry.fee_percentage = rate;
        entry.last_updated = Utc::now();

        tracing::debug!(user = %user_id, %rate, reason, "special fee rate set");
        Ok(entry.clone())
    }

    /// Clears the override and restores the tier's standard rate, recomputed
    /// from the current tier rather than any cached value.
    pub fn remove_special_fee_rate(&self, user_id: UserId) -> UserFeeStructure {
        let mut entry = self
            .structures
            .entry(user_id)
            .or_insert_with(|| UserFeeStructure::new(user_id));

        entry.special_rate = None;
        entry.special_rate_reason = None;
        entry.fee_percentage = entry.tier.standard_rate();
        entry.last_updated = Utc::now();

        tracing::debug!(user = %user_id, "special fee rate removed");
        entry.clone()
    }

    pub(crate) fn structures(&self) -> &DashMap<UserId, UserFeeStructure> {
        &self.structures
    }
}

impl Default for FeeEngine {
    fn default() -> Self {
        Self::new()
    }
}
