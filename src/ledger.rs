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

//! Commission ledger.
//!
//! Append-only record store of completed rental transactions and affiliate
//! commissions. The ledger is fed finished [`crate::fees::FeeCalculation`]
//! values; it never computes platform fees itself. Affiliate payouts *are*
//! computed here, from the affiliate tier's rate.
//!
//! Ordering is a query-time guarantee: records are returned newest-first by
//! the query methods, but storage order carries no meaning.

use crate::base::{AffiliateId, Cents, CommissionId};
use crate::error::MarketError;
use crate::fees::{FeeTier, round_cents};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lifecycle of a commission record. Amounts are immutable; only the status
/// moves, and only out of `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    Pending,
    Completed,
    Refunded,
}

/// Lifecycle of an affiliate payout. Transitions are admin-driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    Pending,
    Paid,
    Cancelled,
}

/// Referral-program bracket determining the affiliate's commission rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateTier {
    Starter,
    Pro,
    Elite,
}

impl AffiliateTier {
    /// Commission rate earned on referred rentals.
    pub fn rate(self) -> Decimal {
        match self {
            AffiliateTier::Starter => dec!(0.02),
            AffiliateTier::Pro => dec!(0.03),
            AffiliateTier::Elite => dec!(0.04),
        }
    }
}

/// One record per completed rental payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionRecord {
    pub id: CommissionId,
    pub payment_id: String,
    pub item_id: String,
    pub item_title: String,
    pub rental_amount: Cents,
    /// Platform fee retained on this rental.
    pub commission: Cents,
    pub owner_payout: Cents,
    pub date: DateTime<Utc>,
    pub status: CommissionStatus,
    pub owner_name: String,
    pub fee_percentage: Decimal,
    pub user_tier: FeeTier,
    pub affiliate_id: Option<AffiliateId>,
    pub affiliate_commission: Option<Cents>,
    pub affiliate_tier: Option<AffiliateTier>,
}

/// One record per referral-attributed rental.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateCommission {
    pub id: CommissionId,
    pub affiliate_id: AffiliateId,
    pub affiliate_name: String,
    pub affiliate_tier: AffiliateTier,
    pub commission_rate: Decimal,
    pub rental_amount: Cents,
    /// `rental_amount × commission_rate`, rounded to whole cents.
    pub commission_amount: Cents,
    pub date: DateTime<Utc>,
    pub status: AffiliateStatus,
    pub referral_code: String,
    pub item_title: String,
}

/// Caller-supplied fields for a new commission record, taken from the
/// payment confirmation and the fee calculation it was quoted with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionInput {
    pub payment_id: String,
    pub item_id: String,
    pub item_title: String,
    pub rental_amount: Cents,
    pub commission: Cents,
    pub owner_payout: Cents,
    pub owner_name: String,
    pub fee_percentage: Decimal,
    pub user_tier: FeeTier,
}

impl CommissionInput {
    fn validate(&self) -> Result<(), MarketError> {
        if self.payment_id.trim().is_empty() {
            return Err(MarketError::MissingField("payment_id"));
        }
        if self.item_id.trim().is_empty() {
            return Err(MarketError::MissingField("item_id"));
        }
        if self.item_title.trim().is_empty() {
            return Err(MarketError::MissingField("item_title"));
        }
        if self.owner_name.trim().is_empty() {
            return Err(MarketError::MissingField("owner_name"));
        }
        if self.rental_amount < 0 || self.commission < 0 {
            return Err(MarketError::NegativeAmount);
        }
        Ok(())
    }
}

/// Referral attribution supplied alongside a commission record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateInfo {
    pub affiliate_id: AffiliateId,
    pub affiliate_name: String,
    pub tier: AffiliateTier,
    pub referral_code: String,
}

/// Aggregate statistics over the ledger.
///
/// All averages are defined as 0 over an empty ledger; the 30-day windows
/// are measured back from the moment `stats()` is called.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionStats {
    pub record_count: usize,
    pub total_revenue: Cents,
    pub total_commissions: Cents,
    pub average_commission: Cents,
    pub monthly_commissions: Cents,
    pub monthly_revenue: Cents,
    pub new_user_commissions: Cents,
    pub experienced_user_commissions: Cents,
    pub average_fee_percentage: Decimal,
    pub affiliate_total: Cents,
    pub affiliate_starter: Cents,
    pub affiliate_pro: Cents,
    pub affiliate_elite: Cents,
    pub affiliate_count: usize,
}

/// Append-only ledger of commission and affiliate records.
///
/// # Thread Safety
///
/// Records are held in [`DashMap`]s keyed by generated id; ids come from
/// atomic counters, so concurrent appends never collide. Status transitions
/// mutate a single record under its shard lock.
pub struct CommissionLedger {
    records: DashMap<CommissionId, CommissionRecord>,
    affiliate_records: DashMap<CommissionId, AffiliateCommission>,
    next_record_id: AtomicU64,
    next_affiliate_id: AtomicU64,
}

impl CommissionLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        CommissionLedger {
            records: DashMap::new(),
            affiliate_records: DashMap::new(),
            next_record_id: AtomicU64::new(1),
            next_affiliate_id: AtomicU64::new(1),
        }
    }

    /// Appends a commission record, stamped with the current time.
    ///
    /// When `affiliate` is supplied, also computes the affiliate payout
    /// (`rental_amount × tier rate`, rounded), appends a linked
    /// [`AffiliateCommission`] with status `Pending`, and back-fills the
    /// commission record's affiliate fields.
    ///
    /// # Errors
    ///
    /// [`MarketError::MissingField`] / [`MarketError::NegativeAmount`] on
    /// malformed input; nothing is appended in that case.
    pub fn record(
        &self,
        input: CommissionInput,
        affiliate: Option<AffiliateInfo>,
    ) -> Result<CommissionRecord, MarketError> {
        self.record_at(input, affiliate, Utc::now())
    }

    fn record_at(
        &self,
        input: CommissionInput,
        affiliate: Option<AffiliateInfo>,
        date: DateTime<Utc>,
    ) -> Result<CommissionRecord, MarketError> {
        input.validate()?;
        if let Some(info) = &affiliate {
            if info.affiliate_name.trim().is_empty() {
                return Err(MarketError::MissingField("affiliate_name"));
            }
            if info.referral_code.trim().is_empty() {
                return Err(MarketError::MissingField("referral_code"));
            }
        }

        let id = CommissionId(self.next_record_id.fetch_add(1, Ordering::Relaxed));
        let mut record = CommissionRecord {
            id,
            payment_id: input.payment_id,
            item_id: input.item_id,
            item_title: input.item_title,
            rental_amount: input.rental_amount,
            commission: input.commission,
            owner_payout: input.owner_payout,
            date,
            status: CommissionStatus::Pending,
            owner_name: input.owner_name,
            fee_percentage: input.fee_percentage,
            user_tier: input.user_tier,
            affiliate_id: None,
            affiliate_commission: None,
            affiliate_tier: None,
        };

        if let Some(info) = affiliate {
            let amount = round_cents(Decimal::from(record.rental_amount) * info.tier.rate());
            let affiliate_record = AffiliateCommission {
                id: CommissionId(self.next_affiliate_id.fetch_add(1, Ordering::Relaxed)),
                affiliate_id: info.affiliate_id,
                affiliate_name: info.affiliate_name,
                affiliate_tier: info.tier,
                commission_rate: info.tier.rate(),
                rental_amount: record.rental_amount,
                commission_amount: amount,
                date,
                status: AffiliateStatus::Pending,
                referral_code: info.referral_code,
                item_title: record.item_title.clone(),
            };

            record.affiliate_id = Some(info.affiliate_id);
            record.affiliate_commission = Some(amount);
            record.affiliate_tier = Some(info.tier);

            self.affiliate_records
                .insert(affiliate_record.id, affiliate_record);
        }

        tracing::debug!(record = %id, payment = %record.payment_id, "commission recorded");
        self.records.insert(id, record.clone());
        Ok(record)
    }

    /// Moves a commission record out of `Pending`.
    ///
    /// # Errors
    ///
    /// - [`MarketError::RecordNotFound`] for an unknown id.
    /// - [`MarketError::InvalidStatusTransition`] unless the record is
    ///   `Pending` and the target is `Completed` or `Refunded`.
    pub fn set_record_status(
        &self,
        id: CommissionId,
        status: CommissionStatus,
    ) -> Result<CommissionRecord, MarketError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(MarketError::RecordNotFound(id))?;

        if record.status != CommissionStatus::Pending || status == CommissionStatus::Pending {
            return Err(MarketError::InvalidStatusTransition);
        }
        record.status = status;
        Ok(record.clone())
    }

    /// Moves an affiliate payout out of `Pending` (admin-driven).
    ///
    /// # Errors
    ///
    /// Same shape as [`Self::set_record_status`].
    pub fn set_affiliate_status(
        &self,
        id: CommissionId,
        status: AffiliateStatus,
    ) -> Result<AffiliateCommission, MarketError> {
        let mut record = self
            .affiliate_records
            .get_mut(&id)
            .ok_or(MarketError::RecordNotFound(id))?;

        if record.status != AffiliateStatus::Pending || status == AffiliateStatus::Pending {
            return Err(MarketError::InvalidStatusTransition);
        }
        record.status = status;
        Ok(record.clone())
    }

    /// All commission records, newest first.
    pub fn records(&self) -> Vec<CommissionRecord> {
        let mut out: Vec<_> = self.records.iter().map(|r| r.value().clone()).collect();
        Self::sort_newest_first(&mut out);
        out
    }

    /// Commission records for one owner, newest first.
    pub fn records_by_owner(&self, owner_name: &str) -> Vec<CommissionRecord> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.owner_name == owner_name)
            .map(|r| r.value().clone())
            .collect();
        Self::sort_newest_first(&mut out);
        out
    }

    /// Commission records dated within `[start, end]`, newest first.
    pub fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<CommissionRecord> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .map(|r| r.value().clone())
            .collect();
        Self::sort_newest_first(&mut out);
        out
    }

    /// All affiliate payouts, newest first.
    pub fn affiliate_commissions(&self) -> Vec<AffiliateCommission> {
        let mut out: Vec<_> = self
            .affiliate_records
            .iter()
            .map(|r| r.value().clone())
            .collect();
        out.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.0.cmp(&a.id.0)));
        out
    }

    /// Number of commission records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the ledger holds no commission records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Aggregates totals, averages, tier breakdowns, and 30-day windows.
    pub fn stats(&self) -> CommissionStats {
        let window_start = Utc::now() - Duration::days(30);

        let mut record_count = 0usize;
        let mut total_revenue: Cents = 0;
        let mut total_commissions: Cents = 0;
        let mut monthly_commissions: Cents = 0;
        let mut monthly_revenue: Cents = 0;
        let mut new_user_commissions: Cents = 0;
        let mut experienced_user_commissions: Cents = 0;
        let mut fee_percentage_sum = Decimal::ZERO;

        for record in self.records.iter() {
            record_count += 1;
            total_revenue += record.rental_amount;
            total_commissions += record.commission;
            fee_percentage_sum += record.fee_percentage;
            if record.date >= window_start {
                monthly_commissions += record.commission;
                monthly_revenue += record.rental_amount;
            }
            match record.user_tier {
                FeeTier::NewUser => new_user_commissions += record.commission,
                FeeTier::ExperiencedUser => experienced_user_commissions += record.commission,
            }
        }

        let average_commission = if record_count == 0 {
            0
        } else {
            round_cents(Decimal::from(total_commissions) / Decimal::from(record_count as i64))
        };
        let average_fee_percentage = if record_count == 0 {
            Decimal::ZERO
        } else {
            fee_percentage_sum / Decimal::from(record_count as i64)
        };

        let mut affiliate_total: Cents = 0;
        let mut affiliate_starter: Cents = 0;
        let mut affiliate_pro: Cents = 0;
        let mut affiliate_elite: Cents = 0;
        let affiliate_count = self.affiliate_records.len();

        for payout in self.affiliate_records.iter() {
            affiliate_total += payout.commission_amount;
            match payout.affiliate_tier {
                AffiliateTier::Starter => affiliate_starter += payout.commission_amount,
                AffiliateTier::Pro => affiliate_pro += payout.commission_amount,
                AffiliateTier::Elite => affiliate_elite += payout.commission_amount,
            }
        }

        CommissionStats {
            record_count,
            total_revenue,
            total_commissions,
            average_commission,
            monthly_commissions,
            monthly_revenue,
            new_user_commissions,
            experienced_user_commissions,
            average_fee_percentage,
            affiliate_total,
            affiliate_starter,
            affiliate_pro,
            affiliate_elite,
            affiliate_count,
        }
    }

    fn sort_newest_first(records: &mut [CommissionRecord]) {
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.0.cmp(&a.id.0)));
    }
}

impl Default for CommissionLedger {
    fn default() -> Self {
        Self::new()
    }
}
