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

//! Platform fee analytics.
//!
//! A read-only join of the fee engine's per-user state with the commission
//! ledger's aggregate statistics. No side effects; safe to call on empty
//! stores (all averages are 0 over empty sets).

use crate::base::Cents;
use crate::fees::{FeeEngine, FeeTier};
use crate::ledger::{CommissionLedger, CommissionStats};
use rust_decimal::Decimal;
use serde::Serialize;

/// Per-tier user-population rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TierBreakdown {
    pub users: usize,
    pub commissions: Cents,
}

/// Aggregate view over all fee structures and ledger records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeeAnalytics {
    pub total_users: usize,
    pub special_rate_users: usize,
    /// Mean of the current effective rates across all known users; 0 when
    /// no users exist.
    pub average_fee_percentage: Decimal,
    pub new_user: TierBreakdown,
    pub experienced_user: TierBreakdown,
    pub ledger: CommissionStats,
}

impl FeeEngine {
    /// Aggregates fee-structure and ledger statistics for the admin panel.
    pub fn fee_analytics(&self, ledger: &CommissionLedger) -> FeeAnalytics {
        let mut total_users = 0usize;
        let mut special_rate_users = 0usize;
        let mut new_users = 0usize;
        let mut experienced_users = 0usize;
        let mut rate_sum = Decimal::ZERO;

        for structure in self.structures().iter() {
            total_users += 1;
            rate_sum += structure.effective_rate();
            if structure.special_rate.is_some() {
                special_rate_users += 1;
            }
            match structure.tier {
                FeeTier::NewUser => new_users += 1,
                FeeTier::ExperiencedUser => experienced_users += 1,
            }
        }

        let average_fee_percentage = if total_users == 0 {
            Decimal::ZERO
        } else {
            rate_sum / Decimal::from(total_users as i64)
        };

        let stats = ledger.stats();
        FeeAnalytics {
            total_users,
            special_rate_users,
            average_fee_percentage,
            new_user: TierBreakdown {
                users: new_users,
                commissions: stats.new_user_commissions,
            },
            experienced_user: TierBreakdown {
                users: experienced_users,
                commissions: stats.experienced_user_commissions,
            },
            ledger: stats,
        }
    }
}
