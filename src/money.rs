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

//! Currency and percentage display formatting.
//!
//! Pure, stateless helpers. These are for *display only* — fee arithmetic in
//! [`crate::fees`] works on raw cent amounts and never round-trips through
//! formatted strings.

use crate::base::Cents;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Formats a cent amount as a dollar string, e.g. `1234` → `"$12.34"`.
///
/// Negative amounts keep the sign in front of the symbol: `-200` → `"-$2.00"`.
pub fn format_cents(amount: Cents) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Formats a fractional rate as a percentage, e.g. `0.22` → `"22%"`.
///
/// Trailing zeros are trimmed so `0.05` renders as `"5%"`, while
/// `0.025` renders as `"2.5%"`.
pub fn format_rate(rate: Decimal) -> String {
    format!("{}%", (rate * dec!(100)).normalize())
}
