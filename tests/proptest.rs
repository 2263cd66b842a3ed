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

//! Property-based tests for the marketplace core.
//!
//! These verify invariants that should hold for any input: the filter's
//! purity and score bounds, the universal fee clamp, tier-promotion
//! monotonicity, ledger totals, and unread counting.

use chrono::Utc;
use proptest::prelude::*;
use rentmarket::fees::{MAX_COMMISSION, MIN_COMMISSION};
use rentmarket::{
    ChatEngine, CommissionInput, CommissionLedger, FeeEngine, FeeTier, UserChatProfile, UserId,
    filter,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a fee rate in [0, 1] with 4 decimal places.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|basis| Decimal::new(basis, 4))
}

/// Generate a rental amount from zero up to $10,000,000.00.
fn arb_amount() -> impl Strategy<Value = i64> {
    0i64..=1_000_000_000i64
}

fn chat_profile(id: u64) -> UserChatProfile {
    UserChatProfile {
        user_id: UserId(id),
        display_name: format!("user-{id}"),
        avatar: None,
        verification_level: 1,
        safety_score: 90,
        is_online: true,
        last_seen: Utc::now(),
        response_time: "within an hour".to_string(),
        badges: Vec::new(),
    }
}

// =============================================================================
// Filter Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Identical input always yields identical output.
    #[test]
    fn filter_is_deterministic(content in any::<String>()) {
        prop_assert_eq!(filter::filter(&content), filter::filter(&content));
    }

    /// The score is always within [0, 100] and flags never repeat.
    #[test]
    fn filter_score_and_flags_are_bounded(content in any::<String>()) {
        let outcome = filter::filter(&content);
        prop_assert!(outcome.safety_score <= 100);
        prop_assert!(outcome.flags.len() <= 4);
        let mut deduped = outcome.flags.clone();
        deduped.dedup();
        prop_assert_eq!(deduped, outcome.flags);
    }

    /// A message with no findings passes through byte-for-byte.
    #[test]
    fn unflagged_content_is_never_mutated(content in "[a-zA-Z ,.!?]{0,80}") {
        let outcome = filter::filter(&content);
        if outcome.flags.is_empty() {
            prop_assert_eq!(outcome.content, content);
            prop_assert_eq!(outcome.safety_score, 100);
        }
    }
}

// =============================================================================
// Fee Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// The commission clamp holds for every amount and every legal rate.
    #[test]
    fn platform_fee_is_always_clamped(amount in arb_amount(), rate in arb_rate()) {
        let engine = FeeEngine::new();
        engine
            .set_special_fee_rate(UserId(1), rate, "property probe")
            .unwrap();

        let calc = engine.calculate_fees(UserId(1), amount, 0).unwrap();
        prop_assert!(calc.platform_fee >= MIN_COMMISSION);
        prop_assert!(calc.platform_fee <= MAX_COMMISSION);
        prop_assert_eq!(calc.owner_payout, amount - calc.platform_fee);
        prop_assert_eq!(calc.platform_fee_percentage, rate);
    }

    /// The deposit flows into the total but never into the fee.
    #[test]
    fn deposit_never_changes_the_fee(
        amount in arb_amount(),
        deposit in 0i64..=10_000_000i64,
    ) {
        let engine = FeeEngine::new();
        let with_deposit = engine.calculate_fees(UserId(1), amount, deposit).unwrap();
        let without = engine.calculate_fees(UserId(1), amount, 0).unwrap();

        prop_assert_eq!(with_deposit.platform_fee, without.platform_fee);
        prop_assert_eq!(with_deposit.total_with_fees, amount + deposit);
    }

    /// Once promoted, no sequence of further count updates demotes.
    #[test]
    fn tier_promotion_is_monotone(counts in prop::collection::vec(0u32..50, 1..20)) {
        let engine = FeeEngine::new();
        let mut promoted = false;

        for count in counts {
            let structure = engine.update_user_rental_count(UserId(1), count);
            if promoted {
                prop_assert_eq!(structure.tier, FeeTier::ExperiencedUser);
            }
            if structure.tier == FeeTier::ExperiencedUser {
                promoted = true;
            }
        }
    }
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Stats totals always equal the literal sums of what was recorded.
    #[test]
    fn stats_match_recorded_sums(amounts in prop::collection::vec(0i64..=1_000_000, 0..30)) {
        let ledger = CommissionLedger::new();
        let mut revenue = 0i64;
        let mut commissions = 0i64;

        for (i, amount) in amounts.iter().enumerate() {
            let commission = amount / 5;
            revenue += amount;
            commissions += commission;
            ledger
                .record(
                    CommissionInput {
                        payment_id: format!("pay-{i}"),
                        item_id: format!("item-{i}"),
                        item_title: "Folding chairs".to_string(),
                        rental_amount: *amount,
                        commission,
                        owner_payout: amount - commission,
                        owner_name: "Dana".to_string(),
                        fee_percentage: dec!(0.20),
                        user_tier: FeeTier::NewUser,
                    },
                    None,
                )
                .unwrap();
        }

        let stats = ledger.stats();
        prop_assert_eq!(stats.record_count, amounts.len());
        prop_assert_eq!(stats.total_revenue, revenue);
        prop_assert_eq!(stats.total_commissions, commissions);
        if amounts.is_empty() {
            prop_assert_eq!(stats.average_commission, 0);
        }
    }
}

// =============================================================================
// Chat Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// After N unread sends the room reads back exactly N, and mark-read
    /// resets to 0.
    #[test]
    fn unread_count_equals_sends(n in 1usize..20) {
        let engine = ChatEngine::new();
        engine.register_profile(chat_profile(1));
        engine.register_profile(chat_profile(2));

        let mut room_id = None;
        for i in 0..n {
            let message = engine
                .send_message(UserId(1), UserId(2), &format!("message {i}"), None)
                .unwrap();
            room_id = Some(message.room_id);
        }

        let room_id = room_id.unwrap();
        prop_assert_eq!(engine.room(room_id).unwrap().unread_count, n as u32);

        engine.mark_messages_read(room_id, UserId(2)).unwrap();
        prop_assert_eq!(engine.room(room_id).unwrap().unread_count, 0);
    }

    /// Message retrieval preserves send order for any message mix.
    #[test]
    fn send_order_is_preserved(contents in prop::collection::vec("[a-z ]{1,30}", 1..15)) {
        let engine = ChatEngine::new();
        engine.register_profile(chat_profile(1));
        engine.register_profile(chat_profile(2));

        let mut room_id = None;
        let mut expected = Vec::new();
        for content in &contents {
            let message = engine
                .send_message(UserId(1), UserId(2), content, None)
                .unwrap();
            room_id = Some(message.room_id);
            expected.push(message.id);
        }

        let stored: Vec<_> = engine
            .get_chat_messages(room_id.unwrap())
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        prop_assert_eq!(stored, expected);
    }
}
