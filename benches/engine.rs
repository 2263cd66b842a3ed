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

//! Benchmarks for the marketplace core.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Fee calculation (tier rate and special rate)
//! - Message filtering (clean, profane, and PII-bearing text)
//! - Chat send throughput, single- and multi-threaded
//! - Ledger append and stats scaling

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use rentmarket::{
    ChatEngine, CommissionInput, CommissionLedger, FeeEngine, FeeTier, UserChatProfile, UserId,
    filter,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn sample_input(payment: u32, amount: i64) -> CommissionInput {
    CommissionInput {
        payment_id: format!("pay-{payment}"),
        item_id: "item-1".to_string(),
        item_title: "Bounce house".to_string(),
        rental_amount: amount,
        commission: amount / 5,
        owner_payout: amount - amount / 5,
        owner_name: "Dana".to_string(),
        fee_percentage: dec!(0.22),
        user_tier: FeeTier::NewUser,
    }
}

fn profile(id: u64) -> UserChatProfile {
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

fn chat_engine_with_profiles(count: u64) -> ChatEngine {
    let engine = ChatEngine::new();
    for id in 1..=count {
        engine.register_profile(profile(id));
    }
    engine
}

// =============================================================================
// Fee Benchmarks
// =============================================================================

fn bench_calculate_fees(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculate_fees");

    group.bench_function("tier_rate", |b| {
        let engine = FeeEngine::new();
        engine.user_fee_structure(UserId(1));
        b.iter(|| engine.calculate_fees(UserId(1), black_box(10_000), 5_000).unwrap())
    });

    group.bench_function("special_rate", |b| {
        let engine = FeeEngine::new();
        engine
            .set_special_fee_rate(UserId(1), dec!(0.05), "benchmark")
            .unwrap();
        b.iter(|| engine.calculate_fees(UserId(1), black_box(10_000), 5_000).unwrap())
    });

    group.finish();
}

fn bench_rental_count_updates(c: &mut Criterion) {
    c.bench_function("rental_count_update", |b| {
        let engine = FeeEngine::new();
        let mut count = 0u32;
        b.iter(|| {
            count += 1;
            engine.update_user_rental_count(UserId(1), black_box(count))
        })
    });
}

// =============================================================================
// Filter Benchmarks
// =============================================================================

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    let clean = "Hi! Is the bounce house available next Saturday afternoon?";
    let profane = "That damn canopy is stupid expensive";
    let pii = "Call me at 555-123-4567 or dana@example.com";
    let long = "a ".repeat(400);

    group.bench_function("clean", |b| b.iter(|| filter::filter(black_box(clean))));
    group.bench_function("profanity", |b| b.iter(|| filter::filter(black_box(profane))));
    group.bench_function("personal_info", |b| b.iter(|| filter::filter(black_box(pii))));
    group.bench_function("long_message", |b| {
        b.iter(|| filter::filter(black_box(long.as_str())))
    });

    group.finish();
}

// =============================================================================
// Chat Benchmarks
// =============================================================================

fn bench_send_message(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_message");

    group.bench_function("same_room", |b| {
        let engine = chat_engine_with_profiles(2);
        b.iter(|| {
            engine
                .send_message(UserId(1), UserId(2), black_box("see you at noon"), None)
                .unwrap()
        })
    });

    group.finish();
}

fn bench_parallel_sends_distinct_pairs(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_sends_distinct_pairs");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = Arc::new(chat_engine_with_profiles(count as u64 * 2));

                (0..count).into_par_iter().for_each(|i| {
                    let sender = UserId(i as u64 * 2 + 1);
                    let receiver = UserId(i as u64 * 2 + 2);
                    engine
                        .send_message(sender, receiver, "is this available?", None)
                        .unwrap();
                });

                black_box(&engine);
            })
        });
    }
    group.finish();
}

fn bench_parallel_sends_same_room(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_sends_same_room");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let engine = Arc::new(chat_engine_with_profiles(2));

                (0..count).into_par_iter().for_each(|_| {
                    engine
                        .send_message(UserId(1), UserId(2), "ping", None)
                        .unwrap();
                });

                black_box(&engine);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Ledger Benchmarks
// =============================================================================

fn bench_ledger_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_append");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = CommissionLedger::new();
                for i in 0..count {
                    ledger.record(sample_input(i, 10_000), None).unwrap();
                }
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

fn bench_ledger_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_stats");

    for count in [100, 1_000, 10_000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let ledger = CommissionLedger::new();
            for i in 0..count {
                ledger.record(sample_input(i, 10_000), None).unwrap();
            }
            b.iter(|| black_box(ledger.stats()))
        });
    }
    group.finish();
}

// =============================================================================
// Criterion Groups
// =============================================================================

criterion_group!(fees, bench_calculate_fees, bench_rental_count_updates,);

criterion_group!(filtering, bench_filter,);

criterion_group!(
    chat,
    bench_send_message,
    bench_parallel_sends_distinct_pairs,
    bench_parallel_sends_same_room,
);

criterion_group!(ledger, bench_ledger_append, bench_ledger_stats,);

criterion_main!(fees, filtering, chat, ledger);
