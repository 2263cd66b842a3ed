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

use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rentmarket::{
    AffiliateId, AffiliateInfo, AffiliateTier, CommissionInput, CommissionLedger, FeeEngine,
    UserId, money,
};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Settlement processor - turn completed-rental CSVs into commission records
///
/// Reads one row per captured rental payment, runs each through the tiered
/// fee engine, and writes the resulting commission records to stdout.
#[derive(Parser, Debug)]
#[command(name = "rentmarket")]
#[command(about = "Process completed-rental CSVs into commission records", long_about = None)]
struct Args {
    /// Path to CSV file with completed rentals
    ///
    /// Expected format: payment,user,item,title,owner,amount,deposit,affiliate,affiliate_name,affiliate_tier,referral
    /// Example: cargo run -- settlements.csv > commissions.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Print aggregate ledger statistics to stderr after processing
    #[arg(long)]
    stats: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let (fees, ledger) = match process_settlements(BufReader::new(file)) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error processing settlements: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_records(&ledger, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }

    if args.stats {
        print_stats(&fees, &ledger);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `payment, user, item, title, owner, amount, deposit, affiliate,
/// affiliate_name, affiliate_tier, referral` — the last five may be empty.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    payment: String,
    user: u64,
    item: String,
    title: String,
    owner: String,
    amount: i64,
    #[serde(deserialize_with = "csv::invalid_option")]
    deposit: Option<i64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    affiliate: Option<u64>,
    affiliate_name: Option<String>,
    affiliate_tier: Option<String>,
    referral: Option<String>,
}

impl CsvRecord {
    /// Extracts affiliate attribution when all of its columns are present.
    fn affiliate_info(&self) -> Option<AffiliateInfo> {
        let tier = match self.affiliate_tier.as_deref()?.to_lowercase().as_str() {
            "starter" => AffiliateTier::Starter,
            "pro" => AffiliateTier::Pro,
            "elite" => AffiliateTier::Elite,
            _ => return None,
        };
        Some(AffiliateInfo {
            affiliate_id: AffiliateId(self.affiliate?),
            affiliate_name: self.affiliate_name.clone()?,
            tier,
            referral_code: self.referral.clone()?,
        })
    }
}

/// Process completed rentals from a CSV reader.
///
/// Streaming parse; malformed rows and rows the engines reject are skipped
/// (logged in debug builds) so a bad row never aborts the run. Each
/// processed row also bumps the renting user's completed-rental count, so a
/// long settlement file exercises tier promotion the same way production
/// traffic does.
///
/// # Errors
///
/// Returns a CSV error if the reader itself fails; individual row errors do
/// not stop processing.
pub fn process_settlements<R: Read>(
    reader: R,
) -> Result<(FeeEngine, CommissionLedger), csv::Error> {
    let fees = FeeEngine::new();
    let ledger = CommissionLedger::new();

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!("skipping malformed row: {}", e);
                continue;
            }
        };

        let user = UserId(record.user);
        let structure = fees.user_fee_structure(user);

        let calculation = match fees.calculate_fees(user, record.amount, record.deposit.unwrap_or(0))
        {
            Ok(calculation) => calculation,
            Err(e) => {
                tracing::debug!(payment = %record.payment, "skipping row: {}", e);
                continue;
            }
        };

        let input = CommissionInput {
            payment_id: record.payment.clone(),
            item_id: record.item.clone(),
            item_title: record.title.clone(),
            rental_amount: calculation.rental_amount,
            commission: calculation.platform_fee,
            owner_payout: calculation.owner_payout,
            owner_name: record.owner.clone(),
            fee_percentage: calculation.platform_fee_percentage,
            user_tier: structure.tier,
        };

        if let Err(e) = ledger.record(input, record.affiliate_info()) {
            tracing::debug!(payment = %record.payment, "skipping row: {}", e);
            continue;
        }

        fees.update_user_rental_count(user, structure.rental_count + 1);
    }

    Ok((fees, ledger))
}

/// Write commission records to a CSV writer, newest first.
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_records<W: Write>(ledger: &CommissionLedger, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for record in ledger.records() {
        wtr.serialize(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

fn print_stats(fees: &FeeEngine, ledger: &CommissionLedger) {
    let analytics = fees.fee_analytics(ledger);
    eprintln!("records:            {}", analytics.ledger.record_count);
    eprintln!(
        "total revenue:      {}",
        money::format_cents(analytics.ledger.total_revenue)
    );
    eprintln!(
        "total commissions:  {}",
        money::format_cents(analytics.ledger.total_commissions)
    );
    eprintln!(
        "average commission: {}",
        money::format_cents(analytics.ledger.average_commission)
    );
    eprintln!(
        "affiliate payouts:  {}",
        money::format_cents(analytics.ledger.affiliate_total)
    );
    eprintln!(
        "users (new/exp):    {}/{}",
        analytics.new_user.users, analytics.experienced_user.users
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentmarket::FeeTier;
    use std::io::Cursor;

    const HEADER: &str =
        "payment,user,item,title,owner,amount,deposit,affiliate,affiliate_name,affiliate_tier,referral\n";

    #[test]
    fn parse_simple_settlement() {
        let csv = format!("{HEADER}pay-1,1,item-1,Bounce house,Dana,10000,,,,,\n");
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.len(), 1);
        let record = &ledger.records()[0];
        assert_eq!(record.rental_amount, 10_000);
        assert_eq!(record.commission, 2_200);
        assert_eq!(record.owner_payout, 7_800);
    }

    #[test]
    fn settlement_with_deposit_and_affiliate() {
        let csv = format!("{HEADER}pay-1,1,item-1,Tent,Dana,10000,5000,7,Riley,pro,PARTY10\n");
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();

        let record = &ledger.records()[0];
        assert_eq!(record.affiliate_commission, Some(300));
        assert_eq!(ledger.affiliate_commissions().len(), 1);
        assert_eq!(ledger.affiliate_commissions()[0].referral_code, "PARTY10");
    }

    #[test]
    fn rental_counts_accumulate_and_promote() {
        let mut csv = String::from(HEADER);
        for i in 0..10 {
            csv.push_str(&format!("pay-{i},1,item-{i},Chairs,Dana,10000,,,,,\n"));
        }
        let (fees, ledger) = process_settlements(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.len(), 10);
        let structure = fees.user_fee_structure(UserId(1));
        assert_eq!(structure.rental_count, 10);
        assert_eq!(structure.tier, FeeTier::ExperiencedUser);
    }

    #[test]
    fn skip_malformed_rows() {
        let csv = format!(
            "{HEADER}pay-1,1,item-1,Bounce house,Dana,10000,,,,,\n\
             not,a,valid,row\n\
             pay-2,2,item-2,Speakers,Sam,5000,,,,,\n"
        );
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn negative_amount_rows_are_skipped() {
        let csv = format!("{HEADER}pay-1,1,item-1,Bounce house,Dana,-100,,,,,\n");
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn unknown_affiliate_tier_records_without_attribution() {
        let csv = format!("{HEADER}pay-1,1,item-1,Tent,Dana,10000,,7,Riley,gold,CODE\n");
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();

        assert_eq!(ledger.len(), 1);
        assert!(ledger.records()[0].affiliate_id.is_none());
        assert!(ledger.affiliate_commissions().is_empty());
    }

    #[test]
    fn write_records_emits_csv_header() {
        let csv = format!("{HEADER}pay-1,1,item-1,Bounce house,Dana,10000,,,,,\n");
        let (_, ledger) = process_settlements(Cursor::new(csv)).unwrap();

        let mut output = Vec::new();
        write_records(&ledger, &mut output).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("payment_id"));
        assert!(output.contains("pay-1"));
    }
}
