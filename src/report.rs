//! Summary reporting: per-SKU totals over the persisted transactions.

use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::SyncError;

/// Grouped totals for one SKU.
#[derive(Debug, Clone, PartialEq)]
pub struct SkuSummary {
    pub seller_sku: Option<String>,
    pub transaction_count: i64,
    pub total_quantity: i64,
    pub total_amount: Decimal,
}

/// Group persisted transactions by SKU, ordered by descending total amount
/// (SKU as tiebreak). Pure read, no mutation.
///
/// Amounts are summed in `Decimal` over the raw rows rather than in SQL so
/// the totals stay exact.
pub fn summarize(conn: &Connection) -> Result<Vec<SkuSummary>, SyncError> {
    let mut stmt =
        conn.prepare("SELECT seller_sku, quantity, currency_amount FROM financial_transactions")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, Option<String>>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut by_sku: HashMap<Option<String>, SkuSummary> = HashMap::new();

    for row in rows {
        let (seller_sku, quantity, raw_amount) = row?;
        let amount = match Decimal::from_str(&raw_amount) {
            Ok(amount) => amount,
            Err(e) => {
                log::warn!("Ignoring stored amount {:?}: {}", raw_amount, e);
                Decimal::ZERO
            }
        };

        let entry = by_sku
            .entry(seller_sku.clone())
            .or_insert_with(|| SkuSummary {
                seller_sku,
                transaction_count: 0,
                total_quantity: 0,
                total_amount: Decimal::ZERO,
            });
        entry.transaction_count += 1;
        entry.total_quantity += quantity;
        entry.total_amount += amount;
    }

    let mut summaries: Vec<SkuSummary> = by_sku.into_values().collect();
    summaries.sort_by(|a, b| {
        b.total_amount
            .cmp(&a.total_amount)
            .then_with(|| a.seller_sku.cmp(&b.seller_sku))
    });

    Ok(summaries)
}

/// Render the fixed-width summary table to standard output.
pub fn print_summary(summaries: &[SkuSummary]) {
    println!("\n--- Summary Report: Totals by SKU ---");

    if summaries.is_empty() {
        println!("No data found to generate a summary.");
        return;
    }

    println!(
        "{:<30} | {:>12} | {:>12} | {:>15}",
        "SKU", "TRANSACTIONS", "TOTAL UNITS", "TOTAL AMOUNT"
    );
    println!("{}", "-".repeat(80));
    for summary in summaries {
        println!(
            "{:<30} | {:>12} | {:>12} | {:>15.2}",
            summary.seller_sku.as_deref().unwrap_or("(no sku)"),
            summary.transaction_count,
            summary.total_quantity,
            summary.total_amount
        );
    }
    println!("{}", "-".repeat(80));
}
