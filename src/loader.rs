//! Idempotent persistence of canonical transactions.
//!
//! Bulk insert is the fast path; any uniqueness violation in the batch drops
//! the whole transaction and falls back to row-by-row inserts, each in its
//! own transaction, so duplicates from an overlapping date range are skipped
//! without losing the fresh rows around them.

use rusqlite::{params, Connection};

use crate::error::SyncError;
use crate::types::CanonicalTransaction;

/// Outcome of one load call. Duplicates are expected on re-runs and never
/// surface as failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub inserted: usize,
    pub duplicates: usize,
    pub failed: usize,
}

const INSERT_SQL: &str = "INSERT INTO financial_transactions
    (amazon_order_id, transaction_id, event_type, posted_date,
     seller_sku, charge_type, currency_code, currency_amount, quantity)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";

fn insert_one(conn: &Connection, tx: &CanonicalTransaction) -> Result<(), rusqlite::Error> {
    conn.execute(
        INSERT_SQL,
        params![
            tx.amazon_order_id,
            tx.transaction_id,
            tx.event_type,
            tx.posted_date.to_rfc3339(),
            tx.seller_sku,
            tx.charge_type,
            tx.currency_code,
            tx.currency_amount.to_string(),
            tx.quantity,
        ],
    )?;
    Ok(())
}

/// True for a UNIQUE (or primary-key) constraint violation, as opposed to
/// any other constraint or storage failure.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _)
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

fn bulk_insert(
    conn: &mut Connection,
    transactions: &[CanonicalTransaction],
) -> Result<(), rusqlite::Error> {
    let db_tx = conn.transaction()?;
    for tx in transactions {
        insert_one(&db_tx, tx)?;
    }
    db_tx.commit()
}

fn insert_individually(
    conn: &mut Connection,
    transactions: &[CanonicalTransaction],
) -> Result<LoadOutcome, SyncError> {
    let mut outcome = LoadOutcome::default();

    for tx in transactions {
        let result = conn.transaction().and_then(|db_tx| {
            insert_one(&db_tx, tx)?;
            db_tx.commit()
        });

        match result {
            Ok(()) => outcome.inserted += 1,
            Err(e) if is_unique_violation(&e) => {
                outcome.duplicates += 1;
                log::debug!("Skipping duplicate transaction {}", tx.transaction_id);
            }
            Err(e) => {
                outcome.failed += 1;
                log::warn!("Failed to insert {}: {}", tx.transaction_id, e);
            }
        }
    }

    log::info!(
        "Loaded {} unique transactions ({} duplicates skipped, {} failed)",
        outcome.inserted,
        outcome.duplicates,
        outcome.failed
    );

    Ok(outcome)
}

/// Persist a batch of canonical transactions with at-most-once semantics.
///
/// Dropped (uncommitted) rusqlite transactions roll back, so every exit
/// path out of either phase leaves the database consistent.
pub fn load(
    conn: &mut Connection,
    transactions: &[CanonicalTransaction],
) -> Result<LoadOutcome, SyncError> {
    if transactions.is_empty() {
        log::info!("No new transactions to load");
        return Ok(LoadOutcome::default());
    }

    log::info!("Attempting to load {} parsed transactions", transactions.len());

    match bulk_insert(conn, transactions) {
        Ok(()) => {
            log::info!("✅ Committed {} transactions in one batch", transactions.len());
            Ok(LoadOutcome {
                inserted: transactions.len(),
                ..LoadOutcome::default()
            })
        }
        Err(e) if is_unique_violation(&e) => {
            log::warn!("Duplicate entries detected, rolling back and loading one by one");
            insert_individually(conn, transactions)
        }
        Err(e) => Err(SyncError::Database(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = db::open(temp_file.path().to_str().unwrap()).unwrap();
        db::init_schema(&conn).unwrap();
        (temp_file, conn)
    }

    fn make_transaction(transaction_id: &str, amount: &str) -> CanonicalTransaction {
        CanonicalTransaction {
            transaction_id: transaction_id.to_string(),
            amazon_order_id: Some("ORDER-1".to_string()),
            event_type: "ShipmentEvent".to_string(),
            posted_date: DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
            seller_sku: Some("SKU-A".to_string()),
            charge_type: "Principal".to_string(),
            currency_code: "USD".to_string(),
            currency_amount: Decimal::from_str(amount).unwrap(),
            quantity: 1,
        }
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM financial_transactions", [], |row| {
            row.get(0)
        })
        .unwrap()
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let (_temp, mut conn) = create_test_db();
        let outcome = load(&mut conn, &[]).unwrap();
        assert_eq!(outcome, LoadOutcome::default());
        assert_eq!(row_count(&conn), 0);
    }

    #[test]
    fn test_bulk_insert_fast_path() {
        let (_temp, mut conn) = create_test_db();
        let batch = vec![
            make_transaction("t1", "10.00"),
            make_transaction("t2", "5.50"),
            make_transaction("t3", "0.99"),
        ];

        let outcome = load(&mut conn, &batch).unwrap();
        assert_eq!(outcome.inserted, 3);
        assert_eq!(outcome.duplicates, 0);
        assert_eq!(outcome.failed, 0);
        assert_eq!(row_count(&conn), 3);
    }

    #[test]
    fn test_duplicate_within_batch_persists_one() {
        let (_temp, mut conn) = create_test_db();
        let batch = vec![make_transaction("t1", "10.00"), make_transaction("t1", "10.00")];

        let outcome = load(&mut conn, &batch).unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_reload_is_idempotent() {
        let (_temp, mut conn) = create_test_db();
        let batch = vec![make_transaction("t1", "10.00"), make_transaction("t2", "5.50")];

        let first = load(&mut conn, &batch).unwrap();
        assert_eq!(first.inserted, 2);

        let second = load(&mut conn, &batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 2);
        assert_eq!(row_count(&conn), 2);
    }

    #[test]
    fn test_partial_overlap_keeps_fresh_rows() {
        let (_temp, mut conn) = create_test_db();
        load(&mut conn, &[make_transaction("t1", "10.00")]).unwrap();

        let batch = vec![
            make_transaction("t1", "10.00"),
            make_transaction("t2", "5.50"),
            make_transaction("t3", "0.99"),
        ];
        let outcome = load(&mut conn, &batch).unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(row_count(&conn), 3);
    }

    #[test]
    fn test_amount_round_trips_exactly() {
        let (_temp, mut conn) = create_test_db();
        // More than 2 fractional digits must survive storage untouched
        load(&mut conn, &[make_transaction("t1", "10.999")]).unwrap();

        let stored: String = conn
            .query_row(
                "SELECT currency_amount FROM financial_transactions WHERE transaction_id = 't1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(Decimal::from_str(&stored).unwrap(), Decimal::from_str("10.999").unwrap());
    }

    #[test]
    fn test_non_unique_failure_surfaces_as_error() {
        let (_temp, mut conn) = create_test_db();
        // NOT NULL violation on charge_type is not a duplicate, so the bulk
        // phase must roll back and report the error without falling back.
        conn.execute(
            "INSERT INTO financial_transactions
                (transaction_id, event_type, posted_date, charge_type, currency_code, currency_amount, quantity)
                VALUES ('seed', 'ShipmentEvent', '2024-01-01T00:00:00+00:00', 'Principal', 'USD', '1.00', 1)",
            [],
        )
        .unwrap();

        let err = bulk_insert_null_charge(&mut conn);
        assert!(err.is_err());
        assert!(!is_unique_violation(&err.unwrap_err()));
        // Nothing from the failed batch landed
        assert_eq!(row_count(&conn), 1);
    }

    fn bulk_insert_null_charge(conn: &mut Connection) -> Result<(), rusqlite::Error> {
        let db_tx = conn.transaction()?;
        db_tx.execute(
            "INSERT INTO financial_transactions
                (transaction_id, event_type, posted_date, charge_type, currency_code, currency_amount, quantity)
                VALUES ('bad', 'ShipmentEvent', '2024-01-01T00:00:00+00:00', NULL, 'USD', '1.00', 1)",
            [],
        )?;
        db_tx.commit()
    }
}
