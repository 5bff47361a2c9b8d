//! SQLite connection and schema management.

use rusqlite::Connection;
use std::path::Path;

use crate::error::SyncError;

/// Open the database, creating the parent directory if needed.
pub fn open(db_path: &str) -> Result<Connection, SyncError> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;

    Ok(conn)
}

/// Create the transactions table and indexes. Idempotent.
pub fn init_schema(conn: &Connection) -> Result<(), SyncError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS financial_transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amazon_order_id TEXT,
            transaction_id TEXT NOT NULL UNIQUE,
            event_type TEXT NOT NULL,
            posted_date TEXT NOT NULL,
            seller_sku TEXT,
            charge_type TEXT NOT NULL,
            currency_code TEXT NOT NULL,
            currency_amount TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // Indexes for the report query and order lookups
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_seller_sku ON financial_transactions(seller_sku)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_order_id ON financial_transactions(amazon_order_id)",
        [],
    )?;

    log::info!("✅ Database schema ready (WAL mode)");

    Ok(())
}
