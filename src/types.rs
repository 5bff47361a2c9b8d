//! Shared pipeline types.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde_json::Value;

/// One raw event envelope as returned by the reporting API: a JSON object
/// with a single recognized `<EventType>List` key holding the event records.
pub type RawEvent = Value;

/// Flattened, uniquely-keyed transaction record.
///
/// `transaction_id` is the natural dedup key, derived as
/// `{order_id}-{sku}-{charge_type}-{posted_date_raw}` from the source fields
/// (absent optional segments render empty). It must be byte-stable across
/// runs for the same source data.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalTransaction {
    pub transaction_id: String,
    pub amazon_order_id: Option<String>,
    pub event_type: String,
    pub posted_date: DateTime<FixedOffset>,
    pub seller_sku: Option<String>,
    pub charge_type: String,
    pub currency_code: String,
    pub currency_amount: Decimal,
    pub quantity: i64,
}
