//! Event normalization: flattens raw financial-event envelopes into
//! canonical transaction records.
//!
//! One envelope holds a single `<EventType>List` key with the posted event
//! records for that kind. Records nest line items, which nest charges; every
//! surviving charge becomes one `CanonicalTransaction` carrying a
//! deterministic natural key, so reprocessing an overlapping date range
//! produces byte-identical `transaction_id` values.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

use crate::error::SyncError;
use crate::types::{CanonicalTransaction, RawEvent};

/// Suffix that marks an envelope key as an event list.
const EVENT_LIST_SUFFIX: &str = "List";

/// Substring that marks a reversal/correction event kind.
const ADJUSTMENT_MARKER: &str = "Adjustment";

/// One recognized envelope kind.
struct EventVariant {
    list_key: &'static str,
    /// Shipped quantities are negated for adjustment kinds.
    adjustment: bool,
}

/// Known event-list keys of the reporting API's FinancialEvents payload.
/// Envelopes carrying none of these are skipped, not errors.
const EVENT_VARIANTS: &[EventVariant] = &[
    EventVariant { list_key: "ShipmentEventList", adjustment: false },
    EventVariant { list_key: "ShipmentSettleEventList", adjustment: false },
    EventVariant { list_key: "RefundEventList", adjustment: false },
    EventVariant { list_key: "GuaranteeClaimEventList", adjustment: false },
    EventVariant { list_key: "ChargebackEventList", adjustment: false },
    EventVariant { list_key: "RetrochargeEventList", adjustment: false },
    EventVariant { list_key: "RentalTransactionEventList", adjustment: false },
    EventVariant { list_key: "ServiceFeeEventList", adjustment: false },
    EventVariant { list_key: "AdjustmentEventList", adjustment: true },
    EventVariant { list_key: "TrialShipmentEventList", adjustment: false },
    EventVariant { list_key: "RemovalShipmentEventList", adjustment: false },
    EventVariant { list_key: "RemovalShipmentAdjustmentEventList", adjustment: true },
];

/// One posted financial occurrence inside an event list.
///
/// Line items live under one of two keys depending on whether the event is
/// the original or an adjustment to it; both are kept as `Option` so a
/// present-but-empty original list does not fall through to the variant key.
#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(rename = "AmazonOrderId")]
    amazon_order_id: Option<String>,
    #[serde(rename = "PostedDate")]
    posted_date: Option<String>,
    #[serde(rename = "ShipmentItemList")]
    items: Option<Vec<LineItem>>,
    #[serde(rename = "ShipmentItemAdjustmentList")]
    item_adjustments: Option<Vec<LineItem>>,
}

#[derive(Debug, Deserialize)]
struct LineItem {
    #[serde(rename = "SellerSKU")]
    seller_sku: Option<String>,
    #[serde(rename = "QuantityShipped", default)]
    quantity_shipped: i64,
    #[serde(rename = "ItemChargeList")]
    charges: Option<Vec<Charge>>,
    #[serde(rename = "ItemChargeAdjustmentList")]
    charge_adjustments: Option<Vec<Charge>>,
}

#[derive(Debug, Deserialize)]
struct Charge {
    #[serde(rename = "ChargeType")]
    charge_type: Option<String>,
    #[serde(rename = "ChargeAmount")]
    amount: Option<ChargeAmount>,
}

#[derive(Debug, Deserialize)]
struct ChargeAmount {
    #[serde(rename = "CurrencyCode")]
    currency_code: Option<String>,
    #[serde(rename = "CurrencyAmount")]
    currency_amount: Option<Value>,
}

impl ChargeAmount {
    /// Mirrors the "non-empty amount document" requirement: an amount object
    /// with neither field present counts as absent.
    fn is_empty(&self) -> bool {
        self.currency_code.is_none() && self.currency_amount.is_none()
    }
}

/// Classify an envelope against the known variant table.
fn classify(envelope: &RawEvent) -> Option<&'static EventVariant> {
    let map = envelope.as_object()?;
    EVENT_VARIANTS.iter().find(|v| map.contains_key(v.list_key))
}

/// Parse a posted-date string, accepting a literal `Z` UTC suffix.
fn parse_posted_date(raw: &str) -> Result<chrono::DateTime<chrono::FixedOffset>, SyncError> {
    chrono::DateTime::parse_from_rfc3339(raw).map_err(|_| SyncError::DateParse {
        raw: raw.to_string(),
    })
}

/// Parse a source amount value, which arrives as a JSON number or string.
/// A missing value defaults to zero; an unparseable one yields `None`.
fn parse_amount(value: Option<&Value>) -> Option<Decimal> {
    match value {
        None | Some(Value::Null) => Some(Decimal::ZERO),
        Some(Value::Number(n)) => {
            let repr = n.to_string();
            Decimal::from_str(&repr)
                .or_else(|_| Decimal::from_scientific(&repr))
                .ok()
        }
        Some(Value::String(s)) => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok(),
        Some(_) => None,
    }
}

/// Flatten raw event envelopes into canonical transactions.
///
/// Pure function, no I/O. Malformed envelopes, records, and charges are
/// skipped at the smallest granularity; a missing or unparseable
/// `PostedDate` is the one fatal condition and fails the whole batch.
pub fn normalize(raw_events: &[RawEvent]) -> Result<Vec<CanonicalTransaction>, SyncError> {
    let mut transactions = Vec::new();

    for envelope in raw_events {
        let variant = match classify(envelope) {
            Some(v) => v,
            None => {
                log::debug!("Skipping envelope without a recognized event list key");
                continue;
            }
        };

        let event_type = variant
            .list_key
            .strip_suffix(EVENT_LIST_SUFFIX)
            .unwrap_or(variant.list_key);

        let records = match envelope.get(variant.list_key).and_then(Value::as_array) {
            Some(records) => records,
            None => {
                log::debug!("Skipping {}: value is not an array", variant.list_key);
                continue;
            }
        };

        for record_value in records {
            let record: EventRecord = match serde_json::from_value(record_value.clone()) {
                Ok(record) => record,
                Err(e) => {
                    log::debug!("Skipping malformed {} record: {}", event_type, e);
                    continue;
                }
            };

            let raw_posted = record.posted_date.as_deref().ok_or(SyncError::MissingPostedDate)?;
            let posted_date = parse_posted_date(raw_posted)?;
            let order_id = record.amazon_order_id.as_deref();

            let line_items = record
                .items
                .as_deref()
                .or(record.item_adjustments.as_deref())
                .unwrap_or(&[]);

            for item in line_items {
                let quantity = if variant.adjustment {
                    -item.quantity_shipped.abs()
                } else {
                    item.quantity_shipped
                };

                let charges = item
                    .charges
                    .as_deref()
                    .or(item.charge_adjustments.as_deref())
                    .unwrap_or(&[]);

                for charge in charges {
                    let charge_type = match charge.charge_type.as_deref() {
                        Some(t) => t,
                        None => continue,
                    };
                    let amount = match charge.amount.as_ref().filter(|a| !a.is_empty()) {
                        Some(a) => a,
                        None => continue,
                    };

                    let currency_amount = match parse_amount(amount.currency_amount.as_ref()) {
                        Some(d) => d,
                        None => {
                            log::warn!(
                                "Skipping charge with unparseable amount: {:?}",
                                amount.currency_amount
                            );
                            continue;
                        }
                    };

                    // Natural key uses the raw posted-date string, not the
                    // parsed timestamp, to stay independent of offset
                    // normalization.
                    let transaction_id = format!(
                        "{}-{}-{}-{}",
                        order_id.unwrap_or(""),
                        item.seller_sku.as_deref().unwrap_or(""),
                        charge_type,
                        raw_posted
                    );

                    transactions.push(CanonicalTransaction {
                        transaction_id,
                        amazon_order_id: order_id.map(str::to_string),
                        event_type: event_type.to_string(),
                        posted_date,
                        seller_sku: item.seller_sku.clone(),
                        charge_type: charge_type.to_string(),
                        currency_code: amount.currency_code.clone().unwrap_or_default(),
                        currency_amount,
                        quantity,
                    });
                }
            }
        }
    }

    Ok(transactions)
}
