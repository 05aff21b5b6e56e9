//! Sale postbacks from affiliate networks.
//!
//! Networks name their fields differently and send JSON or form bodies. The
//! payload is normalized into a [`SaleRecord`], stored, and attributed back to
//! the originating click when its id resolves.
//!
//! There is no idempotency key: a network that retries a postback produces a
//! second record and the aggregates are counted twice.

use crate::classify::{detect_network, is_truthy};
use crate::click::ClickAttributor;
use crate::outcome::{Bookkeeping, Step};
use affiliate_core::types::{ClickRecord, SaleRecord};
use affiliate_core::{keys, AffiliateError, AffiliateResult};
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info};

const CLICK_ID_FIELDS: [&str; 4] = ["click_id", "clickId", "subid", "sub_id"];
const ORDER_ID_FIELDS: [&str; 3] = ["order_id", "orderId", "transaction_id"];
const AMOUNT_FIELDS: [&str; 3] = ["amount", "order_amount", "sale_amount"];
const COMMISSION_FIELDS: [&str; 3] = ["commission", "commission_amount", "payout"];

/// Raw callback as received over HTTP.
#[derive(Debug, Clone, Default)]
pub struct SaleCallback {
    pub content_type: Option<String>,
    pub user_agent: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub sale_id: String,
    pub record: SaleRecord,
    /// Whether the click id resolved to a stored click.
    pub attributed: bool,
    pub bookkeeping: Bookkeeping,
}

/// Decode a callback body into a field map.
///
/// JSON and form bodies are honoured by content type; anything else is tried
/// as JSON. Bodies that do not yield an object are kept under `rawData`.
pub fn parse_payload(content_type: &str, body: &str) -> Map<String, Value> {
    if content_type.contains("application/x-www-form-urlencoded") {
        return url::form_urlencoded::parse(body.as_bytes())
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect();
    }

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => raw_payload(other),
        Err(_) => raw_payload(Value::String(body.to_string())),
    }
}

fn raw_payload(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("rawData".to_string(), value);
    map
}

/// First alias holding a truthy string or number. Other JSON shapes are
/// passed over so a later alias can still supply the field.
fn first_field<'a>(payload: &'a Map<String, Value>, fields: &[&str]) -> Option<&'a Value> {
    fields
        .iter()
        .filter_map(|f| payload.get(*f))
        .filter(|v| matches!(v, Value::String(_) | Value::Number(_)))
        .find(|v| is_truthy(v))
}

fn text_field(payload: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    match first_field(payload, fields)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn amount_field(payload: &Map<String, Value>, fields: &[&str]) -> f64 {
    let value = match first_field(payload, fields) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => parse_leading_float(s),
        _ => 0.0,
    };
    // Money fields are never negative; reversals are not modeled.
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Parse the numeric prefix of a string, e.g. `"49.90 INR"` -> 49.9 and
/// `"1e3"` -> 1000. Returns 0 when no number leads the string.
fn parse_leading_float(raw: &str) -> f64 {
    let bytes = raw.trim_start().as_bytes();
    let digits_from = |mut i: usize| {
        while bytes.get(i).is_some_and(u8::is_ascii_digit) {
            i += 1;
        }
        i
    };

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;
    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - end - 1;
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return 0.0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    std::str::from_utf8(&bytes[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

impl ClickAttributor {
    /// Normalize and store a sale postback, then attribute it.
    ///
    /// Requires a click id or an order id; without either nothing is written.
    /// Attribution and the daily rollup are best-effort and never fail the call.
    pub async fn process_sale_callback(&self, callback: SaleCallback) -> AffiliateResult<SaleOutcome> {
        let payload = parse_payload(
            callback.content_type.as_deref().unwrap_or_default(),
            &callback.body,
        );
        debug!(fields = payload.len(), "Received sale callback");

        let click_id = text_field(&payload, &CLICK_ID_FIELDS);
        let order_id = text_field(&payload, &ORDER_ID_FIELDS);
        let reference = click_id
            .clone()
            .or_else(|| order_id.clone())
            .ok_or_else(|| AffiliateError::validation("Missing click_id or order_id"))?;

        let now = Utc::now();
        let record = SaleRecord {
            amount: amount_field(&payload, &AMOUNT_FIELDS),
            commission: amount_field(&payload, &COMMISSION_FIELDS),
            currency: text_field(&payload, &["currency"])
                .unwrap_or_else(|| self.config.default_currency.clone()),
            network: detect_network(callback.user_agent.as_deref().unwrap_or_default(), &payload),
            status: text_field(&payload, &["status"]).unwrap_or_else(|| "pending".to_string()),
            timestamp: now,
            click_id,
            order_id,
            raw_data: Value::Object(payload),
        };

        let sale_id = keys::sale(&reference, now.timestamp_millis());
        self.records.put(&sale_id, &record).await?;
        metrics::counter!("sales.recorded", "network" => record.network.as_str()).increment(1);

        let mut bookkeeping = Bookkeeping::default();
        let attributed = self.attribute(&record, &mut bookkeeping).await;

        bookkeeping.record(
            Step::DailyMetrics,
            self.daily
                .record_sale(now.date_naive(), record.network, record.commission)
                .await,
        );

        info!(
            sale_id = %sale_id,
            network = %record.network,
            commission = record.commission,
            attributed = attributed,
            "Sale callback processed"
        );

        Ok(SaleOutcome {
            sale_id,
            record,
            attributed,
            bookkeeping,
        })
    }

    /// Credit the sale to the click's offer and user. Returns whether the click
    /// was found.
    async fn attribute(&self, sale: &SaleRecord, bookkeeping: &mut Bookkeeping) -> bool {
        let Some(click_id) = sale.click_id.as_deref() else {
            bookkeeping.skip(Step::ClickLookup, "no click id");
            return false;
        };
        let click = match self.records.get::<ClickRecord>(&keys::click(click_id)).await {
            Ok(Some(click)) => click,
            Ok(None) => {
                debug!(click_id = click_id, "Sale references unknown click");
                bookkeeping.skip(Step::ClickLookup, "click not found");
                return false;
            }
            // The id addressed some other kind of record.
            Err(AffiliateError::Serialization(e)) => {
                debug!(click_id = click_id, error = %e, "Sale id is not a click record");
                bookkeeping.skip(Step::ClickLookup, "not a click record");
                return false;
            }
            Err(e) => {
                bookkeeping.record::<()>(Step::ClickLookup, Err(e));
                return false;
            }
        };
        bookkeeping.record(Step::ClickLookup, Ok(()));

        match click.offer_id.as_deref() {
            Some(offer_id) => bookkeeping.record(
                Step::OfferSaleStats,
                self.stats.record_sale(offer_id, sale.commission).await,
            ),
            None => bookkeeping.skip(Step::OfferSaleStats, "click has no offer id"),
        }
        bookkeeping.record(
            Step::ProfileConversion,
            self.profiles
                .record_conversion(&click.user_id, sale.commission)
                .await,
        );
        true
    }
}
