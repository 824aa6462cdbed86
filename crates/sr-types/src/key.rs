use serde_json::Value;

/// The seven-scalar tuple that defines record identity. Ordering matches the
/// wire schema: `(datetime, event_type, ticker, price, quantity, exchange,
/// conditions)`. String fields are opaque byte sequences — no normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    pub timestamp_ns: i64,
    pub event_type: String,
    pub ticker: String,
    pub price: i64,
    pub quantity: i64,
    pub exchange: String,
    pub conditions: String,
}

impl Key {
    /// The key as a seven-element JSON array, matching the `details`
    /// output schema's `record` field.
    pub fn to_json_array(&self) -> Vec<Value> {
        vec![
            Value::from(self.timestamp_ns),
            Value::from(self.event_type.clone()),
            Value::from(self.ticker.clone()),
            Value::from(self.price),
            Value::from(self.quantity),
            Value::from(self.exchange.clone()),
            Value::from(self.conditions.clone()),
        ]
    }
}

/// Why `key_from_bus` failed on a given payload. Never fatal to the run —
/// callers record these in `bad_rows` and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusDecodeError {
    /// Payload is not a keyed object, or a non-timestamp field is absent or
    /// not coercible to its expected type.
    MalformedPayload { reason: String },
    /// The timestamp field itself is absent.
    MissingTimestamp,
    /// The timestamp field is present but cannot be interpreted as a 64-bit
    /// integer.
    InvalidTimestamp { raw: String },
}

impl std::fmt::Display for BusDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusDecodeError::MalformedPayload { reason } => {
                write!(f, "malformed payload: {reason}")
            }
            BusDecodeError::MissingTimestamp => write!(f, "missing timestamp field"),
            BusDecodeError::InvalidTimestamp { raw } => {
                write!(f, "timestamp field is not a 64-bit integer: {raw}")
            }
        }
    }
}

impl std::error::Error for BusDecodeError {}

const FIELD_TIMESTAMP: &str = "datetime";
const FIELD_EVENT_TYPE: &str = "event_type";
const FIELD_TICKER: &str = "ticker";
const FIELD_PRICE: &str = "price";
const FIELD_QUANTITY: &str = "quantity";
const FIELD_EXCHANGE: &str = "exchange";
const FIELD_CONDITIONS: &str = "conditions";

/// Decode a bus payload into a [`Key`].
///
/// The timestamp is singled out (`MissingTimestamp`/`InvalidTimestamp`)
/// because windowing depends on it; every other field error collapses to
/// `MalformedPayload`. Integer fields accept either a JSON number or a
/// decimal string (a numeric `price` stored as a string on the bus must
/// still match the database's integer column); string fields must be JSON
/// strings, taken verbatim.
pub fn key_from_bus(payload: &Value) -> Result<Key, BusDecodeError> {
    let obj = payload.as_object().ok_or_else(|| BusDecodeError::MalformedPayload {
        reason: "payload is not a JSON object".to_string(),
    })?;

    let timestamp_ns = match obj.get(FIELD_TIMESTAMP) {
        None => return Err(BusDecodeError::MissingTimestamp),
        Some(v) => coerce_int(v).ok_or_else(|| BusDecodeError::InvalidTimestamp {
            raw: v.to_string(),
        })?,
    };

    let event_type = require_string(obj, FIELD_EVENT_TYPE)?;
    let ticker = require_string(obj, FIELD_TICKER)?;
    let price = require_int(obj, FIELD_PRICE)?;
    let quantity = require_int(obj, FIELD_QUANTITY)?;
    let exchange = require_string(obj, FIELD_EXCHANGE)?;
    let conditions = require_string(obj, FIELD_CONDITIONS)?;

    Ok(Key {
        timestamp_ns,
        event_type,
        ticker,
        price,
        quantity,
        exchange,
        conditions,
    })
}

/// Decode a database row into a [`Key`]. Total: the database guarantees the
/// schema, so there is nothing to fail on here.
pub fn key_from_db(
    timestamp_ns: i64,
    event_type: String,
    ticker: String,
    price: i64,
    quantity: i64,
    exchange: String,
    conditions: String,
) -> Key {
    Key {
        timestamp_ns,
        event_type,
        ticker,
        price,
        quantity,
        exchange,
        conditions,
    }
}

fn require_string(
    obj: &serde_json::Map<String, Value>,
    field: &str,
) -> Result<String, BusDecodeError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(BusDecodeError::MalformedPayload {
            reason: format!("field '{field}' is not a string"),
        }),
        None => Err(BusDecodeError::MalformedPayload {
            reason: format!("missing field '{field}'"),
        }),
    }
}

fn require_int(obj: &serde_json::Map<String, Value>, field: &str) -> Result<i64, BusDecodeError> {
    match obj.get(field) {
        Some(v) => coerce_int(v).ok_or_else(|| BusDecodeError::MalformedPayload {
            reason: format!("field '{field}' is not an integer: {v}"),
        }),
        None => Err(BusDecodeError::MalformedPayload {
            reason: format!("missing field '{field}'"),
        }),
    }
}

/// Coerce a JSON number or a decimal string into an `i64`.
fn coerce_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn good_payload() -> Value {
        json!({
            "datetime": 1_000_000_000i64,
            "event_type": "trade",
            "ticker": "AAPL",
            "price": "19550",
            "quantity": 100,
            "exchange": "XNAS",
            "conditions": "@"
        })
    }

    #[test]
    fn decodes_well_formed_payload() {
        let key = key_from_bus(&good_payload()).unwrap();
        assert_eq!(key.timestamp_ns, 1_000_000_000);
        assert_eq!(key.price, 19550);
        assert_eq!(key.ticker, "AAPL");
    }

    #[test]
    fn coerces_numeric_string_price_to_match_db_integer() {
        let a = key_from_bus(&good_payload()).unwrap();
        let mut numeric = good_payload();
        numeric["price"] = json!(19550);
        let b = key_from_bus(&numeric).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_timestamp_is_distinguished() {
        let mut p = good_payload();
        p.as_object_mut().unwrap().remove("datetime");
        assert_eq!(key_from_bus(&p).unwrap_err(), BusDecodeError::MissingTimestamp);
    }

    #[test]
    fn invalid_timestamp_is_distinguished() {
        let mut p = good_payload();
        p["datetime"] = json!("not-a-number");
        assert!(matches!(
            key_from_bus(&p).unwrap_err(),
            BusDecodeError::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn missing_other_field_is_malformed() {
        let mut p = good_payload();
        p.as_object_mut().unwrap().remove("ticker");
        assert!(matches!(
            key_from_bus(&p).unwrap_err(),
            BusDecodeError::MalformedPayload { .. }
        ));
    }

    #[test]
    fn non_object_payload_is_malformed() {
        assert!(matches!(
            key_from_bus(&json!([1, 2, 3])).unwrap_err(),
            BusDecodeError::MalformedPayload { .. }
        ));
    }

    #[test]
    fn db_row_decode_is_total() {
        let k = key_from_db(1, "t".into(), "TICK".into(), 1, 1, "X".into(), "".into());
        assert_eq!(k.timestamp_ns, 1);
    }
}
