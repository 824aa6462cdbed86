use serde_json::json;
use sr_recon::{process_batch, BusItem};
use sr_state::ReconciliationState;
use sr_testkit::FakeDatabaseReader;
use sr_types::Key;

fn key(ts: i64) -> Key {
    Key {
        timestamp_ns: ts,
        event_type: "trade".into(),
        ticker: "AAPL".into(),
        price: 100,
        quantity: 1,
        exchange: "XNAS".into(),
        conditions: "".into(),
    }
}

fn item(ts: i64, offset: i64) -> BusItem {
    BusItem {
        topic: "trades".into(),
        partition: 0,
        offset,
        payload: json!({
            "datetime": ts,
            "event_type": "trade",
            "ticker": "AAPL",
            "price": 100,
            "quantity": 1,
            "exchange": "XNAS",
            "conditions": ""
        }),
    }
}

/// The bus carries the same record twice but the database only persisted it
/// once; one copy is a genuine duplicate with no counterpart, so it is
/// reported missing, not silently folded into the matched count.
#[tokio::test]
async fn duplicate_bus_record_without_a_second_db_row_is_missing() {
    let db = FakeDatabaseReader::new();
    db.insert(1000, key(1000));

    let mut state = ReconciliationState::new();
    process_batch(
        &db,
        "trades",
        &mut state,
        vec![item(1000, 0), item(1000, 1)],
    )
    .await
    .unwrap();

    assert_eq!(state.matched_direct, 1);
    assert_eq!(state.missing_total(), 1);
    assert_eq!(state.missing_from_db.get(&key(1000)), 1);
    assert!(state.check_mass_balance());
}
