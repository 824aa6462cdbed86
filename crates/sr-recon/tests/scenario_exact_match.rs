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

#[tokio::test]
async fn three_records_present_on_both_sides_are_all_matched_direct() {
    let db = FakeDatabaseReader::new();
    db.insert(1000, key(1000));
    db.insert(2000, key(2000));
    db.insert(3000, key(3000));

    let mut state = ReconciliationState::new();
    process_batch(
        &db,
        "trades",
        &mut state,
        vec![item(1000, 0), item(2000, 1), item(3000, 2)],
    )
    .await
    .unwrap();

    assert_eq!(state.matched_direct, 3);
    assert_eq!(state.matched_via_overflow, 0);
    assert_eq!(state.missing_total(), 0);
    assert_eq!(state.extra_total(), 0);
    assert!(state.check_mass_balance());
}
