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

/// Batch 1's forward query for `[1000, 1000]` returns both the `1000` row
/// and a `2000` row the database already holds — the database got ahead of
/// the bus within the query's own window. The `1000` row matches directly;
/// the `2000` row has no bus counterpart yet and waits in
/// `pending_from_db` until batch 2's bus record clears it via overflow.
#[tokio::test]
async fn row_returned_ahead_of_its_own_timestamp_clears_via_overflow_next_batch() {
    let db = FakeDatabaseReader::new();
    db.insert(1000, key(1000));
    db.insert(1000, key(2000));

    let mut state = ReconciliationState::new();
    process_batch(&db, "trades", &mut state, vec![item(1000, 0)])
        .await
        .unwrap();
    assert_eq!(state.matched_direct, 1);
    assert_eq!(state.extra_total(), 1);

    process_batch(&db, "trades", &mut state, vec![item(2000, 1)])
        .await
        .unwrap();

    assert_eq!(state.matched_direct, 1);
    assert_eq!(state.matched_via_overflow, 1);
    assert_eq!(state.extra_total(), 0);
    assert!(state.check_mass_balance());
}
