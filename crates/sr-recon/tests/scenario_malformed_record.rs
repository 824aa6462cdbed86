use serde_json::json;
use sr_recon::{process_batch, BusItem};
use sr_state::{BadRowReason, ReconciliationState};
use sr_testkit::FakeDatabaseReader;

/// A record missing its timestamp field can't be keyed at all; it is
/// recorded as a bad row and never enters the matching counts.
#[tokio::test]
async fn record_missing_timestamp_is_a_bad_row_not_a_mismatch() {
    let db = FakeDatabaseReader::new();

    let item = BusItem {
        topic: "trades".into(),
        partition: 0,
        offset: 0,
        payload: json!({
            "event_type": "trade",
            "ticker": "AAPL",
            "price": 100,
            "quantity": 1,
            "exchange": "XNAS",
            "conditions": ""
        }),
    };

    let mut state = ReconciliationState::new();
    process_batch(&db, "trades", &mut state, vec![item])
        .await
        .unwrap();

    assert_eq!(state.matched_direct, 0);
    assert_eq!(state.missing_total(), 0);
    assert_eq!(state.extra_total(), 0);
    assert_eq!(state.bad_rows.len(), 1);
    assert_eq!(state.bad_rows[0].reason, BadRowReason::MissingTimestamp);
    assert_eq!(state.bad_rows[0].topic, "trades");
    assert_eq!(state.bad_rows[0].offset, 0);
    assert!(state.check_mass_balance());
}
