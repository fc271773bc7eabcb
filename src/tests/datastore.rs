use crate::datastore::{Command, RecordPayload};
use crate::error::IbexError;
use crate::tests::harness::{insert_manual, list_all, lookup_manual, test_store};
use tokio::sync::oneshot;

#[tokio::test]
async fn test_insert_normalizes_name_and_type() {
    let store = test_store().await;
    let id = insert_manual(&store, "ExAmple.TEST", "a", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");
    assert!(id > 0);

    let records = lookup_manual(&store, "example.test.", "A").await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "example.test.");
    assert_eq!(records[0].record_type, "A");
    assert!(records[0].is_manual);
}

#[tokio::test]
async fn test_mx_requires_preference() {
    let store = test_store().await;
    let result = insert_manual(&store, "example.test.", "MX", "mail.example.test.", 60, None).await;
    match result {
        Err(IbexError::InvalidRecord { field, .. }) => assert_eq!(field, "preference"),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[tokio::test]
async fn test_a_record_requires_parseable_ipv4() {
    let store = test_store().await;
    let result = insert_manual(&store, "example.test.", "A", "not-an-address", 60, None).await;
    match result {
        Err(IbexError::InvalidRecord { field, .. }) => assert_eq!(field, "value"),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unsupported_type_is_rejected() {
    let store = test_store().await;
    let result = insert_manual(&store, "example.test.", "SOA", "whatever", 60, None).await;
    match result {
        Err(IbexError::InvalidRecord { field, .. }) => assert_eq!(field, "record_type"),
        other => panic!("expected InvalidRecord, got {other:?}"),
    }
}

#[tokio::test]
async fn test_delete_by_name_removes_all_records_for_the_name() {
    let store = test_store().await;
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");
    insert_manual(&store, "example.test.", "TXT", "hello", 60, None)
        .await
        .expect("insert failed");
    insert_manual(&store, "other.test.", "A", "10.0.0.2", 60, None)
        .await
        .expect("insert failed");

    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    store
        .send(Command::DeleteByName {
            name: "example.test.".to_string(),
            resp: tx_oneshot,
        })
        .await
        .expect("failed to send delete");
    assert_eq!(rx_oneshot.await.expect("no delete response"), 2);

    let remaining = list_all(&store).await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "other.test.");
}

#[tokio::test]
async fn test_update_rewrites_a_record() {
    let store = test_store().await;
    let id = insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");

    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    store
        .send(Command::Update {
            id,
            payload: RecordPayload {
                name: "example.test.".to_string(),
                record_type: "A".to_string(),
                value: "10.0.0.9".to_string(),
                ttl: 120,
                preference: None,
            },
            resp: tx_oneshot,
        })
        .await
        .expect("failed to send update");
    assert!(rx_oneshot
        .await
        .expect("no update response")
        .expect("update failed"));

    let records = lookup_manual(&store, "example.test.", "A").await;
    assert_eq!(records[0].value, "10.0.0.9");
    assert_eq!(records[0].ttl, 120);
}

#[tokio::test]
async fn test_update_missing_record_reports_not_found() {
    let store = test_store().await;
    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    store
        .send(Command::Update {
            id: 999,
            payload: RecordPayload {
                name: "example.test.".to_string(),
                record_type: "A".to_string(),
                value: "10.0.0.9".to_string(),
                ttl: 120,
                preference: None,
            },
            resp: tx_oneshot,
        })
        .await
        .expect("failed to send update");
    assert!(!rx_oneshot
        .await
        .expect("no update response")
        .expect("update errored"));
}

#[tokio::test]
async fn test_lookup_any_returns_every_type_for_the_name() {
    let store = test_store().await;
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");
    insert_manual(&store, "example.test.", "MX", "mail.example.test.", 60, Some(10))
        .await
        .expect("insert failed");

    let (tx_oneshot, rx_oneshot) = oneshot::channel();
    store
        .send(Command::LookupAny {
            name: "example.test.".to_string(),
            resp: tx_oneshot,
        })
        .await
        .expect("failed to send lookup");
    let records = rx_oneshot.await.expect("no lookup response");
    assert_eq!(records.len(), 2);
}
