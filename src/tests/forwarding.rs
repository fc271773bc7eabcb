use crate::forwarding::forward_with_timeout;
use crate::tests::harness::{dead_upstream, fake_upstream_once};
use crate::message::build_query;
use crate::enums::RecordType;
use std::time::Duration;

const TEST_TIMEOUT: Duration = Duration::from_millis(200);

#[tokio::test]
async fn test_failover_to_second_upstream() {
    let (dead_host, dead_port, _guard) = dead_upstream().await;
    let (live_host, live_port) =
        fake_upstream_once(vec![("A", "93.184.216.34", 300, None)]).await;
    let upstreams = vec![(dead_host, dead_port), (live_host, live_port)];

    let query = build_query(42, "example.com.", RecordType::A).expect("failed to build query");
    let response = forward_with_timeout(&upstreams, &query, TEST_TIMEOUT)
        .await
        .expect("expected an answer from the second upstream");
    // the canned upstream echoes our transaction id
    assert_eq!(response[0..2], [0, 42]);
    assert_eq!(u16::from_be_bytes([response[6], response[7]]), 1);
}

#[tokio::test]
async fn test_exhaustion_is_an_error() {
    let (dead_host, dead_port, _guard) = dead_upstream().await;
    let upstreams = vec![(dead_host, dead_port)];
    let query = build_query(42, "example.com.", RecordType::A).expect("failed to build query");
    assert!(forward_with_timeout(&upstreams, &query, TEST_TIMEOUT)
        .await
        .is_err());
}

#[tokio::test]
async fn test_unreachable_host_is_skipped() {
    // nothing listens here, so the send either errors or times out
    let (live_host, live_port) = fake_upstream_once(vec![("A", "1.2.3.4", 60, None)]).await;
    let upstreams = vec![("192.0.2.1".to_string(), 53), (live_host, live_port)];
    let query = build_query(7, "example.com.", RecordType::A).expect("failed to build query");
    let response = forward_with_timeout(&upstreams, &query, TEST_TIMEOUT).await;
    assert!(response.is_ok());
}
