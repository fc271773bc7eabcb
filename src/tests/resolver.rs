use crate::cache::CachedRecord;
use crate::enums::RecordType;
use crate::message::{build_query, parse_response};
use crate::querylog::Transport;
use crate::tests::harness::{fake_upstream_once, insert_manual, test_resolver};
use std::time::Duration;

#[tokio::test]
async fn test_manual_a_record_hit_over_the_wire() {
    let (resolver, store, _cache) = test_resolver(vec![]).await;
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");

    let query = build_query(0x1a2b, "example.test.", RecordType::A).expect("failed to build");
    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");

    assert_eq!(response[0..2], [0x1a, 0x2b]);
    assert_eq!(response[2..4], [0x81, 0x80]);
    assert_eq!(u16::from_be_bytes([response[6], response[7]]), 1);
    // RDATA is the last four octets of the single answer
    assert_eq!(response[response.len() - 4..], [10, 0, 0, 1]);
}

#[tokio::test]
async fn test_nxdomain_when_nothing_answers() {
    let (resolver, _store, _cache) = test_resolver(vec![]).await;
    let query = build_query(0xbeef, "nx.test.", RecordType::A).expect("failed to build");
    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");

    assert_eq!(response[0..2], [0xbe, 0xef]);
    assert_eq!(response[2..4], [0x81, 0x83]);
    assert_eq!(u16::from_be_bytes([response[6], response[7]]), 0);
    // the question section is echoed back untouched
    assert_eq!(response[12..], query[12..]);
}

#[tokio::test]
async fn test_upstream_miss_then_cache_hit() {
    let upstream = fake_upstream_once(vec![("A", "93.184.216.34", 300, None)]).await;
    let (resolver, _store, _cache) = test_resolver(vec![upstream]).await;

    let first_query = build_query(0x0101, "example.com.", RecordType::A).expect("failed to build");
    let first = resolver
        .resolve(&first_query, None, Transport::Udp)
        .await
        .expect("resolve failed");
    // upstream bytes pass through verbatim, id included
    assert_eq!(first[0..2], [0x01, 0x01]);
    let parsed = parse_response(&first).expect("failed to parse upstream reply");
    assert_eq!(parsed.answers.len(), 1);

    // the cache write-through runs on its own task
    tokio::time::sleep(Duration::from_millis(100)).await;

    // the fake upstream is gone now, so this answer can only be cached
    let second_query = build_query(0x0202, "example.com.", RecordType::A).expect("failed to build");
    let second = resolver
        .resolve(&second_query, None, Transport::Udp)
        .await
        .expect("resolve failed");
    assert_eq!(second[0..2], [0x02, 0x02]);
    assert_eq!(second[2..4], [0x81, 0x80]);
    assert_eq!(second[second.len() - 4..], [0x5D, 0xB8, 0xD8, 0x22]);
}

#[tokio::test]
async fn test_any_unions_cached_types_in_cache_order() {
    let (resolver, _store, cache) = test_resolver(vec![]).await;
    cache.insert(CachedRecord {
        name: "a.example.".to_string(),
        record_type: "A".to_string(),
        value: "1.2.3.4".to_string(),
        ttl: 300,
        preference: None,
    });
    cache.insert(CachedRecord {
        name: "a.example.".to_string(),
        record_type: "AAAA".to_string(),
        value: "::1".to_string(),
        ttl: 300,
        preference: None,
    });

    let query = build_query(7, "a.example.", RecordType::ANY).expect("failed to build");
    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");

    let parsed = parse_response(&response).expect("failed to parse");
    assert_eq!(parsed.rcode, 0);
    let types: Vec<RecordType> = parsed.answers.iter().map(|a| a.rrtype).collect();
    assert_eq!(types, vec![RecordType::A, RecordType::AAAA]);
    // the question still says ANY
    assert_eq!(parsed.questions[0].qtype, RecordType::ANY);
}

#[tokio::test]
async fn test_manual_record_wins_identity_collisions() {
    let (resolver, store, cache) = test_resolver(vec![]).await;
    cache.insert(CachedRecord {
        name: "example.test.".to_string(),
        record_type: "A".to_string(),
        value: "10.0.0.1".to_string(),
        ttl: 300,
        preference: None,
    });
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");

    let query = build_query(7, "example.test.", RecordType::A).expect("failed to build");
    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");

    let parsed = parse_response(&response).expect("failed to parse");
    assert_eq!(parsed.answers.len(), 1);
    // the manual record's TTL, not the cached one's
    assert_eq!(parsed.answers[0].ttl, 60);
}

#[tokio::test]
async fn test_non_internet_class_is_refused() {
    let (resolver, _store, _cache) = test_resolver(vec![]).await;
    let mut query = build_query(7, "shutdown.", RecordType::TXT).expect("failed to build");
    let qclass_at = query.len() - 2;
    query[qclass_at..].copy_from_slice(&3u16.to_be_bytes());

    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");
    assert_eq!(response[3] & 0x0F, 5);
}

#[tokio::test]
async fn test_unknown_qtype_skips_local_data() {
    let (resolver, store, _cache) = test_resolver(vec![]).await;
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");

    let query = build_query(7, "example.test.", RecordType::Other(999)).expect("failed to build");
    let response = resolver
        .resolve(&query, None, Transport::Udp)
        .await
        .expect("resolve failed");
    // no upstreams configured, so an unknown type is NXDOMAIN even with
    // local records for the name
    assert_eq!(response[3] & 0x0F, 3);
    assert_eq!(u16::from_be_bytes([response[6], response[7]]), 0);
}

#[tokio::test]
async fn test_malformed_query_is_an_error() {
    let (resolver, _store, _cache) = test_resolver(vec![]).await;
    assert!(resolver
        .resolve(&[0u8; 5], None, Transport::Udp)
        .await
        .is_err());
}

#[tokio::test]
async fn test_json_resolution_from_manual_records() {
    let (resolver, store, _cache) = test_resolver(vec![]).await;
    insert_manual(&store, "example.test.", "A", "10.0.0.1", 60, None)
        .await
        .expect("insert failed");

    let body = resolver
        .resolve_json("example.test.", RecordType::A, None)
        .await;
    assert_eq!(body.status, 0);
    assert_eq!(body.question[0].name, "example.test.");
    assert_eq!(body.answer.len(), 1);
    assert_eq!(body.answer[0].data, Some("10.0.0.1".to_string()));
    assert_eq!(body.answer[0].ttl, 60);
}

#[tokio::test]
async fn test_json_resolution_nxdomain() {
    let (resolver, _store, _cache) = test_resolver(vec![]).await;
    let body = resolver.resolve_json("nx.test.", RecordType::A, None).await;
    assert_eq!(body.status, 3);
    assert!(body.answer.is_empty());
}
