mod datastore;
mod forwarding;
mod resolver;

use crate::enums::{Rcode, RecordClass, RecordType};
use crate::message::{build_query, decode_name, encode_name, parse_response};
use crate::reply::{reply_nxdomain, reply_refused, Reply};
use crate::resourcerecord::AnswerRecord;
use crate::{Header, Question, HEADER_BYTES};

#[test]
fn test_encode_name() {
    assert_eq!(
        encode_name("cheese.world.").expect("failed to encode"),
        [6, 99, 104, 101, 101, 115, 101, 5, 119, 111, 114, 108, 100, 0]
    );
}

#[test]
fn test_encode_name_without_trailing_dot() {
    assert_eq!(
        encode_name("cheese").expect("failed to encode"),
        [6, 99, 104, 101, 101, 115, 101, 0]
    );
}

#[test]
fn test_encode_name_rejects_long_labels() {
    let label = "x".repeat(64);
    assert!(encode_name(&label).is_err());
}

#[test]
fn test_decode_name_plain() {
    let mut data = vec![0u8; HEADER_BYTES];
    data.extend(encode_name("foo.bar.").expect("failed to encode"));
    let (name, offset) = decode_name(&data, HEADER_BYTES).expect("failed to decode");
    assert_eq!(name, "foo.bar.");
    assert_eq!(offset, HEADER_BYTES + 9);
}

#[test]
fn test_decode_name_follows_pointer() {
    // name at 12, then a pointer back to it
    let mut data = vec![0u8; HEADER_BYTES];
    data.extend(encode_name("foo.").expect("failed to encode"));
    let pointer_at = data.len();
    data.extend([0xC0, HEADER_BYTES as u8]);
    let (name, offset) = decode_name(&data, pointer_at).expect("failed to decode");
    assert_eq!(name, "foo.");
    // the cursor lands just past the two pointer octets
    assert_eq!(offset, pointer_at + 2);
}

#[test]
fn test_decode_name_rejects_pointer_loop() {
    let mut data = vec![0u8; HEADER_BYTES];
    data.extend([0xC0, HEADER_BYTES as u8]);
    assert!(decode_name(&data, HEADER_BYTES).is_err());
}

#[test]
fn test_decode_name_rejects_oversized_names() {
    // four 63-octet labels add up past the 255 octet cap
    let mut data = vec![0u8; HEADER_BYTES];
    for _ in 0..4 {
        data.push(63);
        data.extend([b'a'; 63]);
    }
    data.push(0);
    assert!(decode_name(&data, HEADER_BYTES).is_err());
}

#[test]
fn test_decode_name_rejects_truncated_label() {
    let mut data = vec![0u8; HEADER_BYTES];
    data.extend([5, b'a', b'b']);
    assert!(decode_name(&data, HEADER_BYTES).is_err());
}

#[test]
fn test_question_round_trip() {
    let query = build_query(0x1234, "example.com.", RecordType::A).expect("failed to build");
    let header = Header::from_wire(&query).expect("failed to unpack header");
    assert_eq!(header.id, 0x1234);
    assert!(header.recursion_desired);
    assert_eq!(header.qdcount, 1);

    let question = Question::from_wire(&query).expect("failed to parse question");
    assert_eq!(question.qname, "example.com.");
    assert_eq!(question.qtype, RecordType::A);
    assert_eq!(question.qclass, RecordClass::Internet);
    assert_eq!(
        question.to_bytes().expect("failed to serialize"),
        query[HEADER_BYTES..].to_vec()
    );
}

#[test]
fn test_build_iana_org_a_reply() {
    let mut question = encode_name("iana.org.").expect("failed to encode");
    question.extend(1u16.to_be_bytes());
    question.extend(1u16.to_be_bytes());

    let answer = AnswerRecord::from_strings("A", "192.0.43.8", 350, None)
        .expect("failed to build answer");
    let reply = Reply::new(41840, &question, vec![answer], Rcode::NoError);
    let reply_bytes = reply.as_bytes().expect("failed to serialize reply");

    let expected_bytes = [
        /* header - 12 bytes */
        0xa3, 0x70, 0x81, 0x80, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00,
        /* question - 14 bytes */
        0x04, 0x69, 0x61, 0x6e, 0x61, 0x03, 0x6f, 0x72, 0x67, 0x00, 0x00, 0x01, 0x00, 0x01,
        /* answer - 16 bytes */
        0xc0, 0x0c, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x01, 0x5e, 0x00, 0x04, 0xc0, 0x00, 0x2b,
        0x08,
    ];
    assert_eq!(reply_bytes, expected_bytes);
}

#[test]
fn test_reply_nxdomain_flags() {
    let mut question = encode_name("nx.test.").expect("failed to encode");
    question.extend(1u16.to_be_bytes());
    question.extend(1u16.to_be_bytes());
    let bytes = reply_nxdomain(7, &question)
        .as_bytes()
        .expect("failed to serialize");
    assert_eq!(bytes[0..2], [0, 7]);
    assert_eq!(bytes[2..4], [0x81, 0x83]);
    // ANCOUNT is zero and the question is echoed
    assert_eq!(bytes[6..8], [0, 0]);
    assert_eq!(bytes[HEADER_BYTES..].to_vec(), question);
}

#[test]
fn test_reply_refused_flags() {
    let question = encode_name("chaos.test.").expect("failed to encode");
    let bytes = reply_refused(7, &question)
        .as_bytes()
        .expect("failed to serialize");
    assert_eq!(bytes[2..4], [0x81, 0x85]);
}

#[test]
fn test_mx_answer_wire_format() {
    let answer = AnswerRecord::from_strings("MX", "mail.example.com.", 300, Some(10))
        .expect("failed to build answer");
    let bytes = answer.wire_bytes().expect("failed to serialize");
    // pointer owner, type 15, class 1, ttl, then rdlength and pref
    assert_eq!(bytes[0..2], [0xC0, 0x0C]);
    assert_eq!(bytes[2..4], [0, 15]);
    assert_eq!(bytes[12..14], [0, 10]);
}

#[test]
fn test_txt_answer_wire_format() {
    let answer =
        AnswerRecord::from_strings("TXT", "hello", 60, None).expect("failed to build answer");
    let bytes = answer.wire_bytes().expect("failed to serialize");
    let rdlength = u16::from_be_bytes([bytes[10], bytes[11]]) as usize;
    assert_eq!(rdlength, 6);
    assert_eq!(bytes[12], 5);
    assert_eq!(&bytes[13..], b"hello");
}

#[test]
fn test_parse_response_round_trip() {
    let mut question = encode_name("iana.org.").expect("failed to encode");
    question.extend(1u16.to_be_bytes());
    question.extend(1u16.to_be_bytes());
    let answer = AnswerRecord::from_strings("A", "192.0.43.8", 350, None)
        .expect("failed to build answer");
    let bytes = Reply::new(41840, &question, vec![answer], Rcode::NoError)
        .as_bytes()
        .expect("failed to serialize");

    let parsed = parse_response(&bytes).expect("failed to parse");
    assert_eq!(parsed.id, 41840);
    assert_eq!(parsed.rcode, 0);
    assert_eq!(parsed.questions.len(), 1);
    assert_eq!(parsed.questions[0].name, "iana.org.");
    assert_eq!(parsed.answers.len(), 1);
    assert_eq!(parsed.answers[0].name, "iana.org.");
    assert_eq!(parsed.answers[0].rrtype, RecordType::A);
    assert_eq!(parsed.answers[0].ttl, 350);
    assert_eq!(parsed.answers[0].data, Some("192.0.43.8".to_string()));
}

#[test]
fn test_parse_response_mx_presentation_form() {
    let mut question = encode_name("example.com.").expect("failed to encode");
    question.extend(15u16.to_be_bytes());
    question.extend(1u16.to_be_bytes());
    let answer = AnswerRecord::from_strings("MX", "mail.example.com.", 300, Some(10))
        .expect("failed to build answer");
    let bytes = Reply::new(7, &question, vec![answer], Rcode::NoError)
        .as_bytes()
        .expect("failed to serialize");

    let parsed = parse_response(&bytes).expect("failed to parse");
    assert_eq!(
        parsed.answers[0].data,
        Some("10 mail.example.com.".to_string())
    );
}

#[test]
fn test_parse_response_rejects_truncated_messages() {
    let query = build_query(1, "example.com.", RecordType::A).expect("failed to build");
    assert!(parse_response(&query[..HEADER_BYTES + 3]).is_err());
}
