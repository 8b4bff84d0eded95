use std::collections::HashMap;

use assert_matches::assert_matches;
use serde::Serialize;

use super::*;
use crate::codec::{
    CodecError, Decode, DecodeOptions, Decoder, Encode, Encoder, Writer, decode_from_slice,
    decode_from_slice_with, encode_to_bytes,
};

fn round_trip<T>(value: &T) -> T
where
    T: Encode + Decode,
{
    let bytes = encode_to_bytes(value).expect("failed to encode");
    decode_from_slice(&bytes).expect("failed to decode")
}

#[test]
fn test_round_trip_all_records() {
    let publish = PubMessage::new("orders.new", vec![1u8, 2, 3]).with_reply_to("orders.ack");
    assert_eq!(round_trip(&publish), publish);

    let reply = ReplyMessage {
        subject: "orders.ack".into(),
        reply_to: String::new(),
        body: Bytes::from_static(b"ok"),
    };
    assert_eq!(round_trip(&reply), reply);

    let request = RequestMessage::new("inventory.lookup", "sku-123", 1_500);
    assert_eq!(round_trip(&request), request);

    let sub = SubMessage {
        subject: "éèê.unicode".into(),
        reply_to: "_INBOX.42".into(),
        body: Bytes::from(vec![0u8; 70_000]),
    };
    assert_eq!(round_trip(&sub), sub);

    assert_eq!(round_trip(&PubMessage::default()), PubMessage::default());
    let max_timeout = RequestMessage::new("", Bytes::new(), u32::MAX);
    assert_eq!(round_trip(&max_timeout), max_timeout);
}

#[test]
fn test_publish_wire_layout() {
    let msg = PubMessage::new("orders.new", vec![0x01u8, 0x02]);
    let bytes = encode_to_bytes(&msg).unwrap();

    let mut expected = vec![0x83u8];
    expected.push(0xa7);
    expected.extend_from_slice(b"subject");
    expected.push(0xaa);
    expected.extend_from_slice(b"orders.new");
    expected.push(0xa7);
    expected.extend_from_slice(b"replyTo");
    expected.push(0xa0);
    expected.push(0xa4);
    expected.extend_from_slice(b"body");
    expected.extend_from_slice(&[0xc4, 0x02, 0x01, 0x02]);

    assert_eq!(&bytes[..], &expected[..]);
    assert_eq!(decode_from_slice::<PubMessage>(&bytes).unwrap(), msg);
}

#[test]
fn test_request_wire_layout() {
    let msg = RequestMessage::new("a", Bytes::new(), 3);
    let bytes = encode_to_bytes(&msg).unwrap();

    let mut expected = vec![0x83u8, 0xa7];
    expected.extend_from_slice(b"subject");
    expected.extend_from_slice(&[0xa1, b'a', 0xa4]);
    expected.extend_from_slice(b"body");
    expected.extend_from_slice(&[0xc4, 0x00, 0xa9]);
    expected.extend_from_slice(b"timeoutMs");
    expected.extend_from_slice(&[0xce, 0x00, 0x00, 0x00, 0x03]);

    assert_eq!(&bytes[..], &expected[..]);
}

#[test]
fn test_encoding_is_deterministic() {
    let msg = SubMessage {
        subject: "s".into(),
        reply_to: "r".into(),
        body: Bytes::from_static(b"payload"),
    };
    assert_eq!(
        encode_to_bytes(&msg).unwrap(),
        encode_to_bytes(&msg.clone()).unwrap()
    );
}

#[test]
fn test_field_order() {
    assert_eq!(PubMessage::FIELDS, ["subject", "replyTo", "body"]);
    assert_eq!(RequestMessage::FIELDS, ["subject", "body", "timeoutMs"]);
}

#[test]
fn test_nil_decodes_to_default() {
    assert_eq!(
        decode_from_slice::<PubMessage>(&[0xc0]).unwrap(),
        PubMessage::default()
    );
    assert_eq!(
        decode_from_slice::<ReplyMessage>(&[0xc0]).unwrap(),
        ReplyMessage::default()
    );
    assert_eq!(
        decode_from_slice::<RequestMessage>(&[0xc0]).unwrap(),
        RequestMessage::default()
    );
    assert_eq!(
        decode_from_slice::<SubMessage>(&[0xc0]).unwrap(),
        SubMessage::default()
    );
}

#[test]
fn test_empty_map_decodes_to_default() {
    assert_eq!(
        decode_from_slice::<RequestMessage>(&[0x80]).unwrap(),
        RequestMessage::default()
    );
}

/// Encodes `msg` followed by extra entries, with the map header counting them.
fn with_trailing_fields(msg: &PubMessage, extra: impl Fn(&mut Encoder<'_>)) -> Vec<u8> {
    let mut buf = vec![0u8; 256];
    let len = {
        let mut encoder = Encoder::new(&mut buf);
        encoder.write_map_size(5).unwrap();
        encoder.write_string("subject").unwrap();
        encoder.write_string(&msg.subject).unwrap();
        encoder.write_string("replyTo").unwrap();
        encoder.write_string(&msg.reply_to).unwrap();
        encoder.write_string("body").unwrap();
        encoder.write_byte_array(&msg.body).unwrap();
        extra(&mut encoder);
        encoder.position()
    };
    buf.truncate(len);
    buf
}

#[test]
fn test_unknown_trailing_fields_are_skipped() {
    let msg = PubMessage::new("orders.new", vec![9u8, 8, 7]).with_reply_to("inbox");
    let bytes = with_trailing_fields(&msg, |enc| {
        enc.write_string("priority").unwrap();
        enc.write_u32(7).unwrap();
        enc.write_string("trace").unwrap();
        enc.write_nil().unwrap();
    });

    assert_eq!(decode_from_slice::<PubMessage>(&bytes).unwrap(), msg);
}

#[test]
fn test_strict_decoding_rejects_unknown_fields() {
    let msg = PubMessage::new("orders.new", vec![1u8]);
    let bytes = with_trailing_fields(&msg, |enc| {
        enc.write_string("priority").unwrap();
        enc.write_u32(7).unwrap();
        enc.write_string("trace").unwrap();
        enc.write_nil().unwrap();
    });

    assert_eq!(
        decode_from_slice_with::<PubMessage>(&bytes, DecodeOptions::strict()),
        Err(CodecError::UnknownField("priority".to_string()))
    );

    let plain = encode_to_bytes(&msg).unwrap();
    assert_eq!(
        decode_from_slice_with::<PubMessage>(&plain, DecodeOptions::strict()).unwrap(),
        msg
    );
}

#[test]
fn test_truncated_input_never_decodes() {
    let msg = RequestMessage::new("inventory.lookup", vec![1u8, 2, 3, 4], 250);
    let bytes = encode_to_bytes(&msg).unwrap();

    for len in 0..bytes.len() {
        let result = decode_from_slice::<RequestMessage>(&bytes[..len]);
        assert_matches!(
            result,
            Err(CodecError::UnexpectedEof { .. }),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn test_type_mismatch_on_known_field() {
    let mut buf = Vec::new();
    rmp::encode::write_map_len(&mut buf, 1).unwrap();
    rmp::encode::write_str(&mut buf, "timeoutMs").unwrap();
    rmp::encode::write_str(&mut buf, "soon").unwrap();

    assert_matches!(
        decode_from_slice::<RequestMessage>(&buf),
        Err(CodecError::TypeMismatch {
            expected: "integer",
            ..
        })
    );
}

#[test]
fn test_non_map_input_is_rejected() {
    let mut decoder = Decoder::new(&[0x93, 0x01, 0x02, 0x03]);
    assert_matches!(
        SubMessage::decode(&mut decoder),
        Err(CodecError::TypeMismatch { expected: "map", .. })
    );
}

/// A newer revision of the publish record, as another implementation might
/// send it.
#[derive(Serialize)]
struct PubMessageV2 {
    subject: String,
    #[serde(rename = "replyTo")]
    reply_to: String,
    body: Bytes,
    headers: HashMap<String, String>,
}

#[test]
fn test_decodes_records_from_generic_msgpack() {
    let newer = PubMessageV2 {
        subject: "orders.new".into(),
        reply_to: "inbox".into(),
        body: Bytes::from_static(&[1, 2, 3]),
        headers: HashMap::from([("trace-id".to_string(), "abc".to_string())]),
    };
    let bytes = rmp_serde::to_vec_named(&newer).unwrap();

    let decoded: PubMessage = decode_from_slice(&bytes).unwrap();
    assert_eq!(decoded.subject, "orders.new");
    assert_eq!(decoded.reply_to, "inbox");
    assert_eq!(&decoded.body[..], &[1, 2, 3]);
}

#[test]
fn test_generic_msgpack_reads_our_encoding() {
    let request = RequestMessage::new("inventory.lookup", vec![4u8, 5], 900);
    let bytes = encode_to_bytes(&request).unwrap();

    let decoded: RequestMessage = rmp_serde::from_slice(&bytes).unwrap();
    assert_eq!(decoded, request);
}

#[test]
fn test_request_timeout_helper() {
    let request = RequestMessage::new("a", Bytes::new(), 1_500);
    assert_eq!(request.timeout(), Duration::from_millis(1_500));
}

#[test]
fn test_sub_message_conversions() {
    let sub = SubMessage {
        subject: "orders.new".into(),
        reply_to: "inbox".into(),
        body: Bytes::from_static(b"x"),
    };
    assert!(sub.expects_reply());

    let publish: PubMessage = sub.clone().into();
    assert_eq!(SubMessage::from(publish), sub);
    assert!(!SubMessage::default().expects_reply());
}
