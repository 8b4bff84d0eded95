use super::*;
use assert_matches::assert_matches;

struct Sample {
    name: String,
    blob: Vec<u8>,
    count: u32,
    entries: u32,
}

impl Encode for Sample {
    fn encode<W: Writer>(&self, w: &mut W) -> Result<(), CodecError> {
        w.write_map_size(self.entries)?;
        w.write_string(&self.name)?;
        w.write_byte_array(&self.blob)?;
        w.write_u32(self.count)?;
        w.write_nil()
    }
}

fn sample(name_len: usize, blob_len: usize, entries: u32) -> Sample {
    Sample {
        name: "n".repeat(name_len),
        blob: vec![0xab; blob_len],
        count: 42,
        entries,
    }
}

#[test]
fn test_sizer_matches_encoder_across_length_classes() {
    let cases = [
        (0, 0, 0),
        (31, 255, 15),
        (32, 256, 16),
        (255, 65_535, 65_535),
        (256, 65_536, 65_536),
        (65_536, 1, 1),
    ];

    for (name_len, blob_len, entries) in cases {
        let value = sample(name_len, blob_len, entries);
        let sized = encoded_len(&value).unwrap();
        let bytes = encode_to_bytes(&value).unwrap();
        assert_eq!(sized, bytes.len(), "case {name_len}/{blob_len}/{entries}");
    }
}

#[test]
fn test_encoding_matches_rmp_reference() {
    let value = sample(40, 300, 20);
    let bytes = encode_to_bytes(&value).unwrap();

    let mut expected = Vec::new();
    rmp::encode::write_map_len(&mut expected, 20).unwrap();
    rmp::encode::write_str(&mut expected, &value.name).unwrap();
    rmp::encode::write_bin(&mut expected, &value.blob).unwrap();
    rmp::encode::write_u32(&mut expected, 42).unwrap();
    rmp::encode::write_nil(&mut expected).unwrap();

    assert_eq!(&bytes[..], &expected[..]);
}

#[test]
fn test_u32_is_fixed_width() {
    let mut buf = [0u8; 5];
    let mut encoder = Encoder::new(&mut buf);
    encoder.write_u32(1).unwrap();
    assert_eq!(encoder.position(), 5);
    assert_eq!(buf, [0xce, 0, 0, 0, 1]);
}

#[test]
fn test_encoder_rejects_small_buffer() {
    let mut buf = [0u8; 4];
    let mut encoder = Encoder::new(&mut buf);
    encoder.write_string("abc").unwrap();
    assert_eq!(encoder.position(), 4);

    let err = encoder.write_nil().unwrap_err();
    assert_eq!(
        err,
        CodecError::BufferTooSmall {
            needed: 1,
            remaining: 0
        }
    );
    assert_eq!(encoder.position(), 4);
}

#[test]
fn test_read_u32_accepts_compact_integers() {
    assert_eq!(Decoder::new(&[0x05]).read_u32().unwrap(), 5);
    assert_eq!(Decoder::new(&[0xcc, 0xff]).read_u32().unwrap(), 255);
    assert_eq!(Decoder::new(&[0xcd, 0x01, 0x00]).read_u32().unwrap(), 256);
    assert_eq!(
        Decoder::new(&[0xce, 0xff, 0xff, 0xff, 0xff]).read_u32().unwrap(),
        u32::MAX
    );
    assert_eq!(
        Decoder::new(&[0xcf, 0, 0, 0, 0, 0, 0, 0, 7]).read_u32().unwrap(),
        7
    );
    assert_eq!(Decoder::new(&[0xd0, 0x10]).read_u32().unwrap(), 16);
}

#[test]
fn test_read_u32_rejects_out_of_range() {
    assert_eq!(
        Decoder::new(&[0xcf, 0, 0, 0, 1, 0, 0, 0, 0]).read_u32(),
        Err(CodecError::IntegerOutOfRange("u32"))
    );
    assert_eq!(
        Decoder::new(&[0xff]).read_u32(),
        Err(CodecError::IntegerOutOfRange("u32"))
    );
}

#[test]
fn test_type_mismatch_on_known_reader() {
    let err = Decoder::new(&[0x01]).read_string().unwrap_err();
    assert_eq!(
        err,
        CodecError::TypeMismatch {
            expected: "string",
            found: Marker::FixPos(1)
        }
    );

    let err = Decoder::new(&[0xa1, b'x']).read_byte_array().unwrap_err();
    assert_matches!(err, CodecError::TypeMismatch { expected: "binary", .. });
}

#[test]
fn test_truncated_string_is_an_error() {
    let err = Decoder::new(&[0xa5, b'a', b'b']).read_string().unwrap_err();
    assert_eq!(
        err,
        CodecError::UnexpectedEof {
            needed: 5,
            remaining: 2
        }
    );
}

#[test]
fn test_length_prefix_beyond_input() {
    let err = Decoder::new(&[0xdb, 0xff, 0xff, 0xff, 0xff, b'x'])
        .read_string()
        .unwrap_err();
    assert_eq!(
        err,
        CodecError::UnexpectedEof {
            needed: u32::MAX as usize,
            remaining: 1
        }
    );

    let err = Decoder::new(&[0xc5, 0x01]).read_byte_array().unwrap_err();
    assert_matches!(err, CodecError::UnexpectedEof { needed: 2, remaining: 1 });
}

#[test]
fn test_invalid_utf8() {
    let err = Decoder::new(&[0xa2, 0xff, 0xfe]).read_string().unwrap_err();
    assert_eq!(err, CodecError::InvalidUtf8);
}

#[test]
fn test_is_next_nil_peeks() {
    let decoder = Decoder::new(&[0xc0]);
    assert!(decoder.is_next_nil().unwrap());
    assert_eq!(decoder.remaining(), 1);

    assert!(!Decoder::new(&[0x80]).is_next_nil().unwrap());
    assert_matches!(
        Decoder::new(&[]).is_next_nil(),
        Err(CodecError::UnexpectedEof { needed: 1, remaining: 0 })
    );
}

#[test]
fn test_skip_consumes_exactly_one_value_of_any_type() {
    let mut buf = Vec::new();
    // { "a": [1.5, true, -300, "s"], "b": { "c": bin[3] }, "d": ext(4 bytes) }
    rmp::encode::write_map_len(&mut buf, 3).unwrap();
    rmp::encode::write_str(&mut buf, "a").unwrap();
    rmp::encode::write_array_len(&mut buf, 4).unwrap();
    rmp::encode::write_f64(&mut buf, 1.5).unwrap();
    rmp::encode::write_bool(&mut buf, true).unwrap();
    rmp::encode::write_sint(&mut buf, -300).unwrap();
    rmp::encode::write_str(&mut buf, "s").unwrap();
    rmp::encode::write_str(&mut buf, "b").unwrap();
    rmp::encode::write_map_len(&mut buf, 1).unwrap();
    rmp::encode::write_str(&mut buf, "c").unwrap();
    rmp::encode::write_bin(&mut buf, &[1, 2, 3]).unwrap();
    rmp::encode::write_str(&mut buf, "d").unwrap();
    rmp::encode::write_ext_meta(&mut buf, 4, 7).unwrap();
    buf.extend_from_slice(&[9, 9, 9, 9]);
    // Something after the skipped value.
    rmp::encode::write_str(&mut buf, "after").unwrap();

    let mut decoder = Decoder::new(&buf);
    decoder.skip().unwrap();
    assert_eq!(decoder.read_str().unwrap(), "after");
    assert_eq!(decoder.remaining(), 0);
}

#[test]
fn test_skip_ext_with_explicit_length() {
    let mut buf = Vec::new();
    rmp::encode::write_ext_meta(&mut buf, 20, 1).unwrap();
    buf.extend_from_slice(&[0u8; 20]);
    buf.push(0x07);

    let mut decoder = Decoder::new(&buf);
    decoder.skip().unwrap();
    assert_eq!(decoder.read_u32().unwrap(), 7);
}

#[test]
fn test_skip_deeply_nested_input() {
    let depth = 100_000;
    let mut buf = vec![0x91; depth];
    buf.push(0xc0);

    let mut decoder = Decoder::new(&buf);
    decoder.skip().unwrap();
    assert_eq!(decoder.remaining(), 0);
}

#[test]
fn test_skip_rejects_reserved_marker() {
    assert_eq!(
        Decoder::new(&[0xc1]).skip(),
        Err(CodecError::InvalidMarker(0xc1))
    );
    // Inside a container too.
    assert_eq!(
        Decoder::new(&[0x92, 0x01, 0xc1]).skip(),
        Err(CodecError::InvalidMarker(0xc1))
    );
}

#[test]
fn test_skip_truncated_container() {
    assert_matches!(
        Decoder::new(&[0x93, 0x01]).skip(),
        Err(CodecError::UnexpectedEof { .. })
    );
}

#[test]
fn test_skip_field_honours_options() {
    let buf = [0x01];
    let mut lenient = Decoder::new(&buf);
    lenient.skip_field("extra").unwrap();
    assert_eq!(lenient.remaining(), 0);

    let mut strict = Decoder::with_options(&buf, DecodeOptions::strict());
    assert_eq!(
        strict.skip_field("extra"),
        Err(CodecError::UnknownField("extra".to_string()))
    );
}
