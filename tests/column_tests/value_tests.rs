//! Tests for values and key ordering

use std::cmp::Ordering;

use atlasdb::{AtlasError, Column, Record, Value};

#[test]
fn test_key_order_within_variant() {
    assert_eq!(Value::Int(-5).key_cmp(&Value::Int(3)), Ordering::Less);
    assert_eq!(Value::UInt(10).key_cmp(&Value::UInt(2)), Ordering::Greater);
    assert_eq!(Value::from("abc").key_cmp(&Value::from("abd")), Ordering::Less);
    assert_eq!(Value::from("ab").key_cmp(&Value::from("abc")), Ordering::Less);
    assert_eq!(Value::from(vec![1u8, 2]).key_cmp(&Value::from(vec![1u8, 2])), Ordering::Equal);
}

#[test]
fn test_text_orders_bytewise() {
    // 'Z' (0x5A) sorts before 'a' (0x61), and multi-byte chars after ASCII
    assert_eq!(Value::from("Zed").key_cmp(&Value::from("abc")), Ordering::Less);
    assert_eq!(Value::from("é").key_cmp(&Value::from("z")), Ordering::Greater);
}

#[test]
fn test_float_order_is_total() {
    assert_eq!(Value::Float(-0.0).key_cmp(&Value::Float(0.0)), Ordering::Less);
    assert_eq!(Value::Float(f64::NAN).key_cmp(&Value::Float(f64::NAN)), Ordering::Equal);
    assert_eq!(Value::Float(1.0).key_cmp(&Value::Float(f64::INFINITY)), Ordering::Less);
}

#[test]
fn test_mixed_variants_order_by_kind() {
    assert_eq!(Value::Int(100).key_cmp(&Value::UInt(0)), Ordering::Less);
    assert_eq!(Value::from("a").key_cmp(&Value::Int(0)), Ordering::Greater);
}

#[test]
fn test_conversions() {
    assert_eq!(Value::from(7i32), Value::Int(7));
    assert_eq!(Value::from(7u32), Value::UInt(7));
    assert_eq!(Value::from(&b"ab"[..]), Value::Bytes(vec![b'a', b'b']));
    assert_eq!(Value::from(String::from("x")).as_text(), Some("x"));
    assert_eq!(Value::Int(1).as_uint(), None);
    assert_eq!(Value::Float(2.5).as_float(), Some(2.5));
}

#[test]
fn test_display() {
    assert_eq!(Value::Int(-3).to_string(), "-3");
    assert_eq!(Value::from("hi").to_string(), "\"hi\"");
    assert_eq!(Value::from(vec![0u8; 3]).to_string(), "<3 bytes>");
}

#[test]
fn test_json_untagged() {
    assert_eq!(serde_json::to_string(&Value::Int(5)).unwrap(), "5");
    assert_eq!(serde_json::to_string(&Value::from("x")).unwrap(), "\"x\"");

    let parsed: Value = serde_json::from_str("-12").unwrap();
    assert_eq!(parsed, Value::Int(-12));
    let parsed: Value = serde_json::from_str("\"name\"").unwrap();
    assert_eq!(parsed, Value::from("name"));
}

#[test]
fn test_json_round_trip_reencodes_unsigned() {
    let record = Record::new().with("age", 42u32).with("size", u64::MAX);
    let json = serde_json::to_string(&record).unwrap();
    let back: Record = serde_json::from_str(&json).unwrap();

    // small unsigned values come back as signed
    let age = back.get("age").unwrap();
    assert_eq!(age, &Value::Int(42));
    let column = Column::uint8("age");
    assert_eq!(column.encode_to_vec(age).unwrap(), vec![42]);
    assert_eq!(column.normalize(age).unwrap(), Value::UInt(42));

    let size = back.get("size").unwrap();
    assert_eq!(size, &Value::UInt(u64::MAX));
    assert_eq!(Column::uint64("size").normalize(size).unwrap(), Value::UInt(u64::MAX));
}

#[test]
fn test_negative_into_unsigned_is_out_of_range() {
    let err = Column::uint8("age").encode_to_vec(&Value::Int(-1)).unwrap_err();
    assert!(matches!(err, AtlasError::ValueOutOfRange { ref value, .. } if value == "-1"));
}

#[test]
fn test_fixed_string_strips_padding() {
    let column = Column::fixed_string("code", 6);
    let bytes = column.encode_to_vec(&Value::from("ab")).unwrap();
    assert_eq!(bytes, b"ab\0\0\0\0");
    assert_eq!(column.normalize(&Value::from("ab")).unwrap(), Value::from("ab"));
    assert_eq!(column.normalize(&Value::from("abcdefgh")).unwrap(), Value::from("abcdef"));
}

#[test]
fn test_fixed_bytes_keep_padding() {
    let column = Column::fixed_bytes("hash", 4);
    assert_eq!(column.normalize(&Value::from(vec![1u8])).unwrap(), Value::Bytes(vec![1, 0, 0, 0]));
}
