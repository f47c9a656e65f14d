//! Unit tests for the literal model.

use super::literal::{Literal, LiteralArray, LiteralTag, LiteralValue};

#[test]
fn tag_codes_are_binary_stable() {
    assert_eq!(LiteralTag::TagValue as u8, 0x00);
    assert_eq!(LiteralTag::Bool as u8, 0x01);
    assert_eq!(LiteralTag::Integer as u8, 0x02);
    assert_eq!(LiteralTag::Float as u8, 0x03);
    assert_eq!(LiteralTag::Double as u8, 0x04);
    assert_eq!(LiteralTag::String as u8, 0x05);
    assert_eq!(LiteralTag::Method as u8, 0x06);
    assert_eq!(LiteralTag::MethodAffiliate as u8, 0x09);
    assert_eq!(LiteralTag::ArrayU1 as u8, 0x0a);
    assert_eq!(LiteralTag::ArrayString as u8, 0x15);
    assert_eq!(LiteralTag::LiteralArray as u8, 0x18);
    assert_eq!(LiteralTag::NullValue as u8, 0xff);
}

#[test]
fn constructors_pair_tag_and_payload() {
    assert_eq!(Literal::string("x").tag, LiteralTag::String);
    assert_eq!(Literal::affiliate(3).tag, LiteralTag::MethodAffiliate);
    assert_eq!(Literal::u32(7).tag, LiteralTag::Integer);
    assert_eq!(Literal::null().tag, LiteralTag::NullValue);
    assert_eq!(Literal::null().value, LiteralValue::Null);
}

#[test]
fn tombstone_detection() {
    let mut array = LiteralArray::new(vec![Literal::string("keep"), Literal::u32(1)]);
    assert!(!array.has_tombstones());

    array.literals[0] = Literal::null();
    assert!(array.has_tombstones());
    assert!(array.literals[0].is_tombstone());
}

#[test]
fn float_literals_keep_their_bit_pattern() {
    // A payload that a float->double->float round trip would not preserve.
    let bits = 0x7fc0_0001u32;
    let value = f32::from_bits(bits);
    let literal = Literal::f32(value);

    match literal.value {
        LiteralValue::F32(v) => assert_eq!(v.to_bits(), bits),
        other => panic!("unexpected payload: {other:?}"),
    }
}

#[test]
fn payload_accessors() {
    assert_eq!(Literal::string("s").as_str(), Some("s"));
    assert_eq!(Literal::affiliate(2).as_affiliate(), Some(2));
    assert_eq!(Literal::u32(9).as_u32(), Some(9));
    assert_eq!(Literal::u32(9).as_str(), None);
}
