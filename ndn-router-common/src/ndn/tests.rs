//! Unit tests for the NDN packet implementation

use super::*;
use crate::tlv;
use bytes::{Bytes, BytesMut};

#[test]
fn test_name_creation() {
    let name = Name::from_string("/test/data/1");

    assert_eq!(name.len(), 3);
    assert_eq!(name.get(0).unwrap().as_bytes().as_ref(), b"test");
    assert_eq!(name.get(1).unwrap().as_bytes().as_ref(), b"data");
    assert_eq!(name.get(2).unwrap().as_bytes().as_ref(), b"1");

    assert_eq!(name.to_string(), "/test/data/1");
    assert_eq!(Name::from_string("/").to_string(), "/");
    assert_eq!(Name::from_string("//a//b/").to_string(), "/a/b");
}

#[test]
fn test_name_prefix_matching() {
    let name1 = Name::from_string("/a/b/c");
    let name2 = Name::from_string("/a/b/c");
    let name3 = Name::from_string("/a/b/d");
    let name4 = Name::from_string("/a/b");

    assert_eq!(name1, name2);
    assert_ne!(name1, name3);

    assert!(name4.is_prefix_of(&name1));
    assert!(name1.is_prefix_of(&name2));
    assert!(!name1.is_prefix_of(&name4));
    assert!(!name3.is_prefix_of(&name1));
    assert!(Name::new().is_prefix_of(&name1));

    assert_eq!(name1.prefix(2), name4);
    assert_eq!(name1.prefix(0), Name::new());
}

#[test]
fn test_name_wire_round_trip() {
    let name = Name::from_string("/app/video/42");
    let mut buf = BytesMut::new();
    name.to_tlv().encode(&mut buf);

    let parsed = Name::from_wire(&buf).unwrap();
    assert_eq!(parsed, name);
}

#[test]
fn test_empty_component_is_rejected() {
    // Name TLV holding a single zero-length component.
    let wire = [tlv::TLV_NAME, 0x02, tlv::TLV_COMPONENT, 0x00];
    assert!(Name::from_wire(&wire).is_err());
}

#[test]
fn test_interest_wire_round_trip() {
    let interest = Interest::new(Name::from_string("/test/interest"))
        .with_nonce(0x01020304)
        .with_lifetime(4000)
        .with_can_be_prefix(true)
        .with_must_be_fresh(true);

    let wire = interest.to_bytes();
    assert_eq!(wire[0], tlv::TLV_INTEREST);

    let parsed = Interest::from_wire(&wire).unwrap();
    assert_eq!(parsed.name, interest.name);
    assert_eq!(parsed.nonce, 0x01020304);
    assert_eq!(parsed.lifetime_ms, Some(4000));
    assert!(parsed.can_be_prefix);
    assert!(parsed.must_be_fresh);
}

#[test]
fn test_interest_without_optional_fields() {
    let interest = Interest::new(Name::from_string("/minimal")).with_nonce(7);
    let parsed = Interest::from_wire(&interest.to_bytes()).unwrap();

    assert_eq!(parsed.nonce, 7);
    assert_eq!(parsed.lifetime_ms, None);
    assert_eq!(parsed.hop_limit, None);
    assert!(!parsed.can_be_prefix);
    assert!(!parsed.must_be_fresh);
}

#[test]
fn test_data_wire_round_trip() {
    let mut data = Data::new(Name::from_string("/test/data"), Bytes::from_static(b"hi"));
    data.freshness_ms = Some(1000);
    data.signature_info = SignatureInfo {
        signature_type: SIGNATURE_DIGEST_SHA256,
        key_locator: Some(Name::from_string("/keys/router")),
    };
    data.signature_value = Bytes::from_static(&[0u8; 32]);

    let wire = data.to_bytes();
    assert_eq!(wire[0], tlv::TLV_DATA);

    let parsed = Data::from_wire(&wire).unwrap();
    assert_eq!(parsed.name, data.name);
    assert_eq!(parsed.freshness_ms, Some(1000));
    assert_eq!(parsed.content, data.content);
    assert_eq!(parsed.signature_info, data.signature_info);
    assert_eq!(parsed.signature_value, data.signature_value);
}

#[test]
fn test_packet_dispatch() {
    let interest = Interest::new(Name::from_string("/a")).with_nonce(1);
    let data = Data::new(Name::from_string("/a/b"), Bytes::from_static(b"x"));

    match Packet::from_bytes(&interest.to_bytes()).unwrap() {
        Packet::Interest(i) => assert_eq!(i.name, interest.name),
        other => panic!("expected Interest, got {}", other.packet_type()),
    }
    match Packet::from_bytes(&data.to_bytes()).unwrap() {
        Packet::Data(d) => assert_eq!(d.name, data.name),
        other => panic!("expected Data, got {}", other.packet_type()),
    }

    assert!(Packet::from_bytes(&[0x42, 0x00]).is_err());
    assert!(Packet::from_bytes(&[]).is_err());
}

#[test]
fn test_frame_length() {
    let interest = Interest::new(Name::from_string("/frame/test")).with_nonce(9);
    let wire = interest.to_bytes();

    // Complete frame reports its own size.
    assert_eq!(Packet::frame_length(&wire).unwrap(), Some(wire.len()));

    // Partial header keeps asking for more.
    assert_eq!(Packet::frame_length(&wire[..1]).unwrap(), None);
    assert_eq!(Packet::frame_length(&[]).unwrap(), None);

    // A frame claiming more than the packet limit is fatal.
    let oversized = [tlv::TLV_DATA, 253, 0xFF, 0xFF];
    assert!(Packet::frame_length(&oversized).is_err());

    // Garbage where a packet type should be is fatal too.
    assert!(Packet::frame_length(&[0x00, 0x01]).is_err());
}

#[test]
fn test_control_response_encoding() {
    let body = control_response_success();

    let mut buf = &body[..];
    let outer = TlvElement::decode(&mut buf).unwrap();
    assert_eq!(outer.tlv_type, tlv::TLV_CONTROL_RESPONSE);

    let mut inner = outer.value.clone();
    let code = TlvElement::decode(&mut inner).unwrap();
    assert_eq!(code.tlv_type, tlv::TLV_STATUS_CODE);
    assert_eq!(tlv::decode_nonneg_int(&code.value).unwrap(), 200);

    let text = TlvElement::decode(&mut inner).unwrap();
    assert_eq!(text.tlv_type, tlv::TLV_STATUS_TEXT);
    assert_eq!(text.value.as_ref(), b"Success");
}

#[test]
fn test_component_display_falls_back_to_hex() {
    let printable = NameComponent::new(Bytes::from_static(b"plain"));
    assert_eq!(printable.to_string(), "plain");

    let binary = NameComponent::new(Bytes::from_static(&[0x01, 0xFF]));
    assert_eq!(binary.to_string(), "0x01ff");
}
