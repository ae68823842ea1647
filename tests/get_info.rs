use ctap_core::authenticator::Authenticator;
use ctap_core::cbor::{self, Value};
use hex_literal::hex;

/// The default settings, on the wire: status 0x00 followed by
/// `{1: ["FIDO_2_1"], 3: aaguid 00..0f, 4: {five options}, 9: ["usb"],
/// 10: [{"alg": -7, "type": "public-key"}]}` in canonical order.
#[test]
fn get_info_default_wire_vector() {
    let mut authenticator = Authenticator::default();
    let response = authenticator.cbor(&[0x04]);
    assert_eq!(
        response,
        hex!(
            "00"
            "a5"
            "01 81 68 4649444f5f325f31"
            "03 50 000102030405060708090a0b0c0d0e0f"
            "04 a5"
            "   62 726b f4"
            "   62 7570 f5"
            "   64 706c6174 f4"
            "   70 6d616b654372656455764e6f74527164 f4"
            "   781e 6e6f4d6347615065726d697373696f6e7357697468436c69656e7450696e f4"
            "09 81 63 757362"
            "0a 81 a2 63616c67 26 6474797065 6a 7075626c69632d6b6579"
        )
    );
}

#[test]
fn get_info_ignores_argument_bytes() {
    let mut authenticator = Authenticator::default();
    let bare = authenticator.cbor(&[0x04]);
    // platforms may send an empty map argument
    let with_map = authenticator.cbor(&[0x04, 0xA0]);
    assert_eq!(bare, with_map);
}

#[test]
fn populated_members_appear_under_their_keys() {
    let mut settings = ctap_core::ctap2::get_info::Settings::default();
    assert!(settings.max_msg_size.is_none());
    settings.max_msg_size = Some(7609);
    settings.min_pin_length = Some(4);
    let mut authenticator = Authenticator::new(settings);

    let response = authenticator.cbor(&[0x04]);
    assert_eq!(response[0], 0x00);
    let map = cbor::decode_all(&response[1..]).unwrap();
    assert_eq!(
        map.get(&Value::Unsigned(0x05)),
        Some(&Value::Unsigned(7609))
    );
    assert_eq!(map.get(&Value::Unsigned(0x0D)), Some(&Value::Unsigned(4)));
    assert_eq!(map.get(&Value::Unsigned(0x18)), None);
}
