//! Integration tests for the pipe-core frame codec.
//!
//! These go through the crate-root re-exports, the same way the broker
//! uses the codec, and check the properties the frontend relies on.

use pipe_core::{
    decode_frame, encode_frame,
    protocol::frame::{CONNECT_FRAME_SIZE, MAX_FRAME_SIZE, PSK_LEN},
    Bssid, ConnectRequest, ControlCode, Frame, ProtocolError, Psk, StatusCode,
};

fn roundtrip(frame: Frame) -> Frame {
    let bytes = encode_frame(&frame).expect("encode must succeed");
    assert_eq!(
        bytes.len(),
        frame.control_code().frame_size(),
        "encoded length must equal the fixed frame size"
    );
    decode_frame(&bytes).expect("decode must succeed")
}

#[test]
fn test_roundtrip_sync() {
    assert_eq!(roundtrip(Frame::Sync), Frame::Sync);
}

#[test]
fn test_roundtrip_quit_and_unbind() {
    assert_eq!(roundtrip(Frame::Quit), Frame::Quit);
    assert_eq!(roundtrip(Frame::Unbind), Frame::Unbind);
}

#[test]
fn test_roundtrip_status_both_codes() {
    for code in [StatusCode::Success, StatusCode::GenericError] {
        assert_eq!(roundtrip(Frame::Status(code)), Frame::Status(code));
    }
}

#[test]
fn test_roundtrip_connect_with_unicode_ssid() {
    let original = Frame::Connect(ConnectRequest {
        ssid: "WiiU-éç".to_string(),
        bssid: Bssid([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]),
        psk: Psk([7; PSK_LEN]),
    });
    assert_eq!(roundtrip(original.clone()), original);
}

#[test]
fn test_sync_scenario_byte_is_0x01() {
    assert_eq!(decode_frame(&[0x01]).unwrap(), Frame::Sync);
    assert_eq!(ControlCode::Sync as u8, 0x01);
}

#[test]
fn test_every_short_prefix_of_a_full_size_buffer_is_handled() {
    // No input up to the largest frame may panic; short ones must error.
    let bytes = [0x02u8; MAX_FRAME_SIZE];
    for len in 0..CONNECT_FRAME_SIZE {
        assert!(matches!(
            decode_frame(&bytes[..len]),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }
}

#[test]
fn test_arbitrary_first_bytes_never_panic() {
    for code in 0u8..=255 {
        let _ = decode_frame(&[code]);
        let _ = decode_frame(&[code; MAX_FRAME_SIZE]);
    }
}
