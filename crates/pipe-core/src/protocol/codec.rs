//! Binary codec for encoding and decoding vanilla-pipe frames.
//!
//! Wire format: see [`crate::protocol::frame`].  All multi-byte integers are
//! big-endian ("network order") regardless of host endianness; this module
//! is the only place byte order is converted.

use crate::protocol::frame::{
    Bssid, ConnectRequest, ControlCode, Frame, Psk, StatusCode, BSSID_LEN, PSK_LEN,
    SSID_FIELD_LEN,
};
use thiserror::Error;

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the frame's fixed size.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The control code byte is not a recognized value.
    #[error("unknown control code: 0x{0:02X}")]
    UnknownControlCode(u8),

    /// The payload could not be parsed (bad UTF-8, non-canonical status, etc.).
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A field does not fit its fixed-width slot.
    #[error("field {field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a [`Frame`] into its fixed-size wire form.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if a CONNECT SSID exceeds 32 bytes,
/// or [`ProtocolError::MalformedPayload`] if it contains a NUL byte.
///
/// # Examples
///
/// ```rust
/// use pipe_core::protocol::{decode_frame, encode_frame, Frame, StatusCode};
///
/// let frame = Frame::Status(StatusCode::Success);
/// let bytes = encode_frame(&frame).unwrap();
/// assert_eq!(bytes, [0x04, 0, 0, 0, 0]);
/// assert_eq!(decode_frame(&bytes).unwrap(), frame);
/// ```
pub fn encode_frame(frame: &Frame) -> Result<Vec<u8>, ProtocolError> {
    let code = frame.control_code();
    let mut buf = Vec::with_capacity(code.frame_size());
    buf.push(code as u8);

    match frame {
        Frame::Sync | Frame::BindAck | Frame::Unbind | Frame::Quit => {}
        Frame::Status(status) => buf.extend_from_slice(&status.as_i32().to_be_bytes()),
        Frame::Connect(req) => encode_connect(&mut buf, req)?,
    }

    debug_assert_eq!(buf.len(), code.frame_size());
    Ok(buf)
}

/// Decodes one [`Frame`] from the beginning of `bytes`.
///
/// Bytes past the frame's fixed size are ignored, so a frontend that always
/// sends a full-size buffer is accepted.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are truncated, carry an unknown
/// control code, or contain an invalid payload.
///
/// # Examples
///
/// ```rust
/// use pipe_core::protocol::{decode_frame, Frame, ProtocolError};
///
/// assert_eq!(decode_frame(&[0x01]).unwrap(), Frame::Sync);
/// assert!(matches!(decode_frame(&[]), Err(ProtocolError::InsufficientData { .. })));
/// ```
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, ProtocolError> {
    let Some(&code_byte) = bytes.first() else {
        return Err(ProtocolError::InsufficientData {
            needed: 1,
            available: 0,
        });
    };

    let code =
        ControlCode::try_from(code_byte).map_err(|_| ProtocolError::UnknownControlCode(code_byte))?;

    let needed = code.frame_size();
    if bytes.len() < needed {
        return Err(ProtocolError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }

    let payload = &bytes[1..needed];
    match code {
        ControlCode::Sync => Ok(Frame::Sync),
        ControlCode::BindAck => Ok(Frame::BindAck),
        ControlCode::Unbind => Ok(Frame::Unbind),
        ControlCode::Quit => Ok(Frame::Quit),
        ControlCode::Status => decode_status(payload).map(Frame::Status),
        ControlCode::Connect => decode_connect(payload).map(Frame::Connect),
    }
}

// ── Per-frame helpers ─────────────────────────────────────────────────────────

fn encode_connect(buf: &mut Vec<u8>, req: &ConnectRequest) -> Result<(), ProtocolError> {
    let ssid = req.ssid.as_bytes();
    if ssid.len() > SSID_FIELD_LEN {
        return Err(ProtocolError::FieldTooLong {
            field: "ssid",
            len: ssid.len(),
            max: SSID_FIELD_LEN,
        });
    }
    if ssid.contains(&0) {
        return Err(ProtocolError::MalformedPayload(
            "ssid contains a NUL byte".to_string(),
        ));
    }

    let mut ssid_field = [0u8; SSID_FIELD_LEN];
    ssid_field[..ssid.len()].copy_from_slice(ssid);
    buf.extend_from_slice(&ssid_field);
    buf.extend_from_slice(&req.bssid.0);
    buf.extend_from_slice(&req.psk.0);
    Ok(())
}

fn decode_status(p: &[u8]) -> Result<StatusCode, ProtocolError> {
    let value = i32::from_be_bytes([p[0], p[1], p[2], p[3]]);
    StatusCode::from_i32(value).ok_or_else(|| {
        ProtocolError::MalformedPayload(format!("non-canonical status code: {value}"))
    })
}

fn decode_connect(p: &[u8]) -> Result<ConnectRequest, ProtocolError> {
    let ssid_field = &p[..SSID_FIELD_LEN];
    // NUL-padded; anything after the first NUL is padding.
    let ssid_len = ssid_field
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(SSID_FIELD_LEN);
    let ssid = std::str::from_utf8(&ssid_field[..ssid_len])
        .map_err(|e| ProtocolError::MalformedPayload(format!("ssid is not UTF-8: {e}")))?
        .to_string();

    let mut bssid = [0u8; BSSID_LEN];
    bssid.copy_from_slice(&p[SSID_FIELD_LEN..SSID_FIELD_LEN + BSSID_LEN]);

    let psk_off = SSID_FIELD_LEN + BSSID_LEN;
    let mut psk = [0u8; PSK_LEN];
    psk.copy_from_slice(&p[psk_off..psk_off + PSK_LEN]);

    Ok(ConnectRequest {
        ssid,
        bssid: Bssid(bssid),
        psk: Psk(psk),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
