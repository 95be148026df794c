//! All vanilla-pipe command and response frame types.
//!
//! A frame is one datagram.  Byte 0 is the control code; the rest is a
//! fixed-size payload whose length depends on the control code:
//!
//! ```text
//! SYNC      [0x01]
//! CONNECT   [0x02][ssid:32][bssid:6][psk:32]
//! BIND_ACK  [0x03]
//! STATUS    [0x04][result:4]            (i32, big-endian)
//! UNBIND    [0x05]
//! QUIT      [0x06]
//! ```

use std::fmt;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Width of the NUL-padded SSID field in a CONNECT payload.
pub const SSID_FIELD_LEN: usize = 32;

/// Width of the raw BSSID field in a CONNECT payload.
pub const BSSID_LEN: usize = 6;

/// Width of the raw pre-shared key field in a CONNECT payload.
pub const PSK_LEN: usize = 32;

/// Size of a frame that carries only its control code.
pub const BARE_FRAME_SIZE: usize = 1;

/// Size of a STATUS frame: control code + 32-bit result.
pub const STATUS_FRAME_SIZE: usize = 1 + 4;

/// Size of a CONNECT frame: control code + ssid + bssid + psk.
pub const CONNECT_FRAME_SIZE: usize = 1 + SSID_FIELD_LEN + BSSID_LEN + PSK_LEN;

/// Largest frame the protocol defines; receive buffers are sized from this.
pub const MAX_FRAME_SIZE: usize = CONNECT_FRAME_SIZE;

// ── Control codes ─────────────────────────────────────────────────────────────

/// One-byte discriminant at the start of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    Sync = 0x01,
    Connect = 0x02,
    BindAck = 0x03,
    Status = 0x04,
    Unbind = 0x05,
    Quit = 0x06,
}

impl ControlCode {
    /// Returns the fixed on-wire size of a frame carrying this control code.
    pub fn frame_size(self) -> usize {
        match self {
            ControlCode::Connect => CONNECT_FRAME_SIZE,
            ControlCode::Status => STATUS_FRAME_SIZE,
            ControlCode::Sync | ControlCode::BindAck | ControlCode::Unbind | ControlCode::Quit => {
                BARE_FRAME_SIZE
            }
        }
    }
}

impl TryFrom<u8> for ControlCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(ControlCode::Sync),
            0x02 => Ok(ControlCode::Connect),
            0x03 => Ok(ControlCode::BindAck),
            0x04 => Ok(ControlCode::Status),
            0x05 => Ok(ControlCode::Unbind),
            0x06 => Ok(ControlCode::Quit),
            _ => Err(()),
        }
    }
}

// ── Status result codes ───────────────────────────────────────────────────────

/// Result carried by a STATUS frame.
///
/// Only the two canonical values exist on the wire; anything else is rejected
/// by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    GenericError,
}

impl StatusCode {
    /// Wire value for [`StatusCode::Success`].
    pub const SUCCESS_VALUE: i32 = 0;
    /// Wire value for [`StatusCode::GenericError`].
    pub const GENERIC_ERROR_VALUE: i32 = -1;

    /// Returns the signed 32-bit value sent on the wire.
    pub fn as_i32(self) -> i32 {
        match self {
            StatusCode::Success => Self::SUCCESS_VALUE,
            StatusCode::GenericError => Self::GENERIC_ERROR_VALUE,
        }
    }

    /// Maps a wire value back to a canonical code, if it is one.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            Self::SUCCESS_VALUE => Some(StatusCode::Success),
            Self::GENERIC_ERROR_VALUE => Some(StatusCode::GenericError),
            _ => None,
        }
    }

    /// `Success` for `true`, `GenericError` for `false`.
    pub fn from_outcome(ok: bool) -> Self {
        if ok {
            StatusCode::Success
        } else {
            StatusCode::GenericError
        }
    }
}

// ── CONNECT payload fields ────────────────────────────────────────────────────

/// 802.11 BSSID (access point MAC address) of the target console.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bssid(pub [u8; BSSID_LEN]);

impl fmt::Display for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for Bssid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bssid({self})")
    }
}

/// Raw WPA2 pre-shared key for the console's access point.
///
/// `Debug` never prints the key bytes so frames can be logged safely.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Psk(pub [u8; PSK_LEN]);

impl Psk {
    /// Lower-case hex form, the 64-character raw-key notation Wi-Fi tooling accepts.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for Psk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Psk(<redacted>)")
    }
}

/// CONNECT payload: which network to join and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Network name; at most [`SSID_FIELD_LEN`] bytes.  Empty means "the
    /// target found by the last SYNC".
    pub ssid: String,
    pub bssid: Bssid,
    pub psk: Psk,
}

// ── Top-level frame enum ──────────────────────────────────────────────────────

/// A decoded vanilla-pipe frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Frontend asks the broker to look for the console.
    Sync,
    /// Frontend asks the broker to associate with the console.
    Connect(ConnectRequest),
    /// Broker acknowledges a CONNECT.
    BindAck,
    /// Broker reports the outcome of a SYNC.
    Status(StatusCode),
    /// Frontend asks the broker to drop the wireless link.
    Unbind,
    /// Frontend asks the broker to exit.
    Quit,
}

impl Frame {
    /// Returns the control code for this frame.
    pub fn control_code(&self) -> ControlCode {
        match self {
            Frame::Sync => ControlCode::Sync,
            Frame::Connect(_) => ControlCode::Connect,
            Frame::BindAck => ControlCode::BindAck,
            Frame::Status(_) => ControlCode::Status,
            Frame::Unbind => ControlCode::Unbind,
            Frame::Quit => ControlCode::Quit,
        }
    }

    /// Shorthand for a STATUS frame.
    pub fn status(code: StatusCode) -> Self {
        Frame::Status(code)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
