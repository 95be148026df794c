//! Protocol module containing frame types and the binary codec.

pub mod codec;
pub mod frame;

pub use codec::{decode_frame, encode_frame, ProtocolError};
pub use frame::*;
