//! TFTP core protocol implementation
//!
//! This module contains the core components of the TFTP protocol:
//! - `packet`: Packet serialization and deserialization
//! - `socket`: Transport abstraction over a datagram socket
//! - `error`: Transfer and codec errors
//! - `error_code`: RFC 1350 error code table

mod error;
pub mod error_code;
mod packet;
mod socket;

#[cfg(test)]
pub(crate) mod mock;

// Public core types
pub use error::{PacketError, TransferError};
pub use error_code::ErrorCode;
pub use packet::{
    BLOCK_SIZE, HEADER_SIZE, MAX_PACKET_SIZE, Mode, Packet, RequestKind, encode_ack, encode_data,
    encode_request,
};
pub use socket::{Transport, is_timeout};
