//! TFTP (Trivial File Transfer Protocol) client
//!
//! This module implements the client side of [RFC 1350](https://www.rfc-editor.org/rfc/rfc1350),
//! TFTP Protocol version 2. Option negotiation (RFC 2347 and later) is not supported,
//! so every transfer uses 512-byte blocks and a single block in flight.
//!
//! ## Module Structure
//!
//! ```text
//! tftp/
//! ├── core/           # Core protocol implementation
//! │   ├── packet      # Packet serialization/deserialization
//! │   ├── socket      # Transport abstraction layer
//! │   ├── error       # Transfer error taxonomy
//! │   └── error_code  # RFC 1350 error code table
//! │
//! └── client/         # TFTP client
//!     ├── client      # get/put on files and streams
//!     ├── config      # Client configuration
//!     ├── session     # Retry policy and transfer ID binding
//!     ├── download    # RRQ state machine
//!     └── upload      # WRQ state machine
//! ```
//!
//! ## Usage Examples
//!
//! ### Download into memory
//!
//! ```rust,no_run
//! use tftpc::tftp::client::{Client, ClientConfig};
//! use tftpc::tftp::core::Mode;
//!
//! let config = ClientConfig::new("192.168.1.100", 69).with_mode(Mode::Octet);
//! let client = Client::new(config).unwrap();
//!
//! let mut image = Vec::new();
//! client.get_to("pxelinux.0", &mut image).unwrap();
//! ```

// Submodules
pub mod client;
pub mod core;
