use std::io;

use super::error_code;

/// Reasons a datagram could not be encoded or decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("packet too short: opcode {opcode}, {len} bytes")]
    Truncated { opcode: u16, len: usize },
    #[error("missing NUL terminator")]
    MissingTerminator,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("unsupported transfer mode `{0}`")]
    InvalidMode(String),
    #[error("data payload of {0} bytes exceeds 512")]
    OversizedPayload(usize),
    #[error("request of {0} bytes does not fit in a 512-byte datagram")]
    RequestTooLong(usize),
}

/// Errors that terminate a transfer
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("malformed packet: {0}")]
    MalformedPacket(#[from] PacketError),

    #[error("protocol violation: expected {expected}, received {received}")]
    ProtocolViolation {
        expected: &'static str,
        received: String,
    },

    #[error("server error {code}: {}", render_server_message(.code, .message))]
    ServerError { code: u16, message: String },

    #[error("timed out after {attempts} attempt(s)")]
    NetworkTimeout { attempts: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn render_server_message(code: &u16, message: &str) -> String {
    if message.is_empty() {
        error_code::describe(*code).to_string()
    } else {
        message.to_string()
    }
}

impl TransferError {
    /// Process exit status for this failure class
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::MalformedPacket(_) => 3,
            Self::ProtocolViolation { .. } => 4,
            Self::ServerError { .. } => 5,
            Self::NetworkTimeout { .. } => 6,
            Self::Io(_) => 7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_verbatim() {
        let err = TransferError::ServerError {
            code: 1,
            message: "no such file: foo".to_string(),
        };
        assert_eq!(err.to_string(), "server error 1: no such file: foo");
    }

    #[test]
    fn empty_server_message_uses_table() {
        let err = TransferError::ServerError {
            code: 2,
            message: String::new(),
        };
        assert_eq!(err.to_string(), "server error 2: Access violation.");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let errors = [
            TransferError::MalformedPacket(PacketError::MissingTerminator),
            TransferError::ProtocolViolation {
                expected: "DATA",
                received: "ACK".to_string(),
            },
            TransferError::ServerError {
                code: 0,
                message: String::new(),
            },
            TransferError::NetworkTimeout { attempts: 1 },
            TransferError::Io(io::Error::other("disk")),
        ];
        let mut codes: Vec<u8> = errors.iter().map(TransferError::exit_code).collect();
        codes.dedup();
        assert_eq!(codes, vec![3, 4, 5, 6, 7]);
    }
}
