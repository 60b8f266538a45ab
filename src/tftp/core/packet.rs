use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use super::error::PacketError;

/// Maximum payload carried by a single DATA packet
pub const BLOCK_SIZE: usize = 512;

/// Opcode and block number header of DATA/ACK packets
pub const HEADER_SIZE: usize = 4;

/// Largest datagram exchanged during a transfer (header + full block)
pub const MAX_PACKET_SIZE: usize = HEADER_SIZE + BLOCK_SIZE;

mod opcodes {
    pub const RRQ: u16 = 1;
    pub const WRQ: u16 = 2;
    pub const DATA: u16 = 3;
    pub const ACK: u16 = 4;
    pub const ERROR: u16 = 5;
}

/// Transfer mode named in a request
///
/// The mode is only carried on the wire. Payloads are always moved as raw
/// bytes, no netascii translation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Netascii,
    Octet,
    Mail,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Netascii => "netascii",
            Mode::Octet => "octet",
            Mode::Mail => "mail",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = PacketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("netascii") {
            Ok(Mode::Netascii)
        } else if s.eq_ignore_ascii_case("octet") {
            Ok(Mode::Octet)
        } else if s.eq_ignore_ascii_case("mail") {
            Ok(Mode::Mail)
        } else {
            Err(PacketError::InvalidMode(s.to_string()))
        }
    }
}

/// Which request opens a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
}

/// A TFTP protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq { filename: String, mode: Mode },
    Wrq { filename: String, mode: Mode },
    Data { block_num: u16, data: Vec<u8> },
    Ack(u16),
    Error { code: u16, msg: String },
}

impl Packet {
    /// Short name used in logs and protocol errors
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Rrq { .. } => "RRQ",
            Packet::Wrq { .. } => "WRQ",
            Packet::Data { .. } => "DATA",
            Packet::Ack(_) => "ACK",
            Packet::Error { .. } => "ERROR",
        }
    }

    /// Encode the packet into its wire representation
    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        match self {
            Packet::Rrq { filename, mode } => encode_request(RequestKind::Read, filename, *mode),
            Packet::Wrq { filename, mode } => encode_request(RequestKind::Write, filename, *mode),
            Packet::Data { block_num, data } => encode_data(*block_num, data),
            Packet::Ack(block_num) => Ok(encode_ack(*block_num).to_vec()),
            Packet::Error { code, msg } => {
                let mut buf = Vec::with_capacity(HEADER_SIZE + msg.len() + 1);
                buf.extend_from_slice(&opcodes::ERROR.to_be_bytes());
                buf.extend_from_slice(&code.to_be_bytes());
                buf.extend_from_slice(msg.as_bytes());
                buf.push(0);
                Ok(buf)
            }
        }
    }

    /// Decode a received datagram
    pub fn deserialize(buf: &[u8]) -> Result<Packet, PacketError> {
        if buf.len() < 2 {
            return Err(PacketError::Truncated {
                opcode: 0,
                len: buf.len(),
            });
        }
        let opcode = u16::from_be_bytes([buf[0], buf[1]]);

        match opcode {
            opcodes::RRQ | opcodes::WRQ => {
                let (filename, rest) = take_cstr(&buf[2..])?;
                let (mode, _) = take_cstr(rest)?;
                let mode = mode.parse()?;
                if opcode == opcodes::RRQ {
                    Ok(Packet::Rrq { filename, mode })
                } else {
                    Ok(Packet::Wrq { filename, mode })
                }
            }
            opcodes::DATA => {
                let block_num = read_block_num(opcode, buf)?;
                let data = &buf[HEADER_SIZE..];
                if data.len() > BLOCK_SIZE {
                    return Err(PacketError::OversizedPayload(data.len()));
                }
                Ok(Packet::Data {
                    block_num,
                    data: data.to_vec(),
                })
            }
            opcodes::ACK => Ok(Packet::Ack(read_block_num(opcode, buf)?)),
            opcodes::ERROR => {
                let code = read_block_num(opcode, buf)?;
                // The trailing NUL is optional, everything after the code is the message
                let raw = &buf[HEADER_SIZE..];
                let raw = raw.strip_suffix(b"\0").unwrap_or(raw);
                Ok(Packet::Error {
                    code,
                    msg: String::from_utf8_lossy(raw).into_owned(),
                })
            }
            _ => Err(PacketError::UnknownOpcode(opcode)),
        }
    }
}

/// Encode an RRQ or WRQ
///
/// Fails if the filename cannot be NUL-framed or the request would not fit
/// in a single 512-byte datagram.
pub fn encode_request(kind: RequestKind, filename: &str, mode: Mode) -> Result<Vec<u8>, PacketError> {
    if filename.as_bytes().contains(&0) {
        return Err(PacketError::MissingTerminator);
    }

    let opcode = match kind {
        RequestKind::Read => opcodes::RRQ,
        RequestKind::Write => opcodes::WRQ,
    };
    let mode = mode.as_str();
    let len = 2 + filename.len() + 1 + mode.len() + 1;
    if len > BLOCK_SIZE {
        return Err(PacketError::RequestTooLong(len));
    }

    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(&opcode.to_be_bytes());
    buf.extend_from_slice(filename.as_bytes());
    buf.push(0);
    buf.extend_from_slice(mode.as_bytes());
    buf.push(0);
    Ok(buf)
}

pub fn encode_ack(block_num: u16) -> [u8; HEADER_SIZE] {
    let [a, b] = opcodes::ACK.to_be_bytes();
    let [c, d] = block_num.to_be_bytes();
    [a, b, c, d]
}

pub fn encode_data(block_num: u16, data: &[u8]) -> Result<Vec<u8>, PacketError> {
    if data.len() > BLOCK_SIZE {
        return Err(PacketError::OversizedPayload(data.len()));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + data.len());
    buf.extend_from_slice(&opcodes::DATA.to_be_bytes());
    buf.extend_from_slice(&block_num.to_be_bytes());
    buf.extend_from_slice(data);
    Ok(buf)
}

fn read_block_num(opcode: u16, buf: &[u8]) -> Result<u16, PacketError> {
    if buf.len() < HEADER_SIZE {
        return Err(PacketError::Truncated {
            opcode,
            len: buf.len(),
        });
    }
    Ok(u16::from_be_bytes([buf[2], buf[3]]))
}

fn take_cstr(buf: &[u8]) -> Result<(String, &[u8]), PacketError> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or(PacketError::MissingTerminator)?;
    let s = std::str::from_utf8(&buf[..nul]).map_err(|_| PacketError::InvalidUtf8)?;
    Ok((s.to_string(), &buf[nul + 1..]))
}
