use std::io::{self, Read};

use super::session::{Session, TransferSummary};
use crate::tftp::core::{
    BLOCK_SIZE, Mode, Packet, RequestKind, TransferError, Transport, encode_data, encode_request,
};

/// Upload `source` to the server as `filename` (WRQ)
///
/// The server's ACK 0 to the request fixes its transfer ID, then blocks are
/// sent one at a time, each only after the previous one was acknowledged.
/// A final block shorter than 512 bytes is always sent, so a source whose
/// length is a multiple of 512 ends with an empty DATA packet.
pub fn upload<T, R>(
    session: &mut Session<'_, T>,
    filename: &str,
    mode: Mode,
    source: &mut R,
) -> Result<TransferSummary, TransferError>
where
    T: Transport + ?Sized,
    R: Read + ?Sized,
{
    let mut summary = TransferSummary::default();

    log::debug!("Sending WRQ for {} ({}) to {}", filename, mode, session.peer());
    session.send_request(encode_request(RequestKind::Write, filename, mode)?)?;
    await_ack(session, 0)?;

    let mut block_num: u16 = 1;
    let mut buf = [0u8; BLOCK_SIZE];
    loop {
        let len = read_block(source, &mut buf)?;
        let last_block_was_short = len < BLOCK_SIZE;

        session.send(encode_data(block_num, &buf[..len])?)?;
        await_ack(session, block_num)?;

        summary.bytes += len as u64;
        summary.blocks += 1;
        log::debug!("Block {} acknowledged ({} bytes)", block_num, len);

        if last_block_was_short {
            break;
        }
        block_num = block_num.wrapping_add(1);
    }

    summary.retransmits = session.retransmits();
    log::debug!("Transfer complete. Total bytes: {}", summary.bytes);
    Ok(summary)
}

/// Wait until the peer acknowledges `block_num`
///
/// Stale or duplicate ACKs and stray DATA/request packets are ignored and
/// never trigger a resend (Sorcerer's Apprentice, RFC 1123 4.2.3.1).
fn await_ack<T: Transport + ?Sized>(
    session: &mut Session<'_, T>,
    block_num: u16,
) -> Result<(), TransferError> {
    session.await_reply("ACK", |packet| match packet {
        Packet::Ack(n) if n == block_num => Ok(Some(())),
        Packet::Ack(n) => {
            log::debug!("Ignoring ACK {} while waiting for {}", n, block_num);
            Ok(None)
        }
        Packet::Error { code, msg } => Err(TransferError::ServerError { code, message: msg }),
        other => {
            log::warn!("Ignoring unexpected {} while waiting for ACK", other.name());
            Ok(None)
        }
    })
}

/// Fill `buf` from `source`, returning fewer bytes only at end of input
fn read_block<R: Read + ?Sized>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
