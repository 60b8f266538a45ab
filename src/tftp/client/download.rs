use std::io::Write;

use super::session::{Session, TransferSummary};
use crate::tftp::core::{
    BLOCK_SIZE, Mode, Packet, RequestKind, TransferError, Transport, encode_ack, encode_request,
};

/// Download `filename` from the server into `sink` (RRQ)
///
/// DATA blocks are accepted strictly in sequence. Each accepted block is
/// written to `sink` and then acknowledged. A block with any other number is
/// dropped without an ACK. The transfer ends after the first block shorter
/// than 512 bytes has been acknowledged.
pub fn download<T, W>(
    session: &mut Session<'_, T>,
    filename: &str,
    mode: Mode,
    sink: &mut W,
) -> Result<TransferSummary, TransferError>
where
    T: Transport + ?Sized,
    W: Write + ?Sized,
{
    let mut summary = TransferSummary::default();
    let mut expected_block: u16 = 1;

    log::debug!("Sending RRQ for {} ({}) to {}", filename, mode, session.peer());
    session.send_request(encode_request(RequestKind::Read, filename, mode)?)?;

    loop {
        let data = session.await_reply("DATA", |packet| match packet {
            Packet::Data { block_num, data } if block_num == expected_block => Ok(Some(data)),
            Packet::Data { block_num, .. } => {
                log::warn!(
                    "Received unexpected block {}, expected {}",
                    block_num,
                    expected_block
                );
                Ok(None)
            }
            Packet::Error { code, msg } => Err(TransferError::ServerError { code, message: msg }),
            other => Err(TransferError::ProtocolViolation {
                expected: "DATA",
                received: other.name().to_string(),
            }),
        })?;

        sink.write_all(&data)?;
        session.send(encode_ack(expected_block).to_vec())?;

        summary.bytes += data.len() as u64;
        summary.blocks += 1;
        log::debug!("Block {} received ({} bytes)", expected_block, data.len());

        // If data is less than block size, transfer is complete
        if data.len() < BLOCK_SIZE {
            break;
        }
        expected_block = expected_block.wrapping_add(1);
    }

    sink.flush()?;
    summary.retransmits = session.retransmits();
    log::debug!("Transfer complete. Total bytes: {}", summary.bytes);
    Ok(summary)
}
