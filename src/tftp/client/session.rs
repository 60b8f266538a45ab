use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::tftp::core::{MAX_PACKET_SIZE, Packet, PacketError, TransferError, Transport, is_timeout};

/// Upper bound on a single backed-off wait, unless the base timeout is larger
const MAX_BACKOFF_WAIT: Duration = Duration::from_secs(60);

/// Retransmission policy shared by downloads and uploads
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// How long to wait for the first reply
    pub timeout: Duration,
    /// Retransmissions allowed before giving up
    pub retries: u32,
    /// Wait multiplier applied after every retransmission
    pub backoff: f32,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            backoff: 1.0,
        }
    }

    pub fn with_backoff(mut self, backoff: f32) -> Self {
        self.backoff = backoff;
        self
    }

    /// Total number of waits before a transfer times out
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Wait applied to the given attempt, counted from zero
    pub fn wait_for(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.backoff.is_nan() || self.backoff <= 1.0 {
            return self.timeout;
        }

        let factor = f64::from(self.backoff).powi(attempt.min(i32::MAX as u32) as i32);
        let cap = MAX_BACKOFF_WAIT.max(self.timeout);
        Duration::try_from_secs_f64(self.timeout.as_secs_f64() * factor)
            .unwrap_or(cap)
            .min(cap)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 5)
    }
}

/// Counters reported once a transfer completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub bytes: u64,
    pub blocks: u64,
    pub retransmits: u32,
}

/// State shared by one request/response exchange with a server
///
/// The session starts out talking to the configured server address. The
/// source of the first reply becomes the peer's transfer ID and every later
/// packet is sent to, and only accepted from, that address.
pub struct Session<'a, T: Transport + ?Sized> {
    transport: &'a T,
    server: SocketAddr,
    peer: Option<SocketAddr>,
    policy: RetryPolicy,
    last_sent: Option<(SocketAddr, Vec<u8>)>,
    retransmits: u32,
    buf: [u8; MAX_PACKET_SIZE],
}

impl<'a, T: Transport + ?Sized> Session<'a, T> {
    pub fn new(transport: &'a T, server: SocketAddr, policy: RetryPolicy) -> Self {
        Self {
            transport,
            server,
            peer: None,
            policy,
            last_sent: None,
            retransmits: 0,
            buf: [0u8; MAX_PACKET_SIZE],
        }
    }

    /// Address outgoing packets currently go to
    pub fn peer(&self) -> SocketAddr {
        self.peer.unwrap_or(self.server)
    }

    pub fn retransmits(&self) -> u32 {
        self.retransmits
    }

    /// Send the opening request to the configured server address
    pub fn send_request(&mut self, packet: Vec<u8>) -> Result<(), TransferError> {
        self.transmit(self.server, packet)
    }

    /// Send a packet to the bound peer
    pub fn send(&mut self, packet: Vec<u8>) -> Result<(), TransferError> {
        self.transmit(self.peer(), packet)
    }

    fn transmit(&mut self, dest: SocketAddr, packet: Vec<u8>) -> Result<(), TransferError> {
        self.transport.send_to(&packet, dest)?;
        self.last_sent = Some((dest, packet));
        Ok(())
    }

    fn retransmit(&mut self) -> Result<(), TransferError> {
        if let Some((dest, packet)) = &self.last_sent {
            self.transport.send_to(packet, *dest)?;
            self.retransmits += 1;
        }
        Ok(())
    }

    /// Wait for the reply to the last packet sent
    ///
    /// `accept` decides what to do with each packet: `Ok(Some(_))` ends the
    /// wait, `Ok(None)` drops the packet and keeps waiting within the same
    /// deadline, and an error aborts the transfer. When a deadline expires
    /// the last packet is sent again, up to the policy's retry limit.
    pub fn await_reply<R>(
        &mut self,
        expecting: &'static str,
        mut accept: impl FnMut(Packet) -> Result<Option<R>, TransferError>,
    ) -> Result<R, TransferError> {
        for attempt in 0..self.policy.attempts() {
            if attempt > 0 {
                log::warn!(
                    "No {} from {} (attempt {}/{}), retransmitting",
                    expecting,
                    self.peer(),
                    attempt,
                    self.policy.attempts()
                );
                self.retransmit()?;
            }

            let deadline = Instant::now() + self.policy.wait_for(attempt);
            while let Some(packet) = self.recv_until(deadline, expecting)? {
                if let Some(reply) = accept(packet)? {
                    return Ok(reply);
                }
            }
        }

        Err(TransferError::NetworkTimeout {
            attempts: self.policy.attempts(),
        })
    }

    /// Receive one packet from the peer, or `None` once `deadline` passes
    fn recv_until(
        &mut self,
        deadline: Instant,
        expecting: &'static str,
    ) -> Result<Option<Packet>, TransferError> {
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            self.transport.set_read_timeout(Some(remaining))?;

            let (amt, from) = match self.transport.recv_from(&mut self.buf) {
                Ok(received) => received,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

            match self.peer {
                None => {
                    if from != self.server {
                        log::debug!("Server answered from {}, binding transfer to it", from);
                    }
                    self.peer = Some(from);
                }
                Some(peer) if peer != from => {
                    log::warn!(
                        "Ignoring {} byte datagram from unknown transfer ID {}",
                        amt,
                        from
                    );
                    continue;
                }
                Some(_) => {}
            }

            return match Packet::deserialize(&self.buf[..amt]) {
                Ok(packet) => {
                    log::trace!("Received {} ({} bytes) from {}", packet.name(), amt, from);
                    Ok(Some(packet))
                }
                Err(PacketError::UnknownOpcode(opcode)) => Err(TransferError::ProtocolViolation {
                    expected: expecting,
                    received: format!("opcode {}", opcode),
                }),
                Err(e) => Err(e.into()),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::core::encode_ack;
    use crate::tftp::core::mock::ScriptedTransport;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_secs(5), retries)
    }

    fn expect_ack(packet: Packet) -> Result<Option<u16>, TransferError> {
        match packet {
            Packet::Ack(n) => Ok(Some(n)),
            _ => Ok(None),
        }
    }

    #[test]
    fn constant_wait_without_backoff() {
        let policy = RetryPolicy::new(Duration::from_secs(5), 3);
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.wait_for(0), Duration::from_secs(5));
        assert_eq!(policy.wait_for(3), Duration::from_secs(5));
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let policy = RetryPolicy::new(Duration::from_secs(1), 10).with_backoff(2.0);
        assert_eq!(policy.wait_for(0), Duration::from_secs(1));
        assert_eq!(policy.wait_for(1), Duration::from_secs(2));
        assert_eq!(policy.wait_for(3), Duration::from_secs(8));
        assert_eq!(policy.wait_for(30), MAX_BACKOFF_WAIT);

        let nan = RetryPolicy::new(Duration::from_secs(1), 1).with_backoff(f32::NAN);
        assert_eq!(nan.wait_for(1), Duration::from_secs(1));
    }

    #[test]
    fn first_reply_binds_peer() {
        let server = addr(69);
        let tid = addr(40000);
        let transport = ScriptedTransport::new();
        transport.push(tid, encode_ack(0));

        let mut session = Session::new(&transport, server, policy(0));
        session.send_request(b"req".to_vec()).unwrap();
        assert_eq!(session.peer(), server);

        assert_eq!(session.await_reply("ACK", expect_ack).unwrap(), 0);
        assert_eq!(session.peer(), tid);

        session.send(encode_ack(1).to_vec()).unwrap();
        let sent = transport.sent();
        assert_eq!(sent[0].0, server);
        assert_eq!(sent[1].0, tid);
    }

    #[test]
    fn foreign_tid_is_ignored() {
        let tid = addr(40000);
        let transport = ScriptedTransport::new();
        transport
            .push(tid, encode_ack(0))
            .push(addr(40001), encode_ack(1))
            .push(tid, encode_ack(2));

        let mut session = Session::new(&transport, addr(69), policy(0));
        session.send_request(b"req".to_vec()).unwrap();
        assert_eq!(session.await_reply("ACK", expect_ack).unwrap(), 0);
        assert_eq!(session.await_reply("ACK", expect_ack).unwrap(), 2);
        assert_eq!(session.retransmits(), 0);
    }

    #[test]
    fn timeout_retransmits_last_packet() {
        let transport = ScriptedTransport::new();
        transport.push_timeout().push(addr(69), encode_ack(0));

        let mut session = Session::new(&transport, addr(69), policy(1));
        session.send_request(b"req".to_vec()).unwrap();
        assert_eq!(session.await_reply("ACK", expect_ack).unwrap(), 0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(session.retransmits(), 1);
    }

    #[test]
    fn exhausted_retries_time_out() {
        let transport = ScriptedTransport::new();
        let mut session = Session::new(&transport, addr(69), policy(2));
        session.send_request(b"req".to_vec()).unwrap();

        let err = session.await_reply("ACK", expect_ack).unwrap_err();
        assert!(matches!(err, TransferError::NetworkTimeout { attempts: 3 }));
        assert_eq!(transport.sent().len(), 3);
    }

    #[test]
    fn unknown_opcode_is_protocol_violation() {
        let transport = ScriptedTransport::new();
        transport.push(addr(69), vec![0, 99, 0, 1]);

        let mut session = Session::new(&transport, addr(69), policy(0));
        session.send_request(b"req".to_vec()).unwrap();
        let err = session.await_reply("ACK", expect_ack).unwrap_err();
        assert!(matches!(
            err,
            TransferError::ProtocolViolation { expected: "ACK", .. }
        ));
    }

    #[test]
    fn truncated_datagram_is_malformed() {
        let transport = ScriptedTransport::new();
        transport.push(addr(69), vec![0, 4, 0]);

        let mut session = Session::new(&transport, addr(69), policy(0));
        session.send_request(b"req".to_vec()).unwrap();
        let err = session.await_reply("ACK", expect_ack).unwrap_err();
        assert!(matches!(err, TransferError::MalformedPacket(_)));
    }
}
