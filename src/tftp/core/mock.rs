//! Scripted in-memory transport for engine tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use super::socket::Transport;

#[derive(Debug, Clone)]
pub enum Incoming {
    Datagram { from: SocketAddr, bytes: Vec<u8> },
    Timeout,
}

/// Replays scripted receives and records every datagram sent
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    incoming: RefCell<VecDeque<Incoming>>,
    sent: RefCell<Vec<(SocketAddr, Vec<u8>)>>,
    timeouts: RefCell<Vec<Option<Duration>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, from: SocketAddr, bytes: impl Into<Vec<u8>>) -> &Self {
        self.incoming.borrow_mut().push_back(Incoming::Datagram {
            from,
            bytes: bytes.into(),
        });
        self
    }

    pub fn push_timeout(&self) -> &Self {
        self.incoming.borrow_mut().push_back(Incoming::Timeout);
        self
    }

    pub fn sent(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.sent.borrow().clone()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.incoming.borrow().len()
    }
}

impl Transport for ScriptedTransport {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        self.sent.borrow_mut().push((addr, buf.to_vec()));
        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        // An exhausted script behaves like a silent peer
        match self.incoming.borrow_mut().pop_front() {
            Some(Incoming::Datagram { from, bytes }) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok((n, from))
            }
            Some(Incoming::Timeout) | None => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "scripted timeout",
            )),
        }
    }

    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.timeouts.borrow_mut().push(timeout);
        Ok(())
    }
}
