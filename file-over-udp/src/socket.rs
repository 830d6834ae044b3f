//! Async UDP socket abstraction.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that speaks
//! [`crate::packet::Segment`] instead of raw bytes. All protocol logic lives
//! elsewhere; this module owns only byte I/O and the bounded receive that
//! drives retransmission.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{PacketError, Segment, PACKET_SIZE};

/// Errors that can arise from socket operations.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of one bounded receive.
#[derive(Debug)]
pub enum RecvEvent {
    /// A well-formed datagram arrived.
    Segment(Segment, SocketAddr),
    /// A datagram arrived but was too short to decode.
    Malformed(PacketError, SocketAddr),
    /// Nothing usable arrived before the timeout, or the transport reported
    /// a reset (which is handled the same way).
    TimedOut,
}

/// An async, segment-oriented UDP socket.
///
/// All methods are `&self` so the socket can be shared across tasks if needed.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Bind to an OS-chosen port on all interfaces.
    pub async fn bind_ephemeral() -> Result<Self, SocketError> {
        Self::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await
    }

    /// Encode `segment` and send it as a single UDP datagram to `dest`.
    pub async fn send_to(&self, segment: &Segment, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(&segment.encode(), dest).await?;
        Ok(())
    }

    /// Send raw bytes, bypassing the codec. Used by the fault simulator to
    /// replay held-back datagrams.
    pub async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }

    /// Receive one datagram, waiting at most `limit`.
    ///
    /// A connection reset reported by the transport is folded into
    /// [`RecvEvent::TimedOut`]; every other I/O error is returned.
    /// Datagrams longer than [`PACKET_SIZE`] are truncated to it.
    pub async fn recv_timeout(&self, limit: Duration) -> Result<RecvEvent, SocketError> {
        let mut buf = [0u8; PACKET_SIZE];
        match tokio::time::timeout(limit, self.inner.recv_from(&mut buf)).await {
            Err(_elapsed) => Ok(RecvEvent::TimedOut),
            Ok(Err(e)) if is_reset(&e) => {
                log::debug!("[socket] transport reset ({e}); treating as timeout");
                Ok(RecvEvent::TimedOut)
            }
            Ok(Err(e)) => Err(SocketError::Io(e)),
            Ok(Ok((n, addr))) => Ok(match Segment::decode(&buf[..n]) {
                Ok(segment) => RecvEvent::Segment(segment, addr),
                Err(e) => RecvEvent::Malformed(e, addr),
            }),
        }
    }
}

/// `true` for errors a UDP socket raises after an ICMP unreachable.
fn is_reset(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}
