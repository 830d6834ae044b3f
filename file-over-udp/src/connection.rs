//! Sliding-window transfer engine: data phase + teardown + metrics.
//!
//! # Architecture
//!
//! ```text
//!   byte source (Read + Seek)
//!        │ admit_sends
//!        ▼
//!  ┌───────────────────────────────────────────────┐
//!  │ Transfer                                      │
//!  │   ├── TransmissionWindow  (in-flight map)     │
//!  │   ├── AckProcessor        (dup-ACK counting)  │
//!  │   ├── RetransmitTimer     (fixed RTO)         │
//!  │   ├── Teardown            (FIN/FINACK FSM)    │
//!  │   └── MetricsCollector    (delay samples)     │
//!  └────────────────────┬──────────────────────────┘
//!                       │ Segment datagrams
//!                  ┌────▼────┐
//!                  │ Socket  │  (ephemeral UDP port, owned per run)
//!                  └─────────┘
//! ```
//!
//! One run is a single cooperative loop: fill the window, then block on one
//! bounded receive (ACK or timeout), update state, repeat. Once the window
//! drains, the teardown handshake runs under an absolute deadline. The
//! socket belongs to the [`Transfer`] and is closed when it is dropped,
//! whichever way the run ends.
//!
//! ```ignore
//! let config = TransferConfig::new("127.0.0.1:5001".parse()?);
//! let report = Transfer::open(config, File::open("file.mp3")?).await?.run().await?;
//! println!("{:.7}", report.throughput);
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::SocketAddr;
use std::path::Path;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::ack::{AckOutcome, AckProcessor};
use crate::config::{ConfigError, TransferConfig};
use crate::metrics::{MetricsCollector, TransferReport, TransferStats};
use crate::packet::Segment;
use crate::socket::{RecvEvent, Socket, SocketError};
use crate::state::TransferPhase;
use crate::teardown::Teardown;
use crate::timer::{Deadline, RetransmitTimer};
use crate::window::TransmissionWindow;

/// Reasons a transfer run did not complete.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("source I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("file of {0} bytes does not fit the 32-bit sequence space")]
    FileTooLarge(u64),
    #[error("data phase did not complete within {0:?}")]
    DataPhaseTimeout(Duration),
    #[error("teardown handshake did not complete within {0:?}")]
    TeardownTimeout(Duration),
}

/// One file transfer from a fresh ephemeral socket.
pub struct Transfer<R> {
    socket: Socket,
    config: TransferConfig,
    source: R,
    phase: TransferPhase,
    window: TransmissionWindow,
    acks: AckProcessor,
    timer: RetransmitTimer,
    metrics: MetricsCollector,
    stats: TransferStats,
}

impl<R: Read + Seek> Transfer<R> {
    /// Validate `config`, size the source and bind a new socket.
    ///
    /// The throughput clock starts once the socket is bound.
    pub async fn open(config: TransferConfig, mut source: R) -> Result<Self, TransferError> {
        config.validate()?;
        let len = source.seek(SeekFrom::End(0))?;
        let total_bytes = i32::try_from(len).map_err(|_| TransferError::FileTooLarge(len))?;

        let window =
            TransmissionWindow::new(total_bytes, config.message_size(), config.window_size);
        let socket = Socket::bind_ephemeral().await?;
        let started = Instant::now();
        log::debug!(
            "[xfer] bound {} → {} bytes={} segments={} window={} rto={:?}",
            socket.local_addr,
            config.dest,
            window.total_bytes(),
            window.offsets().len(),
            window.capacity(),
            config.rto
        );

        Ok(Self {
            window,
            acks: AckProcessor::new(config.dup_ack_threshold),
            timer: RetransmitTimer::new(config.rto),
            metrics: MetricsCollector::new(started),
            stats: TransferStats::default(),
            phase: TransferPhase::Data,
            socket,
            config,
            source,
        })
    }

    /// Address of this run's ephemeral socket.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    /// Drive the transfer to completion and report its metrics.
    pub async fn run(mut self) -> Result<TransferReport, TransferError> {
        self.data_phase().await?;
        self.enter(TransferPhase::Teardown);
        self.teardown().await?;
        let finished = Instant::now();
        self.enter(TransferPhase::Finished);

        let bytes = self.window.total_bytes() as u64;
        let report = self.metrics.finish(bytes, finished, self.stats);
        log::info!(
            "[xfer] done bytes={} elapsed={:?} sent={} retx={} fast={} timeouts={}",
            bytes,
            report.elapsed,
            report.stats.segments_sent,
            report.stats.retransmissions,
            report.stats.fast_retransmits,
            report.stats.timeouts
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Data phase
    // -----------------------------------------------------------------------

    async fn data_phase(&mut self) -> Result<(), TransferError> {
        let deadline = self
            .config
            .data_timeout
            .map(|limit| (limit, Deadline::after(Instant::now(), limit)));

        loop {
            let fresh = self.window.admit_sends(&mut self.source, Instant::now())?;
            for seg in &fresh {
                self.transmit(seg).await?;
                log::debug!(
                    "[xfer] → DATA seq={} len={} in_flight={}",
                    seg.seq_id,
                    seg.payload.len(),
                    self.window.len()
                );
            }

            if self.window.is_complete() {
                return Ok(());
            }

            let now = Instant::now();
            let wait = match deadline {
                Some((limit, d)) if d.expired(now) => {
                    log::warn!("[xfer] data phase exceeded {limit:?}; giving up");
                    return Err(TransferError::DataPhaseTimeout(limit));
                }
                Some((_, d)) => d.clamp(self.timer.rto(), now),
                None => self.timer.rto(),
            };

            match self.socket.recv_timeout(wait).await? {
                RecvEvent::Segment(reply, _from) => self.on_reply(&reply).await?,
                RecvEvent::Malformed(e, from) => {
                    log::trace!("[xfer] dropping malformed datagram from {from}: {e}");
                }
                RecvEvent::TimedOut => {
                    self.stats.timeouts += 1;
                    let resend = self.timer.on_timeout(&mut self.window);
                    self.stats.retransmissions += resend.len() as u64;
                    for seg in &resend {
                        self.transmit(seg).await?;
                    }
                }
            }
        }
    }

    async fn on_reply(&mut self, reply: &Segment) -> Result<(), TransferError> {
        let outcome = self
            .acks
            .on_reply(reply, &mut self.window, &mut self.metrics, Instant::now());

        if let AckOutcome::Processed {
            ack,
            duplicates,
            fast_retransmit: Some(seg),
            ..
        } = outcome
        {
            log::debug!(
                "[xfer] {duplicates} duplicate ACKs for {ack}; fast retransmit seq={}",
                seg.seq_id
            );
            self.stats.fast_retransmits += 1;
            self.stats.retransmissions += 1;
            self.transmit(&seg).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    async fn teardown(&mut self) -> Result<(), TransferError> {
        let limit = self.config.teardown_timeout;
        let deadline = Deadline::after(Instant::now(), limit);
        let mut handshake = Teardown::new(self.window.total_bytes());

        loop {
            while let Some(seg) = handshake.poll_transmit() {
                self.transmit(&seg).await?;
                log::debug!(
                    "[xfer] → seq={} len={} ({})",
                    seg.seq_id,
                    seg.payload.len(),
                    handshake.state()
                );
            }
            if handshake.is_done() {
                return Ok(());
            }

            let now = Instant::now();
            if deadline.expired(now) {
                log::warn!(
                    "[xfer] teardown exceeded {limit:?} (acked={} fin={})",
                    handshake.peer_acked(),
                    handshake.peer_fin()
                );
                return Err(TransferError::TeardownTimeout(limit));
            }

            match self
                .socket
                .recv_timeout(deadline.clamp(self.timer.rto(), now))
                .await?
            {
                RecvEvent::Segment(reply, _from) => handshake.on_reply(&reply),
                RecvEvent::Malformed(e, from) => {
                    log::trace!("[xfer] dropping malformed datagram from {from}: {e}");
                }
                RecvEvent::TimedOut => {
                    self.stats.timeouts += 1;
                    handshake.on_timeout();
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn transmit(&mut self, seg: &Segment) -> Result<(), TransferError> {
        self.socket.send_to(seg, self.config.dest).await?;
        self.stats.segments_sent += 1;
        Ok(())
    }

    fn enter(&mut self, phase: TransferPhase) {
        log::debug!("[xfer] {} → {}", self.phase, phase);
        self.phase = phase;
    }
}

/// Send the file at `path` in a single run.
pub async fn send_file(
    path: impl AsRef<Path>,
    config: TransferConfig,
) -> Result<TransferReport, TransferError> {
    let file = File::open(path)?;
    Transfer::open(config, file).await?.run().await
}

/// Send the file at `path` `trials` times in sequence.
///
/// Every trial gets its own socket and state. The first failing trial
/// aborts the series.
pub async fn run_trials(
    path: impl AsRef<Path>,
    config: &TransferConfig,
    trials: usize,
) -> Result<Vec<TransferReport>, TransferError> {
    let path = path.as_ref();
    let mut reports = Vec::with_capacity(trials);
    for trial in 1..=trials {
        let report = send_file(path, config.clone()).await?;
        log::info!(
            "[xfer] trial {trial}/{trials}: throughput={:.7} delay={:.7} metric={:.7}",
            report.throughput,
            report.avg_delay,
            report.score
        );
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::packet::Token;

    fn config_to(dest: SocketAddr) -> TransferConfig {
        TransferConfig {
            rto: Duration::from_millis(20),
            teardown_timeout: Duration::from_millis(200),
            ..TransferConfig::new(dest)
        }
    }

    /// A bound-but-silent UDP port to aim at.
    async fn silent_peer() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_binding() {
        let config = TransferConfig::default().with_window_size(0);
        let err = Transfer::open(config, Cursor::new(vec![1u8])).await.err().unwrap();
        assert!(matches!(err, TransferError::Config(ConfigError::ZeroWindow)));
    }

    #[tokio::test]
    async fn open_starts_in_data_phase_on_ephemeral_port() {
        let peer = silent_peer().await;
        let t = Transfer::open(config_to(peer.local_addr), Cursor::new(vec![0u8; 10]))
            .await
            .unwrap();
        assert_eq!(t.phase(), TransferPhase::Data);
        assert_ne!(t.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn silent_peer_with_empty_file_times_out_in_teardown() {
        let peer = silent_peer().await;
        let t = Transfer::open(config_to(peer.local_addr), Cursor::new(Vec::new()))
            .await
            .unwrap();
        let err = t.run().await.err().unwrap();
        assert!(matches!(err, TransferError::TeardownTimeout(_)), "{err}");
    }

    #[tokio::test]
    async fn data_deadline_bounds_silent_peer() {
        let peer = silent_peer().await;
        let config = TransferConfig {
            data_timeout: Some(Duration::from_millis(100)),
            ..config_to(peer.local_addr)
        };
        let t = Transfer::open(config, Cursor::new(vec![0u8; 5000])).await.unwrap();
        let err = t.run().await.err().unwrap();
        assert!(matches!(err, TransferError::DataPhaseTimeout(_)), "{err}");
    }

    #[tokio::test]
    async fn noise_during_data_phase_changes_nothing() {
        let peer = silent_peer().await;
        let config = TransferConfig {
            rto: Duration::from_secs(2),
            teardown_timeout: Duration::from_secs(5),
            ..TransferConfig::new(peer.local_addr)
        }
        .with_window_size(1);

        // Before every ACK the peer sends a runt datagram, a stray `fin` and
        // a data-looking reply; none of them may move the window.
        let peer_task = tokio::spawn(async move {
            let mut seen = Vec::new();
            loop {
                let (seg, from) = match peer.recv_timeout(Duration::from_secs(3)).await.unwrap() {
                    RecvEvent::Segment(seg, from) => (seg, from),
                    other => panic!("unexpected {other:?}"),
                };
                match seg.token() {
                    Token::FinAck => return seen,
                    _ if seg.payload.is_empty() => {
                        peer.send_to(&Segment::ack(seg.seq_id), from).await.unwrap();
                        peer.send_to(&Segment::fin(seg.seq_id), from).await.unwrap();
                    }
                    _ => {
                        peer.send_raw(&[0xff, 0x01], from).await.unwrap();
                        peer.send_to(&Segment::fin(0), from).await.unwrap();
                        let echo = Segment::data(seg.seq_id, b"noise".to_vec());
                        peer.send_to(&echo, from).await.unwrap();
                        let next = seg.seq_id + seg.payload.len() as i32;
                        peer.send_to(&Segment::ack(next), from).await.unwrap();
                        seen.push(seg.seq_id);
                    }
                }
            }
        });

        let t = Transfer::open(config, Cursor::new(vec![3u8; 2500])).await.unwrap();
        let report = t.run().await.unwrap();
        let seen = peer_task.await.unwrap();

        assert_eq!(seen, vec![0, 1020, 2040]);
        assert_eq!(report.bytes, 2500);
        assert_eq!(report.stats.timeouts, 0);
        assert_eq!(report.stats.retransmissions, 0);
        assert_eq!(report.stats.fast_retransmits, 0);
        // 3 data + terminal + FINACK
        assert_eq!(report.stats.segments_sent, 5);
    }
}
