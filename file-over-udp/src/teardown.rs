//! Four-way termination handshake.
//!
//! Once every data byte is acknowledged the sender:
//!
//! 1. sends the terminal segment (`seq_id = total_bytes`, empty payload),
//! 2. waits until the peer has both acknowledged it (`ack` with id
//!    `total_bytes`) and sent its own `fin`, resending the terminal segment
//!    after every receive timeout,
//! 3. sends `==FINACK==` exactly once and stops.
//!
//! [`Teardown`] is the pure state machine; the caller supplies replies and
//! timeouts and transmits whatever [`Teardown::poll_transmit`] hands back.
//! The absolute deadline is enforced by the caller.

use crate::packet::{Segment, Token};
use crate::state::TeardownState;

#[derive(Debug)]
pub struct Teardown {
    state: TeardownState,
    total_bytes: i32,
    peer_acked: bool,
    peer_fin: bool,
    fin_sends: u32,
}

impl Teardown {
    pub fn new(total_bytes: i32) -> Self {
        Self {
            state: TeardownState::SendingFin,
            total_bytes,
            peer_acked: false,
            peer_fin: false,
            fin_sends: 0,
        }
    }

    pub fn state(&self) -> TeardownState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == TeardownState::Done
    }

    /// The peer acknowledged the terminal segment.
    pub fn peer_acked(&self) -> bool {
        self.peer_acked
    }

    /// The peer sent its own termination signal.
    pub fn peer_fin(&self) -> bool {
        self.peer_fin
    }

    /// How many times the terminal segment has been handed out.
    pub fn fin_sends(&self) -> u32 {
        self.fin_sends
    }

    /// The segment due for transmission now, if any.
    ///
    /// Each call that returns a segment also advances the state, so the
    /// confirmation is returned at most once over the handshake's life.
    pub fn poll_transmit(&mut self) -> Option<Segment> {
        match self.state {
            TeardownState::SendingFin => {
                self.fin_sends += 1;
                self.state = TeardownState::AwaitFinAckAndFin;
                Some(Segment::terminal(self.total_bytes))
            }
            TeardownState::SendFinAck => {
                self.state = TeardownState::Done;
                Some(Segment::finack())
            }
            TeardownState::AwaitFinAckAndFin | TeardownState::Done => None,
        }
    }

    /// A receive timed out: the terminal segment is due again.
    pub fn on_timeout(&mut self) {
        if self.state == TeardownState::AwaitFinAckAndFin {
            self.state = TeardownState::SendingFin;
        }
    }

    /// Fold one decoded reply into the handshake.
    pub fn on_reply(&mut self, reply: &Segment) {
        if matches!(self.state, TeardownState::SendFinAck | TeardownState::Done) {
            return;
        }
        match reply.token() {
            Token::Ack if reply.seq_id == self.total_bytes => self.peer_acked = true,
            Token::Fin => self.peer_fin = true,
            _ => {
                log::trace!("[teardown] ignoring reply seq={}", reply.seq_id);
                return;
            }
        }
        log::debug!(
            "[teardown] ← seq={} acked={} fin={}",
            reply.seq_id,
            self.peer_acked,
            self.peer_fin
        );
        if self.peer_acked && self.peer_fin {
            self.state = TeardownState::SendFinAck;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::FINACK_TOKEN;

    /// Events a scripted peer can produce.
    enum Ev {
        Reply(Segment),
        Timeout,
    }

    /// Drive the machine the way the engine does and collect every segment
    /// it transmits.
    fn drive(td: &mut Teardown, script: Vec<Ev>) -> Vec<Segment> {
        let mut sent = Vec::new();
        let mut script = script.into_iter();
        loop {
            while let Some(seg) = td.poll_transmit() {
                sent.push(seg);
            }
            if td.is_done() {
                break;
            }
            match script.next() {
                Some(Ev::Reply(seg)) => td.on_reply(&seg),
                Some(Ev::Timeout) => td.on_timeout(),
                None => break,
            }
        }
        sent
    }

    fn finacks(sent: &[Segment]) -> usize {
        sent.iter().filter(|s| s.payload == FINACK_TOKEN).count()
    }

    #[test]
    fn ack_then_fin_completes() {
        let mut td = Teardown::new(2500);
        let sent = drive(
            &mut td,
            vec![Ev::Reply(Segment::ack(2500)), Ev::Reply(Segment::fin(2500))],
        );
        assert!(td.is_done());
        assert_eq!(sent, vec![Segment::terminal(2500), Segment::finack()]);
    }

    #[test]
    fn fin_then_ack_completes() {
        let mut td = Teardown::new(2500);
        let sent = drive(
            &mut td,
            vec![Ev::Reply(Segment::fin(7)), Ev::Reply(Segment::ack(2500))],
        );
        assert!(td.is_done());
        assert_eq!(finacks(&sent), 1);
    }

    #[test]
    fn timeouts_resend_terminal_segment_only() {
        let mut td = Teardown::new(100);
        let sent = drive(
            &mut td,
            vec![
                Ev::Timeout,
                Ev::Reply(Segment::fin(100)),
                Ev::Timeout,
                Ev::Timeout,
                Ev::Reply(Segment::ack(100)),
                Ev::Timeout,
            ],
        );
        assert!(td.is_done());
        assert_eq!(td.fin_sends(), 4);
        assert_eq!(finacks(&sent), 1);
        assert_eq!(sent.last(), Some(&Segment::finack()));
    }

    #[test]
    fn ack_for_wrong_offset_does_not_count() {
        let mut td = Teardown::new(2500);
        drive(
            &mut td,
            vec![Ev::Reply(Segment::ack(2040)), Ev::Reply(Segment::fin(0))],
        );
        assert!(!td.peer_acked());
        assert!(td.peer_fin());
        assert_eq!(td.state(), TeardownState::AwaitFinAckAndFin);
    }

    #[test]
    fn noise_is_ignored() {
        let mut td = Teardown::new(10);
        drive(
            &mut td,
            vec![
                Ev::Reply(Segment::data(10, b"hello".to_vec())),
                Ev::Reply(Segment::finack()),
            ],
        );
        assert!(!td.peer_acked() && !td.peer_fin());
    }

    #[test]
    fn replies_after_done_change_nothing() {
        let mut td = Teardown::new(0);
        drive(&mut td, vec![Ev::Reply(Segment::ack(0)), Ev::Reply(Segment::fin(0))]);
        assert!(td.is_done());

        td.on_reply(&Segment::fin(0));
        td.on_timeout();
        assert!(td.poll_transmit().is_none());
        assert_eq!(td.state(), TeardownState::Done);
    }

    #[test]
    fn duplicated_replies_send_one_confirmation() {
        let mut td = Teardown::new(50);
        let sent = drive(
            &mut td,
            vec![
                Ev::Reply(Segment::ack(50)),
                Ev::Reply(Segment::ack(50)),
                Ev::Reply(Segment::fin(50)),
                Ev::Reply(Segment::fin(50)),
            ],
        );
        assert_eq!(finacks(&sent), 1);
        assert_eq!(td.fin_sends(), 1);
    }
}
