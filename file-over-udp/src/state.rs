//! Transfer finite-state-machine types.
//!
//! A transfer moves through three coarse [`TransferPhase`]s. The teardown
//! phase has its own four-state machine, [`TeardownState`], driven by
//! [`crate::teardown::Teardown`].
//!
//! State types live in their own module so guard logic,
//! entry/exit actions and tracing stay out of the engine.

use std::fmt;

/// Where a transfer run currently is.
///
/// ```text
///  DATA ──window drained──▶ TEARDOWN ──FINACK sent──▶ FINISHED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    /// Filling the window and processing ACKs.
    #[default]
    Data,
    /// Exchanging termination messages with the peer.
    Teardown,
    /// Confirmation sent; metrics are final.
    Finished,
}

/// States of the post-data termination exchange.
///
/// ```text
///  SENDING_FIN ──sent──▶ AWAIT_FIN_ACK_AND_FIN ──ack(N) and fin seen──▶ SEND_FINACK ──sent──▶ DONE
///       ▲                        │
///       └────────timeout─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownState {
    /// The terminal segment is due for (re)transmission.
    #[default]
    SendingFin,
    /// Terminal segment sent; waiting for both the peer's ACK of it and the
    /// peer's own FIN, in either order.
    AwaitFinAckAndFin,
    /// Both seen; the confirmation is due.
    SendFinAck,
    /// Confirmation sent. Terminal.
    Done,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferPhase::Data => "DATA",
            TransferPhase::Teardown => "TEARDOWN",
            TransferPhase::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

impl fmt::Display for TeardownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TeardownState::SendingFin => "SENDING_FIN",
            TeardownState::AwaitFinAckAndFin => "AWAIT_FIN_ACK_AND_FIN",
            TeardownState::SendFinAck => "SEND_FINACK",
            TeardownState::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_initial_states() {
        assert_eq!(TransferPhase::default(), TransferPhase::Data);
        assert_eq!(TeardownState::default(), TeardownState::SendingFin);
    }

    #[test]
    fn display_uses_protocol_names() {
        assert_eq!(TeardownState::AwaitFinAckAndFin.to_string(), "AWAIT_FIN_ACK_AND_FIN");
        assert_eq!(TransferPhase::Teardown.to_string(), "TEARDOWN");
    }
}
