//! Wire-format definitions for transfer segments.
//!
//! Every datagram exchanged between sender and receiver is a [`Segment`].
//! This module is responsible for:
//! - Defining the on-wire binary layout (sequence id, payload).
//! - Serialising a [`Segment`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Segment`], returning an
//!   error for truncated input.
//! - Naming the application tokens carried by control replies ([`Token`]).
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! The sequence id is a **big-endian, two's-complement** signed integer.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                          Sequence Id                          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                 Payload / token (0..=1020 bytes)              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! There is no length field: the payload length is whatever remains of the
//! datagram after the sequence id.

use thiserror::Error;

/// Total datagram size, sequence id included.
pub const PACKET_SIZE: usize = 1024;

/// Bytes reserved for the sequence id.
pub const SEQ_ID_SIZE: usize = 4;

/// Bytes available for payload in a single segment.
pub const MESSAGE_SIZE: usize = PACKET_SIZE - SEQ_ID_SIZE;

/// Literal payload of the termination confirmation.
pub const FINACK_TOKEN: &[u8] = b"==FINACK==";

const ACK_PREFIX: &[u8] = b"ack";
const FIN_PREFIX: &[u8] = b"fin";

/// A single datagram: signed sequence id followed by payload bytes.
///
/// For data segments `seq_id` is the byte offset of the first payload byte
/// within the file; for control segments it is a protocol-defined value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq_id: i32,
    pub payload: Vec<u8>,
}

/// Application-level meaning of a segment's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// Cumulative acknowledgment; `seq_id` is the next expected byte.
    Ack,
    /// Peer signals it is finished.
    Fin,
    /// Sender's final termination confirmation.
    FinAck,
    /// Anything else: file bytes, or an empty terminal segment.
    Data,
}

impl Token {
    /// Classify a payload by its leading token.
    ///
    /// `FinAck` must match exactly; `Ack` and `Fin` only need the prefix.
    pub fn classify(payload: &[u8]) -> Self {
        if payload == FINACK_TOKEN {
            Token::FinAck
        } else if payload.starts_with(ACK_PREFIX) {
            Token::Ack
        } else if payload.starts_with(FIN_PREFIX) {
            Token::Fin
        } else {
            Token::Data
        }
    }
}

impl Segment {
    /// A data segment carrying `payload` at byte offset `offset`.
    pub fn data(offset: i32, payload: Vec<u8>) -> Self {
        Self {
            seq_id: offset,
            payload,
        }
    }

    /// The empty segment that closes the data phase.
    pub fn terminal(total_bytes: i32) -> Self {
        Self {
            seq_id: total_bytes,
            payload: Vec::new(),
        }
    }

    /// A cumulative acknowledgment for everything below `next_expected`.
    pub fn ack(next_expected: i32) -> Self {
        Self {
            seq_id: next_expected,
            payload: ACK_PREFIX.to_vec(),
        }
    }

    /// A peer termination signal.
    pub fn fin(seq_id: i32) -> Self {
        Self {
            seq_id,
            payload: FIN_PREFIX.to_vec(),
        }
    }

    /// The termination confirmation. Its sequence id carries no meaning.
    pub fn finack() -> Self {
        Self {
            seq_id: 0,
            payload: FINACK_TOKEN.to_vec(),
        }
    }

    /// The token this segment carries.
    pub fn token(&self) -> Token {
        Token::classify(&self.payload)
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(SEQ_ID_SIZE + self.payload.len());
        buf.extend_from_slice(&self.seq_id.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Segment`] from a raw datagram.
    ///
    /// Returns [`PacketError::BufferTooShort`] if `buf` cannot hold a
    /// sequence id. Any trailing bytes, including none, form the payload.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        let (id, rest) = buf
            .split_first_chunk::<SEQ_ID_SIZE>()
            .ok_or(PacketError::BufferTooShort(buf.len()))?;
        Ok(Self {
            seq_id: i32::from_be_bytes(*id),
            payload: rest.to_vec(),
        })
    }

    /// Byte offset one past the end of this segment's payload.
    ///
    /// Widened to `i64` so a segment ending exactly at `i32::MAX` does not
    /// overflow.
    pub fn end(&self) -> i64 {
        i64::from(self.seq_id) + self.payload.len() as i64
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("datagram of {0} bytes is too short to contain a sequence id")]
    BufferTooShort(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_size_constant_is_correct() {
        assert_eq!(MESSAGE_SIZE, 1020);
    }

    #[test]
    fn seq_id_big_endian_on_wire() {
        let bytes = Segment::data(0x0102_0304, b"xy".to_vec()).encode();
        assert_eq!(&bytes[..4], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[4..], b"xy");
    }

    #[test]
    fn negative_seq_id_is_twos_complement() {
        let bytes = Segment::data(-1, vec![]).encode();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff]);
        assert_eq!(Segment::decode(&bytes).unwrap().seq_id, -1);
    }

    #[test]
    fn decode_short_buffer_returns_error() {
        assert_eq!(Segment::decode(&[]), Err(PacketError::BufferTooShort(0)));
        assert_eq!(
            Segment::decode(&[0, 0, 1]),
            Err(PacketError::BufferTooShort(3))
        );
    }

    #[test]
    fn decode_header_only_yields_empty_payload() {
        let seg = Segment::decode(&[0, 0, 0x09, 0xc4]).unwrap();
        assert_eq!(seg.seq_id, 2500);
        assert!(seg.payload.is_empty());
    }

    #[test]
    fn terminal_segment_is_header_only() {
        let bytes = Segment::terminal(2500).encode();
        assert_eq!(bytes.len(), SEQ_ID_SIZE);
    }

    #[test]
    fn classify_tokens() {
        assert_eq!(Token::classify(b"ack"), Token::Ack);
        assert_eq!(Token::classify(b"ack-extra"), Token::Ack);
        assert_eq!(Token::classify(b"fin"), Token::Fin);
        assert_eq!(Token::classify(b"finished"), Token::Fin);
        assert_eq!(Token::classify(b"==FINACK=="), Token::FinAck);
        assert_eq!(Token::classify(b""), Token::Data);
        assert_eq!(Token::classify(b"hello"), Token::Data);
        // FINACK must match exactly, not just as a prefix.
        assert_eq!(Token::classify(b"==FINACK==!"), Token::Data);
    }

    #[test]
    fn finack_carries_literal_token() {
        let bytes = Segment::finack().encode();
        assert_eq!(&bytes[SEQ_ID_SIZE..], FINACK_TOKEN);
    }

    #[test]
    fn end_does_not_overflow_at_i32_max() {
        let seg = Segment::data(i32::MAX - 1, vec![0u8; 10]);
        assert_eq!(seg.end(), i64::from(i32::MAX) + 9);
    }
}
