//! # Wire Format
//!
//! Every packet occupies exactly `packet_size` bytes, whatever it carries.
//!
//! ```text
//!  offset  0        1        2        3        4        5 ...
//!        +--------+--------+--------+--------+--------+----------------+
//!        | length |  seq   |  ack   |  checksum (LE)  |    payload     |
//!        +--------+--------+--------+--------+--------+----------------+
//! ```
//!
//! - `length`: payload bytes in use, `0..=packet_size - 5`
//! - `seq`: data sequence number, `0xFF` on an ack travelling back
//! - `ack`: acknowledged sequence number, `0xFF` when absent
//! - `checksum`: see [`crate::checksum`]; covers `length - 1` payload bytes
//!
//! Bytes past `5 + length` are zero on transmission and ignored on receipt.

use bytes::{BufMut, BytesMut};
use std::fmt;
use thiserror::Error;

use crate::checksum::payload_checksum;
use crate::config::{ACK_NONE, HEADER_SIZE};

const LEN_OFFSET: usize = 0;
const SEQ_OFFSET: usize = 1;
const ACK_OFFSET: usize = 2;
const CHECKSUM_OFFSET: usize = 3;

// ─── Rejection ───────────────────────────────────────────────────────────────

/// Why an incoming packet was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Declared payload length does not fit the packet.
    #[error("declared payload length {len} exceeds maximum {max}")]
    Malformed { len: usize, max: usize },
    /// Checksum over the covered payload does not match the header.
    #[error("checksum mismatch: header {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}

// ─── Packet ──────────────────────────────────────────────────────────────────

/// A fixed-capacity packet buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    buf: BytesMut,
}

impl Packet {
    /// Build a data packet carrying `payload` with sequence number `seq`.
    ///
    /// The ack field is set to [`ACK_NONE`] and the checksum is computed.
    /// A payload longer than the packet can describe is cut to the largest
    /// one that fits, and the length byte declares what was kept.
    pub fn data(seq: u8, payload: &[u8], packet_size: usize) -> Self {
        debug_assert!(packet_size > HEADER_SIZE);
        let max = packet_size
            .saturating_sub(HEADER_SIZE)
            .min(u8::MAX as usize);
        let payload = &payload[..payload.len().min(max)];

        let mut buf = BytesMut::with_capacity(packet_size);
        buf.put_u8(payload.len() as u8);
        buf.put_u8(seq);
        buf.put_u8(ACK_NONE);
        buf.put_u16_le(payload_checksum(payload));
        buf.put_slice(payload);
        buf.resize(packet_size, 0);
        Packet { buf }
    }

    /// Total packet size, header included.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Largest payload this packet can describe.
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.capacity() - HEADER_SIZE
    }

    /// Raw declared payload length (not validated).
    #[inline]
    pub fn payload_len(&self) -> usize {
        self.buf[LEN_OFFSET] as usize
    }

    #[inline]
    pub fn seq(&self) -> u8 {
        self.buf[SEQ_OFFSET]
    }

    #[inline]
    pub fn ack(&self) -> u8 {
        self.buf[ACK_OFFSET]
    }

    #[inline]
    pub fn checksum(&self) -> u16 {
        u16::from_le_bytes([self.buf[CHECKSUM_OFFSET], self.buf[CHECKSUM_OFFSET + 1]])
    }

    /// Payload bytes in use, clamped to the packet capacity.
    pub fn payload(&self) -> &[u8] {
        let len = self.payload_len().min(self.max_payload());
        &self.buf[HEADER_SIZE..HEADER_SIZE + len]
    }

    /// Whole packet as sent on the wire.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Mutable access to the raw bytes, for link impairments.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Structural and checksum validation, identical on both peers.
    pub fn validate(&self) -> Result<(), Rejection> {
        let len = self.payload_len();
        let max = self.max_payload();
        if len > max {
            return Err(Rejection::Malformed { len, max });
        }

        let expected = self.checksum();
        let actual = payload_checksum(self.payload());
        if expected != actual {
            return Err(Rejection::ChecksumMismatch { expected, actual });
        }
        Ok(())
    }

    /// Turn a received data packet into its acknowledgment, in place.
    ///
    /// The ack field takes the packet's own sequence number and the sequence
    /// field is invalidated. Payload and checksum are left untouched so the
    /// ack still validates at the sender.
    pub fn make_ack(&mut self) {
        let seq = self.seq();
        self.buf[SEQ_OFFSET] = ACK_NONE;
        self.buf[ACK_OFFSET] = seq;
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.payload_len())
            .field("seq", &self.seq())
            .field("ack", &self.ack())
            .field("checksum", &format_args!("{:#06x}", self.checksum()))
            .field("capacity", &self.capacity())
            .finish()
    }
}
