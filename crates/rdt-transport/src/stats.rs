//! # Transport Statistics
//!
//! Counters kept by each peer. Serializable so harnesses can export them
//! as JSON next to their own results.

use serde::Serialize;

// ─── Sender Stats ───────────────────────────────────────────────────────────

/// Sender-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Messages accepted from the upper layer.
    pub messages_accepted: u64,
    /// Payload bytes accepted from the upper layer.
    pub bytes_accepted: u64,
    /// Packets created by fragmentation.
    pub packets_created: u64,
    /// Transmissions handed to the link (first sends and retransmissions).
    pub transmissions: u64,
    /// Transmissions caused by a timeout.
    pub retransmissions: u64,
    /// Timer expiries with packets outstanding.
    pub timeouts: u64,
    /// Valid acks that acknowledged an in-flight packet.
    pub acks_received: u64,
    /// Valid acks outside the in-flight range.
    pub acks_stale: u64,
    /// Packets dropped by length or checksum validation.
    pub acks_rejected: u64,
    /// Highest window occupancy observed.
    pub peak_in_flight: usize,
}

impl SenderStats {
    /// Retransmissions per transmission.
    pub fn retransmit_ratio(&self) -> f64 {
        if self.transmissions == 0 {
            0.0
        } else {
            self.retransmissions as f64 / self.transmissions as f64
        }
    }
}

// ─── Receiver Stats ─────────────────────────────────────────────────────────

/// Receiver-side counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Packets handed in by the link, valid or not.
    pub packets_received: u64,
    /// Dropped for an out-of-range length byte.
    pub malformed: u64,
    /// Dropped for a checksum mismatch.
    pub checksum_failures: u64,
    /// Valid packets outside the receive window (acked, not stored).
    pub out_of_window: u64,
    /// Valid in-window packets whose slot was already filled.
    pub duplicates: u64,
    /// Acks returned to the link.
    pub acks_sent: u64,
    /// Messages delivered to the upper layer.
    pub messages_delivered: u64,
    /// Payload bytes delivered to the upper layer.
    pub bytes_delivered: u64,
    /// Highest number of messages held waiting for a gap to fill.
    pub peak_buffered: usize,
}

impl ReceiverStats {
    /// Share of received packets that produced a delivery.
    pub fn goodput_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            0.0
        } else {
            self.messages_delivered as f64 / self.packets_received as f64
        }
    }
}
