//! # Receiver State Machine
//!
//! Pure logic with no I/O. Validates packets from the link, acknowledges every
//! one that passes, holds out-of-order payloads in a slot per sequence
//! number and releases them upward strictly in order, exactly once.
//!
//! ```text
//!  slots:  [ . | . | B | . | D | . | ... ]      indexed by seq
//!                ^ next_expected
//!  arrival of seq 1 fills the gap: deliver 1, 2, slide twice,
//!  D stays until 3 arrives.
//! ```
//!
//! Acks are emitted even for duplicates and for packets outside the window:
//! the sender only learns that a transmission round-tripped from an ack,
//! and after a lost ack the retransmitted copy is all it will get.

use std::collections::VecDeque;

use bytes::Bytes;
use tracing::{debug, info, trace};

use crate::config::ProtocolConfig;
use crate::stats::ReceiverStats;
use crate::window::SeqWindow;
use crate::wire::{Packet, Rejection};

// ─── Receiver Events ────────────────────────────────────────────────────────

/// Work the receiver asks its environment to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiverEvent {
    /// Return this acknowledgment to the link.
    Ack(Packet),
    /// Hand this message to the upper layer.
    Deliver(Bytes),
}

// ─── Receiver ───────────────────────────────────────────────────────────────

/// Receiver state machine.
pub struct Receiver {
    config: ProtocolConfig,
    window: SeqWindow,
    /// Reassembled payloads awaiting in-order release, indexed by seq.
    slots: Vec<Option<Bytes>>,
    events: VecDeque<ReceiverEvent>,
    stats: ReceiverStats,
}

impl Receiver {
    /// Create a receiver with the given protocol parameters.
    pub fn new(config: ProtocolConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid protocol config");

        Receiver {
            config,
            window: SeqWindow::new(config.window_size, config.seq_space),
            slots: vec![None; config.seq_space as usize],
            events: VecDeque::new(),
            stats: ReceiverStats::default(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start-of-session hook. Puts the receiver in its initial state.
    pub fn init(&mut self) {
        *self = Receiver::new(self.config);
        info!(
            window = self.config.window_size,
            seq_space = self.config.seq_space,
            "receiver initializing"
        );
    }

    /// End-of-session hook. Returns the final counters.
    pub fn finalize(&mut self) -> ReceiverStats {
        info!(
            delivered = self.stats.messages_delivered,
            bytes = self.stats.bytes_delivered,
            held = self.buffered(),
            "receiver finalizing"
        );
        self.stats.clone()
    }

    // ─── Lower Layer ─────────────────────────────────────────────────────

    /// Process a packet arriving from the link.
    pub fn receive(&mut self, packet: Packet) {
        self.stats.packets_received += 1;

        if let Err(reason) = packet.validate() {
            match reason {
                Rejection::Malformed { .. } => self.stats.malformed += 1,
                Rejection::ChecksumMismatch { .. } => self.stats.checksum_failures += 1,
            }
            debug!(%reason, "receiver dropped invalid packet");
            return;
        }

        let seq = packet.seq();
        let payload = Bytes::copy_from_slice(packet.payload());

        let mut ack = packet;
        ack.make_ack();
        self.events.push_back(ReceiverEvent::Ack(ack));
        self.stats.acks_sent += 1;

        if !self.window.contains(seq) {
            self.stats.out_of_window += 1;
            debug!(
                seq,
                begin = self.window.begin(),
                end = self.window.end(),
                "out-of-window packet acked and dropped"
            );
            return;
        }

        let slot = &mut self.slots[seq as usize];
        if slot.is_some() {
            self.stats.duplicates += 1;
            debug!(seq, "duplicate packet acked and dropped");
            return;
        }
        *slot = Some(payload);
        self.window.occupy();
        self.stats.peak_buffered = self.stats.peak_buffered.max(self.window.occupancy());

        let delivered = self.drain_in_order();
        debug!(
            seq,
            delivered,
            next_expected = self.next_expected(),
            held = self.buffered(),
            "packet accepted"
        );
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// Drain events produced by the handlers, in order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = ReceiverEvent> + '_ {
        self.events.drain(..)
    }

    /// Number of undrained events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // ─── Inspection ──────────────────────────────────────────────────────

    /// Sequence number of the next in-order delivery.
    pub fn next_expected(&self) -> u8 {
        self.window.begin()
    }

    /// Messages held waiting for an earlier gap to fill.
    pub fn buffered(&self) -> usize {
        self.window.occupancy()
    }

    pub fn window(&self) -> &SeqWindow {
        &self.window
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn stats(&self) -> &ReceiverStats {
        &self.stats
    }

    // ─── Internal Helpers ────────────────────────────────────────────────

    /// Deliver every contiguous filled slot starting at the cursor.
    fn drain_in_order(&mut self) -> usize {
        let mut delivered = 0;
        while let Some(msg) = self.slots[self.window.begin() as usize].take() {
            trace!(seq = self.window.begin(), len = msg.len(), "deliver");
            self.stats.messages_delivered += 1;
            self.stats.bytes_delivered += msg.len() as u64;
            self.events.push_back(ReceiverEvent::Deliver(msg));
            self.window.release();
            self.window.slide_forward(1);
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ACK_NONE, HEADER_SIZE};
    use std::time::Duration;

    fn test_config(window_size: u8, seq_space: u8) -> ProtocolConfig {
        ProtocolConfig::new(window_size, seq_space, 32, Duration::from_millis(100)).unwrap()
    }

    fn data(seq: u8, payload: &[u8]) -> Packet {
        Packet::data(seq, payload, 32)
    }

    /// Acked seqs and delivered messages, in order.
    fn split_events(receiver: &mut Receiver) -> (Vec<u8>, Vec<Bytes>) {
        let mut acks = Vec::new();
        let mut delivered = Vec::new();
        for ev in receiver.drain_events() {
            match ev {
                ReceiverEvent::Ack(p) => {
                    assert_eq!(p.seq(), ACK_NONE);
                    assert!(p.validate().is_ok());
                    acks.push(p.ack());
                }
                ReceiverEvent::Deliver(m) => delivered.push(m),
            }
        }
        (acks, delivered)
    }

    // ─── In-Order Delivery ──────────────────────────────────────────────

    #[test]
    fn in_order_packet_is_acked_and_delivered() {
        let mut rx = Receiver::new(test_config(10, 25));
        rx.receive(data(0, b"hello"));

        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![0]);
        assert_eq!(delivered, vec![Bytes::from_static(b"hello")]);
        assert_eq!(rx.next_expected(), 1);
        assert_eq!(rx.buffered(), 0);
    }

    #[test]
    fn gap_fill_drains_in_one_pass() {
        let mut rx = Receiver::new(test_config(10, 25));

        rx.receive(data(2, b"two"));
        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![2]);
        assert!(delivered.is_empty());
        assert_eq!(rx.buffered(), 1);

        rx.receive(data(0, b"zero"));
        let (_, delivered) = split_events(&mut rx);
        assert_eq!(delivered, vec![Bytes::from_static(b"zero")]);

        rx.receive(data(1, b"one"));
        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![1]);
        assert_eq!(
            delivered,
            vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]
        );
        assert_eq!(rx.next_expected(), 3);
        assert_eq!(rx.stats().peak_buffered, 1);
    }

    #[test]
    fn delayed_head_releases_whole_run() {
        let mut rx = Receiver::new(test_config(10, 25));
        rx.receive(data(2, b"c"));
        rx.receive(data(1, b"b"));
        split_events(&mut rx);

        rx.receive(data(0, b"a"));
        let (_, delivered) = split_events(&mut rx);
        let order: Vec<&[u8]> = delivered.iter().map(|b| b.as_ref()).collect();
        assert_eq!(order, vec![&b"a"[..], b"b", b"c"]);
    }

    // ─── Duplicates & Window ────────────────────────────────────────────

    #[test]
    fn duplicate_of_held_packet_is_acked_not_stored() {
        let mut rx = Receiver::new(test_config(10, 25));
        rx.receive(data(3, b"x"));
        rx.receive(data(3, b"x"));

        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![3, 3]);
        assert!(delivered.is_empty());
        assert_eq!(rx.stats().duplicates, 1);
        assert_eq!(rx.buffered(), 1);
    }

    #[test]
    fn redelivered_packet_after_lost_ack_is_not_delivered_twice() {
        let mut rx = Receiver::new(test_config(10, 25));
        rx.receive(data(0, b"once"));
        split_events(&mut rx);

        // Window is now [1, 10]; 0 is behind it.
        rx.receive(data(0, b"once"));
        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![0]);
        assert!(delivered.is_empty());
        assert_eq!(rx.stats().out_of_window, 1);
        assert_eq!(rx.stats().messages_delivered, 1);
    }

    #[test]
    fn packet_beyond_window_is_acked_and_dropped() {
        let mut rx = Receiver::new(test_config(4, 9));
        rx.receive(data(6, b"far"));

        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks, vec![6]);
        assert!(delivered.is_empty());
        assert_eq!(rx.buffered(), 0);
    }

    // ─── Validation ─────────────────────────────────────────────────────

    #[test]
    fn corrupted_packet_gets_no_ack() {
        let mut rx = Receiver::new(test_config(10, 25));
        let mut pkt = data(0, b"abcdef");
        pkt.as_bytes_mut()[HEADER_SIZE + 1] ^= 0x08;
        rx.receive(pkt);

        assert_eq!(rx.pending_events(), 0);
        assert_eq!(rx.stats().checksum_failures, 1);
        assert_eq!(rx.next_expected(), 0);
    }

    #[test]
    fn oversized_length_is_malformed() {
        let mut rx = Receiver::new(test_config(10, 25));
        let mut pkt = data(0, b"abc");
        pkt.as_bytes_mut()[0] = 200;
        rx.receive(pkt);

        assert_eq!(rx.pending_events(), 0);
        assert_eq!(rx.stats().malformed, 1);
    }

    // ─── Wraparound ─────────────────────────────────────────────────────

    #[test]
    fn boundary_straddle_is_not_a_duplicate() {
        let mut rx = Receiver::new(test_config(4, 9));
        for seq in 0..8u8 {
            rx.receive(data(seq, &[seq]));
        }
        split_events(&mut rx);
        assert_eq!(rx.next_expected(), 8);

        // Window [8, 2]: 0 arrives before 8.
        rx.receive(data(0, b"after"));
        let (_, delivered) = split_events(&mut rx);
        assert!(delivered.is_empty());
        assert_eq!(rx.buffered(), 1);

        rx.receive(data(8, b"last"));
        let (_, delivered) = split_events(&mut rx);
        assert_eq!(
            delivered,
            vec![Bytes::from_static(b"last"), Bytes::from_static(b"after")]
        );
        assert_eq!(rx.next_expected(), 1);
        assert_eq!(rx.stats().duplicates, 0);
    }

    #[test]
    fn long_run_wraps_several_times() {
        let mut rx = Receiver::new(test_config(3, 7));
        for i in 0..50u32 {
            let seq = (i % 7) as u8;
            rx.receive(data(seq, &i.to_le_bytes()));
        }
        let (acks, delivered) = split_events(&mut rx);
        assert_eq!(acks.len(), 50);
        assert_eq!(delivered.len(), 50);
        for (i, msg) in delivered.iter().enumerate() {
            assert_eq!(msg.as_ref(), &(i as u32).to_le_bytes());
        }
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    #[test]
    fn init_resets_and_finalize_reports() {
        let mut rx = Receiver::new(test_config(4, 9));
        rx.receive(data(1, b"held"));
        rx.receive(data(0, b"head"));
        assert_eq!(rx.finalize().messages_delivered, 2);

        rx.init();
        assert_eq!(rx.next_expected(), 0);
        assert_eq!(rx.buffered(), 0);
        assert_eq!(rx.pending_events(), 0);
        assert_eq!(rx.stats(), &ReceiverStats::default());
    }
}
