//! # Sender State Machine
//!
//! Pure logic with no I/O. Accepts application messages, slices them into
//! packets, numbers them in the modulo sequence space, keeps at most a
//! window's worth in flight and recovers from loss with a single
//! retransmission timer.
//!
//! ## Bookkeeping
//!
//! ```text
//!  outstanding:  [ in flight (window occupancy) | buffered, not yet sent ]
//!                  ^ base_seq                     ^ only when window full
//! ```
//!
//! Acks are selective: each one marks a single sequence number. The window
//! then slides past every contiguous acknowledged slot starting at the base,
//! releasing those packets, and refills from the buffered tail.
//!
//! On timeout every in-flight packet not yet acknowledged is retransmitted,
//! so any subset of losses inside the window is repaired in one period.
//!
//! The sender does not own a clock or a link; it emits [`SenderEvent`]s for
//! the caller to act on, one handler at a time.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::config::ProtocolConfig;
use crate::stats::SenderStats;
use crate::window::{seq_add, SeqWindow};
use crate::wire::Packet;

// ─── Sender Events ──────────────────────────────────────────────────────────

/// Work the sender asks its environment to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    /// Hand this packet to the link.
    Transmit(Packet),
    /// (Re)start the one-shot retransmission timer, replacing any pending
    /// deadline.
    ArmTimer(Duration),
}

// ─── Sender ─────────────────────────────────────────────────────────────────

/// Sender state machine.
pub struct Sender {
    config: ProtocolConfig,
    window: SeqWindow,
    /// Acknowledged flag per sequence number.
    acked: Vec<bool>,
    /// Unacknowledged packets, oldest first.
    outstanding: VecDeque<Packet>,
    timer_armed: bool,
    events: VecDeque<SenderEvent>,
    stats: SenderStats,
}

impl Sender {
    /// Create a sender with the given protocol parameters.
    pub fn new(config: ProtocolConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "invalid protocol config");

        Sender {
            config,
            window: SeqWindow::new(config.window_size, config.seq_space),
            acked: vec![false; config.seq_space as usize],
            outstanding: VecDeque::with_capacity(config.window_size as usize),
            timer_armed: false,
            events: VecDeque::new(),
            stats: SenderStats::default(),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start-of-session hook. Puts the sender in its initial state.
    pub fn init(&mut self) {
        *self = Sender::new(self.config);
        info!(
            window = self.config.window_size,
            seq_space = self.config.seq_space,
            packet_size = self.config.packet_size,
            "sender initializing"
        );
    }

    /// End-of-session hook. Returns the final counters.
    pub fn finalize(&mut self) -> SenderStats {
        info!(
            transmissions = self.stats.transmissions,
            retransmissions = self.stats.retransmissions,
            outstanding = self.outstanding.len(),
            "sender finalizing"
        );
        self.stats.clone()
    }

    // ─── Upper Layer ─────────────────────────────────────────────────────

    /// Submit an application message.
    ///
    /// The message is cut into consecutive packets of at most
    /// `max_payload` bytes, each numbered after everything already
    /// outstanding. Packets that fit in the window go out immediately; the
    /// rest wait until acks open space. Returns the number of packets created.
    pub fn send(&mut self, message: &[u8]) -> usize {
        self.stats.messages_accepted += 1;
        self.stats.bytes_accepted += message.len() as u64;

        let mut created = 0;
        for chunk in message.chunks(self.config.max_payload()) {
            let seq = self.next_seq();
            let pkt = Packet::data(seq, chunk, self.config.packet_size);
            self.outstanding.push_back(pkt);
            self.stats.packets_created += 1;
            created += 1;

            let was_idle = self.window.is_empty();
            if self.fill_window() > 0 && was_idle {
                self.arm_timer();
            }
        }

        debug!(
            bytes = message.len(),
            packets = created,
            in_flight = self.in_flight(),
            buffered = self.buffered(),
            "message accepted"
        );
        created
    }

    // ─── Lower Layer ─────────────────────────────────────────────────────

    /// Process a packet arriving from the link (an acknowledgment).
    pub fn receive(&mut self, packet: Packet) {
        if let Err(reason) = packet.validate() {
            self.stats.acks_rejected += 1;
            debug!(%reason, "sender dropped invalid packet");
            return;
        }

        let ack = packet.ack();
        let in_flight = self.window.occupancy();
        match self.window.offset_of(ack) {
            Some(offset) if offset < in_flight => {}
            _ => {
                self.stats.acks_stale += 1;
                debug!(
                    ack,
                    begin = self.window.begin(),
                    end = self.window.end(),
                    "stale ack ignored"
                );
                return;
            }
        }

        self.stats.acks_received += 1;
        self.acked[ack as usize] = true;

        let advanced = self.slide();
        let sent = self.fill_window();

        if advanced > 0 {
            if self.window.is_empty() {
                // Everything acknowledged; let the pending deadline lapse.
                self.timer_armed = false;
            } else {
                self.arm_timer();
            }
        }

        debug!(
            ack,
            advanced,
            sent,
            base = self.base_seq(),
            in_flight = self.in_flight(),
            "ack processed"
        );
    }

    // ─── Timer ───────────────────────────────────────────────────────────

    /// Retransmission timer expired.
    ///
    /// Resends every in-flight packet that has not been acknowledged and
    /// restarts the timer.
    pub fn on_timeout(&mut self) {
        if self.window.is_empty() {
            self.timer_armed = false;
            trace!("timeout with nothing in flight");
            return;
        }

        self.stats.timeouts += 1;
        let mut resent = 0;
        for offset in 0..self.window.occupancy() {
            let seq = self.window.seq_at(offset);
            if self.acked[seq as usize] {
                continue;
            }
            let pkt = self.outstanding[offset].clone();
            self.transmit(pkt);
            self.stats.retransmissions += 1;
            resent += 1;
        }

        debug!(resent, base = self.base_seq(), "retransmission timeout");
        self.arm_timer();
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// Drain events produced by the handlers, in order.
    pub fn drain_events(&mut self) -> impl Iterator<Item = SenderEvent> + '_ {
        self.events.drain(..)
    }

    /// Number of undrained events.
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    // ─── Inspection ──────────────────────────────────────────────────────

    /// Oldest unacknowledged sequence number.
    pub fn base_seq(&self) -> u8 {
        self.window.begin()
    }

    /// Sequence number the next new packet will get.
    pub fn next_seq(&self) -> u8 {
        seq_add(
            self.window.begin(),
            self.outstanding.len(),
            self.config.seq_space,
        )
    }

    /// Packets transmitted and not yet released by an ack.
    pub fn in_flight(&self) -> usize {
        self.window.occupancy()
    }

    /// Packets waiting for window space.
    pub fn buffered(&self) -> usize {
        self.outstanding.len() - self.window.occupancy()
    }

    /// All packets not yet released, in flight or buffered.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    /// Whether the sender expects a timer expiry.
    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn window(&self) -> &SeqWindow {
        &self.window
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn stats(&self) -> &SenderStats {
        &self.stats
    }

    // ─── Internal Helpers ────────────────────────────────────────────────

    /// Release the contiguous run of acknowledged packets at the base.
    fn slide(&mut self) -> usize {
        let mut advanced = 0;
        while !self.window.is_empty() && self.acked[self.window.begin() as usize] {
            self.acked[self.window.begin() as usize] = false;
            self.outstanding.pop_front();
            self.window.release();
            self.window.slide_forward(1);
            advanced += 1;
        }
        if advanced > 0 {
            trace!(
                begin = self.window.begin(),
                end = self.window.end(),
                occupancy = self.window.occupancy(),
                "sender window slid"
            );
        }
        advanced
    }

    /// Transmit buffered packets while the window has room.
    fn fill_window(&mut self) -> usize {
        let mut sent = 0;
        while !self.window.is_full() && self.window.occupancy() < self.outstanding.len() {
            let pkt = self.outstanding[self.window.occupancy()].clone();
            self.window.occupy();
            self.transmit(pkt);
            sent += 1;
        }
        self.stats.peak_in_flight = self.stats.peak_in_flight.max(self.window.occupancy());
        sent
    }

    fn transmit(&mut self, pkt: Packet) {
        trace!(seq = pkt.seq(), len = pkt.payload_len(), "transmit");
        self.stats.transmissions += 1;
        self.events.push_back(SenderEvent::Transmit(pkt));
    }

    fn arm_timer(&mut self) {
        self.timer_armed = true;
        self.events
            .push_back(SenderEvent::ArmTimer(self.config.timeout));
    }
}
