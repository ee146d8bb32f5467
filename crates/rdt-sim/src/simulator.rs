//! # Discrete-Event Simulator
//!
//! Drives one [`Sender`] and one [`Receiver`] across two impaired
//! [`Link`]s in virtual time. Events are processed strictly one at a time in
//! timestamp order (ties broken by scheduling order), so each peer sees the
//! same sequential handler discipline it would get from a real harness.
//!
//! ## Timer
//!
//! The sender has one one-shot retransmission timer. Every
//! [`SenderEvent::ArmTimer`] bumps a generation counter and schedules an
//! expiry tagged with it; an expiry whose generation is no longer current
//! was replaced and is ignored.
//!
//! ## Termination
//!
//! The run ends as soon as the source is exhausted, the sender has nothing
//! outstanding and the sink holds every source byte, or when the event queue
//! drains, or when virtual time passes `max_time`. The last two count as
//! liveness failures in the report, not panics.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use rdt_transport::stats::{ReceiverStats, SenderStats};
use rdt_transport::{Packet, Receiver, ReceiverEvent, Sender, SenderEvent};

use crate::link::{Link, LinkStats};
use crate::scenario::ScenarioConfig;
use crate::traffic::{MessageSource, Verdict, VerifyingSink};

// ─── Event Queue ────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Event {
    /// The application submits its next message.
    Submit,
    /// A data packet reaches the receiver.
    DataArrival(Packet),
    /// An ack reaches the sender.
    AckArrival(Packet),
    /// Retransmission timer of the given generation expires.
    TimerExpiry(u64),
}

#[derive(Debug)]
struct Scheduled {
    at: Duration,
    order: u64,
    event: Event,
}

// Min-heap on (at, order).
impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.at, other.order).cmp(&(self.at, self.order))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.order == other.order
    }
}

impl Eq for Scheduled {}

// ─── Report ─────────────────────────────────────────────────────────────────

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Everything submitted was delivered and acknowledged.
    Completed,
    /// Virtual time reached `max_time` with work outstanding.
    TimedOut,
    /// No events left while work was outstanding.
    Stalled,
}

/// Result of one simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub outcome: Outcome,
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Virtual time at which the run stopped, in seconds.
    pub sim_time_secs: f64,
    pub events_processed: u64,
    pub messages_submitted: u64,
    pub bytes_submitted: usize,
    pub messages_delivered: u64,
    pub bytes_delivered: usize,
    pub sender: SenderStats,
    pub receiver: ReceiverStats,
    pub forward_link: LinkStats,
    pub backward_link: LinkStats,
}

impl SimulationReport {
    /// Completed with every byte delivered intact exactly once.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Completed && self.verdict.is_intact()
    }
}

// ─── Simulator ──────────────────────────────────────────────────────────────

pub struct Simulator {
    config: ScenarioConfig,
    now: Duration,
    queue: BinaryHeap<Scheduled>,
    next_order: u64,
    events_processed: u64,

    sender: Sender,
    receiver: Receiver,
    forward: Link,
    backward: Link,

    source: MessageSource,
    sink: VerifyingSink,
    messages_submitted: u64,

    timer_generation: u64,
}

impl Simulator {
    pub fn new(config: ScenarioConfig) -> Self {
        // Independent streams per component, all derived from one seed.
        let seed = config.seed;
        Self {
            now: Duration::ZERO,
            queue: BinaryHeap::new(),
            next_order: 0,
            events_processed: 0,
            sender: Sender::new(config.protocol),
            receiver: Receiver::new(config.protocol),
            forward: Link::new("forward", config.impairment, seed.wrapping_mul(3).wrapping_add(1)),
            backward: Link::new("backward", config.impairment, seed.wrapping_mul(3).wrapping_add(2)),
            source: MessageSource::new(
                seed,
                config.messages,
                config.max_message_size,
                config.message_interval,
            ),
            sink: VerifyingSink::new(),
            messages_submitted: 0,
            timer_generation: 0,
            config,
        }
    }

    /// Run the scenario to completion or to its time bound.
    pub fn run(mut self) -> SimulationReport {
        info!(
            seed = self.config.seed,
            messages = self.config.messages,
            loss = self.config.impairment.loss_rate,
            corrupt = self.config.impairment.corrupt_rate,
            reorder = self.config.impairment.reorder_rate,
            "simulation starting"
        );

        // Sequence numbers are reused without a packet lifetime bound: a copy
        // still on the link after its number comes round again is accepted.
        let worst_rtt = self.config.impairment.max_delay() * 2;
        if worst_rtt >= self.config.protocol.timeout {
            warn!(
                ?worst_rtt,
                timeout = ?self.config.protocol.timeout,
                "worst-case round trip reaches the retransmission timeout; stale copies may alias reused sequence numbers"
            );
        }

        self.sender.init();
        self.receiver.init();
        if !self.source.is_exhausted() {
            self.schedule(Duration::ZERO, Event::Submit);
        }

        let outcome = loop {
            if self.is_done() {
                break Outcome::Completed;
            }
            let Some(next) = self.queue.pop() else {
                break Outcome::Stalled;
            };
            if next.at > self.config.max_time {
                self.now = self.config.max_time;
                break Outcome::TimedOut;
            }
            self.now = next.at;
            self.events_processed += 1;
            self.dispatch(next.event);
        };

        let sender = self.sender.finalize();
        let receiver = self.receiver.finalize();
        let verdict = self.sink.verify(self.source.transcript());

        let report = SimulationReport {
            seed: self.config.seed,
            outcome,
            verdict,
            sim_time_secs: self.now.as_secs_f64(),
            events_processed: self.events_processed,
            messages_submitted: self.messages_submitted,
            bytes_submitted: self.source.transcript().len(),
            messages_delivered: self.sink.messages(),
            bytes_delivered: self.sink.bytes(),
            sender,
            receiver,
            forward_link: self.forward.stats().clone(),
            backward_link: self.backward.stats().clone(),
        };

        if report.is_success() {
            info!(
                t = report.sim_time_secs,
                bytes = report.bytes_delivered,
                retransmissions = report.sender.retransmissions,
                "simulation completed"
            );
        } else {
            warn!(
                t = report.sim_time_secs,
                outcome = ?report.outcome,
                verdict = ?report.verdict,
                "simulation failed"
            );
        }
        report
    }

    fn is_done(&self) -> bool {
        self.source.is_exhausted()
            && self.sender.outstanding() == 0
            && self.sink.bytes() == self.source.transcript().len()
    }

    fn schedule(&mut self, delay: Duration, event: Event) {
        let order = self.next_order;
        self.next_order += 1;
        self.queue.push(Scheduled {
            at: self.now + delay,
            order,
            event,
        });
    }

    // ─── Event Dispatch ──────────────────────────────────────────────────

    fn dispatch(&mut self, event: Event) {
        let t_ms = self.now.as_millis() as u64;
        match event {
            Event::Submit => {
                if let Some(msg) = self.source.next_message() {
                    self.messages_submitted += 1;
                    trace!(t_ms, len = msg.len(), "submit");
                    self.sender.send(&msg);
                    self.flush_sender();
                }
                if !self.source.is_exhausted() {
                    let gap = self.source.next_gap();
                    self.schedule(gap, Event::Submit);
                }
            }
            Event::DataArrival(pkt) => {
                trace!(t_ms, seq = pkt.seq(), "data arrival");
                self.receiver.receive(pkt);
                self.flush_receiver();
            }
            Event::AckArrival(pkt) => {
                trace!(t_ms, ack = pkt.ack(), "ack arrival");
                self.sender.receive(pkt);
                self.flush_sender();
            }
            Event::TimerExpiry(generation) => {
                if generation != self.timer_generation {
                    trace!(t_ms, generation, "superseded timer ignored");
                    return;
                }
                debug!(t_ms, base = self.sender.base_seq(), "timer expired");
                self.sender.on_timeout();
                self.flush_sender();
            }
        }
    }

    fn flush_sender(&mut self) {
        let events: Vec<SenderEvent> = self.sender.drain_events().collect();
        for ev in events {
            match ev {
                SenderEvent::Transmit(pkt) => {
                    if let Some(transit) = self.forward.carry(pkt) {
                        self.schedule(transit.delay, Event::DataArrival(transit.packet));
                    }
                }
                SenderEvent::ArmTimer(timeout) => {
                    self.timer_generation += 1;
                    let generation = self.timer_generation;
                    self.schedule(timeout, Event::TimerExpiry(generation));
                }
            }
        }
    }

    fn flush_receiver(&mut self) {
        let events: Vec<ReceiverEvent> = self.receiver.drain_events().collect();
        for ev in events {
            match ev {
                ReceiverEvent::Ack(pkt) => {
                    if let Some(transit) = self.backward.carry(pkt) {
                        self.schedule(transit.delay, Event::AckArrival(transit.packet));
                    }
                }
                ReceiverEvent::Deliver(msg) => self.sink.accept(&msg),
            }
        }
    }
}

/// Convenience wrapper: build and run a simulator for `config`.
pub fn run(config: ScenarioConfig) -> SimulationReport {
    Simulator::new(config).run()
}
