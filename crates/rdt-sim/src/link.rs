//! One direction of the simulated point-to-point link.
//!
//! Each packet handed to [`Link::carry`] is independently dropped,
//! corrupted, held back for reordering, and given a delay. The link owns its
//! own seeded RNG so both directions stay reproducible regardless of how
//! their traffic interleaves.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::Serialize;
use tracing::trace;

use rdt_transport::checksum::covered_len;
use rdt_transport::config::HEADER_SIZE;
use rdt_transport::Packet;

use crate::impairment::ImpairmentConfig;

/// Per-direction link counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    pub offered: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub reordered: u64,
    pub carried: u64,
}

/// A packet that survived the link, and how long it spends in flight.
#[derive(Debug)]
pub struct Transit {
    pub packet: Packet,
    pub delay: Duration,
}

pub struct Link {
    name: &'static str,
    impairment: ImpairmentConfig,
    rng: StdRng,
    stats: LinkStats,
}

impl Link {
    pub fn new(name: &'static str, impairment: ImpairmentConfig, seed: u64) -> Self {
        Self {
            name,
            impairment,
            rng: StdRng::seed_from_u64(seed),
            stats: LinkStats::default(),
        }
    }

    /// Pass one packet through the impairment model.
    ///
    /// Returns `None` when the packet is lost.
    pub fn carry(&mut self, mut packet: Packet) -> Option<Transit> {
        self.stats.offered += 1;

        if self.rng.random::<f64>() < self.impairment.loss_rate {
            self.stats.dropped += 1;
            trace!(link = self.name, seq = packet.seq(), ack = packet.ack(), "drop");
            return None;
        }

        if self.rng.random::<f64>() < self.impairment.corrupt_rate && self.corrupt(&mut packet) {
            self.stats.corrupted += 1;
        }

        let mut delay = self.base_delay();
        if self.rng.random::<f64>() < self.impairment.reorder_rate {
            delay += self.reorder_delay();
            self.stats.reordered += 1;
            trace!(link = self.name, ?delay, "held back");
        }

        self.stats.carried += 1;
        Some(Transit { packet, delay })
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Flip bits in one checksum-covered payload byte.
    ///
    /// Packets whose checksum covers nothing are left alone.
    fn corrupt(&mut self, packet: &mut Packet) -> bool {
        let declared = packet.payload_len().min(packet.max_payload());
        let covered = covered_len(declared);
        if covered == 0 {
            return false;
        }
        let idx = HEADER_SIZE + self.rng.random_range(0..covered);
        let mask = self.rng.random_range(1..=u8::MAX);
        packet.as_bytes_mut()[idx] ^= mask;
        trace!(link = self.name, byte = idx, mask, "corrupt");
        true
    }

    /// `mean_delay ± jitter`, never negative.
    fn base_delay(&mut self) -> Duration {
        let mean = self.impairment.mean_delay.as_secs_f64();
        let jitter = self.impairment.jitter.as_secs_f64();
        let offset = (self.rng.random::<f64>() * 2.0 - 1.0) * jitter;
        Duration::from_secs_f64((mean + offset).max(0.0))
    }

    /// Extra hold-back long enough for packets sent right after to overtake.
    fn reorder_delay(&mut self) -> Duration {
        let spread = self.rng.random::<f64>();
        self.impairment.jitter * 2 + self.impairment.mean_delay.mul_f64(spread)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(payload: &[u8]) -> Packet {
        Packet::data(3, payload, 32)
    }

    #[test]
    fn clean_link_carries_everything_intact() {
        let mut link = Link::new("fwd", ImpairmentConfig::clean(), 7);
        for _ in 0..100 {
            let pkt = packet(b"intact payload");
            let transit = link.carry(pkt.clone()).unwrap();
            assert_eq!(transit.packet, pkt);
            assert!(transit.delay >= Duration::from_millis(39));
            assert!(transit.delay <= Duration::from_millis(61));
        }
        assert_eq!(link.stats().carried, 100);
        assert_eq!(link.stats().dropped, 0);
    }

    #[test]
    fn loss_rate_is_roughly_honoured() {
        let config = ImpairmentConfig {
            loss_rate: 0.3,
            ..Default::default()
        };
        let mut link = Link::new("fwd", config, 11);
        let survived = (0..10_000)
            .filter(|_| link.carry(packet(b"x")).is_some())
            .count();
        assert!((6_500..7_500).contains(&survived), "survived {survived}");
        assert_eq!(link.stats().offered, 10_000);
    }

    #[test]
    fn corruption_is_always_detectable() {
        let config = ImpairmentConfig {
            corrupt_rate: 0.999,
            ..Default::default()
        };
        let mut link = Link::new("fwd", config, 5);
        for _ in 0..500 {
            let transit = link.carry(packet(b"some longer payload")).unwrap();
            if transit.packet != packet(b"some longer payload") {
                assert!(transit.packet.validate().is_err());
            }
        }
        assert!(link.stats().corrupted > 400);
    }

    #[test]
    fn single_byte_payload_is_never_corrupted() {
        let config = ImpairmentConfig {
            corrupt_rate: 0.999,
            ..Default::default()
        };
        let mut link = Link::new("fwd", config, 5);
        for _ in 0..100 {
            let transit = link.carry(packet(b"z")).unwrap();
            assert_eq!(transit.packet.validate(), Ok(()));
        }
        assert_eq!(link.stats().corrupted, 0);
    }

    #[test]
    fn reordered_packets_are_held_longer() {
        let config = ImpairmentConfig {
            reorder_rate: 0.999,
            ..Default::default()
        };
        let mut link = Link::new("fwd", config, 9);
        for _ in 0..100 {
            let transit = link.carry(packet(b"late")).unwrap();
            // never earlier than the slowest unimpaired packet
            assert!(transit.delay >= Duration::from_millis(59));
            assert!(transit.delay <= config.max_delay() + Duration::from_millis(1));
        }
        assert!(link.stats().reordered > 90);
    }

    #[test]
    fn same_seed_same_fates() {
        let config = ImpairmentConfig::uniform(0.2);
        let mut a = Link::new("a", config, 42);
        let mut b = Link::new("b", config, 42);
        for _ in 0..200 {
            let ta = a.carry(packet(b"determinism")).map(|t| (t.packet, t.delay));
            let tb = b.carry(packet(b"determinism")).map(|t| (t.packet, t.delay));
            assert_eq!(ta, tb);
        }
        assert_eq!(a.stats(), b.stats());
    }
}
