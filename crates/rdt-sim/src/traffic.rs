//! Application-side traffic: a seeded message source and a sink that
//! checks what the receiver delivers against what the source produced.

use std::time::Duration;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::RngExt as _;
use rand::SeedableRng;
use serde::Serialize;

// ─── Message Source ─────────────────────────────────────────────────────────

/// Generates messages of random size and content from a seed.
///
/// Every byte produced is also appended to a transcript the sink verifies
/// against.
pub struct MessageSource {
    rng: StdRng,
    max_message_size: usize,
    mean_interval: Duration,
    remaining: usize,
    transcript: Vec<u8>,
}

impl MessageSource {
    pub fn new(seed: u64, messages: usize, max_message_size: usize, mean_interval: Duration) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            max_message_size: max_message_size.max(1),
            mean_interval,
            remaining: messages,
            transcript: Vec::new(),
        }
    }

    /// Next message, or `None` once the configured count is exhausted.
    pub fn next_message(&mut self) -> Option<Bytes> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let size = self.rng.random_range(1..=self.max_message_size);
        let msg: Vec<u8> = (0..size).map(|_| self.rng.random::<u8>()).collect();
        self.transcript.extend_from_slice(&msg);
        Some(Bytes::from(msg))
    }

    /// Gap before the next message, uniform in `[0, 2 * mean_interval]`.
    pub fn next_gap(&mut self) -> Duration {
        self.mean_interval.mul_f64(self.rng.random::<f64>() * 2.0)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Every byte produced so far, in order.
    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }
}

// ─── Verifying Sink ─────────────────────────────────────────────────────────

/// Outcome of comparing delivered bytes with the source transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Every byte delivered once, in order.
    Intact,
    /// Delivered bytes diverge from the source at `offset`.
    Mismatch { offset: usize },
    /// A correct prefix was delivered but `missing` bytes never arrived.
    Incomplete { missing: usize },
    /// All source bytes arrived, followed by `extra` bytes that should not exist.
    Excess { extra: usize },
}

impl Verdict {
    pub fn is_intact(&self) -> bool {
        matches!(self, Verdict::Intact)
    }
}

/// Collects delivered messages and checks them against the source.
#[derive(Debug, Default)]
pub struct VerifyingSink {
    received: Vec<u8>,
    messages: u64,
}

impl VerifyingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&mut self, msg: &[u8]) {
        self.received.extend_from_slice(msg);
        self.messages += 1;
    }

    pub fn bytes(&self) -> usize {
        self.received.len()
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn verify(&self, expected: &[u8]) -> Verdict {
        let common = self.received.len().min(expected.len());
        if let Some(offset) = self.received[..common]
            .iter()
            .zip(&expected[..common])
            .position(|(a, b)| a != b)
        {
            return Verdict::Mismatch { offset };
        }

        if self.received.len() < expected.len() {
            Verdict::Incomplete {
                missing: expected.len() - self.received.len(),
            }
        } else if self.received.len() > expected.len() {
            Verdict::Excess {
                extra: self.received.len() - expected.len(),
            }
        } else {
            Verdict::Intact
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── Source ─────────────────────────────────────────────────────────

    #[test]
    fn source_is_deterministic() {
        let mut a = MessageSource::new(3, 20, 100, Duration::from_millis(10));
        let mut b = MessageSource::new(3, 20, 100, Duration::from_millis(10));
        while let Some(m) = a.next_message() {
            assert_eq!(Some(m), b.next_message());
            assert_eq!(a.next_gap(), b.next_gap());
        }
        assert!(b.next_message().is_none());
        assert_eq!(a.transcript(), b.transcript());
    }

    #[test]
    fn sizes_stay_within_bounds() {
        let mut src = MessageSource::new(1, 500, 17, Duration::ZERO);
        let mut total = 0;
        while let Some(m) = src.next_message() {
            assert!((1..=17).contains(&m.len()));
            total += m.len();
        }
        assert_eq!(src.transcript().len(), total);
        assert!(src.is_exhausted());
    }

    #[test]
    fn gaps_average_to_mean() {
        let mut src = MessageSource::new(8, 0, 1, Duration::from_millis(100));
        let total: Duration = (0..10_000).map(|_| src.next_gap()).sum();
        let mean = total / 10_000;
        assert!(mean > Duration::from_millis(90) && mean < Duration::from_millis(110));
    }

    // ─── Sink ───────────────────────────────────────────────────────────

    #[test]
    fn sink_verdicts() {
        let expected = b"hello world";

        let mut sink = VerifyingSink::new();
        sink.accept(b"hello ");
        sink.accept(b"world");
        assert_eq!(sink.verify(expected), Verdict::Intact);
        assert_eq!(sink.messages(), 2);

        let mut sink = VerifyingSink::new();
        sink.accept(b"hello");
        assert_eq!(sink.verify(expected), Verdict::Incomplete { missing: 6 });

        let mut sink = VerifyingSink::new();
        sink.accept(b"hellO world");
        assert_eq!(sink.verify(expected), Verdict::Mismatch { offset: 4 });

        let mut sink = VerifyingSink::new();
        sink.accept(b"hello world!!");
        assert_eq!(sink.verify(expected), Verdict::Excess { extra: 2 });
    }

    #[test]
    fn verdict_serializes_with_tag() {
        let json = serde_json::to_string(&Verdict::Incomplete { missing: 3 }).unwrap();
        assert_eq!(json, r#"{"verdict":"incomplete","missing":3}"#);
    }
}
