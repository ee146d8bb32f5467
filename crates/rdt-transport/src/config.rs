//! # Protocol Configuration
//!
//! The protocol is parameterised by four values that both peers must agree
//! on: window size, sequence-space size, packet capacity and retransmission
//! timeout. The build-time constants below are the defaults every deployment
//! uses; [`ProtocolConfig`] carries them explicitly into each peer so tests
//! can run independent instances with small windows.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Maximum number of packets in flight (sender) or accepted ahead of the
/// delivery cursor (receiver).
pub const WINDOW_SIZE: u8 = 10;

/// Sequence numbers cycle through `0..SEQ_SPACE`.
pub const SEQ_SPACE: u8 = 25;

/// Total size of every packet on the wire, header included.
pub const PACKET_SIZE: usize = 128;

/// Header bytes: length, sequence, ack, 16-bit checksum.
pub const HEADER_SIZE: usize = 5;

/// Retransmission timeout.
pub const TIMEOUT: Duration = Duration::from_millis(300);

/// Sentinel for "no sequence number" / "no ack" in a one-byte header field.
pub const ACK_NONE: u8 = 0xFF;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("sequence space {seq_space} must exceed window size {window_size}")]
    SeqSpaceTooSmall { window_size: u8, seq_space: u8 },
    #[error(
        "sequence space {seq_space} is ambiguous for window size {window_size}; it must be at least twice the window"
    )]
    AmbiguousSeqSpace { window_size: u8, seq_space: u8 },
    #[error("packet size {0} leaves no room for payload after the 5-byte header")]
    PacketTooSmall(usize),
    #[error("packet size {0} exceeds what a one-byte length field can describe")]
    PacketTooLarge(usize),
    #[error("retransmission timeout must be non-zero")]
    ZeroTimeout,
}

// ─── ProtocolConfig ──────────────────────────────────────────────────────────

/// Protocol parameters shared by a sender/receiver pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolConfig {
    pub window_size: u8,
    pub seq_space: u8,
    pub packet_size: usize,
    pub timeout: Duration,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            window_size: WINDOW_SIZE,
            seq_space: SEQ_SPACE,
            packet_size: PACKET_SIZE,
            timeout: TIMEOUT,
        }
    }
}

impl ProtocolConfig {
    /// Build a validated configuration.
    pub fn new(
        window_size: u8,
        seq_space: u8,
        packet_size: usize,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let config = ProtocolConfig {
            window_size,
            seq_space,
            packet_size,
            timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants both peers rely on.
    ///
    /// The receiver acks and stores packets anywhere in its window, so a
    /// retransmitted copy from the previous window must never land inside the
    /// current one. That needs a sequence space of at least twice the window,
    /// which caps the window at 127.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if self.seq_space <= self.window_size {
            return Err(ConfigError::SeqSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if (self.seq_space as usize) < 2 * self.window_size as usize {
            return Err(ConfigError::AmbiguousSeqSpace {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.packet_size <= HEADER_SIZE {
            return Err(ConfigError::PacketTooSmall(self.packet_size));
        }
        if self.packet_size - HEADER_SIZE > u8::MAX as usize {
            return Err(ConfigError::PacketTooLarge(self.packet_size));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }

    /// Largest payload one packet can carry.
    #[inline]
    pub fn max_payload(&self) -> usize {
        self.packet_size - HEADER_SIZE
    }
}

// ─── Config Input ────────────────────────────────────────────────────────────

/// Partially specified configuration as read from a scenario file.
/// Missing fields fall back to the build-time defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProtocolConfigInput {
    pub window_size: Option<u8>,
    pub seq_space: Option<u8>,
    pub packet_size: Option<usize>,
    pub timeout_ms: Option<u64>,
}

impl ProtocolConfigInput {
    pub fn resolve(self) -> Result<ProtocolConfig, ConfigError> {
        let defaults = ProtocolConfig::default();
        ProtocolConfig::new(
            self.window_size.unwrap_or(defaults.window_size),
            self.seq_space.unwrap_or(defaults.seq_space),
            self.packet_size.unwrap_or(defaults.packet_size),
            self.timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ProtocolConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.max_payload(), 123);
    }

    #[test]
    fn seq_space_must_exceed_window() {
        let err = ProtocolConfig::new(10, 10, PACKET_SIZE, TIMEOUT).unwrap_err();
        assert_eq!(
            err,
            ConfigError::SeqSpaceTooSmall {
                window_size: 10,
                seq_space: 10
            }
        );
        assert_eq!(
            ProtocolConfig::new(10, 11, PACKET_SIZE, TIMEOUT),
            Err(ConfigError::AmbiguousSeqSpace {
                window_size: 10,
                seq_space: 11
            })
        );
    }

    #[test]
    fn seq_space_must_cover_two_windows() {
        assert_eq!(
            ProtocolConfig::new(4, 5, 6, Duration::from_millis(100)),
            Err(ConfigError::AmbiguousSeqSpace {
                window_size: 4,
                seq_space: 5
            })
        );
        assert_eq!(
            ProtocolConfig::new(4, 7, PACKET_SIZE, TIMEOUT),
            Err(ConfigError::AmbiguousSeqSpace {
                window_size: 4,
                seq_space: 7
            })
        );
        assert!(ProtocolConfig::new(4, 8, PACKET_SIZE, TIMEOUT).is_ok());
        assert!(ProtocolConfig::new(1, 2, PACKET_SIZE, TIMEOUT).is_ok());
    }

    #[test]
    fn largest_window_is_half_the_largest_space() {
        assert!(ProtocolConfig::new(127, u8::MAX, PACKET_SIZE, TIMEOUT).is_ok());
        assert!(matches!(
            ProtocolConfig::new(128, u8::MAX, PACKET_SIZE, TIMEOUT),
            Err(ConfigError::AmbiguousSeqSpace { .. })
        ));
    }

    #[test]
    fn largest_seq_space_stays_clear_of_sentinel() {
        let cfg = ProtocolConfig::new(10, u8::MAX, PACKET_SIZE, TIMEOUT).unwrap();
        assert!(cfg.seq_space - 1 < ACK_NONE);
    }

    #[test]
    fn rejects_degenerate_packet_sizes() {
        assert_eq!(
            ProtocolConfig::new(4, 9, HEADER_SIZE, TIMEOUT),
            Err(ConfigError::PacketTooSmall(HEADER_SIZE))
        );
        assert_eq!(
            ProtocolConfig::new(4, 9, HEADER_SIZE + 256, TIMEOUT),
            Err(ConfigError::PacketTooLarge(HEADER_SIZE + 256))
        );
        assert!(ProtocolConfig::new(4, 9, HEADER_SIZE + 255, TIMEOUT).is_ok());
    }

    #[test]
    fn rejects_empty_window_and_zero_timeout() {
        assert_eq!(
            ProtocolConfig::new(0, 9, PACKET_SIZE, TIMEOUT),
            Err(ConfigError::EmptyWindow)
        );
        assert_eq!(
            ProtocolConfig::new(4, 9, PACKET_SIZE, Duration::ZERO),
            Err(ConfigError::ZeroTimeout)
        );
    }

    #[test]
    fn input_resolves_onto_defaults() {
        let input = ProtocolConfigInput {
            window_size: Some(4),
            timeout_ms: Some(50),
            ..Default::default()
        };
        let cfg = input.resolve().unwrap();
        assert_eq!(cfg.window_size, 4);
        assert_eq!(cfg.seq_space, SEQ_SPACE);
        assert_eq!(cfg.packet_size, PACKET_SIZE);
        assert_eq!(cfg.timeout, Duration::from_millis(50));
    }

    #[test]
    fn input_resolution_validates() {
        let input = ProtocolConfigInput {
            window_size: Some(13),
            ..Default::default()
        };
        assert!(matches!(
            input.resolve(),
            Err(ConfigError::AmbiguousSeqSpace { .. })
        ));
    }
}
