//! # Payload Checksum
//!
//! 16-bit ones-complement sum, accumulated 8 bytes at a time with end-around
//! carry and folded down to 16 bits (the RFC 1071 technique). Words are read
//! little-endian and the result is stored little-endian at header offset 3.
//!
//! ## Coverage
//!
//! A packet declaring `len` payload bytes is checksummed over the first
//! `len - 1` of them only; the final payload byte is never covered. Both
//! peers in this crate compute it the same way. Corruption of the last
//! payload byte, or of any header byte, is therefore invisible to the
//! checksum.
//!
//! ## Tail bytes
//!
//! A tail shorter than 8 bytes is summed as an optional 4-byte word, an
//! optional 2-byte word and an optional single byte, each byte exactly once.
//! Older C implementations of this format also added the byte following
//! the 4- and 2-byte words whenever the tail was even and non-zero, reaching
//! past the covered range. Their checksums differ from these whenever
//! `(len - 1) % 8` is 2, 4 or 6, so the two are not wire compatible.

/// Number of payload bytes covered by the checksum for a declared length.
#[inline]
pub fn covered_len(declared_len: usize) -> usize {
    declared_len.saturating_sub(1)
}

/// Checksum of a packet payload of `payload.len()` declared bytes.
///
/// Applies the wire-format coverage rule, see [`covered_len`].
pub fn payload_checksum(payload: &[u8]) -> u16 {
    ones_complement(&payload[..covered_len(payload.len())])
}

/// Ones-complement checksum over every byte of `buf`.
pub fn ones_complement(buf: &[u8]) -> u16 {
    let mut sum: u64 = 0;

    let mut words = buf.chunks_exact(8);
    for word in &mut words {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(word);
        sum = add_carry(sum, u64::from_le_bytes(raw));
    }

    // Tail shorter than 8 bytes
    let mut tail = words.remainder();
    if tail.len() >= 4 {
        let raw = [tail[0], tail[1], tail[2], tail[3]];
        sum = add_carry(sum, u32::from_le_bytes(raw) as u64);
        tail = &tail[4..];
    }
    if tail.len() >= 2 {
        let raw = [tail[0], tail[1]];
        sum = add_carry(sum, u16::from_le_bytes(raw) as u64);
        tail = &tail[2..];
    }
    if let Some(&last) = tail.first() {
        sum = add_carry(sum, last as u64);
    }

    // Fold 64 → 32 → 16
    let mut folded = (sum & 0xFFFF_FFFF) as u32;
    let (s, carry) = folded.overflowing_add((sum >> 32) as u32);
    folded = s + carry as u32;

    let mut short = (folded & 0xFFFF) as u16;
    let (s, carry) = short.overflowing_add((folded >> 16) as u16);
    short = s + carry as u16;

    !short
}

#[inline]
fn add_carry(sum: u64, value: u64) -> u64 {
    let (s, carry) = sum.overflowing_add(value);
    s + carry as u64
}
