//! # Sequence Window
//!
//! Sequence numbers live in a small modulo space `0..seq_space`. A window is
//! the closed interval `[begin, end]` of `capacity` consecutive numbers in
//! that space, plus an occupancy count. Both edges always move together, so
//! `end == begin + capacity - 1 (mod seq_space)` holds at all times.
//!
//! ```text
//!  not wrapped:   0 ....... begin ======== end ....... seq_space
//!  wrapped:       0 == end ........... begin ========= seq_space
//! ```

/// Add `steps` to `seq` in a sequence space of `seq_space` numbers.
#[inline]
pub fn seq_add(seq: u8, steps: usize, seq_space: u8) -> u8 {
    let space = seq_space as usize;
    ((seq as usize + steps % space) % space) as u8
}

/// Forward distance from `from` to `to` in the sequence space.
#[inline]
pub fn seq_distance(from: u8, to: u8, seq_space: u8) -> usize {
    let space = seq_space as usize;
    (to as usize + space - from as usize) % space
}

/// A `[begin, end]` window over a modulo sequence space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqWindow {
    begin: u8,
    end: u8,
    occupancy: usize,
    capacity: u8,
    seq_space: u8,
}

impl SeqWindow {
    /// A window `[0, capacity - 1]` with nothing in it.
    pub fn new(capacity: u8, seq_space: u8) -> Self {
        debug_assert!(capacity >= 1 && capacity < seq_space);
        SeqWindow {
            begin: 0,
            end: capacity - 1,
            occupancy: 0,
            capacity,
            seq_space,
        }
    }

    #[inline]
    pub fn begin(&self) -> u8 {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> u8 {
        self.end
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    #[inline]
    pub fn occupancy(&self) -> usize {
        self.occupancy
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupancy >= self.capacity()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupancy == 0
    }

    /// Whether `seq` lies in `[begin, end]`, accounting for wraparound.
    pub fn contains(&self, seq: u8) -> bool {
        if seq >= self.seq_space {
            return false;
        }
        if self.begin <= self.end {
            seq >= self.begin && seq <= self.end
        } else {
            seq >= self.begin || seq <= self.end
        }
    }

    /// Position of `seq` relative to `begin`, if it lies in the window.
    pub fn offset_of(&self, seq: u8) -> Option<usize> {
        self.contains(seq)
            .then(|| seq_distance(self.begin, seq, self.seq_space))
    }

    /// The sequence number `offset` positions past `begin`.
    #[inline]
    pub fn seq_at(&self, offset: usize) -> u8 {
        seq_add(self.begin, offset, self.seq_space)
    }

    /// Advance both edges by `steps`.
    pub fn slide_forward(&mut self, steps: usize) {
        self.begin = seq_add(self.begin, steps, self.seq_space);
        self.end = seq_add(self.end, steps, self.seq_space);
    }

    /// Record one more occupied slot.
    pub fn occupy(&mut self) {
        debug_assert!(!self.is_full(), "occupy called on a full window");
        self.occupancy += 1;
    }

    /// Release one occupied slot.
    pub fn release(&mut self) {
        debug_assert!(self.occupancy > 0, "release called on an empty window");
        self.occupancy -= 1;
    }
}
