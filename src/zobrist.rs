//! Multi-slot Zobrist hashing.
//!
//! One slot per element of the board's symmetry group. While few stones are
//! on the board every placement updates all slots, each with the same move
//! mapped through that slot's symmetry, and the canonical hash is the
//! minimum over the slots. Later only slot 0 is updated.

use std::sync::OnceLock;

use crate::constants::MAX_DIM;

/// Largest symmetry group of any shape.
pub const MAX_SLOTS: usize = 12;

/// Number of keys: three per cell of the largest padded grid.
const NUM_KEYS: usize = 3 * (MAX_DIM + 2) * (MAX_DIM + 2);

static KEYS: OnceLock<Vec<u64>> = OnceLock::new();

fn keys() -> &'static [u64] {
    KEYS.get_or_init(|| {
        let mut rng = fastrand::Rng::with_seed(0x5eed_4a11_0f_c0ffee);
        (0..NUM_KEYS).map(|_| rng.u64(..)).collect()
    })
}

/// Hash slots for one board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zobrist {
    slots: [u64; MAX_SLOTS],
}

impl Default for Zobrist {
    fn default() -> Self {
        Self::new()
    }
}

impl Zobrist {
    pub fn new() -> Self {
        Zobrist {
            slots: [0; MAX_SLOTS],
        }
    }

    pub fn clear(&mut self) {
        self.slots = [0; MAX_SLOTS];
    }

    /// Key for a value, `3 * cell + side`.
    #[inline]
    pub fn key(value: usize) -> u64 {
        keys()[value]
    }

    #[inline]
    pub fn update(&mut self, slot: usize, value: usize) {
        self.slots[slot] ^= Self::key(value);
    }

    /// Slot `slot` as it would be after `update(slot, value)`.
    #[inline]
    pub fn test(&self, slot: usize, value: usize) -> u64 {
        self.slots[slot] ^ Self::key(value)
    }

    #[inline]
    pub fn get(&self, slot: usize) -> u64 {
        self.slots[slot]
    }

    /// Minimum over the first `n` slots.
    pub fn min(&self, n: usize) -> u64 {
        self.slots[..n].iter().copied().min().unwrap_or(0)
    }
}
