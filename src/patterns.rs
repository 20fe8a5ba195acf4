//! Local neighbor patterns.
//!
//! Every cell caches the contents of its six neighbors as a 12-bit pattern:
//! two bits per direction, in the order of [`DIRECTIONS`](crate::geometry::DIRECTIONS),
//! using the codes of [`Side::to_index`] (0 empty, 1 P1, 2 P2, 3 off-board).
//!
//! The board keeps these up to date on every placement, so playouts and
//! knowledge can look at a cell's surroundings without touching the grid:
//! - bridge intrusions and the reply that saves the bridge
//! - the number of own stones next to a cell
//! - a symmetry-reduced pattern id for gamma-weighted playouts

use crate::outcome::Side;

/// Number of distinct 12-bit patterns.
pub const NUM_PATTERNS: usize = 1 << 12;

/// Contents of the neighbor in direction `dir`.
#[inline]
pub fn get(pattern: u16, dir: usize) -> Side {
    Side::from_index(((pattern >> (2 * dir)) & 3) as usize)
}

/// Pattern with the neighbor in direction `dir` replaced by `side`.
#[inline]
pub fn set(pattern: u16, dir: usize, side: Side) -> u16 {
    let shift = 2 * dir;
    (pattern & !(3 << shift)) | ((side.to_index() as u16) << shift)
}

/// Rotate by one direction step.
#[inline]
pub fn rotate(pattern: u16) -> u16 {
    ((pattern << 2) | (pattern >> 10)) & 0xfff
}

/// Mirror through the x <-> y axis, which maps direction `d` to `2 - d`.
pub fn mirror(pattern: u16) -> u16 {
    (0..6).fold(0, |acc, d| set(acc, (8 - d) % 6, get(pattern, d)))
}

/// Swap the two players.
pub fn invert(pattern: u16) -> u16 {
    (0..6).fold(0, |acc, d| {
        let s = get(pattern, d);
        let s = if s.is_player() { !s } else { s };
        set(acc, d, s)
    })
}

/// Smallest pattern among all rotations and mirror images.
pub fn symmetry(pattern: u16) -> u16 {
    let mut best = pattern;
    let mut p = pattern;
    let mut m = mirror(pattern);
    for _ in 0..6 {
        best = best.min(p).min(m);
        p = rotate(p);
        m = rotate(m);
    }
    best
}

/// Number of neighbors owned by `side`.
pub fn count(pattern: u16, side: Side) -> i32 {
    (0..6).filter(|&d| get(pattern, d) == side).count() as i32
}

/// Directions from an intruding stone at which `side` can save a bridge.
///
/// Seen from the intruder, a bridge it broke into shows up as an empty
/// neighbor with `side` stones on both sides of it; the empty cell is the
/// other shared neighbor of the two bridged stones.
pub fn bridge_replies(pattern: u16, side: Side) -> impl Iterator<Item = usize> {
    (0..6).filter(move |&d| {
        get(pattern, d) == Side::None
            && get(pattern, (d + 5) % 6) == side
            && get(pattern, (d + 1) % 6) == side
    })
}

/// Playout weights, one per symmetry-reduced and color-normalized pattern.
#[derive(Clone, Debug)]
pub struct Gammas {
    weights: Vec<f32>,
}

impl Default for Gammas {
    fn default() -> Self {
        Gammas {
            weights: vec![1.0; NUM_PATTERNS],
        }
    }
}

impl Gammas {
    /// Weight of a move whose neighborhood is `pattern`, for `side` to play.
    #[inline]
    pub fn weight(&self, pattern: u16, side: Side) -> f32 {
        self.weights[Self::index(pattern, side)]
    }

    pub fn set(&mut self, pattern: u16, side: Side, weight: f32) {
        let i = Self::index(pattern, side);
        self.weights[i] = weight;
    }

    /// Patterns are stored from P1's point of view, reduced by symmetry.
    fn index(pattern: u16, side: Side) -> usize {
        let p = if side == Side::P2 { invert(pattern) } else { pattern };
        symmetry(p) as usize
    }
}
