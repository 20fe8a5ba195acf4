//! Hex grid geometry and board shapes.
//!
//! All boards live on the same hexagonal lattice, stored as a square grid of
//! `(x, y)` coordinates in which a cell touches its six neighbors in the
//! directions listed in [`DIRECTIONS`]. The order is circular: consecutive
//! directions point at cells that are themselves adjacent, which the board
//! relies on when it walks around a cell.
//!
//! A [`Shape`] decides which part of the grid is playable, where the corners
//! and edges are, which symmetries the board has, and what counts as a
//! winning connection. Two shapes exist:
//! - [`Hexagon`] for Havannah (edges, corners and rings)
//! - [`Triangle`] for Y (all three edges)

use std::fmt;
use std::str::FromStr;

use crate::constants::{
    HAVANNAH_DEFAULT_SIZE, HAVANNAH_MAX_SIZE, HAVANNAH_MIN_SIZE, Y_DEFAULT_SIZE, Y_MAX_SIZE,
    Y_MIN_SIZE,
};

/// The six neighbor directions in circular order.
pub const DIRECTIONS: [(i32, i32); 6] = [(1, 0), (1, 1), (0, 1), (-1, 0), (-1, -1), (0, -1)];

/// A cell coordinate, or one of the sentinel moves.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Move {
    pub x: i8,
    pub y: i8,
}

impl Move {
    /// No move (root of a fresh game, empty principal variation).
    pub const NONE: Move = Move { x: -1, y: -1 };
    /// The player gives up.
    pub const RESIGN: Move = Move { x: -2, y: -2 };
    /// Placeholder for a move not decided yet.
    pub const UNKNOWN: Move = Move { x: -3, y: -3 };

    pub const fn new(x: i8, y: i8) -> Self {
        Move { x, y }
    }

    /// True for real coordinates, false for the sentinels.
    #[inline]
    pub fn is_cell(self) -> bool {
        self.x >= 0 && self.y >= 0
    }

    /// Hex distance between two cells.
    pub fn dist(self, other: Move) -> i32 {
        let dx = self.x as i32 - other.x as i32;
        let dy = self.y as i32 - other.y as i32;
        (dx.abs() + dy.abs() + (dx - dy).abs()) / 2
    }

    pub(crate) fn to_bits(self) -> u16 {
        ((self.x as u8 as u16) << 8) | (self.y as u8 as u16)
    }

    pub(crate) fn from_bits(bits: u16) -> Move {
        Move {
            x: (bits >> 8) as u8 as i8,
            y: (bits & 0xff) as u8 as i8,
        }
    }
}

impl Default for Move {
    fn default() -> Self {
        Move::NONE
    }
}

impl fmt::Display for Move {
    /// Column letter from `y`, row number from `x + 1`: `Move::new(3, 2)` is `c4`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Move::NONE => write!(f, "none"),
            Move::RESIGN => write!(f, "resign"),
            Move::UNKNOWN => write!(f, "unknown"),
            m => write!(f, "{}{}", (b'a' + m.y as u8) as char, m.x as i32 + 1),
        }
    }
}

impl FromStr for Move {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "none" => return Ok(Move::NONE),
            "resign" => return Ok(Move::RESIGN),
            "unknown" => return Ok(Move::UNKNOWN),
            _ => {}
        }

        let bytes = s.as_bytes();
        if bytes.len() < 2 || !bytes[0].is_ascii_lowercase() {
            return Err(format!("cannot parse move '{s}'"));
        }
        let y = (bytes[0] - b'a') as i32;
        let row: i32 = s[1..]
            .parse()
            .map_err(|_| format!("cannot parse move '{s}'"))?;
        if !(1..=i8::MAX as i32).contains(&row) {
            return Err(format!("row out of range in '{s}'"));
        }
        Ok(Move::new((row - 1) as i8, y as i8))
    }
}

/// Shape capability injected into the board: bounds, corners, edges,
/// symmetries, and connection wins.
pub trait Shape: Copy + Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// Game name, used by the front end and in records.
    const NAME: &'static str;
    const MIN_SIZE: usize;
    const MAX_SIZE: usize;
    const DEFAULT_SIZE: usize;
    /// Number of elements of the board's symmetry group.
    const NUM_SYMMETRIES: usize;
    /// Names of the win types, indexed by the board's `win_type`.
    const WIN_NAMES: &'static [&'static str];
    /// Win type of a ring, for shapes that have rings.
    const RING_WIN: Option<u8>;

    /// Side length of the square grid holding a board of `size`.
    fn dim(size: usize) -> usize;

    fn on_board(size: usize, x: i32, y: i32) -> bool;

    fn num_cells(size: usize) -> usize;

    /// Corner index of a cell, if it is a corner.
    fn corner(size: usize, x: i32, y: i32) -> Option<u8>;

    /// Bitmask of the edges a cell lies on.
    fn edges(size: usize, x: i32, y: i32) -> u8;

    /// Image of `(x, y)` under symmetry `k` (0 is the identity).
    fn symmetry(size: usize, k: usize, x: i32, y: i32) -> (i32, i32);

    /// Win type reached by a group with these edge and corner masks.
    fn connection_win(edges: u8, corners: u8) -> Option<u8>;
}

/// Havannah board: a hexagon of radius `size`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Hexagon;

impl Shape for Hexagon {
    const NAME: &'static str = "havannah";
    const MIN_SIZE: usize = HAVANNAH_MIN_SIZE;
    const MAX_SIZE: usize = HAVANNAH_MAX_SIZE;
    const DEFAULT_SIZE: usize = HAVANNAH_DEFAULT_SIZE;
    const NUM_SYMMETRIES: usize = 12;
    const WIN_NAMES: &'static [&'static str] = &["fork", "bridge", "ring"];
    const RING_WIN: Option<u8> = Some(2);

    fn dim(size: usize) -> usize {
        size * 2 - 1
    }

    fn on_board(size: usize, x: i32, y: i32) -> bool {
        let r = size as i32;
        let d = Self::dim(size) as i32;
        x >= 0 && y >= 0 && x < d && y < d && x - y < r && y - x < r
    }

    fn num_cells(size: usize) -> usize {
        3 * size * (size - 1) + 1
    }

    fn corner(size: usize, x: i32, y: i32) -> Option<u8> {
        let m = size as i32 - 1;
        let e = Self::dim(size) as i32 - 1;
        match (x, y) {
            (0, 0) => Some(0),
            _ if (x, y) == (m, 0) => Some(1),
            _ if (x, y) == (e, m) => Some(2),
            _ if (x, y) == (e, e) => Some(3),
            _ if (x, y) == (m, e) => Some(4),
            _ if (x, y) == (0, m) => Some(5),
            _ => None,
        }
    }

    fn edges(size: usize, x: i32, y: i32) -> u8 {
        if Self::corner(size, x, y).is_some() {
            return 0;
        }
        let m = size as i32 - 1;
        let e = Self::dim(size) as i32 - 1;
        let lines = [y == 0, x - y == m, x == e, y == e, y - x == m, x == 0];
        lines
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0, |mask, (i, _)| mask | (1 << i))
    }

    fn symmetry(size: usize, k: usize, x: i32, y: i32) -> (i32, i32) {
        let m = size as i32 - 1;
        let (x, y) = (x - m, y - m);
        let z = y - x;
        // six rotations, then the same six mirrored through x <-> y
        let (a, b) = match k {
            0 => (x, y),
            1 => (y, z),
            2 => (z, -x),
            3 => (-x, -y),
            4 => (-y, -z),
            5 => (-z, x),
            6 => (y, x),
            7 => (z, y),
            8 => (-x, z),
            9 => (-y, -x),
            10 => (-z, -y),
            _ => (x, -z),
        };
        (a + m, b + m)
    }

    fn connection_win(edges: u8, corners: u8) -> Option<u8> {
        if edges.count_ones() >= 3 {
            Some(0)
        } else if corners.count_ones() >= 2 {
            Some(1)
        } else {
            None
        }
    }
}

/// Y board: a triangle with side length `size`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Triangle;

impl Shape for Triangle {
    const NAME: &'static str = "y";
    const MIN_SIZE: usize = Y_MIN_SIZE;
    const MAX_SIZE: usize = Y_MAX_SIZE;
    const DEFAULT_SIZE: usize = Y_DEFAULT_SIZE;
    const NUM_SYMMETRIES: usize = 6;
    const WIN_NAMES: &'static [&'static str] = &["connection"];
    const RING_WIN: Option<u8> = None;

    fn dim(size: usize) -> usize {
        size
    }

    fn on_board(size: usize, x: i32, y: i32) -> bool {
        y >= 0 && y <= x && x < size as i32
    }

    fn num_cells(size: usize) -> usize {
        size * (size + 1) / 2
    }

    fn corner(_size: usize, _x: i32, _y: i32) -> Option<u8> {
        None
    }

    fn edges(size: usize, x: i32, y: i32) -> u8 {
        let mut mask = 0;
        if y == 0 {
            mask |= 1;
        }
        if x == size as i32 - 1 {
            mask |= 2;
        }
        if x == y {
            mask |= 4;
        }
        mask
    }

    fn symmetry(size: usize, k: usize, x: i32, y: i32) -> (i32, i32) {
        // barycentric coordinates, each permutation is one symmetry
        let a = y;
        let b = x - y;
        let c = size as i32 - 1 - x;
        let (a, b) = match k {
            0 => (a, b),
            1 => (a, c),
            2 => (b, a),
            3 => (b, c),
            4 => (c, a),
            _ => (c, b),
        };
        (a + b, a)
    }

    fn connection_win(edges: u8, _corners: u8) -> Option<u8> {
        (edges == 0b111).then_some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells<S: Shape>(size: usize) -> Vec<(i32, i32)> {
        let d = S::dim(size) as i32;
        let mut v = Vec::new();
        for y in 0..d {
            for x in 0..d {
                if S::on_board(size, x, y) {
                    v.push((x, y));
                }
            }
        }
        v
    }

    fn check_symmetries<S: Shape>(size: usize) {
        let all = cells::<S>(size);
        assert_eq!(all.len(), S::num_cells(size));
        for k in 0..S::NUM_SYMMETRIES {
            let mut images: Vec<_> = all
                .iter()
                .map(|&(x, y)| S::symmetry(size, k, x, y))
                .collect();
            for &(x, y) in &images {
                assert!(S::on_board(size, x, y), "symmetry {k} left the board");
            }
            // neighbors stay neighbors
            for &(x, y) in &all {
                for (dx, dy) in DIRECTIONS {
                    if S::on_board(size, x + dx, y + dy) {
                        let a = S::symmetry(size, k, x, y);
                        let b = S::symmetry(size, k, x + dx, y + dy);
                        let a = Move::new(a.0 as i8, a.1 as i8);
                        let b = Move::new(b.0 as i8, b.1 as i8);
                        assert_eq!(a.dist(b), 1);
                    }
                }
            }
            images.sort();
            images.dedup();
            assert_eq!(images.len(), all.len(), "symmetry {k} is not a bijection");
        }
        assert_eq!(S::symmetry(size, 0, 1, 0), (1, 0));
    }

    #[test]
    fn test_hexagon_symmetries() {
        check_symmetries::<Hexagon>(4);
    }

    #[test]
    fn test_triangle_symmetries() {
        check_symmetries::<Triangle>(5);
    }

    #[test]
    fn test_hexagon_corners_and_edges() {
        let size = 4;
        let all = cells::<Hexagon>(size);
        let corners = all
            .iter()
            .filter(|&&(x, y)| Hexagon::corner(size, x, y).is_some())
            .count();
        assert_eq!(corners, 6);
        for e in 0..6 {
            let on_edge = all
                .iter()
                .filter(|&&(x, y)| Hexagon::edges(size, x, y) == 1 << e)
                .count();
            assert_eq!(on_edge, size - 2, "edge {e}");
        }
    }

    #[test]
    fn test_triangle_edges() {
        let size = 4;
        assert_eq!(Triangle::edges(size, 0, 0), 0b101);
        assert_eq!(Triangle::edges(size, 3, 0), 0b011);
        assert_eq!(Triangle::edges(size, 3, 3), 0b110);
        assert_eq!(Triangle::edges(size, 2, 1), 0);
    }

    #[test]
    fn test_directions_are_circular() {
        for i in 0..6 {
            let (ax, ay) = DIRECTIONS[i];
            let (bx, by) = DIRECTIONS[(i + 1) % 6];
            let a = Move::new(ax as i8, ay as i8);
            let b = Move::new(bx as i8, by as i8);
            assert_eq!(a.dist(b), 1);
        }
    }

    #[test]
    fn test_move_text() {
        let m = Move::new(3, 2);
        assert_eq!(m.to_string(), "c4");
        assert_eq!("c4".parse::<Move>(), Ok(m));
        assert_eq!("resign".parse::<Move>(), Ok(Move::RESIGN));
        assert!("4c".parse::<Move>().is_err());
        assert_eq!(Move::from_bits(m.to_bits()), m);
        assert_eq!(Move::from_bits(Move::NONE.to_bits()), Move::NONE);
    }
}
