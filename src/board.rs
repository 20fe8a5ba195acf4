//! The connectivity board.
//!
//! The board is a padded 1D array of cells covering the shape's square grid,
//! so every on-board cell can reach its six neighbors by adding a fixed
//! offset without bounds checks. Padding and off-shape cells are owned by
//! [`Side::Off`].
//!
//! Stones never leave the board, so connectivity is tracked incrementally
//! with union-find: each group representative carries the group's size and
//! the bitmasks of edges and corners it touches. Winning connections are
//! detected the moment the last stone joins them.
//!
//! The board also keeps
//! - a 12-bit neighbor pattern per cell (see [`patterns`](crate::patterns))
//! - a Zobrist hash that is canonical under the board's symmetries while
//!   only a few stones have been placed

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::constants::{MIN_RING_SIZE, UNIQUE_DEPTH};
use crate::error::{EngineError, Result};
use crate::geometry::{DIRECTIONS, Move, Shape};
use crate::outcome::{Outcome, Side};
use crate::patterns;
use crate::zobrist::Zobrist;

/// A cell of the board, and for group representatives, the group summary.
#[derive(Debug)]
pub struct Cell {
    /// Who owns this cell
    pub owner: Side,
    /// Size of the group (valid on representatives)
    pub size: u16,
    /// Union-find parent; rewritten by path compression during queries
    parent: AtomicU16,
    /// Corners the group touches (valid on representatives)
    pub corner: u8,
    /// Edges the group touches (valid on representatives)
    pub edge: u8,
    /// Placed for real rather than during a playout
    pub perm: bool,
    /// Neighbor pattern, see [`patterns`]
    pub pattern: u16,
}

impl Clone for Cell {
    fn clone(&self) -> Self {
        Cell {
            owner: self.owner,
            size: self.size,
            parent: AtomicU16::new(self.parent()),
            corner: self.corner,
            edge: self.edge,
            perm: self.perm,
            pattern: self.pattern,
        }
    }
}

impl Cell {
    fn new(owner: Side, parent: usize, corner: u8, edge: u8, pattern: u16) -> Self {
        Cell {
            owner,
            size: 1,
            parent: AtomicU16::new(parent as u16),
            corner,
            edge,
            perm: false,
            pattern,
        }
    }

    #[inline]
    fn parent(&self) -> u16 {
        self.parent.load(Ordering::Relaxed)
    }

    #[inline]
    fn set_parent(&self, p: usize) {
        self.parent.store(p as u16, Ordering::Relaxed);
    }
}

/// Summary of the group a stone would form, without placing it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupInfo {
    pub size: u16,
    pub corner: u8,
    pub edge: u8,
}

impl GroupInfo {
    /// Number of edges plus corners touched.
    pub fn connectivity(&self) -> u32 {
        self.corner.count_ones() + self.edge.count_ones()
    }
}

/// Own groups around a cell, one entry per run of contiguous own neighbors.
///
/// Two neighbors in the same run are adjacent to each other, so they are
/// already in the same group and joining the second one is pointless.
#[derive(Clone, Copy, Debug, Default)]
struct Runs {
    roots: [usize; 3],
    lens: [u8; 3],
    count: usize,
}

impl Runs {
    fn roots(&self) -> &[usize] {
        &self.roots[..self.count]
    }

    /// Whether the new stone touches one group at two non-adjacent points,
    /// the only way a placement can close a new ring.
    fn may_ring(&self) -> bool {
        let roots = self.roots();
        self.lens[..self.count].iter().any(|&l| l >= 3)
            || (0..roots.len()).any(|i| roots[i + 1..].contains(&roots[i]))
    }
}

/// A game board for the shape `S`.
#[derive(Clone)]
pub struct Board<S: Shape> {
    size: usize,
    /// Width of the padded grid
    stride: usize,
    num_cells: usize,
    num_moves: usize,
    last_move: Move,
    to_play: Side,
    outcome: Outcome,
    win_type: Option<u8>,
    cells: Vec<Cell>,
    offsets: [isize; 6],
    hash: Zobrist,
    /// Whether rings count as wins (shapes with rings only)
    pub check_rings: bool,
    shape: PhantomData<S>,
}

impl<S: Shape> Board<S> {
    /// Create an empty board of the given size.
    pub fn new(size: usize) -> Result<Self> {
        let mut board = Board {
            size: 0,
            stride: 0,
            num_cells: 0,
            num_moves: 0,
            last_move: Move::NONE,
            to_play: Side::P1,
            outcome: Outcome::Unknown,
            win_type: None,
            cells: Vec::new(),
            offsets: [0; 6],
            hash: Zobrist::new(),
            check_rings: S::RING_WIN.is_some(),
            shape: PhantomData,
        };
        board.resize(size)?;
        Ok(board)
    }

    /// Whether `size` is within the shape's supported range.
    pub fn valid_size(size: usize) -> bool {
        (S::MIN_SIZE..=S::MAX_SIZE).contains(&size)
    }

    /// Change the board size, clearing the board.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        if !Self::valid_size(size) {
            return Err(EngineError::InvalidSize {
                size,
                min: S::MIN_SIZE,
                max: S::MAX_SIZE,
            });
        }
        self.size = size;
        self.stride = S::dim(size) + 2;
        self.num_cells = S::num_cells(size);
        let stride = self.stride as isize;
        self.offsets = DIRECTIONS.map(|(dx, dy)| dy as isize * stride + dx as isize);
        self.clear();
        Ok(())
    }

    /// Remove all stones.
    pub fn clear(&mut self) {
        self.num_moves = 0;
        self.last_move = Move::NONE;
        self.to_play = Side::P1;
        self.outcome = Outcome::Unknown;
        self.win_type = None;
        self.hash.clear();

        let n = self.stride * self.stride;
        self.cells = (0..n)
            .map(|i| {
                let m = self.yx(i);
                let (x, y) = (m.x as i32, m.y as i32);
                if S::on_board(self.size, x, y) {
                    let corner = S::corner(self.size, x, y).map_or(0, |c| 1 << c);
                    Cell::new(Side::None, i, corner, S::edges(self.size, x, y), 0)
                } else {
                    Cell::new(Side::Off, i, 0, 0, 0)
                }
            })
            .collect();

        for i in 0..n {
            if self.cells[i].owner == Side::Off {
                continue;
            }
            let pattern = (0..6).fold(0, |p, d| {
                patterns::set(p, d, self.cells[self.neighbor(i, d)].owner)
            });
            self.cells[i].pattern = pattern;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    pub fn num_moves(&self) -> usize {
        self.num_moves
    }

    /// Legal moves left; zero once the game is decided.
    pub fn moves_avail(&self) -> usize {
        if self.outcome.is_solved() {
            0
        } else {
            self.num_cells - self.num_moves
        }
    }

    pub fn last_move(&self) -> Move {
        self.last_move
    }

    pub fn to_play(&self) -> Side {
        self.to_play
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Which winning condition ended the game, indexing `S::WIN_NAMES`.
    pub fn win_type(&self) -> Option<u8> {
        self.win_type
    }

    pub fn win_name(&self) -> Option<&'static str> {
        self.win_type.map(|w| S::WIN_NAMES[w as usize])
    }

    /// Array index of a cell. The move must be on the grid.
    #[inline]
    pub fn xy(&self, m: Move) -> usize {
        (m.y as usize + 1) * self.stride + m.x as usize + 1
    }

    /// Move at an array index.
    #[inline]
    pub fn yx(&self, i: usize) -> Move {
        Move::new(
            (i % self.stride) as i8 - 1,
            (i / self.stride) as i8 - 1,
        )
    }

    /// Number of slots in the cell array.
    pub fn vec_size(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn neighbor(&self, i: usize, dir: usize) -> usize {
        (i as isize + self.offsets[dir]) as usize
    }

    /// Neighbor of any slot, including padding, or `None` past the array.
    fn grid_neighbor(&self, i: usize, dir: usize) -> Option<usize> {
        let x = (i % self.stride) as i32 + DIRECTIONS[dir].0;
        let y = (i / self.stride) as i32 + DIRECTIONS[dir].1;
        let s = self.stride as i32;
        (x >= 0 && y >= 0 && x < s && y < s).then(|| (y * s + x) as usize)
    }

    pub fn on_board(&self, m: Move) -> bool {
        m.is_cell() && S::on_board(self.size, m.x as i32, m.y as i32)
    }

    /// Owner of a cell. Off-board moves report [`Side::Off`].
    pub fn get(&self, m: Move) -> Side {
        if self.on_board(m) {
            self.cells[self.xy(m)].owner
        } else {
            Side::Off
        }
    }

    pub fn cell(&self, m: Move) -> &Cell {
        &self.cells[self.xy(m)]
    }

    /// Legal: on the board, empty, and the game still open.
    pub fn valid_move(&self, m: Move) -> bool {
        !self.outcome.is_solved() && self.on_board(m) && self.cells[self.xy(m)].owner == Side::None
    }

    /// Iterate over the legal moves in index order.
    pub fn moves(&self) -> impl Iterator<Item = Move> + '_ {
        let open = !self.outcome.is_solved();
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, c)| open && c.owner == Side::None)
            .map(|(i, _)| self.yx(i))
    }

    /// Representative of the group containing cell `i`.
    ///
    /// Compresses the path from `i` only, leaving the cells in between alone.
    pub fn find_group(&self, i: usize) -> usize {
        let mut p = self.cells[i].parent() as usize;
        if p != i {
            loop {
                let next = self.cells[p].parent() as usize;
                if next == p {
                    break;
                }
                p = next;
            }
            self.cells[i].set_parent(p);
        }
        p
    }

    /// Representative of the group at `m`.
    pub fn group(&self, m: Move) -> &Cell {
        &self.cells[self.find_group(self.xy(m))]
    }

    /// Merge the groups of `i` and `j`. Returns true if they were already one group.
    fn join_groups(&mut self, i: usize, j: usize) -> bool {
        let mut i = self.find_group(i);
        let mut j = self.find_group(j);
        if i == j {
            return true;
        }
        if self.cells[i].size < self.cells[j].size {
            std::mem::swap(&mut i, &mut j);
        }
        self.cells[j].set_parent(i);
        let (size, corner, edge) = (self.cells[j].size, self.cells[j].corner, self.cells[j].edge);
        let g = &mut self.cells[i];
        g.size += size;
        g.corner |= corner;
        g.edge |= edge;
        false
    }

    /// Own groups around cell `i`, one per run of contiguous `side` neighbors.
    fn runs(&self, i: usize, side: Side) -> Runs {
        let own = |d: usize| self.cells[self.neighbor(i, d)].owner == side;
        let mut runs = Runs::default();
        // start right after a gap so runs don't wrap around the start
        let Some(start) = (0..6).find(|&d| !own(d)) else {
            runs.roots[0] = self.find_group(self.neighbor(i, 0));
            runs.lens[0] = 6;
            runs.count = 1;
            return runs;
        };
        for k in 1..=6 {
            let d = (start + k) % 6;
            if !own(d) {
                continue;
            }
            if own((d + 5) % 6) {
                runs.lens[runs.count - 1] += 1;
            } else {
                runs.roots[runs.count] = self.find_group(self.neighbor(i, d));
                runs.lens[runs.count] = 1;
                runs.count += 1;
            }
        }
        runs
    }

    /// Place a stone for the side to move.
    ///
    /// Returns false, changing nothing, if the move is illegal or the game
    /// is over. With `check_win` the outcome is updated; `permanent` marks
    /// stones of the real game as opposed to playout stones.
    pub fn place(&mut self, m: Move, check_win: bool, permanent: bool) -> bool {
        if !self.valid_move(m) {
            return false;
        }
        let i = self.xy(m);
        let side = self.to_play;
        let runs = self.runs(i, side);

        self.last_move = m;
        self.num_moves += 1;
        self.cells[i].owner = side;
        self.cells[i].perm = permanent;

        self.update_hash(m, side);
        self.update_pattern(i, side);

        for &root in runs.roots() {
            self.join_groups(i, root);
        }

        if check_win {
            let g = self.find_group(i);
            let (edge, corner, size) = (self.cells[g].edge, self.cells[g].corner, self.cells[g].size);
            if let Some(w) = S::connection_win(edge, corner) {
                self.outcome = Outcome::win_for(side);
                self.win_type = Some(w);
            } else if let Some(w) = S::RING_WIN.filter(|_| {
                self.check_rings
                    && runs.may_ring()
                    && size >= MIN_RING_SIZE
                    && self.ring_through(i, side, |j| self.find_group(j) == g)
            }) {
                self.outcome = Outcome::win_for(side);
                self.win_type = Some(w);
            } else if self.num_moves == self.num_cells {
                self.outcome = Outcome::Draw;
            }
        }

        self.to_play = !self.to_play;
        true
    }

    /// The outcome placing `m` for `side` would produce, without placing it.
    pub fn test_outcome(&self, m: Move, side: Side) -> Outcome {
        if !self.valid_move(m) {
            return Outcome::Unknown;
        }
        let i = self.xy(m);
        let runs = self.runs(i, side);
        let info = self.merge_info(i, &runs);

        if S::connection_win(info.edge, info.corner).is_some() {
            return Outcome::win_for(side);
        }
        if S::RING_WIN.is_some()
            && self.check_rings
            && runs.may_ring()
            && info.size >= MIN_RING_SIZE
            && self.ring_through(i, side, |j| {
                self.cells[j].owner == side && runs.roots().contains(&self.find_group(j))
            })
        {
            return Outcome::win_for(side);
        }
        if self.num_moves + 1 == self.num_cells {
            return Outcome::Draw;
        }
        Outcome::Unknown
    }

    fn merge_info(&self, i: usize, runs: &Runs) -> GroupInfo {
        let c = &self.cells[i];
        let mut info = GroupInfo {
            size: 1,
            corner: c.corner,
            edge: c.edge,
        };
        let mut seen = [usize::MAX; 3];
        for (k, &root) in runs.roots().iter().enumerate() {
            if seen.contains(&root) {
                continue;
            }
            seen[k] = root;
            let g = &self.cells[root];
            info.size += g.size;
            info.corner |= g.corner;
            info.edge |= g.edge;
        }
        info
    }

    /// The group the side to move would form by playing `m`.
    pub fn test_cell(&self, m: Move) -> GroupInfo {
        let i = self.xy(m);
        let runs = self.runs(i, self.to_play);
        self.merge_info(i, &runs)
    }

    /// Edges plus corners the group formed by `m` would touch.
    pub fn test_connectivity(&self, m: Move) -> u32 {
        self.test_cell(m).connectivity()
    }

    /// Size of the group formed by `m`.
    pub fn test_size(&self, m: Move) -> u16 {
        self.test_cell(m).size
    }

    /// Whether `side` could still surround `m`: false if `m` or one of its
    /// neighbors is off the board or belongs to an opponent group touching an
    /// edge or corner.
    pub fn encirclable(&self, m: Move, side: Side) -> bool {
        let other = !side;
        let i = self.xy(m);
        let anchored = |j: usize| {
            let g = &self.cells[self.find_group(j)];
            g.owner == other && (g.edge != 0 || g.corner != 0)
        };
        if anchored(i) {
            return false;
        }
        (0..6).all(|d| {
            let n = self.neighbor(i, d);
            self.cells[n].owner != Side::Off && !anchored(n)
        })
    }

    /// Whether the stone at `i`, together with the cells `in_group` accepts,
    /// closes a ring around at least one cell.
    ///
    /// A new ring always has a neighbor of `i` inside it, so only those are
    /// tested: empty or opponent neighbors with a single flood fill from
    /// outside the board, own neighbors one at a time with the neighbor
    /// itself removed from the wall. Neighbors that are not `encirclable`
    /// are always reachable from outside and are skipped.
    fn ring_through(&self, i: usize, side: Side, in_group: impl Fn(usize) -> bool) -> bool {
        let inner: Vec<usize> = (0..6)
            .map(|d| self.neighbor(i, d))
            .filter(|&n| self.cells[n].owner != Side::Off && self.encirclable(self.yx(n), side))
            .collect();
        if inner.is_empty() {
            return false;
        }

        let wall = |j: usize| j == i || in_group(j);
        let reached = self.flood_outside(&wall);
        let mut own = [usize::MAX; 6];
        for (d, &n) in inner.iter().enumerate() {
            if !wall(n) {
                if !reached[n] {
                    return true;
                }
            } else {
                own[d] = n;
            }
        }
        own.iter().filter(|&&n| n != usize::MAX).any(|&n| {
            let reached = self.flood_outside(&|j: usize| j != n && wall(j));
            !reached[n]
        })
    }

    /// Slots reachable from outside the board without crossing a wall.
    fn flood_outside(&self, wall: &dyn Fn(usize) -> bool) -> Vec<bool> {
        let mut reached = vec![false; self.cells.len()];
        let mut stack: Vec<usize> = Vec::with_capacity(self.cells.len());
        for (j, c) in self.cells.iter().enumerate() {
            if c.owner == Side::Off {
                reached[j] = true;
                stack.push(j);
            }
        }
        while let Some(j) = stack.pop() {
            for d in 0..6 {
                if let Some(n) = self.grid_neighbor(j, d) {
                    if !reached[n] && !wall(n) {
                        reached[n] = true;
                        stack.push(n);
                    }
                }
            }
        }
        reached
    }

    fn update_hash(&mut self, m: Move, side: Side) {
        let turn = side.to_index();
        if self.num_moves > UNIQUE_DEPTH {
            let i = self.xy(m);
            self.hash.update(0, 3 * i + turn);
            return;
        }
        for k in 0..S::NUM_SYMMETRIES {
            let v = self.symmetric_value(m, k, turn);
            self.hash.update(k, v);
        }
    }

    fn symmetric_value(&self, m: Move, k: usize, turn: usize) -> usize {
        let (x, y) = S::symmetry(self.size, k, m.x as i32, m.y as i32);
        3 * self.xy(Move::new(x as i8, y as i8)) + turn
    }

    /// Position hash; canonical under the board's symmetries for the first moves.
    pub fn hash(&self) -> u64 {
        if self.num_moves > UNIQUE_DEPTH {
            self.hash.get(0)
        } else {
            self.hash.min(S::NUM_SYMMETRIES)
        }
    }

    /// The hash after `side` plays `m`.
    pub fn test_hash(&self, m: Move, side: Side) -> u64 {
        let turn = side.to_index();
        if self.num_moves >= UNIQUE_DEPTH {
            return self.hash.test(0, 3 * self.xy(m) + turn);
        }
        (0..S::NUM_SYMMETRIES)
            .map(|k| self.hash.test(k, self.symmetric_value(m, k, turn)))
            .min()
            .unwrap_or(0)
    }

    fn update_pattern(&mut self, i: usize, side: Side) {
        for d in 0..6 {
            let n = self.neighbor(i, d);
            let c = &mut self.cells[n];
            c.pattern = patterns::set(c.pattern, (d + 3) % 6, side);
        }
    }

    /// Neighbor pattern of a cell.
    pub fn pattern(&self, m: Move) -> u16 {
        self.cells[self.xy(m)].pattern
    }

    /// Number of `side` stones next to `m`.
    pub fn local(&self, m: Move, side: Side) -> i32 {
        patterns::count(self.pattern(m), side)
    }

    /// Cell next to `m` in direction `dir`.
    pub fn neighbor_move(&self, m: Move, dir: usize) -> Move {
        self.yx(self.neighbor(self.xy(m), dir))
    }
}

impl<S: Shape> fmt::Display for Board<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dim = S::dim(self.size) as i32;
        write!(f, "  ")?;
        for x in 0..dim {
            write!(f, "{:>2}", x + 1)?;
        }
        writeln!(f)?;
        for y in 0..dim {
            let off = (0..dim)
                .filter(|&x| !S::on_board(self.size, x, y))
                .count();
            write!(f, "{} {}", (b'a' + y as u8) as char, " ".repeat(off))?;
            for x in 0..dim {
                let m = Move::new(x as i8, y as i8);
                if !self.on_board(m) {
                    continue;
                }
                let c = match self.get(m) {
                    Side::P1 => 'W',
                    Side::P2 => 'B',
                    _ => '.',
                };
                if m == self.last_move {
                    write!(f, "[{c}")?;
                } else {
                    write!(f, " {c}")?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Hexagon, Triangle};

    fn play<S: Shape>(board: &mut Board<S>, moves: &[&str]) {
        for mv in moves {
            let m: Move = mv.parse().unwrap();
            assert!(board.place(m, true, true), "move {mv} failed");
        }
    }

    #[test]
    fn test_new_board() {
        let b = Board::<Hexagon>::new(4).unwrap();
        assert_eq!(b.num_cells(), 37);
        assert_eq!(b.moves().count(), 37);
        assert_eq!(b.to_play(), Side::P1);
        let b = Board::<Triangle>::new(4).unwrap();
        assert_eq!(b.moves().count(), 10);
    }

    #[test]
    fn test_invalid_size() {
        assert!(matches!(
            Board::<Hexagon>::new(2),
            Err(EngineError::InvalidSize { .. })
        ));
        assert!(Board::<Triangle>::new(26).is_err());
    }

    #[test]
    fn test_place_rejects_occupied_and_off_board() {
        let mut b = Board::<Triangle>::new(4).unwrap();
        let m = Move::new(0, 0);
        assert!(b.place(m, true, true));
        assert!(!b.place(m, true, true));
        assert!(!b.place(Move::new(0, 1), true, true));
        assert!(!b.place(Move::NONE, true, true));
        assert_eq!(b.num_moves(), 1);
        assert_eq!(b.to_play(), Side::P2);
    }

    #[test]
    fn test_union_find_groups() {
        let mut b = Board::<Triangle>::new(5).unwrap();
        // P1 a1 and a2 are adjacent, P2 plays away
        play(&mut b, &["a1", "a5", "a2", "b5"]);
        let g = b.group("a1".parse().unwrap());
        assert_eq!(g.size, 2);
        assert_eq!(g.owner, Side::P1);
        assert_eq!(b.group("b5".parse().unwrap()).size, 2);

        // a3 would join a1 a2, touching the bottom and left edges
        let a3: Move = "a3".parse().unwrap();
        assert_eq!(b.test_size(a3), 3);
        assert_eq!(b.test_connectivity(a3), 2);
        assert_eq!(b.test_size("c3".parse().unwrap()), 1);
    }

    #[test]
    fn test_y_win() {
        let mut b = Board::<Triangle>::new(4).unwrap();
        // P1 runs along y = 0; a1 touches two edges and a4 the third
        play(&mut b, &["a1", "d4", "a2", "c4", "a3", "b4"]);
        assert_eq!(b.outcome(), Outcome::Unknown);
        let m: Move = "a4".parse().unwrap();
        assert_eq!(b.test_outcome(m, Side::P1), Outcome::P1);
        assert!(b.place(m, true, true));
        assert_eq!(b.outcome(), Outcome::P1);
        assert_eq!(b.win_type(), Some(0));
        assert_eq!(b.moves_avail(), 0);
        assert!(!b.place("b2".parse().unwrap(), true, true));
    }

    #[test]
    fn test_havannah_bridge() {
        let mut b = Board::<Hexagon>::new(3).unwrap();
        // corners (0,0) and (2,0) along y = 0
        play(&mut b, &["a1", "e5", "a2", "e4"]);
        let m: Move = "a3".parse().unwrap();
        assert_eq!(b.test_outcome(m, Side::P1), Outcome::P1);
        assert!(b.place(m, true, true));
        assert_eq!(b.win_name(), Some("bridge"));
    }

    #[test]
    fn test_havannah_ring() {
        let mut b = Board::<Hexagon>::new(4).unwrap();
        // ring around the center (3,3); P2 answers on the rim
        let center = Move::new(3, 3);
        let ring: Vec<Move> = DIRECTIONS
            .iter()
            .map(|&(dx, dy)| Move::new(3 + dx as i8, 3 + dy as i8))
            .collect();
        let elsewhere = ["a1", "a2", "a3", "g7", "g6"];
        for k in 0..5 {
            assert!(b.place(ring[k], true, true));
            assert!(b.place(elsewhere[k].parse().unwrap(), true, true));
        }
        assert_eq!(b.get(center), Side::None);
        assert_eq!(b.test_outcome(ring[5], Side::P1), Outcome::P1);
        assert!(b.place(ring[5], true, true));
        assert_eq!(b.outcome(), Outcome::P1);
        assert_eq!(b.win_name(), Some("ring"));
    }

    #[test]
    fn test_havannah_filled_ring() {
        let mut b = Board::<Hexagon>::new(4).unwrap();
        let center = Move::new(3, 3);
        let ring: Vec<Move> = DIRECTIONS
            .iter()
            .map(|&(dx, dy)| Move::new(3 + dx as i8, 3 + dy as i8))
            .collect();
        let elsewhere = ["a1", "a2", "a3", "g7", "g6", "g5"];
        assert!(b.place(center, true, true));
        assert!(b.place(elsewhere[0].parse().unwrap(), true, true));
        for k in 0..5 {
            assert!(b.place(ring[k], true, true));
            assert!(b.place(elsewhere[k + 1].parse().unwrap(), true, true));
        }
        assert_eq!(b.outcome(), Outcome::Unknown);
        assert!(b.place(ring[5], true, true));
        assert_eq!(b.win_name(), Some("ring"));
    }

    #[test]
    fn test_rings_can_be_disabled() {
        let mut b = Board::<Hexagon>::new(4).unwrap();
        b.check_rings = false;
        let ring: Vec<Move> = DIRECTIONS
            .iter()
            .map(|&(dx, dy)| Move::new(3 + dx as i8, 3 + dy as i8))
            .collect();
        let elsewhere = ["a1", "a2", "a3", "g7", "g6"];
        for k in 0..5 {
            assert!(b.place(ring[k], true, true));
            assert!(b.place(elsewhere[k].parse().unwrap(), true, true));
        }
        assert_eq!(b.test_outcome(ring[5], Side::P1), Outcome::Unknown);
        assert!(b.place(ring[5], true, true));
        assert_eq!(b.outcome(), Outcome::Unknown);
    }

    #[test]
    fn test_pattern_cache() {
        let mut b = Board::<Triangle>::new(4).unwrap();
        let corner = Move::new(0, 0);
        // (0,0) has neighbors (1,0) and (1,1) on the board
        let p = b.pattern(corner);
        assert_eq!(patterns::count(p, Side::Off), 4);
        assert_eq!(patterns::count(p, Side::None), 2);
        b.place(Move::new(1, 0), true, true);
        assert_eq!(b.local(corner, Side::P1), 1);
    }

    #[test]
    fn test_encirclable() {
        let b = Board::<Hexagon>::new(4).unwrap();
        assert!(b.encirclable(Move::new(3, 3), Side::P1));
        assert!(!b.encirclable(Move::new(0, 0), Side::P1));

        let mut b = Board::<Hexagon>::new(4).unwrap();
        assert!(b.encirclable(Move::new(1, 1), Side::P1));
        assert!(b.place(Move::new(3, 3), true, true));
        assert!(b.place(Move::new(0, 0), true, true));
        // next to a corner stone of the opponent
        assert!(!b.encirclable(Move::new(1, 1), Side::P1));
        assert!(b.encirclable(Move::new(1, 1), Side::P2));
    }

    #[test]
    fn test_hash_symmetric_first_move() {
        let size = 4;
        let mut a = Board::<Hexagon>::new(size).unwrap();
        a.place(Move::new(1, 0), true, true);
        for k in 1..Hexagon::NUM_SYMMETRIES {
            let (x, y) = Hexagon::symmetry(size, k, 1, 0);
            let mut b = Board::<Hexagon>::new(size).unwrap();
            let m = Move::new(x as i8, y as i8);
            assert_eq!(Board::<Hexagon>::new(size).unwrap().test_hash(m, Side::P1), a.hash());
            b.place(m, true, true);
            assert_eq!(a.hash(), b.hash(), "symmetry {k}");
        }
    }

    #[test]
    fn test_test_hash_matches_place() {
        let mut b = Board::<Triangle>::new(6).unwrap();
        let moves: Vec<Move> = b.moves().collect();
        for (k, &m) in moves.iter().step_by(2).take(9).enumerate() {
            let expected = b.test_hash(m, b.to_play());
            assert!(b.place(m, true, true));
            assert_eq!(b.hash(), expected, "move {k}");
        }
    }

    #[test]
    fn test_display_lists_every_cell() {
        let b = Board::<Triangle>::new(4).unwrap();
        let s = b.to_string();
        assert_eq!(s.matches('.').count(), 10);
    }
}
