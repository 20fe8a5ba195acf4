//! Monte Carlo playouts (random game simulation).
//!
//! A rollout plays moves until the game is decided. Each move comes from the
//! first policy that has an opinion:
//! 1. instant win: win right now, or block the opponent's immediate win
//! 2. bridge protection: answer an intrusion into one of our bridges
//! 3. random: uniformly from a shuffled list, or weighted by pattern gammas
//!
//! Every simulation records its moves in a [`MoveList`], which turns the
//! rollout results into the direct and RAVE updates of the tree.

use crate::board::Board;
use crate::geometry::{Move, Shape};
use crate::outcome::{Outcome, Side};
use crate::patterns::{self, Gammas};

/// Half points `side` scores for a finished game.
#[inline]
pub fn score(outcome: Outcome, side: Side) -> u32 {
    match outcome {
        Outcome::Draw => 1,
        o if o.is_win_for(side) => 2,
        _ => 0,
    }
}

/// Shuffled list of empty cells, consumed from the back.
#[derive(Debug, Default)]
pub struct RandomPolicy {
    moves: Vec<Move>,
}

impl RandomPolicy {
    pub fn prepare<S: Shape>(&mut self, board: &Board<S>, rng: &mut fastrand::Rng) {
        self.moves.clear();
        self.moves.extend(board.moves());
        rng.shuffle(&mut self.moves);
    }

    pub fn choose_move<S: Shape>(&mut self, board: &Board<S>) -> Option<Move> {
        while let Some(m) = self.moves.pop() {
            if board.valid_move(m) {
                return Some(m);
            }
        }
        None
    }
}

/// Random move with probability proportional to the gamma of its pattern.
pub fn weighted_move<S: Shape>(board: &Board<S>, gammas: &Gammas, rng: &mut fastrand::Rng) -> Option<Move> {
    let side = board.to_play();
    let mut total = 0.0f32;
    let weighted: Vec<(Move, f32)> = board
        .moves()
        .map(|m| {
            let w = gammas.weight(board.pattern(m), side);
            total += w;
            (m, total)
        })
        .collect();
    if weighted.is_empty() || total <= 0.0 {
        return None;
    }
    let r = rng.f32() * total;
    weighted
        .iter()
        .find(|&&(_, cum)| r < cum)
        .or(weighted.last())
        .map(|&(m, _)| m)
}

/// Reply to an intrusion into a bridge of the side to move.
///
/// `last` is the opponent's last move; a bridge it broke into has the two
/// bridged stones on both sides of an empty neighbor of `last`.
pub fn protect_bridge<S: Shape>(board: &Board<S>, last: Move, rng: &mut fastrand::Rng) -> Option<Move> {
    if !board.on_board(last) {
        return None;
    }
    let side = board.to_play();
    let replies: Vec<usize> = patterns::bridge_replies(board.pattern(last), side).collect();
    match replies.len() {
        0 => None,
        n => Some(board.neighbor_move(last, replies[rng.usize(..n)])),
    }
}

/// Winning move for the side to move near the last two moves, or failing
/// that, the cell where the opponent would win.
pub fn instant_win<S: Shape>(board: &Board<S>, last: Move, prev: Move) -> Option<Move> {
    let side = board.to_play();
    let mut block = None;
    for center in [prev, last] {
        if !board.on_board(center) {
            continue;
        }
        for d in 0..6 {
            let m = board.neighbor_move(center, d);
            if !board.valid_move(m) {
                continue;
            }
            if board.test_outcome(m, side).is_win_for(side) {
                return Some(m);
            }
            if block.is_none() && board.test_outcome(m, !side).is_win_for(!side) {
                block = Some(m);
            }
        }
    }
    block
}

/// Which policies a rollout uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RolloutOptions {
    pub instant_win: bool,
    pub protect_bridge: bool,
    pub weighted_random: bool,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        RolloutOptions {
            instant_win: false,
            protect_bridge: true,
            weighted_random: false,
        }
    }
}

/// Moves and results of one simulation: the tree part, then one or more
/// rollouts from the leaf.
///
/// For RAVE, every cell remembers in which rollouts each side played it, as a
/// bitmask over rollout numbers; tree moves count for all rollouts.
#[derive(Debug, Default)]
pub struct MoveList {
    marks: [Vec<u32>; 2],
    touched: Vec<usize>,
    results: Vec<Outcome>,
}

fn side_slot(side: Side) -> usize {
    if side == Side::P2 { 1 } else { 0 }
}

impl MoveList {
    /// Start a new simulation on a board with `cells` slots.
    pub fn reset(&mut self, cells: usize) {
        if self.marks[0].len() == cells {
            for &i in &self.touched {
                self.marks[0][i] = 0;
                self.marks[1][i] = 0;
            }
        } else {
            for m in &mut self.marks {
                m.clear();
                m.resize(cells, 0);
            }
        }
        self.touched.clear();
        self.results.clear();
    }

    /// Record a tree move, which counts for every rollout.
    pub fn add_tree(&mut self, side: Side, cell: usize) {
        self.marks[side_slot(side)][cell] = u32::MAX;
        self.touched.push(cell);
    }

    /// Record a rollout move of the current rollout.
    pub fn add_rollout(&mut self, side: Side, cell: usize) {
        self.marks[side_slot(side)][cell] |= 1 << self.results.len();
        self.touched.push(cell);
    }

    pub fn finish_rollout(&mut self, outcome: Outcome) {
        self.results.push(outcome);
    }

    /// Rollouts finished so far.
    pub fn rollouts(&self) -> u32 {
        self.results.len() as u32
    }

    /// (sum, num) of all rollouts from `side`'s point of view.
    pub fn exp(&self, side: Side) -> (u32, u32) {
        let sum = self.results.iter().map(|&o| score(o, side)).sum();
        (sum, self.rollouts())
    }

    /// (sum, num) of the rollouts in which `side` played on `cell`.
    pub fn rave(&self, side: Side, cell: usize) -> (u32, u32) {
        let mask = self.marks[side_slot(side)][cell];
        if mask == 0 {
            return (0, 0);
        }
        self.results
            .iter()
            .enumerate()
            .filter(|&(r, _)| mask & (1 << r) != 0)
            .fold((0, 0), |(s, n), (_, &o)| (s + score(o, side), n + 1))
    }
}

/// Play the current rollout to the end. Returns the outcome and the number
/// of moves played.
pub fn rollout<S: Shape>(
    board: &mut Board<S>,
    mut last: Move,
    options: RolloutOptions,
    gammas: &Gammas,
    random: &mut RandomPolicy,
    movelist: &mut MoveList,
    rng: &mut fastrand::Rng,
) -> (Outcome, u32) {
    if !options.weighted_random {
        random.prepare(board, rng);
    }
    let mut prev = Move::NONE;
    let mut depth = 0;

    while !board.outcome().is_solved() {
        let mut choice = None;
        if options.instant_win {
            choice = instant_win(board, last, prev);
        }
        if choice.is_none() && options.protect_bridge {
            choice = protect_bridge(board, last, rng);
        }
        if choice.is_none() {
            choice = if options.weighted_random {
                weighted_move(board, gammas, rng)
            } else {
                random.choose_move(board)
            };
        }
        let Some(m) = choice else {
            break;
        };

        let side = board.to_play();
        let cell = board.xy(m);
        if !board.place(m, true, false) {
            break;
        }
        movelist.add_rollout(side, cell);
        prev = last;
        last = m;
        depth += 1;
    }

    let outcome = board.outcome();
    movelist.finish_rollout(outcome);
    (outcome, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Hexagon, Triangle};

    #[test]
    fn test_rollout_finishes_game() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut random = RandomPolicy::default();
        let mut movelist = MoveList::default();
        let gammas = Gammas::default();
        for options in [
            RolloutOptions::default(),
            RolloutOptions {
                instant_win: true,
                protect_bridge: true,
                weighted_random: true,
            },
        ] {
            let mut board = Board::<Hexagon>::new(4).unwrap();
            movelist.reset(board.vec_size());
            let (outcome, depth) =
                rollout(&mut board, Move::NONE, options, &gammas, &mut random, &mut movelist, &mut rng);
            assert!(outcome.is_solved());
            assert_eq!(depth as usize, board.num_moves());
            assert_eq!(movelist.rollouts(), 1);
        }
    }

    #[test]
    fn test_y_rollouts_never_draw() {
        let mut rng = fastrand::Rng::with_seed(11);
        let mut random = RandomPolicy::default();
        let mut movelist = MoveList::default();
        let gammas = Gammas::default();
        for _ in 0..50 {
            let mut board = Board::<Triangle>::new(6).unwrap();
            movelist.reset(board.vec_size());
            let (outcome, _) = rollout(
                &mut board,
                Move::NONE,
                RolloutOptions::default(),
                &gammas,
                &mut random,
                &mut movelist,
                &mut rng,
            );
            assert!(outcome.winner().is_some());
        }
    }

    #[test]
    fn test_instant_win_and_block() {
        let mut board = Board::<Triangle>::new(4).unwrap();
        // P1: a1 a2 a3, P2: d4 c4; P1 to move wins at a4
        for mv in ["a1", "d4", "a2", "c4", "a3"] {
            assert!(board.place(mv.parse().unwrap(), true, true));
        }
        // P2 to move must block a4
        let last: Move = "a3".parse().unwrap();
        assert_eq!(instant_win(&board, last, Move::NONE), Some("a4".parse().unwrap()));
    }

    #[test]
    fn test_protect_bridge() {
        let mut board = Board::<Hexagon>::new(4).unwrap();
        // P1 bridge (3,3)-(5,4) shares the neighbors (4,3) and (4,4)
        let mut rng = fastrand::Rng::with_seed(1);
        for m in [Move::new(3, 3), Move::new(4, 3), Move::new(5, 4), Move::new(0, 0)] {
            assert!(board.place(m, true, true));
        }
        assert_eq!(board.to_play(), Side::P1);
        assert_eq!(protect_bridge(&board, Move::new(0, 0), &mut rng), None);
        assert_eq!(protect_bridge(&board, Move::new(4, 3), &mut rng), Some(Move::new(4, 4)));
    }

    #[test]
    fn test_movelist_rave() {
        let mut ml = MoveList::default();
        ml.reset(10);
        ml.add_tree(Side::P1, 1);
        ml.add_rollout(Side::P2, 2);
        ml.add_rollout(Side::P1, 3);
        ml.finish_rollout(Outcome::P1);
        ml.add_rollout(Side::P1, 2);
        ml.finish_rollout(Outcome::P2);

        assert_eq!(ml.exp(Side::P1), (2, 2));
        assert_eq!(ml.rave(Side::P1, 1), (2, 2));
        assert_eq!(ml.rave(Side::P1, 2), (0, 1));
        assert_eq!(ml.rave(Side::P2, 2), (0, 1));
        assert_eq!(ml.rave(Side::P1, 3), (2, 1));
        assert_eq!(ml.rave(Side::P1, 4), (0, 0));

        ml.reset(10);
        assert_eq!(ml.rave(Side::P1, 1), (0, 0));
        assert_eq!(ml.rollouts(), 0);
    }
}
