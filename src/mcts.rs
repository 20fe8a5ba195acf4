//! Monte Carlo Tree Search (MCTS) with RAVE and a proof overlay.
//!
//! This module implements:
//! - RAVE-blended selection with knowledge bonuses and first play urgency
//! - expansion seeded with immediate outcomes, macro moves for forced blocks
//!   and double-threat loss proofs
//! - multi-rollout leaves with virtual loss for concurrent workers
//! - proven-outcome propagation (win if any child wins, otherwise the best
//!   of draw and loss once every child is proven)
//! - garbage collection that keeps heavy subtrees and proof paths
//! - root move choice and principal variation
//!
//! The tree is shared: many [`Simulator`]s walk it at once through `&`
//! references, updating atomics. Everything that needs `&mut` (tree reuse,
//! garbage collection) only happens while the worker pool is paused.

use std::time::Instant;

use crate::arena::NodeArena;
use crate::board::Board;
use crate::constants::{
    FPU_URGENCY, GC_LIMIT, GC_SOLVED, KNOW_BRIDGE, KNOW_CONNECT, KNOW_LOCAL_REPLY, KNOW_LOCALITY,
    KNOW_SIZE, MAX_ROLLOUTS, MIN_RAVE, MS_RAVE, RAVE_FACTOR, ROLLOUTS, VISIT_EXPAND,
};
use crate::error::{EngineError, Result};
use crate::geometry::{Move, Shape};
use crate::node::{Node, ProofState};
use crate::outcome::{Outcome, Side};
use crate::patterns::{self, Gammas};
use crate::playout::{MoveList, RandomPolicy, RolloutOptions, rollout};
use crate::pool::{MAX_WIN_TYPES, WorkerStats};

/// Tunable search parameters.
#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Direct visits at which RAVE and direct experience weigh the same
    pub rave_factor: f32,
    /// Extra RAVE factor per empty cell
    pub decr_rave: f32,
    /// Add the knowledge bonus to child values
    pub knowledge: bool,
    /// Value of an unvisited child
    pub fpurgency: f32,
    /// UCT exploration constant, 0 to disable
    pub explore: f32,
    /// Scale exploration by the parent's average
    pub parent_explore: bool,
    /// Root choice: -2 most wins, -1 most visits, otherwise RAVE factor for scoring
    pub ms_rave: f32,
    /// Exploration penalty for the root choice
    pub ms_explore: f32,
    /// Reuse the subtree of the played move
    pub keep_tree: bool,
    /// 0 off, 1 immediate wins at expansion, 2 also forced blocks and double threats
    pub minimax: u8,
    /// Extra visits a leaf needs before expansion
    pub visit_expand: u32,
    /// Rollouts per leaf visit
    pub rollouts: u32,
    /// Initial garbage collection visit threshold
    pub gc_limit: u32,
    /// Visits a proven subtree needs to survive garbage collection
    pub gc_solved: u32,
    pub know_local_reply: i32,
    pub know_locality: i32,
    pub know_connect: i32,
    pub know_size: i32,
    pub know_bridge: i32,
    pub rollout: RolloutOptions,
    pub gammas: Gammas,
    /// Time the phases of each simulation
    pub profile: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            rave_factor: RAVE_FACTOR,
            decr_rave: 0.0,
            knowledge: true,
            fpurgency: FPU_URGENCY,
            explore: 0.0,
            parent_explore: false,
            ms_rave: MS_RAVE,
            ms_explore: 0.0,
            keep_tree: true,
            minimax: 2,
            visit_expand: VISIT_EXPAND,
            rollouts: ROLLOUTS,
            gc_limit: GC_LIMIT,
            gc_solved: GC_SOLVED,
            know_local_reply: KNOW_LOCAL_REPLY,
            know_locality: KNOW_LOCALITY,
            know_connect: KNOW_CONNECT,
            know_size: KNOW_SIZE,
            know_bridge: KNOW_BRIDGE,
            rollout: RolloutOptions::default(),
            gammas: Gammas::default(),
            profile: false,
        }
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> std::result::Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid value '{value}' for {name}"))
}

fn parse_flag(name: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "1" | "true" | "on" => Ok(true),
        "0" | "false" | "off" => Ok(false),
        _ => Err(format!("invalid value '{value}' for {name}")),
    }
}

impl SearchConfig {
    /// Names and current values of all scalar parameters.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let b = |v: bool| u8::from(v).to_string();
        vec![
            ("ravefactor", self.rave_factor.to_string()),
            ("decrrave", self.decr_rave.to_string()),
            ("knowledge", b(self.knowledge)),
            ("fpurgency", self.fpurgency.to_string()),
            ("explore", self.explore.to_string()),
            ("parentexplore", b(self.parent_explore)),
            ("msrave", self.ms_rave.to_string()),
            ("msexplore", self.ms_explore.to_string()),
            ("keeptree", b(self.keep_tree)),
            ("minimax", self.minimax.to_string()),
            ("visitexpand", self.visit_expand.to_string()),
            ("rollouts", self.rollouts.to_string()),
            ("gclimit", self.gc_limit.to_string()),
            ("gcsolved", self.gc_solved.to_string()),
            ("localreply", self.know_local_reply.to_string()),
            ("locality", self.know_locality.to_string()),
            ("connect", self.know_connect.to_string()),
            ("size", self.know_size.to_string()),
            ("bridge", self.know_bridge.to_string()),
            ("instantwin", b(self.rollout.instant_win)),
            ("rolloutpattern", b(self.rollout.protect_bridge)),
            ("weightedrandom", b(self.rollout.weighted_random)),
            ("profile", b(self.profile)),
        ]
    }

    /// Set one parameter by name.
    pub fn set(&mut self, name: &str, value: &str) -> std::result::Result<(), String> {
        match name {
            "ravefactor" => self.rave_factor = parse_value(name, value)?,
            "decrrave" => self.decr_rave = parse_value(name, value)?,
            "knowledge" => self.knowledge = parse_flag(name, value)?,
            "fpurgency" => self.fpurgency = parse_value(name, value)?,
            "explore" => self.explore = parse_value(name, value)?,
            "parentexplore" => self.parent_explore = parse_flag(name, value)?,
            "msrave" => self.ms_rave = parse_value(name, value)?,
            "msexplore" => self.ms_explore = parse_value(name, value)?,
            "keeptree" => self.keep_tree = parse_flag(name, value)?,
            "minimax" => {
                let v: u8 = parse_value(name, value)?;
                if v > 2 {
                    return Err("minimax must be 0, 1 or 2".to_string());
                }
                self.minimax = v;
            }
            "visitexpand" => self.visit_expand = parse_value(name, value)?,
            "rollouts" => {
                let v: u32 = parse_value(name, value)?;
                if !(1..=MAX_ROLLOUTS).contains(&v) {
                    return Err(format!("rollouts must be in 1..={MAX_ROLLOUTS}"));
                }
                self.rollouts = v;
            }
            "gclimit" => self.gc_limit = parse_value(name, value)?,
            "gcsolved" => self.gc_solved = parse_value(name, value)?,
            "localreply" => self.know_local_reply = parse_value(name, value)?,
            "locality" => self.know_locality = parse_value(name, value)?,
            "connect" => self.know_connect = parse_value(name, value)?,
            "size" => self.know_size = parse_value(name, value)?,
            "bridge" => self.know_bridge = parse_value(name, value)?,
            "instantwin" => self.rollout.instant_win = parse_flag(name, value)?,
            "rolloutpattern" => self.rollout.protect_bridge = parse_flag(name, value)?,
            "weightedrandom" => self.rollout.weighted_random = parse_flag(name, value)?,
            "profile" => self.profile = parse_flag(name, value)?,
            _ => return Err(format!("unknown parameter '{name}'")),
        }
        Ok(())
    }
}

/// The shared search tree and the position at its root.
pub struct SearchTree<S: Shape> {
    pub root: Node,
    pub root_board: Board<S>,
    pub arena: NodeArena,
    pub config: SearchConfig,
    /// Current garbage collection threshold, raised when collection frees too little
    pub gc_limit: u32,
}

impl<S: Shape> SearchTree<S> {
    pub fn new(board: Board<S>, config: SearchConfig) -> Self {
        let gc_limit = config.gc_limit;
        let mut tree = SearchTree {
            root: Node::new(board.last_move()),
            root_board: board,
            arena: NodeArena::new(),
            config,
            gc_limit,
        };
        tree.seed_root();
        tree
    }

    /// Visits credited to a fresh root so it expands on the first simulation.
    fn seed_root(&mut self) {
        if !self.root.has_children() {
            self.root.exp.add_wins(self.config.visit_expand + 1);
        }
    }

    /// Throw the tree away and start over at `board`.
    pub fn reset(&mut self, board: Board<S>) {
        self.arena.dealloc_children(&mut self.root);
        self.root = Node::new(board.last_move());
        self.root_board = board;
        self.seed_root();
    }

    /// Make `m` the new root, keeping its subtree if the tree is reused.
    /// Returns the number of nodes freed.
    pub fn advance(&mut self, m: Move) -> usize {
        let before = self.arena.live();
        let kept = if self.config.keep_tree {
            self.root
                .find_child_mut(m)
                .map(|c| std::mem::replace(c, Node::new(m)))
        } else {
            None
        };
        let kept_tree = kept.is_some();
        self.arena.dealloc_children(&mut self.root);
        self.root = kept.unwrap_or_else(|| Node::new(m));
        self.root_board.place(m, true, true);
        self.seed_root();

        let after = self.arena.live();
        if kept_tree && before > 0 {
            log::debug!(
                "Nodes before: {before}, after: {after}, saved {:.1}% of the tree",
                100.0 * after as f64 / before as f64
            );
        }
        before.saturating_sub(after)
    }

    /// Side to move at the root.
    pub fn to_play(&self) -> Side {
        self.root_board.to_play()
    }

    /// Follow `path` down from the root.
    pub fn find_node(&self, path: &[Move]) -> Option<&Node> {
        path.iter()
            .try_fold(&self.root, |node, &m| node.find_child(m))
    }

    /// Free every subtree the collection policy does not keep. Returns the
    /// number of nodes freed.
    ///
    /// Below a proven node, a child keeps its subtree if it is the proof's
    /// best move, or if it is heavy and either the node is not a loss for the
    /// side to move or the child wins for it. Below an unproven node, a child
    /// keeps its subtree if it has more visits than the threshold, which is
    /// higher for proven children.
    pub fn garbage_collect(&mut self) -> usize {
        let to_play = self.to_play();
        let (limit, solved) = (self.gc_limit, self.config.gc_solved);
        collect(&self.arena, &mut self.root, to_play, limit, solved)
    }

    /// Every node the arena counts as live must hang below the root.
    pub fn check_accounting(&self) -> Result<()> {
        let live = self.arena.live();
        let reachable = self.root.size() - 1;
        if live != reachable {
            return Err(EngineError::Corrupted(format!(
                "arena counts {live} live nodes but {reachable} are reachable from the root"
            )));
        }
        Ok(())
    }

    /// Expand `node`, whose position is `board`. Returns false if another
    /// worker holds the node's expansion lock.
    pub fn create_children(&self, board: &Board<S>, node: &Node) -> bool {
        if !node.try_lock_expand() {
            return false;
        }
        if node.has_children() || node.outcome().is_solved() {
            return true;
        }

        let to_play = board.to_play();
        let opponent = !to_play;
        let moves: Vec<Move> = board.moves().collect();
        let minimax = self.config.minimax;

        let mut outcomes = Vec::with_capacity(moves.len());
        let mut threats = Vec::new();
        for &m in &moves {
            let outcome = if minimax > 0 {
                board.test_outcome(m, to_play)
            } else {
                Outcome::Unknown
            };
            if outcome.is_win_for(to_play) {
                node.prove(ProofState {
                    outcome,
                    depth: 1,
                    best: m,
                });
                return true;
            }
            if minimax > 1 && board.test_outcome(m, opponent).is_win_for(opponent) {
                threats.push(m);
            }
            outcomes.push(outcome);
        }

        if threats.len() >= 2 {
            // one block is not enough
            node.prove(ProofState {
                outcome: Outcome::win_for(opponent),
                depth: 2,
                best: threats[0],
            });
            return true;
        }

        let block = if let [forced] = threats[..] {
            let i = moves.iter().position(|&m| m == forced).unwrap_or(0);
            self.arena.alloc(1, |_| {
                let child = Node::with_outcome(forced, outcomes[i]);
                self.add_knowledge(board, node, &child);
                child
            })
        } else {
            self.arena.alloc(moves.len(), |i| {
                let child = Node::with_outcome(moves[i], outcomes[i]);
                self.add_knowledge(board, node, &child);
                child
            })
        };
        if let Err(block) = node.set_children(block) {
            self.arena.dealloc(block);
        }
        true
    }

    fn add_knowledge(&self, board: &Board<S>, node: &Node, child: &Node) {
        if !self.config.knowledge {
            return;
        }
        let c = &self.config;
        let mut know = 0;
        if c.know_local_reply != 0 && node.mv.is_cell() {
            let dist = child.mv.dist(node.mv);
            if dist < 4 {
                know += c.know_local_reply * (4 - dist);
            }
        }
        if c.know_locality != 0 {
            know += c.know_locality * board.local(child.mv, board.to_play());
        }
        if c.know_connect != 0 || c.know_size != 0 {
            let group = board.test_cell(child.mv);
            know += c.know_connect * group.connectivity() as i32;
            know += c.know_size * group.size as i32;
        }
        if c.know_bridge != 0 && node.mv.is_cell() && saves_bridge(board, node.mv, child.mv) {
            know += c.know_bridge;
        }
        child.set_know(know);
    }

    /// Child to descend into: a proven win right away, otherwise the best value.
    pub fn choose_move<'a>(&self, node: &'a Node, to_play: Side, remain: usize) -> Option<&'a Node> {
        let c = &self.config;
        let rave = c.rave_factor + c.decr_rave * remain as f32;
        let mut explore = c.explore;
        if c.parent_explore {
            explore *= node.exp.avg();
        }
        let log_visits = (node.exp.num() as f32).ln();

        // unproven children outrank proven draws, which outrank proven losses
        let mut best = None;
        let mut best_key = (0u8, f32::NEG_INFINITY);
        for child in node.children() {
            let outcome = child.outcome();
            let key = if outcome.is_solved() {
                if outcome.is_win_for(to_play) {
                    return Some(child);
                }
                (u8::from(outcome == Outcome::Draw), 0.0)
            } else {
                let mut v = child.value(rave, c.knowledge, c.fpurgency);
                if explore > 0.0 {
                    v += explore * (log_visits / (child.exp.num() + 1) as f32).sqrt();
                }
                (2, v)
            };
            if best.is_none() || key > best_key {
                best_key = key;
                best = Some(child);
            }
        }
        best
    }

    /// Try to prove `node` now that `child` has changed. Returns true if the
    /// node is proven, by this call or earlier.
    pub fn do_backup(&self, node: &Node, child: &Node, to_play: Side) -> bool {
        if node.outcome().is_solved() {
            return true;
        }
        if child.outcome().is_win_for(to_play) {
            let shortest = node
                .children()
                .iter()
                .filter(|c| c.outcome().is_win_for(to_play))
                .min_by_key(|c| c.proof().depth)
                .unwrap_or(child);
            node.prove(ProofState {
                outcome: Outcome::win_for(to_play),
                depth: shortest.proof().depth + 1,
                best: shortest.mv,
            });
            return true;
        }

        // every child must be proven; prefer a draw, then the longest
        let mut best: Option<(Outcome, u16, Move)> = None;
        for c in node.children() {
            let p = c.proof();
            if !p.outcome.is_solved() {
                return false;
            }
            let better = match best {
                None => true,
                Some((o, d, _)) => {
                    let rank = |o: Outcome| u8::from(o == Outcome::Draw);
                    rank(p.outcome) > rank(o) || (rank(p.outcome) == rank(o) && p.depth > d)
                }
            };
            if better {
                best = Some((p.outcome, p.depth, c.mv));
            }
        }
        let Some((outcome, depth, mv)) = best else {
            return false;
        };
        node.prove(ProofState {
            outcome,
            depth: depth + 1,
            best: mv,
        });
        true
    }

    /// Move to play from `node`, whose side to move is `to_play`.
    ///
    /// Proven children rank as: shortest win, longest draw, longest loss.
    /// Unproven children rank by wins, visits or value depending on `ms_rave`.
    pub fn return_move(&self, node: &Node, to_play: Side) -> Move {
        let proof = node.proof();
        if proof.outcome.is_solved() && proof.best.is_cell() {
            return proof.best;
        }
        let c = &self.config;
        let parent_visits = (node.exp.num().max(1) as f64).ln();
        let mut best = Move::NONE;
        let mut best_val = f64::NEG_INFINITY;
        for child in node.children() {
            let p = child.proof();
            let depth = p.depth as f64;
            let val = if p.outcome.is_solved() {
                if p.outcome.is_win_for(to_play) {
                    8e11 - depth
                } else if p.outcome == Outcome::Draw {
                    -4e11 + depth
                } else {
                    -8e11 + depth
                }
            } else if c.ms_rave == -1.0 {
                child.exp.num() as f64
            } else if c.ms_rave == -2.0 {
                child.exp.sum() as f64
            } else {
                child.value(c.ms_rave, false, 0.0) as f64
                    - c.ms_explore as f64 * (parent_visits / (child.exp.num() + 1) as f64).sqrt()
            };
            if val > best_val {
                best_val = val;
                best = child.mv;
            }
        }
        best
    }

    /// Best move at the root, or a random legal move if the tree knows nothing.
    pub fn best_move(&self) -> Move {
        let m = self.return_move(&self.root, self.to_play());
        if m.is_cell() {
            m
        } else {
            self.root_board.moves().next().unwrap_or(Move::RESIGN)
        }
    }

    /// Principal variation: `prefix` first, then proven best moves and root
    /// choices down the tree, then immediate wins on the board.
    pub fn principal_variation(&self, prefix: &[Move]) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut board = self.root_board.clone();
        let mut node = Some(&self.root);

        loop {
            let m = if let Some(&m) = prefix.get(pv.len()) {
                m
            } else if let Some(n) = node {
                let p = n.proof();
                if p.outcome.is_solved() && p.best.is_cell() {
                    p.best
                } else if n.has_children() {
                    self.return_move(n, board.to_play())
                } else {
                    break;
                }
            } else {
                break;
            };
            if !board.place(m, true, false) {
                break;
            }
            pv.push(m);
            node = node.and_then(|n| n.find_child(m));
        }

        // finish a forced ending the tree no longer holds
        if !board.outcome().is_solved() {
            let side = board.to_play();
            if let Some(m) = board.moves().find(|&m| board.test_outcome(m, side).is_win_for(side)) {
                pv.push(m);
            }
        }
        pv
    }

    /// The node at `path`, its path and its children, one per line.
    pub fn move_stats(&self, path: &[Move]) -> String {
        let mut s = format!("root:\n{}\n", self.root);
        let mut node = Some(&self.root);
        if !path.is_empty() {
            s.push_str("path:\n");
            for &m in path {
                node = node.and_then(|n| n.find_child(m));
                match node {
                    Some(n) => s.push_str(&format!("{n}\n")),
                    None => break,
                }
            }
        }
        if let Some(n) = node {
            s.push_str("children:\n");
            for c in n.children() {
                s.push_str(&format!("{c}\n"));
            }
        }
        s
    }
}

/// Whether `reply` saves a bridge of the side to move that `intrusion` broke into.
fn saves_bridge<S: Shape>(board: &Board<S>, intrusion: Move, reply: Move) -> bool {
    if !board.on_board(intrusion) {
        return false;
    }
    patterns::bridge_replies(board.pattern(intrusion), board.to_play())
        .any(|d| board.neighbor_move(intrusion, d) == reply)
}

fn collect(arena: &NodeArena, node: &mut Node, to_play: Side, limit: u32, solved: u32) -> usize {
    let proof = node.proof();
    let mut freed = 0;
    for child in node.children_mut() {
        if !child.has_children() {
            continue;
        }
        let visits = child.exp.num();
        // a proven win only needs its winning children, a draw or loss needs them all
        let keep = if proof.outcome.is_solved() {
            child.mv == proof.best
                || (visits > solved
                    && (!proof.outcome.is_win_for(to_play) || child.outcome().is_win_for(to_play)))
        } else {
            visits > if child.outcome().is_solved() { solved } else { limit }
        };
        if keep {
            freed += collect(arena, child, !to_play, limit, solved);
        } else {
            freed += arena.dealloc_children(child);
        }
    }
    freed
}

/// One worker's private state: a board to play on and rollout scratch space.
pub struct Simulator<S: Shape> {
    board: Board<S>,
    movelist: MoveList,
    random: RandomPolicy,
    rng: fastrand::Rng,
    profile_start: Option<Instant>,
}

impl<S: Shape> Simulator<S> {
    pub fn new(board: Board<S>, seed: u64) -> Self {
        Simulator {
            board,
            movelist: MoveList::default(),
            random: RandomPolicy::default(),
            rng: fastrand::Rng::with_seed(seed),
            profile_start: None,
        }
    }

    /// Run one simulation from the root of `tree`.
    pub fn simulate(&mut self, tree: &SearchTree<S>, stats: &mut WorkerStats) -> Result<()> {
        self.board.clone_from(&tree.root_board);
        self.movelist.reset(self.board.vec_size());
        if tree.config.profile {
            self.profile_start = Some(Instant::now());
        }

        tree.root.exp.add_vloss();
        self.walk_tree(tree, &tree.root, 0, stats)?;
        let (sum, num) = self.movelist.exp(!tree.root_board.to_play());
        tree.root.exp.settle(sum, num);

        if let Some(start) = self.profile_start.take() {
            stats.times[2] += start.elapsed();
        }
        stats.runs += 1;
        Ok(())
    }

    fn walk_tree(&mut self, tree: &SearchTree<S>, node: &Node, depth: u32, stats: &mut WorkerStats) -> Result<()> {
        let to_play = self.board.to_play();

        if node.has_children() && !node.outcome().is_solved() {
            // a proven child that does not settle the node is only chosen
            // when nothing better is left, so this ends quickly
            for _ in 0..=node.num_children() {
                let remain = self.board.moves_avail();
                let Some(child) = tree.choose_move(node, to_play, remain) else {
                    return Err(EngineError::Corrupted(format!(
                        "no child to choose below {}",
                        node.mv
                    )));
                };
                if child.outcome().is_solved() {
                    if tree.do_backup(node, child, to_play) {
                        return Ok(());
                    }
                    continue;
                }

                let cell = self.board.xy(child.mv);
                self.movelist.add_tree(to_play, cell);
                if !self.board.place(child.mv, true, false) {
                    return Err(EngineError::Corrupted(format!(
                        "tree move {} is illegal on the board",
                        child.mv
                    )));
                }
                child.exp.add_vloss();
                self.walk_tree(tree, child, depth + 1, stats)?;

                let (sum, num) = self.movelist.exp(to_play);
                child.exp.settle(sum, num);
                let c = &tree.config;
                if !tree.do_backup(node, child, to_play)
                    && c.rave_factor > MIN_RAVE
                    && node.num_children() > 1
                    && 50.0 * remain as f32 * (c.rave_factor + c.decr_rave * remain as f32)
                        > node.exp.num() as f32
                {
                    self.update_rave(tree, node, to_play);
                }
                return Ok(());
            }
            return Err(EngineError::Corrupted(format!(
                "selection below {} did not terminate",
                node.mv
            )));
        }

        if let Some(start) = self.profile_start {
            stats.times[0] += start.elapsed();
            self.profile_start = Some(Instant::now());
        }

        let outcome = match node.outcome() {
            Outcome::Unknown => self.board.outcome(),
            proven => proven,
        };

        if !outcome.is_solved() {
            if node.exp.num() > tree.config.visit_expand && tree.create_children(&self.board, node) {
                return self.walk_tree(tree, node, depth, stats);
            }
            for _ in 0..tree.config.rollouts {
                let mut copy = self.board.clone();
                let (result, moves) = rollout(
                    &mut copy,
                    node.mv,
                    tree.config.rollout,
                    &tree.config.gammas,
                    &mut self.random,
                    &mut self.movelist,
                    &mut self.rng,
                );
                let length = depth + moves;
                stats.game_len.add(length);
                match (result.winner(), copy.win_type()) {
                    (Some(side), Some(w)) if (w as usize) < MAX_WIN_TYPES => {
                        let slot = if side == Side::P1 { 0 } else { 1 };
                        stats.win_types[slot][w as usize].add(length);
                    }
                    _ => stats.draws += 1,
                }
            }
        } else {
            self.movelist.finish_rollout(outcome);
        }
        stats.tree_len.add(depth);

        if let Some(start) = self.profile_start {
            stats.times[1] += start.elapsed();
            self.profile_start = Some(Instant::now());
        }
        Ok(())
    }

    /// Credit the children of `node` played later in the simulation by
    /// `to_play`, the side to move at `node`.
    fn update_rave(&self, tree: &SearchTree<S>, node: &Node, to_play: Side) {
        for child in node.children() {
            let (sum, num) = self.movelist.rave(to_play, tree.root_board.xy(child.mv));
            if num > 0 {
                child.rave.add(sum, num);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Hexagon, Triangle};

    fn tree_for<S: Shape>(size: usize, moves: &[&str]) -> SearchTree<S> {
        let mut board = Board::<S>::new(size).unwrap();
        for m in moves {
            assert!(board.place(m.parse().unwrap(), true, true));
        }
        SearchTree::new(board, SearchConfig::default())
    }

    fn run<S: Shape>(tree: &SearchTree<S>, n: usize) -> WorkerStats {
        let mut sim = Simulator::new(tree.root_board.clone(), 42);
        let mut stats = WorkerStats::default();
        for _ in 0..n {
            if tree.root.outcome().is_solved() {
                break;
            }
            sim.simulate(tree, &mut stats).unwrap();
        }
        stats
    }

    #[test]
    fn test_root_expands_on_first_simulation() {
        let tree = tree_for::<Hexagon>(4, &[]);
        let stats = run(&tree, 1);
        assert_eq!(stats.runs, 1);
        assert_eq!(tree.root.num_children(), 37);
        assert_eq!(tree.arena.live(), 37);
        // seeded visits plus one simulation of five rollouts
        assert_eq!(tree.root.exp.num(), 2 + 5);
    }

    #[test]
    fn test_immediate_win_proves_node() {
        // P1 wins at a4
        let tree = tree_for::<Triangle>(4, &["a1", "d4", "a2", "c4", "a3", "b4"]);
        run(&tree, 1);
        let proof = tree.root.proof();
        assert_eq!(proof.outcome, Outcome::P1);
        assert_eq!(proof.depth, 1);
        assert_eq!(proof.best, "a4".parse().unwrap());
        assert!(!tree.root.has_children());
        assert_eq!(tree.best_move(), "a4".parse().unwrap());
        assert_eq!(tree.principal_variation(&[]), vec!["a4".parse().unwrap()]);
    }

    #[test]
    fn test_single_threat_makes_macro_move() {
        // P2 to move must block a4, b4 is already taken
        let tree = tree_for::<Triangle>(4, &["a1", "d4", "a2", "b4", "a3"]);
        run(&tree, 1);
        assert_eq!(tree.root.num_children(), 1);
        assert_eq!(tree.root.children()[0].mv, "a4".parse().unwrap());
    }

    #[test]
    fn test_double_threat_proves_loss() {
        // P1 wins at a3 or b3, P2 to move
        let mut board = Board::<Triangle>::new(4).unwrap();
        for m in ["a1", "d4", "a2", "c3", "b4"] {
            assert!(board.place(m.parse().unwrap(), true, true));
        }
        let wins: Vec<Move> = board
            .moves()
            .filter(|&m| board.test_outcome(m, Side::P1) == Outcome::P1)
            .collect();
        assert!(wins.len() >= 2, "setup needs two threats, got {wins:?}");

        let tree = SearchTree::new(board, SearchConfig::default());
        run(&tree, 1);
        let proof = tree.root.proof();
        assert_eq!(proof.outcome, Outcome::P1);
        assert_eq!(proof.depth, 2);
        assert!(wins.contains(&proof.best));
        assert_eq!(tree.principal_variation(&[]).len(), 2);
    }

    #[test]
    fn test_backup_prefers_draw_and_longest() {
        let tree = tree_for::<Triangle>(4, &[]);
        let node = Node::new(Move::NONE);
        let kids = tree.arena.alloc(3, |i| Node::new(Move::new(i as i8, 0)));
        assert!(node.set_children(kids).is_ok());
        let proven = |i: usize, outcome, depth| {
            node.children()[i].set_proof(ProofState {
                outcome,
                depth,
                best: Move::NONE,
            })
        };
        proven(0, Outcome::P2, 5);
        assert!(!tree.do_backup(&node, &node.children()[0], Side::P1));
        proven(1, Outcome::P2, 7);
        proven(2, Outcome::Draw, 2);
        assert!(tree.do_backup(&node, &node.children()[2], Side::P1));
        let p = node.proof();
        assert_eq!((p.outcome, p.depth, p.best), (Outcome::Draw, 3, Move::new(2, 0)));
    }

    #[test]
    fn test_backup_shortest_win() {
        let tree = tree_for::<Triangle>(4, &[]);
        let node = Node::new(Move::NONE);
        let kids = tree.arena.alloc(3, |i| Node::new(Move::new(i as i8, 0)));
        assert!(node.set_children(kids).is_ok());
        for (i, depth) in [(0, 9), (2, 3)] {
            node.children()[i].set_proof(ProofState {
                outcome: Outcome::P1,
                depth,
                best: Move::NONE,
            });
        }
        assert!(tree.do_backup(&node, &node.children()[0], Side::P1));
        let p = node.proof();
        assert_eq!((p.outcome, p.depth, p.best), (Outcome::P1, 4, Move::new(2, 0)));
    }

    #[test]
    fn test_return_move_ranking() {
        let tree = tree_for::<Triangle>(4, &[]);
        let node = Node::new(Move::NONE);
        let kids = tree.arena.alloc(4, |i| Node::new(Move::new(i as i8, 0)));
        assert!(node.set_children(kids).is_ok());
        node.children()[0].exp.add(100, 60);
        node.children()[1].set_proof(ProofState {
            outcome: Outcome::P2,
            depth: 9,
            best: Move::NONE,
        });
        assert_eq!(tree.return_move(&node, Side::P1), Move::new(0, 0));
        node.children()[2].set_proof(ProofState {
            outcome: Outcome::P1,
            depth: 5,
            best: Move::NONE,
        });
        node.children()[3].set_proof(ProofState {
            outcome: Outcome::P1,
            depth: 3,
            best: Move::NONE,
        });
        assert_eq!(tree.return_move(&node, Side::P1), Move::new(3, 0));
        // for P2 the P2 win is the only good move
        node.children()[0].set_proof(ProofState {
            outcome: Outcome::P1,
            depth: 1,
            best: Move::NONE,
        });
        assert_eq!(tree.return_move(&node, Side::P2), Move::new(1, 0));
    }

    #[test]
    fn test_advance_reuses_subtree() {
        let mut tree = tree_for::<Hexagon>(3, &[]);
        run(&tree, 400);
        let m = tree.best_move();
        let child_visits = tree.root.find_child(m).map(|c| c.exp.num()).unwrap();
        let child_size = tree.root.find_child(m).map(Node::size).unwrap();

        tree.advance(m);
        assert_eq!(tree.root.mv, m);
        assert_eq!(tree.root_board.num_moves(), 1);
        assert_eq!(tree.arena.live(), child_size - 1);
        let seeded = if tree.root.has_children() { 0 } else { tree.config.visit_expand + 1 };
        assert_eq!(tree.root.exp.num(), child_visits + seeded);

        tree.config.keep_tree = false;
        let next = tree.best_move();
        tree.advance(next);
        assert_eq!(tree.arena.live(), 0);
        assert!(!tree.root.has_children());
    }

    #[test]
    fn test_garbage_collect_keeps_heavy() {
        let mut tree = tree_for::<Hexagon>(3, &[]);
        run(&tree, 2000);
        let live = tree.arena.live();
        tree.gc_limit = 50;
        let freed = tree.garbage_collect();
        assert_eq!(tree.arena.live(), live - freed);
        assert_eq!(tree.root.num_children(), 19);
        assert!(tree.check_accounting().is_ok());
        for c in tree.root.children() {
            if c.has_children() {
                assert!(c.exp.num() > 50 || c.mv == tree.root.proof().best);
            }
        }
    }

    /// Root with three heavy children at (1,0), (2,0), (3,0), each expanded.
    fn proven_root(outcome: Outcome, best: Move) -> SearchTree<Triangle> {
        let mut tree = tree_for::<Triangle>(4, &[]);
        tree.config.gc_solved = 10;
        let kids = tree.arena.alloc(3, |i| Node::new(Move::new(i as i8 + 1, 0)));
        for kid in kids.iter() {
            kid.exp.add(20, 20);
            let grandkids = tree.arena.alloc(2, |j| Node::new(Move::new(j as i8, 0)));
            assert!(kid.set_children(grandkids).is_ok());
        }
        kids[2].set_proof(ProofState {
            outcome: Outcome::P1,
            depth: 3,
            best: Move::NONE,
        });
        assert!(tree.root.set_children(kids).is_ok());
        tree.root.set_proof(ProofState { outcome, depth: 4, best });
        tree
    }

    #[test]
    fn test_garbage_collect_proven_parent() {
        // a lost root keeps every heavy child
        let mut tree = proven_root(Outcome::P2, Move::new(1, 0));
        assert_eq!(tree.garbage_collect(), 0);
        assert!(tree.root.children().iter().all(Node::has_children));

        // a won root keeps the proof and the other winning children
        let mut tree = proven_root(Outcome::P1, Move::new(2, 0));
        assert_eq!(tree.garbage_collect(), 2);
        let kept: Vec<bool> = tree.root.children().iter().map(Node::has_children).collect();
        assert_eq!(kept, [false, true, true]);
        assert!(tree.check_accounting().is_ok());
    }

    #[test]
    fn test_choose_move_prefers_unproven_over_proven_draw() {
        let mut tree = tree_for::<Triangle>(4, &[]);
        tree.config.fpurgency = -5.0;
        let node = Node::new(Move::NONE);
        let kids = tree.arena.alloc(3, |i| Node::new(Move::new(i as i8, 0)));
        assert!(node.set_children(kids).is_ok());
        node.exp.add(10, 10);
        node.children()[0].set_proof(ProofState {
            outcome: Outcome::Draw,
            depth: 2,
            best: Move::NONE,
        });
        node.children()[1].set_proof(ProofState {
            outcome: Outcome::P2,
            depth: 2,
            best: Move::NONE,
        });
        let chosen = tree.choose_move(&node, Side::P1, 10).map(|c| c.mv);
        assert_eq!(chosen, Some(Move::new(2, 0)));

        node.children()[2].set_proof(ProofState {
            outcome: Outcome::P2,
            depth: 4,
            best: Move::NONE,
        });
        let chosen = tree.choose_move(&node, Side::P1, 10).map(|c| c.mv);
        assert_eq!(chosen, Some(Move::new(0, 0)));
    }

    #[test]
    fn test_negative_first_play_urgency_still_searches() {
        let mut tree = tree_for::<Triangle>(5, &[]);
        tree.config.fpurgency = -5.0;
        tree.config.know_size = -200;
        let stats = run(&tree, 3000);
        assert!(stats.runs > 0);
    }

    #[test]
    fn test_config_params() {
        let mut c = SearchConfig::default();
        assert!(c.set("rollouts", "3").is_ok());
        assert_eq!(c.rollouts, 3);
        assert!(c.set("rollouts", "0").is_err());
        assert!(c.set("knowledge", "0").is_ok());
        assert!(!c.knowledge);
        assert!(c.set("nonsense", "1").is_err());
        assert!(c.params().iter().any(|(k, v)| *k == "rollouts" && v == "3"));
    }
}
