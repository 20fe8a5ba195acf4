//! Search driver: game history, the shared tree, and the worker pool.
//!
//! An [`Engine`] owns the authoritative game history and a [`SearchTree`]
//! rooted at the current position. `search` lets the workers simulate until
//! the time or run budget is used up, the root is proven, or the tree hits
//! its memory limit (in which case it garbage collects and carries on).
//! Everything that changes the tree's shape pauses the workers first.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::arena::NODE_BYTES;
use crate::board::Board;
use crate::constants::{GC_GROWTH, MAX_MEMORY, NUM_THREADS};
use crate::error::{EngineError, Result};
use crate::geometry::{Move, Shape};
use crate::history::History;
use crate::mcts::{SearchConfig, SearchTree, Simulator};
use crate::node::Node;
use crate::outcome::{Outcome, Side};
use crate::pool::{Job, PHASES, WorkerPool, WorkerStats};
use crate::record::{RecordNode, TreeRecord};

/// What a search found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
    pub best: Move,
    pub outcome: Outcome,
    /// Moves to the end of the game along the proof, 0 if unproven
    pub proof_depth: u16,
    pub runs: u64,
    pub elapsed: Duration,
}

struct Shared<S: Shape> {
    tree: RwLock<SearchTree<S>>,
    runs: AtomicU64,
    max_runs: AtomicU64,
    max_nodes: AtomicUsize,
    memory_full: AtomicBool,
    error: Mutex<Option<EngineError>>,
}

/// One worker's share of a search.
pub struct SearchJob<S: Shape> {
    shared: Arc<Shared<S>>,
    sim: Option<Simulator<S>>,
    seed: u64,
}

impl<S: Shape> Job for SearchJob<S> {
    fn step(&mut self, stats: &mut WorkerStats) -> bool {
        let shared = &*self.shared;
        let tree = shared.tree.read();
        if tree.root.outcome().is_solved() || tree.root_board.outcome().is_solved() {
            return false;
        }
        if tree.arena.live() >= shared.max_nodes.load(Ordering::Relaxed) {
            shared.memory_full.store(true, Ordering::Relaxed);
            return false;
        }
        if shared.runs.fetch_add(1, Ordering::Relaxed) >= shared.max_runs.load(Ordering::Relaxed) {
            shared.runs.fetch_sub(1, Ordering::Relaxed);
            return false;
        }

        let seed = self.seed;
        let sim = self
            .sim
            .get_or_insert_with(|| Simulator::new(tree.root_board.clone(), seed));
        match sim.simulate(&tree, stats) {
            Ok(()) => true,
            Err(e) => {
                log::error!("Search stopped: {e}");
                *shared.error.lock() = Some(e);
                false
            }
        }
    }
}

/// Game engine for one board shape.
pub struct Engine<S: Shape> {
    shared: Arc<Shared<S>>,
    pool: WorkerPool<SearchJob<S>>,
    history: History<S>,
    ponder: bool,
}

impl<S: Shape> Engine<S> {
    pub fn new(size: usize) -> Result<Self> {
        Self::with_config(size, SearchConfig::default())
    }

    pub fn with_config(size: usize, config: SearchConfig) -> Result<Self> {
        let history = History::new(size)?;
        let tree = SearchTree::new(history.board().clone(), config);
        let shared = Arc::new(Shared {
            tree: RwLock::new(tree),
            runs: AtomicU64::new(0),
            max_runs: AtomicU64::new(0),
            max_nodes: AtomicUsize::new(MAX_MEMORY / NODE_BYTES),
            memory_full: AtomicBool::new(false),
            error: Mutex::new(None),
        });
        let mut engine = Engine {
            shared,
            pool: WorkerPool::new(),
            history,
            ponder: false,
        };
        engine.set_threads(NUM_THREADS);
        Ok(engine)
    }

    pub fn board(&self) -> &Board<S> {
        self.history.board()
    }

    /// Moves played so far.
    pub fn history(&self) -> &[Move] {
        self.history.moves()
    }

    pub fn game_length(&self) -> usize {
        self.history.len()
    }

    /// Start a new game on a board of `size`.
    pub fn configure(&mut self, size: usize) -> Result<()> {
        self.pool.pause();
        self.history.resize(size)?;
        self.reset_tree();
        self.start_ponder();
        Ok(())
    }

    /// Start over from `board`, with no move history.
    pub fn set_position(&mut self, board: Board<S>) {
        self.pool.pause();
        self.history = History::from_board(board);
        self.reset_tree();
        self.start_ponder();
    }

    /// Play `mv` for the side to move, keeping its subtree if configured to.
    pub fn commit_move(&mut self, mv: Move) -> Result<()> {
        self.pool.pause();
        if self.board().outcome().is_solved() {
            return Err(EngineError::GameOver);
        }
        if !self.board().valid_move(mv) {
            return Err(EngineError::IllegalMove(mv.to_string()));
        }
        if !self.history.play(mv) {
            return Err(EngineError::IllegalMove(mv.to_string()));
        }
        {
            let mut tree = self.shared.tree.write();
            let freed = tree.advance(mv);
            tree.check_accounting()?;
            log::debug!("Played {mv}, freed {freed} nodes");
        }
        self.start_ponder();
        Ok(())
    }

    /// Take back the last move. The tree starts over.
    pub fn undo_last(&mut self) -> bool {
        self.pool.pause();
        let undone = self.history.undo();
        if undone {
            self.reset_tree();
        }
        self.start_ponder();
        undone
    }

    fn reset_tree(&mut self) {
        let board = self.history.board().clone();
        self.shared.tree.write().reset(board);
    }

    /// Search the current position for at most `time` and `max_runs`
    /// simulations. `verbose` 0 logs nothing, 1 a summary, 2 worker statistics too.
    pub fn search(&mut self, time: Duration, max_runs: u64, verbose: u8) -> Result<SearchResult> {
        self.pool.pause();
        if self.board().outcome().is_solved() {
            return Err(EngineError::GameOver);
        }
        let start = Instant::now();
        self.shared.error.lock().take();
        self.shared.runs.store(0, Ordering::Relaxed);
        self.shared.max_runs.store(max_runs, Ordering::Relaxed);
        self.pool.reset_stats();

        loop {
            if self.shared.memory_full.swap(false, Ordering::Relaxed) || self.over_limit() {
                self.collect_garbage()?;
            }
            let remaining = time.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            self.pool.resume();
            self.pool.wait_pause(Some(remaining));
            if let Some(e) = self.shared.error.lock().take() {
                return Err(e);
            }
            if !self.shared.memory_full.load(Ordering::Relaxed) {
                break;
            }
        }

        let result = {
            let tree = self.shared.tree.read();
            let proof = tree.root.proof();
            SearchResult {
                best: tree.best_move(),
                outcome: proof.outcome,
                proof_depth: proof.depth,
                runs: self.shared.runs.load(Ordering::Relaxed),
                elapsed: start.elapsed(),
            }
        };
        if verbose > 0 {
            self.log_search(&result, verbose);
        }
        self.start_ponder();
        Ok(result)
    }

    fn over_limit(&self) -> bool {
        self.shared.tree.read().arena.live() >= self.shared.max_nodes.load(Ordering::Relaxed)
    }

    /// Garbage collect until the tree is back under half its limit, raising
    /// the collection threshold when a pass frees too little.
    fn collect_garbage(&self) -> Result<()> {
        let limit = self.shared.max_nodes.load(Ordering::Relaxed);
        let mut tree = self.shared.tree.write();
        loop {
            let before = tree.arena.live();
            let freed = tree.garbage_collect();
            tree.arena.compact();
            tree.check_accounting()?;
            let live = tree.arena.live();
            log::info!("Garbage collected {freed} of {before} nodes, {live} left");
            if live < limit / 2 {
                return Ok(());
            }
            let raised = ((tree.gc_limit as f64 * GC_GROWTH).ceil() as u32).max(tree.gc_limit + 1);
            log::warn!(
                "Collection left {live} of {limit} nodes, raising the visit threshold from {} to {raised}",
                tree.gc_limit
            );
            tree.gc_limit = raised;
            if live < limit {
                return Ok(());
            }
            if freed == 0 {
                return Err(EngineError::MemoryExhausted { nodes: live, limit });
            }
        }
    }

    fn log_search(&self, result: &SearchResult, verbose: u8) {
        let stats = self.pool.stats();
        let secs = result.elapsed.as_secs_f64();
        let tree = self.shared.tree.read();
        let to_play = tree.to_play();
        log::info!(
            "Finished {} runs in {:.0} msec: {:.0} runs/sec",
            result.runs,
            secs * 1000.0,
            if secs > 0.0 { result.runs as f64 / secs } else { 0.0 }
        );
        log::info!(
            "Tree: {} nodes, {:.1} MB, root {} ({:.1}%)",
            tree.arena.live() + 1,
            ((tree.arena.live() + 1) * NODE_BYTES) as f64 / (1024.0 * 1024.0),
            tree.root.exp,
            tree.root.exp.avg() * 100.0
        );
        if result.outcome.is_solved() {
            log::info!(
                "Solved as a {} in {} moves",
                result.outcome.relative_to(to_play),
                result.proof_depth
            );
        }
        let pv: Vec<String> = tree.principal_variation(&[]).iter().map(Move::to_string).collect();
        log::info!("PV: {}", pv.join(" "));

        if verbose < 2 {
            return;
        }
        log::debug!("Tree depth: {}", stats.tree_len);
        log::debug!("Game length: {}", stats.game_len);
        for (slot, side) in [Side::P1, Side::P2].into_iter().enumerate() {
            for (w, name) in S::WIN_NAMES.iter().enumerate() {
                let d = &stats.win_types[slot][w];
                if d.num > 0 {
                    log::debug!("{side} {name}: {d}");
                }
            }
        }
        if stats.draws > 0 {
            log::debug!("Draws: {}", stats.draws);
        }
        if tree.config.profile {
            for (name, t) in PHASES.iter().zip(stats.times) {
                log::debug!("Time in {name}: {:.3} s", t.as_secs_f64());
            }
        }
    }

    /// Principal variation from the root, starting with `prefix`.
    pub fn principal_variation(&self, prefix: &[Move]) -> Vec<Move> {
        self.shared.tree.read().principal_variation(prefix)
    }

    /// Statistics of the node at `path` and its children.
    pub fn move_stats(&self, path: &[Move]) -> String {
        self.shared.tree.read().move_stats(path)
    }

    /// Record the subtree at `path`, keeping descendants with at least
    /// `threshold` visits.
    pub fn serialize_subtree(&self, path: &[Move], threshold: u32) -> Result<TreeRecord> {
        let tree = self.shared.tree.read();
        let node = tree
            .find_node(path)
            .ok_or_else(|| EngineError::IllegalMove(format!("no tree node at {}", join(path))))?;
        let to_play = tree.to_play();
        let node_to_play = if path.len() % 2 == 0 { to_play } else { !to_play };
        Ok(TreeRecord {
            game: S::NAME.to_string(),
            size: tree.root_board.size(),
            to_play,
            path: path.to_vec(),
            root: RecordNode::from_node(node, node_to_play, threshold),
        })
    }

    /// Replace the subtree at the record's path with the recorded one.
    pub fn load_subtree(&mut self, record: &TreeRecord) -> Result<()> {
        self.pool.pause();
        if record.game != S::NAME || record.size != self.board().size() {
            return Err(EngineError::MalformedRecord(format!(
                "record is for {} size {}, the game is {} size {}",
                record.game,
                record.size,
                S::NAME,
                self.board().size()
            )));
        }
        if record.to_play != self.board().to_play() {
            return Err(EngineError::MalformedRecord(format!(
                "record has {} to move",
                record.to_play
            )));
        }

        let mut guard = self.shared.tree.write();
        let SearchTree {
            root,
            root_board,
            arena,
            ..
        } = &mut *guard;
        let mut board = root_board.clone();
        let mut node: &mut Node = root;
        for &m in &record.path {
            if !node.has_children() {
                let moves: Vec<Move> = board.moves().collect();
                let block = arena.alloc(moves.len(), |i| Node::new(moves[i]));
                if let Err(block) = node.set_children(block) {
                    arena.dealloc(block);
                }
            }
            if !board.place(m, true, false) {
                return Err(EngineError::MalformedRecord(format!("illegal move {m} in path")));
            }
            node = match node.find_child_mut(m) {
                Some(child) => child,
                None => {
                    return Err(EngineError::MalformedRecord(format!("no child {m} in the tree")));
                }
            };
        }
        arena.dealloc_children(node);
        let loaded = record.root.load(&board, node, arena)?;
        log::info!("Loaded {loaded} nodes at {}", join(&record.path));
        guard.check_accounting()?;
        drop(guard);
        self.start_ponder();
        Ok(())
    }

    /// Nodes in the tree, the root included.
    pub fn node_count(&self) -> usize {
        self.shared.tree.read().arena.live() + 1
    }

    pub fn set_memory_limit(&self, bytes: usize) {
        let nodes = (bytes / NODE_BYTES).max(1);
        self.shared.max_nodes.store(nodes, Ordering::Relaxed);
    }

    /// Hand recycled blocks back to the allocator. Returns the nodes released.
    pub fn force_compact(&mut self) -> usize {
        self.pool.pause();
        let released = self.shared.tree.read().arena.compact();
        self.start_ponder();
        released
    }

    /// Run a garbage collection pass now. Returns the number of nodes freed.
    pub fn force_collect(&mut self) -> Result<usize> {
        self.pool.pause();
        let freed = {
            let mut tree = self.shared.tree.write();
            let freed = tree.garbage_collect();
            tree.check_accounting()?;
            freed
        };
        self.start_ponder();
        Ok(freed)
    }

    pub fn config(&self) -> SearchConfig {
        self.shared.tree.read().config.clone()
    }

    /// Change the search configuration while the workers are paused.
    pub fn update_config<R>(&mut self, f: impl FnOnce(&mut SearchConfig) -> R) -> R {
        self.pool.pause();
        let r = {
            let mut tree = self.shared.tree.write();
            let r = f(&mut tree.config);
            tree.gc_limit = tree.config.gc_limit;
            r
        };
        self.start_ponder();
        r
    }

    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    pub fn set_threads(&mut self, n: usize) {
        let shared = &self.shared;
        let base = fastrand::u64(..);
        self.pool.set_num_threads(n.max(1), |i| SearchJob {
            shared: Arc::clone(shared),
            sim: None,
            seed: base.wrapping_add(i as u64),
        });
        self.start_ponder();
    }

    /// Keep searching between moves.
    pub fn set_ponder(&mut self, ponder: bool) {
        self.ponder = ponder;
        if ponder {
            self.start_ponder();
        } else {
            self.pool.pause();
        }
    }

    pub fn is_pondering(&self) -> bool {
        self.ponder && self.pool.is_running()
    }

    fn start_ponder(&self) {
        if !self.ponder || self.board().outcome().is_solved() || self.over_limit() {
            return;
        }
        self.shared.runs.store(0, Ordering::Relaxed);
        self.shared.max_runs.store(u64::MAX, Ordering::Relaxed);
        self.pool.resume();
    }
}

fn join(path: &[Move]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    path.iter().map(Move::to_string).collect::<Vec<_>>().join(" ")
}
