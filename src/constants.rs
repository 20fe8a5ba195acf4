//! Constants for board geometry, search parameters, and knowledge weights.
//!
//! These are the defaults; everything tunable at runtime lives in
//! [`SearchConfig`](crate::mcts::SearchConfig) and starts from the values here.

// =============================================================================
// Board Geometry
// =============================================================================

/// Smallest Havannah board radius.
pub const HAVANNAH_MIN_SIZE: usize = 3;

/// Largest Havannah board radius.
pub const HAVANNAH_MAX_SIZE: usize = 10;

/// Default Havannah board radius.
pub const HAVANNAH_DEFAULT_SIZE: usize = 8;

/// Smallest Y board side length.
pub const Y_MIN_SIZE: usize = 4;

/// Largest Y board side length.
pub const Y_MAX_SIZE: usize = 25;

/// Default Y board side length.
pub const Y_DEFAULT_SIZE: usize = 10;

/// Largest grid dimension any shape uses (Y side 25, Havannah diameter 19).
pub const MAX_DIM: usize = 25;

/// Symmetric positions hash identically while at most this many moves are on the board.
pub const UNIQUE_DEPTH: usize = 5;

/// Smallest group that can possibly form a ring.
pub const MIN_RING_SIZE: u16 = 6;

// =============================================================================
// MCTS Parameters
// =============================================================================

/// Default number of worker threads.
pub const NUM_THREADS: usize = 1;

/// Default memory limit for the tree, in bytes.
pub const MAX_MEMORY: usize = 1000 * 1024 * 1024;

/// RAVE equivalence parameter: the number of direct visits at which RAVE
/// and direct experience weigh the same.
pub const RAVE_FACTOR: f32 = 500.0;

/// RAVE factors at or below this disable RAVE completely.
pub const MIN_RAVE: f32 = 0.1;

/// First play urgency: value of a child that has never been visited.
pub const FPU_URGENCY: f32 = 1.0;

/// Root move choice: -2 = most wins, -1 = most visits, otherwise the RAVE factor to score with.
pub const MS_RAVE: f32 = -2.0;

/// Visits a leaf needs (beyond the first) before it is expanded.
pub const VISIT_EXPAND: u32 = 1;

/// Rollouts played from every leaf reached.
pub const ROLLOUTS: u32 = 5;

/// Most rollouts a single leaf visit may run.
pub const MAX_ROLLOUTS: u32 = 32;

/// Garbage collection keeps subtrees of unproven nodes with more visits than this.
pub const GC_LIMIT: u32 = 5;

/// Garbage collection keeps subtrees below proven nodes with more visits than this.
pub const GC_SOLVED: u32 = 100_000;

/// Growth of the collection threshold when a pass fails to free enough memory.
pub const GC_GROWTH: f64 = 1.3;

// =============================================================================
// Knowledge Weights (added to a child's knowledge bonus at expansion)
// =============================================================================

/// Bonus per step of distance under 4 from the previous move.
pub const KNOW_LOCAL_REPLY: i32 = 5;

/// Bonus per own neighboring stone.
pub const KNOW_LOCALITY: i32 = 5;

/// Bonus per edge or corner the resulting group touches.
pub const KNOW_CONNECT: i32 = 20;

/// Bonus per stone in the resulting group.
pub const KNOW_SIZE: i32 = 0;

/// Bonus for answering an intrusion into a bridge.
pub const KNOW_BRIDGE: i32 = 100;
