//! hexmcts: a Monte Carlo Tree Search engine for the connection games
//! Havannah and Y.
//!
//! Both games are played on hexagonal cells; they differ in board shape and
//! win conditions, which the [`geometry::Shape`] trait supplies to a generic
//! board. The search is MCTS with RAVE, a proof overlay that turns proven
//! subtrees into exact results, and a pool of threads sharing one tree.
//!
//! ## Modules
//!
//! - [`constants`] - Size limits and search defaults
//! - [`error`] - Error type shared by the board, tree and driver
//! - [`outcome`] - Sides and game results
//! - [`geometry`] - Moves, directions and the two board shapes
//! - [`zobrist`] - Hash keys and symmetry-aware position hashes
//! - [`patterns`] - Six-neighbor patterns and rollout weights
//! - [`board`] - Union-find board with fork, bridge, ring and Y detection
//! - [`history`] - Moves of the game with undo
//! - [`node`] - Tree nodes with atomic statistics and proofs
//! - [`arena`] - Child block allocation and node accounting
//! - [`record`] - Tree records as text
//! - [`playout`] - Rollout policies and RAVE bookkeeping
//! - [`mcts`] - Selection, expansion, backup, garbage collection
//! - [`pool`] - Pausable worker threads
//! - [`engine`] - Search driver
//! - [`gtp`] - Go Text Protocol front end
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//! use hexmcts::engine::Engine;
//! use hexmcts::geometry::Triangle;
//!
//! let mut engine = Engine::<Triangle>::new(5).unwrap();
//! engine.commit_move("c3".parse().unwrap()).unwrap();
//! let result = engine.search(Duration::from_secs(10), 500, 0).unwrap();
//! println!("Best move: {}", result.best);
//! ```

pub mod arena;
pub mod board;
pub mod constants;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod gtp;
pub mod history;
pub mod mcts;
pub mod node;
pub mod outcome;
pub mod patterns;
pub mod playout;
pub mod pool;
pub mod record;
pub mod zobrist;
