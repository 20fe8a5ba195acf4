//! Error types for the engine.
//!
//! Three kinds of failure exist:
//! - invalid input (bad size, illegal move, malformed record): the caller decides what to do
//! - internal corruption: the search that hit it cannot safely continue
//! - memory exhaustion that garbage collection could not resolve

/// Errors reported by the board, the tree, and the engine driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Board size outside the variant's supported range
    #[error("Size {size} is out of range, expected {min}..={max}")]
    InvalidSize { size: usize, min: usize, max: usize },

    /// Move is off the board or the cell is occupied
    #[error("Invalid move: {0}")]
    IllegalMove(String),

    /// The game already has a decided outcome
    #[error("The game is already over")]
    GameOver,

    /// A tree record could not be parsed or does not fit the position
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// The tree is above its memory limit even after garbage collection
    #[error("Memory limit reached: {nodes} nodes in use, limit is {limit}")]
    MemoryExhausted { nodes: usize, limit: usize },

    /// An internal invariant was violated
    #[error("Internal consistency failure: {0}")]
    Corrupted(String),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
