//! Child block allocator with node accounting.
//!
//! Children of a node are allocated once, as one contiguous block sized to
//! the number of legal moves, and never resized. Freed blocks go to a free
//! list keyed by length so the next expansion with the same number of moves
//! can reuse them; `compact` hands them back to the system allocator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::node::Node;

/// Bytes one node occupies, for converting memory limits to node counts.
pub const NODE_BYTES: usize = std::mem::size_of::<Node>();

#[derive(Debug, Default)]
pub struct NodeArena {
    free: Mutex<HashMap<usize, Vec<Box<[Node]>>>>,
    live: AtomicUsize,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a block of `len` nodes, the i-th built by `init(i)`.
    pub fn alloc(&self, len: usize, mut init: impl FnMut(usize) -> Node) -> Box<[Node]> {
        let recycled = self.free.lock().get_mut(&len).and_then(Vec::pop);
        let block = match recycled {
            Some(mut block) => {
                for (i, slot) in block.iter_mut().enumerate() {
                    *slot = init(i);
                }
                block
            }
            None => (0..len).map(init).collect(),
        };
        self.live.fetch_add(len, Ordering::Relaxed);
        block
    }

    /// Free a block and every subtree below it. Returns the number of nodes freed.
    pub fn dealloc(&self, mut block: Box<[Node]>) -> usize {
        let mut freed = block.len();
        for node in block.iter_mut() {
            if let Some(children) = node.take_children() {
                freed += self.dealloc(children);
            }
        }
        self.live.fetch_sub(block.len(), Ordering::Relaxed);
        self.free.lock().entry(block.len()).or_default().push(block);
        freed
    }

    /// Free the children of `node`, returning the number of nodes freed.
    pub fn dealloc_children(&self, node: &mut Node) -> usize {
        node.take_children().map_or(0, |c| self.dealloc(c))
    }

    /// Drop the free lists. Returns the number of nodes released.
    pub fn compact(&self) -> usize {
        let mut free = self.free.lock();
        let released = free.values().flatten().map(|b| b.len()).sum();
        free.clear();
        released
    }

    /// Nodes currently in use.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Nodes sitting in the free lists.
    pub fn free(&self) -> usize {
        self.free.lock().values().flatten().map(|b| b.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Move;

    fn leaf_block(arena: &NodeArena, len: usize) -> Box<[Node]> {
        arena.alloc(len, |i| Node::new(Move::new(i as i8, 0)))
    }

    #[test]
    fn test_alloc_dealloc_counts() {
        let arena = NodeArena::new();
        let mut root = Node::new(Move::NONE);
        assert!(root.set_children(leaf_block(&arena, 3)).is_ok());
        let grandchildren = leaf_block(&arena, 2);
        assert!(root.children()[1].set_children(grandchildren).is_ok());
        assert_eq!(arena.live(), 5);

        assert_eq!(arena.dealloc_children(&mut root), 5);
        assert_eq!(arena.live(), 0);
        assert_eq!(arena.free(), 5);
        assert!(!root.has_children());
    }

    #[test]
    fn test_blocks_are_recycled_fresh() {
        let arena = NodeArena::new();
        let block = leaf_block(&arena, 4);
        block[2].exp.add(2, 1);
        arena.dealloc(block);

        let block = leaf_block(&arena, 4);
        assert_eq!(arena.free(), 0);
        assert_eq!(block[2].exp.num(), 0);
        assert_eq!(block[2].mv, Move::new(2, 0));

        arena.dealloc(block);
        assert_eq!(arena.compact(), 4);
        assert_eq!(arena.free(), 0);
    }
}
