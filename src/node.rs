//! Search tree nodes.
//!
//! Nodes are shared between worker threads. Statistics are atomics updated
//! without locks; the proven result is packed into one atomic word so that
//! outcome, depth and best move always change together; children are
//! published once through a [`OnceLock`] by whichever worker wins the
//! node's expansion lock.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::constants::MIN_RAVE;
use crate::geometry::Move;
use crate::outcome::Outcome;
use crate::record::NodeStats;

/// A (sum, num) pair of playout results.
///
/// `sum` counts half points: a win adds 2, a draw 1, a loss 0. A virtual
/// loss is just `num += 1`; once the real result is known it is settled
/// without counting that playout twice.
#[derive(Debug, Default)]
pub struct ExpPair {
    sum: AtomicU32,
    num: AtomicU32,
}

impl Clone for ExpPair {
    fn clone(&self) -> Self {
        ExpPair::new(self.sum(), self.num())
    }
}

impl ExpPair {
    pub fn new(sum: u32, num: u32) -> Self {
        ExpPair {
            sum: AtomicU32::new(sum),
            num: AtomicU32::new(num),
        }
    }

    #[inline]
    pub fn sum(&self) -> u32 {
        self.sum.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn num(&self) -> u32 {
        self.num.load(Ordering::Relaxed)
    }

    /// Average score in [0, 1]; 0 when empty.
    #[inline]
    pub fn avg(&self) -> f32 {
        let num = self.num();
        if num == 0 {
            0.0
        } else {
            self.sum() as f32 / (2 * num) as f32
        }
    }

    /// Record `num` playouts worth `sum` half points.
    #[inline]
    pub fn add(&self, sum: u32, num: u32) {
        self.sum.fetch_add(sum, Ordering::Relaxed);
        self.num.fetch_add(num, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_vloss(&self) {
        self.num.fetch_add(1, Ordering::Relaxed);
    }

    /// Replace one earlier virtual loss with `num` real results worth `sum`.
    /// With no results at all the virtual loss is simply taken back.
    #[inline]
    pub fn settle(&self, sum: u32, num: u32) {
        self.sum.fetch_add(sum, Ordering::Relaxed);
        if num == 0 {
            self.num.fetch_sub(1, Ordering::Relaxed);
        } else {
            self.num.fetch_add(num - 1, Ordering::Relaxed);
        }
    }

    pub fn add_wins(&self, n: u32) {
        self.add(2 * n, n);
    }

    pub fn set(&self, sum: u32, num: u32) {
        self.sum.store(sum, Ordering::Relaxed);
        self.num.store(num, Ordering::Relaxed);
    }
}

impl fmt::Display for ExpPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sum(), self.num())
    }
}

/// A proven result: who wins, in how many plies, and with which move.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProofState {
    pub outcome: Outcome,
    pub depth: u16,
    pub best: Move,
}

impl Default for ProofState {
    fn default() -> Self {
        ProofState {
            outcome: Outcome::Unknown,
            depth: 0,
            best: Move::NONE,
        }
    }
}

impl ProofState {
    fn pack(self) -> u64 {
        self.outcome.to_bits() | (self.depth as u64) << 2 | (self.best.to_bits() as u64) << 18
    }

    fn unpack(bits: u64) -> ProofState {
        ProofState {
            outcome: Outcome::from_bits(bits),
            depth: (bits >> 2) as u16,
            best: Move::from_bits((bits >> 18) as u16),
        }
    }
}

/// Atomic [`ProofState`].
#[derive(Debug)]
pub struct Proof(AtomicU64);

impl Default for Proof {
    fn default() -> Self {
        Proof(AtomicU64::new(ProofState::default().pack()))
    }
}

impl Proof {
    #[inline]
    pub fn get(&self) -> ProofState {
        ProofState::unpack(self.0.load(Ordering::Acquire))
    }

    pub fn set(&self, state: ProofState) {
        self.0.store(state.pack(), Ordering::Release);
    }

    /// Publish a result if the node is still unproven. Returns false if
    /// another worker proved it first.
    pub fn prove(&self, state: ProofState) -> bool {
        let current = self.0.load(Ordering::Acquire);
        if ProofState::unpack(current).outcome.is_solved() {
            return false;
        }
        self.0
            .compare_exchange(current, state.pack(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Tree node: a move and what the search has learned about it.
#[derive(Debug, Default)]
pub struct Node {
    pub mv: Move,
    pub exp: ExpPair,
    pub rave: ExpPair,
    know: AtomicI32,
    proof: Proof,
    children: OnceLock<Box<[Node]>>,
    expanding: AtomicBool,
}

impl Node {
    pub fn new(mv: Move) -> Self {
        Node {
            mv,
            ..Default::default()
        }
    }

    /// A node whose result is already known, such as a terminal move.
    pub fn with_outcome(mv: Move, outcome: Outcome) -> Self {
        let node = Node::new(mv);
        if outcome.is_solved() {
            node.proof.set(ProofState {
                outcome,
                depth: 0,
                best: Move::NONE,
            });
        }
        node
    }

    #[inline]
    pub fn outcome(&self) -> Outcome {
        self.proof.get().outcome
    }

    #[inline]
    pub fn proof(&self) -> ProofState {
        self.proof.get()
    }

    pub fn prove(&self, state: ProofState) -> bool {
        self.proof.prove(state)
    }

    pub fn set_proof(&self, state: ProofState) {
        self.proof.set(state);
    }

    #[inline]
    pub fn know(&self) -> i32 {
        self.know.load(Ordering::Relaxed)
    }

    pub fn set_know(&self, know: i32) {
        self.know.store(know, Ordering::Relaxed);
    }

    /// Children, or an empty slice for a leaf.
    #[inline]
    pub fn children(&self) -> &[Node] {
        self.children.get().map(|c| &c[..]).unwrap_or(&[])
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        self.children.get_mut().map(|c| &mut c[..]).unwrap_or(&mut [])
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.children.get().is_some()
    }

    pub fn num_children(&self) -> usize {
        self.children().len()
    }

    /// Claim the right to expand this node. Only one caller ever wins.
    pub fn try_lock_expand(&self) -> bool {
        self.expanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// Publish the children. Hands them back if the node already has some.
    pub fn set_children(&self, children: Box<[Node]>) -> Result<(), Box<[Node]>> {
        self.children.set(children)
    }

    /// Detach the children, leaving a leaf.
    pub fn take_children(&mut self) -> Option<Box<[Node]>> {
        *self.expanding.get_mut() = false;
        self.children.take()
    }

    pub fn find_child(&self, m: Move) -> Option<&Node> {
        self.children().iter().find(|c| c.mv == m)
    }

    pub fn find_child_mut(&mut self, m: Move) -> Option<&mut Node> {
        self.children_mut().iter_mut().find(|c| c.mv == m)
    }

    /// Selection value of this node for the player who would play it.
    ///
    /// Blends RAVE and direct averages, with RAVE fading out as direct
    /// visits come in, plus a knowledge bonus that fades with visits too.
    pub fn value(&self, ravefactor: f32, knowledge: bool, fpurgency: f32) -> f32 {
        let expnum = self.exp.num() as f32;
        let ravenum = self.rave.num();
        let mut val = fpurgency;

        if ravefactor <= MIN_RAVE {
            if expnum > 0.0 {
                val = self.exp.avg();
            }
        } else if ravenum > 0 || expnum > 0.0 {
            let alpha = ravefactor / (ravefactor + expnum);
            val = 0.0;
            if ravenum > 0 {
                val += alpha * self.rave.avg();
            }
            if expnum > 0.0 {
                val += (1.0 - alpha) * self.exp.avg();
            }
        }

        let know = self.know();
        if knowledge && know > 0 {
            if expnum <= 1.0 {
                val += 0.01 * know as f32;
            } else if expnum < 1000.0 {
                val += 0.01 * know as f32 / expnum.sqrt();
            }
        }
        val
    }

    /// Number of nodes in this subtree, this one included.
    pub fn size(&self) -> usize {
        1 + self.children().iter().map(Node::size).sum::<usize>()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", NodeStats::of(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_pair_virtual_loss() {
        let e = ExpPair::default();
        e.add_vloss();
        assert_eq!(e.avg(), 0.0);
        e.settle(2, 1);
        assert_eq!((e.sum(), e.num()), (2, 1));
        e.add_vloss();
        e.settle(3, 3);
        assert_eq!((e.sum(), e.num()), (5, 4));
        e.add_vloss();
        e.settle(0, 0);
        assert_eq!((e.sum(), e.num()), (5, 4));
        e.set(2, 1);
        e.add(1, 1);
        assert_eq!(e.avg(), 0.75);
        e.add_wins(2);
        assert_eq!(e.to_string(), "7/4");
    }

    #[test]
    fn test_proof_packing() {
        let state = ProofState {
            outcome: Outcome::P2,
            depth: 513,
            best: Move::new(7, 3),
        };
        let proof = Proof::default();
        assert!(proof.prove(state));
        assert_eq!(proof.get(), state);
        let other = ProofState {
            outcome: Outcome::P1,
            ..state
        };
        assert!(!proof.prove(other));
        assert_eq!(proof.get().outcome, Outcome::P2);
        assert_eq!(ProofState::default().best, Move::NONE);
        assert_eq!(Proof::default().get(), ProofState::default());
    }

    #[test]
    fn test_value_blend() {
        let n = Node::new(Move::new(0, 0));
        assert_eq!(n.value(500.0, true, 1.0), 1.0);
        n.rave.add(2, 1);
        // only rave: alpha = 1
        assert_eq!(n.value(500.0, false, 1.0), 1.0);
        n.exp.add(0, 500);
        // alpha = 0.5
        assert!((n.value(500.0, false, 1.0) - 0.5).abs() < 1e-6);
        assert_eq!(n.value(0.0, false, 1.0), 0.0);
        n.set_know(10);
        assert!(n.value(0.0, true, 1.0) > 0.0);
    }

    #[test]
    fn test_children_publish_once() {
        let mut n = Node::new(Move::NONE);
        assert!(n.try_lock_expand());
        assert!(!n.try_lock_expand());
        let kids: Box<[Node]> = vec![Node::new(Move::new(0, 0)), Node::new(Move::new(1, 0))].into();
        assert!(n.set_children(kids).is_ok());
        let again: Box<[Node]> = vec![Node::new(Move::new(2, 0))].into();
        assert!(n.set_children(again).is_err());
        assert_eq!(n.num_children(), 2);
        assert!(n.find_child(Move::new(1, 0)).is_some());
        assert_eq!(n.size(), 3);
        assert_eq!(n.take_children().map(|c| c.len()), Some(2));
        assert!(!n.has_children());
        assert!(n.try_lock_expand());
    }
}
