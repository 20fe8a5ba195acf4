//! Game history: the moves played so far and the board they lead to.

use crate::board::Board;
use crate::error::Result;
use crate::geometry::{Move, Shape};

/// The real game. Undo replays every move but the last onto the starting
/// position, since union-find merges cannot be taken back.
#[derive(Clone)]
pub struct History<S: Shape> {
    moves: Vec<Move>,
    start: Board<S>,
    board: Board<S>,
}

impl<S: Shape> History<S> {
    pub fn new(size: usize) -> Result<Self> {
        let board = Board::new(size)?;
        Ok(History {
            moves: Vec::new(),
            start: board.clone(),
            board,
        })
    }

    /// Start from an arbitrary position; its stones cannot be undone.
    pub fn from_board(board: Board<S>) -> Self {
        History {
            moves: Vec::new(),
            start: board.clone(),
            board,
        }
    }

    pub fn board(&self) -> &Board<S> {
        &self.board
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn last(&self) -> Move {
        self.moves.last().copied().unwrap_or(Move::NONE)
    }

    /// Change the board size and clear the game.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        self.board.resize(size)?;
        self.start = self.board.clone();
        self.moves.clear();
        Ok(())
    }

    /// Play a move. Returns false if it is not legal.
    pub fn play(&mut self, m: Move) -> bool {
        if !self.board.place(m, true, true) {
            return false;
        }
        self.moves.push(m);
        true
    }

    /// Take back the last move. Returns false if there is none.
    pub fn undo(&mut self) -> bool {
        if self.moves.pop().is_none() {
            return false;
        }
        self.board = self.start.clone();
        for &m in &self.moves {
            self.board.place(m, true, true);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Triangle;
    use crate::outcome::Side;

    #[test]
    fn test_play_and_undo() {
        let mut h = History::<Triangle>::new(5).unwrap();
        let a: Move = "a1".parse().unwrap();
        let b: Move = "c4".parse().unwrap();
        let before = h.board().hash();
        assert!(h.play(a));
        assert!(!h.play(a));
        assert!(h.play(b));
        assert_eq!(h.len(), 2);
        assert_eq!(h.last(), b);

        assert!(h.undo());
        assert_eq!(h.last(), a);
        assert_eq!(h.board().get(b), Side::None);
        assert_eq!(h.board().to_play(), Side::P2);

        assert!(h.undo());
        assert!(!h.undo());
        assert_eq!(h.board().hash(), before);
        assert_eq!(h.last(), Move::NONE);
    }
}
