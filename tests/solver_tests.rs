//! Proofs found by the search, checked against exhaustive minimax.

use std::collections::HashMap;
use std::time::Duration;

use hexmcts::board::Board;
use hexmcts::engine::Engine;
use hexmcts::geometry::{Move, Shape, Triangle};
use hexmcts::outcome::{Outcome, Side};
use hexmcts::record::RecordNode;

type Memo = HashMap<Vec<Side>, Outcome>;

fn key<S: Shape>(board: &Board<S>) -> Vec<Side> {
    let dim = S::dim(board.size()) as i8;
    (0..dim)
        .flat_map(|y| (0..dim).map(move |x| Move::new(x, y)))
        .filter(|&m| board.on_board(m))
        .map(|m| board.get(m))
        .collect()
}

/// Exact result of the position with perfect play.
fn solve<S: Shape>(board: &Board<S>, memo: &mut Memo) -> Outcome {
    if board.outcome().is_solved() {
        return board.outcome();
    }
    let k = key(board);
    if let Some(&o) = memo.get(&k) {
        return o;
    }
    let side = board.to_play();
    let mut result = Outcome::win_for(!side);
    for m in board.moves() {
        let mut next = board.clone();
        assert!(next.place(m, true, false));
        let o = solve(&next, memo);
        if o.is_win_for(side) {
            result = o;
            break;
        }
        if o == Outcome::Draw {
            result = Outcome::Draw;
        }
    }
    memo.insert(k, result);
    result
}

/// Check every proven node of the record below `board`. Returns how many were checked.
fn check_record<S: Shape>(node: &RecordNode, board: &Board<S>, memo: &mut Memo) -> usize {
    let mut checked = 0;
    let proven = node.stats.proof.outcome;
    if proven.is_solved() {
        assert_eq!(proven, solve(board, memo), "wrong proof at\n{board}");
        checked += 1;
    }
    for child in &node.children {
        let mut next = board.clone();
        assert!(next.place(child.stats.mv, true, false));
        checked += check_record(child, &next, memo);
    }
    checked
}

#[test]
fn test_exact_y4_is_first_player_win() {
    let board = Board::<Triangle>::new(4).unwrap();
    let mut memo = Memo::new();
    assert_eq!(solve(&board, &mut memo), Outcome::P1);
}

#[test]
fn test_proofs_match_minimax_y4() {
    let mut engine = Engine::<Triangle>::new(4).unwrap();
    let result = engine.search(Duration::from_secs(300), 2_000_000, 0).unwrap();
    assert_eq!(result.outcome, Outcome::P1);

    let record = engine.serialize_subtree(&[], 0).unwrap();
    let mut memo = Memo::new();
    let checked = check_record(&record.root, engine.board(), &mut memo);
    assert!(checked > 1);
}

#[test]
fn test_proofs_match_minimax_after_opening() {
    let mut engine = Engine::<Triangle>::new(5).unwrap();
    for m in ["c3", "b2", "d4"] {
        engine.commit_move(m.parse().unwrap()).unwrap();
    }
    engine.search(Duration::from_secs(300), 20_000, 0).unwrap();

    let record = engine.serialize_subtree(&[], 0).unwrap();
    let mut memo = Memo::new();
    check_record(&record.root, engine.board(), &mut memo);
}
