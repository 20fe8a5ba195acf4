//! Tree records: a search tree written out as text and read back.
//!
//! The format is a nested, SGF-like bracket structure. Every node carries
//! its statistics as one comment line:
//!
//! ```text
//! (;GM[y]SZ[4]PL[W]C[move none, exp 40/20, rave 0/0, know 0, outcome unknown, depth 0, best none, children 10]
//! (;W[a1]C[move a1, exp 12/6, rave 9/5, know 20, outcome unknown, depth 0, best none, children 9])
//! (;W[b2]C[...]
//! (;B[a1]C[...])))
//! ```
//!
//! A record of a subtree below the root carries the moves leading to it in a
//! `PA[a1 b2]` property.
//!
//! A child is listed under the side that plays it. Loading recreates every
//! legal child of a recorded node and fills in the ones present in the
//! record, so the loaded tree is searchable as is. A node whose children are
//! all in the record, such as a forced block, gets exactly those back.

use std::fmt;
use std::str::FromStr;

use crate::arena::NodeArena;
use crate::board::Board;
use crate::error::{EngineError, Result};
use crate::geometry::{Move, Shape};
use crate::node::{Node, ProofState};
use crate::outcome::{Outcome, Side};

/// Everything a record keeps about one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeStats {
    pub mv: Move,
    pub exp: (u32, u32),
    pub rave: (u32, u32),
    pub know: i32,
    pub proof: ProofState,
    pub children: usize,
}

impl NodeStats {
    pub fn of(node: &Node) -> Self {
        NodeStats {
            mv: node.mv,
            exp: (node.exp.sum(), node.exp.num()),
            rave: (node.rave.sum(), node.rave.num()),
            know: node.know(),
            proof: node.proof(),
            children: node.num_children(),
        }
    }

    /// Copy the statistics onto `node`. The move and children are left alone.
    pub fn apply(&self, node: &Node) {
        node.exp.set(self.exp.0, self.exp.1);
        node.rave.set(self.rave.0, self.rave.1);
        node.set_know(self.know);
        node.set_proof(self.proof);
    }
}

impl fmt::Display for NodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "move {}, exp {}/{}, rave {}/{}, know {}, outcome {}, depth {}, best {}, children {}",
            self.mv,
            self.exp.0,
            self.exp.1,
            self.rave.0,
            self.rave.1,
            self.know,
            self.proof.outcome,
            self.proof.depth,
            self.proof.best,
            self.children
        )
    }
}

fn malformed(msg: impl Into<String>) -> EngineError {
    EngineError::MalformedRecord(msg.into())
}

fn parse_pair(s: &str) -> Result<(u32, u32)> {
    let (a, b) = s
        .split_once('/')
        .ok_or_else(|| malformed(format!("expected sum/num, got '{s}'")))?;
    let a = a.parse().map_err(|_| malformed(format!("bad sum '{a}'")))?;
    let b = b.parse().map_err(|_| malformed(format!("bad count '{b}'")))?;
    Ok((a, b))
}

impl FromStr for NodeStats {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let mut stats = NodeStats {
            mv: Move::NONE,
            exp: (0, 0),
            rave: (0, 0),
            know: 0,
            proof: ProofState::default(),
            children: 0,
        };
        for field in s.split(',') {
            let field = field.trim();
            if field.is_empty() {
                continue;
            }
            let (key, value) = field
                .split_once(' ')
                .ok_or_else(|| malformed(format!("field without value: '{field}'")))?;
            let value = value.trim();
            match key {
                "move" => stats.mv = value.parse().map_err(malformed)?,
                "exp" => stats.exp = parse_pair(value)?,
                "rave" => stats.rave = parse_pair(value)?,
                "know" => {
                    stats.know = value
                        .parse()
                        .map_err(|_| malformed(format!("bad knowledge '{value}'")))?
                }
                "outcome" => stats.proof.outcome = value.parse().map_err(malformed)?,
                "depth" => {
                    stats.proof.depth = value
                        .parse()
                        .map_err(|_| malformed(format!("bad depth '{value}'")))?
                }
                "best" => stats.proof.best = value.parse().map_err(malformed)?,
                "children" => {
                    stats.children = value
                        .parse()
                        .map_err(|_| malformed(format!("bad child count '{value}'")))?
                }
                _ => return Err(malformed(format!("unknown field '{key}'"))),
            }
        }
        Ok(stats)
    }
}

/// A recorded node and the recorded part of its subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordNode {
    pub stats: NodeStats,
    pub children: Vec<RecordNode>,
}

impl RecordNode {
    /// Record `node` and every descendant with at least `threshold` visits.
    ///
    /// Below a node won by the side to move there, only the winning children
    /// are kept.
    pub fn from_node(node: &Node, to_play: Side, threshold: u32) -> Self {
        let won = node.outcome().is_win_for(to_play);
        let children = node
            .children()
            .iter()
            .filter(|c| c.exp.num() >= threshold && (!won || c.outcome() == node.outcome()))
            .map(|c| RecordNode::from_node(c, !to_play, threshold))
            .collect();
        RecordNode {
            stats: NodeStats::of(node),
            children,
        }
    }

    /// Number of nodes in the record.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(RecordNode::size).sum::<usize>()
    }

    /// Rebuild the recorded subtree below `node`, whose position is `board`.
    ///
    /// Returns the number of nodes allocated from `arena`.
    pub fn load<S: Shape>(&self, board: &Board<S>, node: &Node, arena: &NodeArena) -> Result<usize> {
        self.stats.apply(node);
        if self.children.is_empty() {
            return Ok(0);
        }
        if node.has_children() {
            return Err(malformed(format!("node {} already has children", node.mv)));
        }

        let moves: Vec<Move> = board.moves().collect();
        for rec in &self.children {
            if !moves.contains(&rec.stats.mv) {
                return Err(malformed(format!("illegal move {} in record", rec.stats.mv)));
            }
        }

        let block = if self.children.len() == self.stats.children {
            arena.alloc(self.children.len(), |i| Node::new(self.children[i].stats.mv))
        } else {
            arena.alloc(moves.len(), |i| Node::new(moves[i]))
        };
        let mut allocated = block.len();
        if let Err(block) = node.set_children(block) {
            arena.dealloc(block);
            return Err(malformed("children were published concurrently"));
        }

        for rec in &self.children {
            let Some(child) = node.find_child(rec.stats.mv) else {
                return Err(malformed(format!("missing child {}", rec.stats.mv)));
            };
            let mut next = board.clone();
            next.place(rec.stats.mv, true, false);
            allocated += rec.load(&next, child, arena)?;
        }
        Ok(allocated)
    }

    fn write(&self, f: &mut fmt::Formatter<'_>, side: Side) -> fmt::Result {
        for child in &self.children {
            write!(f, "\n(;{}[{}]C[{}]", side.short_name(), child.stats.mv, child.stats)?;
            child.write(f, !side)?;
            write!(f, ")")?;
        }
        Ok(())
    }
}

/// A whole record: game, board size, side to move at the root, the path from
/// the root to the recorded node, and the tree below it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRecord {
    pub game: String,
    pub size: usize,
    pub to_play: Side,
    pub path: Vec<Move>,
    pub root: RecordNode,
}

impl TreeRecord {
    /// Side to move at the recorded node.
    pub fn node_to_play(&self) -> Side {
        if self.path.len() % 2 == 0 { self.to_play } else { !self.to_play }
    }
}

impl fmt::Display for TreeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(;GM[{}]SZ[{}]PL[{}]",
            self.game,
            self.size,
            self.to_play.short_name()
        )?;
        if !self.path.is_empty() {
            let path: Vec<String> = self.path.iter().map(Move::to_string).collect();
            write!(f, "PA[{}]", path.join(" "))?;
        }
        write!(f, "C[{}]", self.root.stats)?;
        self.root.write(f, self.node_to_play())?;
        writeln!(f, ")")
    }
}

/// Recursive descent over the bracket structure.
struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        let rest = &self.text[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.text[self.pos..].chars().next()
    }

    fn expect(&mut self, c: char) -> Result<()> {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            Ok(())
        } else {
            Err(malformed(format!("expected '{c}' at offset {}", self.pos)))
        }
    }

    /// One `KEY[value]` property, or `None` at the end of the node's properties.
    fn property(&mut self) -> Result<Option<(&'a str, &'a str)>> {
        match self.peek() {
            Some(c) if c.is_ascii_uppercase() => {}
            _ => return Ok(None),
        }
        let text = self.text;
        let rest = &text[self.pos..];
        let open = rest
            .find('[')
            .ok_or_else(|| malformed(format!("property without value at offset {}", self.pos)))?;
        let close = rest
            .find(']')
            .ok_or_else(|| malformed(format!("unterminated property at offset {}", self.pos)))?;
        if close < open {
            return Err(malformed(format!("bad property at offset {}", self.pos)));
        }
        self.pos += close + 1;
        Ok(Some((&rest[..open], &rest[open + 1..close])))
    }

    /// A node's properties, as (key, value) pairs.
    fn properties(&mut self) -> Result<Vec<(&'a str, &'a str)>> {
        self.expect(';')?;
        let mut props = Vec::new();
        while let Some(p) = self.property()? {
            props.push(p);
        }
        Ok(props)
    }

    /// Children of the current node, up to and including its closing bracket.
    fn children(&mut self, side: Side) -> Result<Vec<RecordNode>> {
        let mut children = Vec::new();
        while self.peek() == Some('(') {
            self.expect('(')?;
            let props = self.properties()?;
            let mut stats = None;
            let mut mv = None;
            for (key, value) in props {
                match key {
                    "C" => stats = Some(value.parse::<NodeStats>()?),
                    "W" | "B" => {
                        if key != side.short_name() {
                            return Err(malformed(format!("{key}[{value}] played out of turn")));
                        }
                        mv = Some(value.parse::<Move>().map_err(malformed)?);
                    }
                    _ => {}
                }
            }
            let mut stats = stats.ok_or_else(|| malformed("node without statistics"))?;
            if let Some(mv) = mv {
                stats.mv = mv;
            }
            let grandchildren = self.children(!side)?;
            children.push(RecordNode {
                stats,
                children: grandchildren,
            });
        }
        self.expect(')')?;
        Ok(children)
    }
}

impl FromStr for TreeRecord {
    type Err = EngineError;

    fn from_str(text: &str) -> Result<Self> {
        let mut p = Parser { text, pos: 0 };
        p.expect('(')?;
        let mut game = None;
        let mut size = None;
        let mut to_play = Side::P1;
        let mut stats = None;
        let mut path = Vec::new();
        for (key, value) in p.properties()? {
            match key {
                "GM" => game = Some(value.to_string()),
                "SZ" => {
                    size = Some(
                        value
                            .parse()
                            .map_err(|_| malformed(format!("bad size '{value}'")))?,
                    )
                }
                "PL" => {
                    to_play = match value {
                        "W" => Side::P1,
                        "B" => Side::P2,
                        _ => return Err(malformed(format!("bad side '{value}'"))),
                    }
                }
                "PA" => {
                    path = value
                        .split_whitespace()
                        .map(|m| m.parse::<Move>().map_err(malformed))
                        .collect::<Result<_>>()?
                }
                "C" => stats = Some(value.parse::<NodeStats>()?),
                _ => {}
            }
        }
        let node_side = if path.len() % 2 == 0 { to_play } else { !to_play };
        let children = p.children(node_side)?;
        if p.peek().is_some() {
            return Err(malformed(format!("trailing text at offset {}", p.pos)));
        }
        Ok(TreeRecord {
            game: game.ok_or_else(|| malformed("missing GM"))?,
            size: size.ok_or_else(|| malformed("missing SZ"))?,
            to_play,
            path,
            root: RecordNode {
                stats: stats.ok_or_else(|| malformed("root without statistics"))?,
                children,
            },
        })
    }
}

impl TreeRecord {
    /// Outcome recorded at the root.
    pub fn outcome(&self) -> Outcome {
        self.root.stats.proof.outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Triangle;

    fn sample_tree(arena: &NodeArena, board: &Board<Triangle>) -> Node {
        let root = Node::new(Move::NONE);
        root.exp.add(30, 20);
        let moves: Vec<Move> = board.moves().collect();
        let block = arena.alloc(moves.len(), |i| Node::new(moves[i]));
        block[0].exp.add(8, 6);
        block[0].rave.add(3, 4);
        block[0].set_know(25);
        block[1].exp.add(2, 1);
        block[2].exp.add(10, 5);
        block[2].set_proof(ProofState {
            outcome: Outcome::P1,
            depth: 3,
            best: Move::new(2, 1),
        });
        assert!(root.set_children(block).is_ok());
        root
    }

    #[test]
    fn test_stats_line_roundtrip() {
        let stats = NodeStats {
            mv: Move::new(3, 1),
            exp: (7, 9),
            rave: (11, 13),
            know: -4,
            proof: ProofState {
                outcome: Outcome::Draw,
                depth: 12,
                best: Move::new(0, 0),
            },
            children: 17,
        };
        let line = stats.to_string();
        assert_eq!(
            line,
            "move b4, exp 7/9, rave 11/13, know -4, outcome draw, depth 12, best a1, children 17"
        );
        assert_eq!(line.parse::<NodeStats>(), Ok(stats));
        assert!("move b4, frob 3".parse::<NodeStats>().is_err());
    }

    #[test]
    fn test_record_threshold_and_text() {
        let arena = NodeArena::new();
        let board = Board::<Triangle>::new(4).unwrap();
        let root = sample_tree(&arena, &board);

        let rec = TreeRecord {
            game: "y".into(),
            size: 4,
            to_play: Side::P1,
            path: Vec::new(),
            root: RecordNode::from_node(&root, Side::P1, 2),
        };
        assert_eq!(rec.root.children.len(), 2);
        assert_eq!(rec.root.size(), 3);

        let text = rec.to_string();
        assert!(text.starts_with("(;GM[y]SZ[4]PL[W]C[move none"));
        let parsed: TreeRecord = text.parse().unwrap();
        assert_eq!(parsed, rec);
    }

    #[test]
    fn test_record_with_path() {
        let rec = TreeRecord {
            game: "havannah".into(),
            size: 3,
            to_play: Side::P1,
            path: vec![Move::new(0, 0), Move::new(1, 1)],
            root: RecordNode {
                stats: "move b2, exp 4/3".parse().unwrap(),
                children: vec![RecordNode {
                    stats: "move c3, exp 2/1".parse().unwrap(),
                    children: Vec::new(),
                }],
            },
        };
        let text = rec.to_string();
        assert!(text.contains("PA[a1 b2]"));
        assert!(text.contains("(;W[c3]"));
        assert_eq!(text.parse::<TreeRecord>(), Ok(rec));
    }

    #[test]
    fn test_load_recreates_all_children() {
        let arena = NodeArena::new();
        let board = Board::<Triangle>::new(4).unwrap();
        let root = sample_tree(&arena, &board);
        let rec = RecordNode::from_node(&root, Side::P1, 0);

        let loaded = Node::new(Move::NONE);
        let fresh = NodeArena::new();
        let allocated = rec.load(&board, &loaded, &fresh).unwrap();
        assert_eq!(allocated, 10);
        assert_eq!(fresh.live(), 10);
        assert_eq!(RecordNode::from_node(&loaded, Side::P1, 0), rec);
    }

    #[test]
    fn test_malformed_records() {
        assert!("(;GM[y]C[move none])".parse::<TreeRecord>().is_err());
        assert!("(;GM[y]SZ[4]C[move none]".parse::<TreeRecord>().is_err());
        assert!("(;GM[y]SZ[4]C[move none](;B[a1]C[move a1]))".parse::<TreeRecord>().is_err());

        let bad: TreeRecord = "(;GM[y]SZ[4]C[move none](;W[a2]C[move a2])(;W[a9]C[move a9]))"
            .parse()
            .unwrap();
        let board = Board::<Triangle>::new(4).unwrap();
        let node = Node::new(Move::NONE);
        let err = bad.root.load(&board, &node, &NodeArena::new());
        assert!(matches!(err, Err(EngineError::MalformedRecord(_))));
    }
}
