//! Players and game outcomes.

use std::fmt;
use std::ops::Not;

/// Occupant of a cell, or the player a move belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Side {
    #[default]
    None,
    P1,
    P2,
    /// Padding cell outside the board shape
    Off,
}

impl Side {
    /// Numeric code used in hashes and patterns: 0 none, 1 P1, 2 P2, 3 off-board.
    #[inline]
    pub fn to_index(self) -> usize {
        match self {
            Side::None => 0,
            Side::P1 => 1,
            Side::P2 => 2,
            Side::Off => 3,
        }
    }

    #[inline]
    pub fn from_index(i: usize) -> Side {
        match i & 3 {
            0 => Side::None,
            1 => Side::P1,
            2 => Side::P2,
            _ => Side::Off,
        }
    }

    /// True for the two real players.
    #[inline]
    pub fn is_player(self) -> bool {
        matches!(self, Side::P1 | Side::P2)
    }

    /// Short name used on the board display and in records.
    pub fn short_name(self) -> &'static str {
        match self {
            Side::None => "-",
            Side::P1 => "W",
            Side::P2 => "B",
            Side::Off => "#",
        }
    }
}

impl Not for Side {
    type Output = Side;

    /// The opponent. Non-players map to themselves.
    fn not(self) -> Side {
        match self {
            Side::P1 => Side::P2,
            Side::P2 => Side::P1,
            other => other,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Side::None => "none",
            Side::P1 => "white",
            Side::P2 => "black",
            Side::Off => "off",
        };
        write!(f, "{s}")
    }
}

/// Result of a game, or of a proven tree node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Outcome {
    #[default]
    Unknown,
    Draw,
    P1,
    P2,
}

impl Outcome {
    #[inline]
    pub fn is_solved(self) -> bool {
        self != Outcome::Unknown
    }

    /// The outcome in which `side` wins.
    #[inline]
    pub fn win_for(side: Side) -> Outcome {
        match side {
            Side::P1 => Outcome::P1,
            Side::P2 => Outcome::P2,
            _ => Outcome::Unknown,
        }
    }

    /// The winning side, if there is one.
    #[inline]
    pub fn winner(self) -> Option<Side> {
        match self {
            Outcome::P1 => Some(Side::P1),
            Outcome::P2 => Some(Side::P2),
            _ => None,
        }
    }

    #[inline]
    pub fn is_win_for(self, side: Side) -> bool {
        self.winner() == Some(side)
    }

    /// Outcome described from `side`'s point of view.
    pub fn relative_to(self, side: Side) -> &'static str {
        match self {
            Outcome::Unknown => "unknown",
            Outcome::Draw => "draw",
            o if o.is_win_for(side) => "win",
            _ => "loss",
        }
    }

    pub(crate) fn to_bits(self) -> u64 {
        match self {
            Outcome::Unknown => 0,
            Outcome::Draw => 1,
            Outcome::P1 => 2,
            Outcome::P2 => 3,
        }
    }

    pub(crate) fn from_bits(bits: u64) -> Outcome {
        match bits & 3 {
            0 => Outcome::Unknown,
            1 => Outcome::Draw,
            2 => Outcome::P1,
            _ => Outcome::P2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Outcome::Unknown => "unknown",
            Outcome::Draw => "draw",
            Outcome::P1 => "white",
            Outcome::P2 => "black",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(Outcome::Unknown),
            "draw" => Ok(Outcome::Draw),
            "white" => Ok(Outcome::P1),
            "black" => Ok(Outcome::P2),
            _ => Err(format!("unknown outcome '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent() {
        assert_eq!(!Side::P1, Side::P2);
        assert_eq!(!Side::P2, Side::P1);
        assert_eq!(!Side::None, Side::None);
    }

    #[test]
    fn test_bits_roundtrip() {
        for o in [Outcome::Unknown, Outcome::Draw, Outcome::P1, Outcome::P2] {
            assert_eq!(Outcome::from_bits(o.to_bits()), o);
            assert_eq!(o.to_string().parse::<Outcome>(), Ok(o));
        }
    }

    #[test]
    fn test_relative() {
        assert_eq!(Outcome::P1.relative_to(Side::P1), "win");
        assert_eq!(Outcome::P1.relative_to(Side::P2), "loss");
        assert_eq!(Outcome::Draw.relative_to(Side::P2), "draw");
    }
}
