//! Engine evaluation types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::game::Side;

/// Engine score, always from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Score {
    /// Centipawns, positive = White is better
    #[serde(rename = "cp")]
    Centipawns(i32),
    /// Forced mate in N moves, positive = White mates
    #[serde(rename = "mate")]
    Mate(i32),
}

impl Score {
    /// Re-sign a score reported relative to the side to move.
    pub fn from_side_to_move(relative: Score, to_move: Side) -> Score {
        match (to_move, relative) {
            (Side::White, score) => score,
            (Side::Black, Score::Centipawns(cp)) => Score::Centipawns(-cp),
            (Side::Black, Score::Mate(n)) => Score::Mate(-n),
        }
    }

    pub fn centipawns(self) -> Option<i32> {
        match self {
            Score::Centipawns(cp) => Some(cp),
            Score::Mate(_) => None,
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Score::Mate(_))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Centipawns(cp) => {
                let pawns = *cp as f64 / 100.0;
                if pawns >= 0.0 {
                    write!(f, "+{pawns:.2}")
                } else {
                    write!(f, "{pawns:.2}")
                }
            }
            Score::Mate(0) => write!(f, "checkmate"),
            Score::Mate(n) if *n > 0 => write!(f, "White mates in {n}"),
            Score::Mate(n) => write!(f, "Black mates in {}", n.unsigned_abs()),
        }
    }
}

/// Evaluation of one position plus the engine's preferred move there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Score,
    /// Best move in UCI notation; `None` when the side to move has no legal move
    pub best_move: Option<String>,
}

impl Evaluation {
    pub fn centipawns(cp: i32, best_move: Option<&str>) -> Self {
        Self {
            score: Score::Centipawns(cp),
            best_move: best_move.map(String::from),
        }
    }

    pub fn mate(n: i32, best_move: Option<&str>) -> Self {
        Self {
            score: Score::Mate(n),
            best_move: best_move.map(String::from),
        }
    }
}
