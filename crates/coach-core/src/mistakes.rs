//! Mistake detection over consecutive evaluations — pure state machine,
//! fed one (move, evaluation) pair at a time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::eval::{Evaluation, Score};
use crate::game::{MoveRecord, Side};
use crate::piece_map::PieceMap;

/// Default regression (centipawns) that flags a move
pub const DEFAULT_THRESHOLD_CP: i32 = 100;

/// Whose point of view the running centipawn difference is taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorePerspective {
    /// `previous - current` on White-relative scores, for both sides
    #[default]
    White,
    /// Same difference, re-signed for Black's moves so it measures the mover's loss
    Mover,
}

impl FromStr for ScorePerspective {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "white" => Ok(ScorePerspective::White),
            "mover" => Ok(ScorePerspective::Mover),
            other => Err(format!("unknown score perspective '{other}'")),
        }
    }
}

/// A flagged move.
#[derive(Debug, Clone, Serialize)]
pub struct MistakeRecord {
    #[serde(rename = "move")]
    pub mv: MoveRecord,
    /// Evaluation of the position after the move
    pub evaluation: Evaluation,
    /// Last centipawn score seen before this move
    pub previous_cp: i32,
    /// Centipawn score after this move
    pub current_cp: i32,
    /// Regression that triggered the flag (always >= threshold)
    pub delta: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub piece_map: Option<PieceMap>,
}

impl MistakeRecord {
    pub fn best_move(&self) -> Option<&str> {
        self.evaluation.best_move.as_deref()
    }
}

/// Running detector. Only centipawn evaluations move the state; mate
/// evaluations are neither compared nor remembered.
#[derive(Debug, Clone)]
pub struct MistakeDetector {
    threshold_cp: i32,
    perspective: ScorePerspective,
    attach_piece_map: bool,
    previous_cp: Option<i32>,
    mistakes: Vec<MistakeRecord>,
}

impl Default for MistakeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_CP)
    }
}

impl MistakeDetector {
    pub fn new(threshold_cp: i32) -> Self {
        Self {
            threshold_cp,
            perspective: ScorePerspective::White,
            attach_piece_map: false,
            previous_cp: None,
            mistakes: Vec::new(),
        }
    }

    pub fn with_perspective(mut self, perspective: ScorePerspective) -> Self {
        self.perspective = perspective;
        self
    }

    pub fn with_piece_maps(mut self, attach: bool) -> Self {
        self.attach_piece_map = attach;
        self
    }

    pub fn previous_cp(&self) -> Option<i32> {
        self.previous_cp
    }

    pub fn mistakes(&self) -> &[MistakeRecord] {
        &self.mistakes
    }

    /// Feed the evaluation of the position reached by `mv`. Returns the new
    /// record when the move is flagged.
    pub fn observe(&mut self, mv: &MoveRecord, evaluation: Evaluation) -> Option<&MistakeRecord> {
        let current = match evaluation.score {
            Score::Centipawns(cp) => cp,
            Score::Mate(_) => return None,
        };

        let flagged = match self.previous_cp {
            Some(previous) => {
                let delta = self.regression(previous, current, mv.side);
                (delta >= self.threshold_cp).then_some((previous, delta))
            }
            None => None,
        };
        self.previous_cp = Some(current);

        let (previous_cp, delta) = flagged?;
        let piece_map = self.attach_piece_map.then(|| mv.piece_map());
        self.mistakes.push(MistakeRecord {
            mv: mv.clone(),
            evaluation,
            previous_cp,
            current_cp: current,
            delta,
            piece_map,
        });
        self.mistakes.last()
    }

    pub fn finish(self) -> Vec<MistakeRecord> {
        self.mistakes
    }

    fn regression(&self, previous: i32, current: i32, mover: Side) -> i32 {
        let raw = previous - current;
        match (self.perspective, mover) {
            (ScorePerspective::Mover, Side::Black) => -raw,
            _ => raw,
        }
    }
}
