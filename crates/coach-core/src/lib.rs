//! Chess-side logic for the coaching pipeline: PGN loading, evaluation
//! types, piece maps and the mistake detector. No engine or network I/O.

pub mod error;
pub mod eval;
pub mod game;
pub mod mistakes;
pub mod piece_map;

pub use error::CoreError;
pub use eval::{Evaluation, Score};
pub use game::{load, Game, GameHeaders, MoveRecord, Side};
pub use mistakes::{MistakeDetector, MistakeRecord, ScorePerspective, DEFAULT_THRESHOLD_CP};
pub use piece_map::{PieceMap, PlacedPiece};
