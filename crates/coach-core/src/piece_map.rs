//! Square -> piece snapshot of a board, attached to mistakes on request.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use shakmaty::{Board, Role};

use crate::game::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlacedPiece {
    pub color: Side,
    pub role: &'static str,
}

/// Occupied squares keyed by their algebraic name (`"e4"`), file-major order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PieceMap(BTreeMap<String, PlacedPiece>);

impl PieceMap {
    pub fn from_board(board: &Board) -> Self {
        let mut squares = BTreeMap::new();
        for square in board.occupied() {
            if let Some(piece) = board.piece_at(square) {
                squares.insert(
                    square.to_string(),
                    PlacedPiece {
                        color: Side::from(piece.color),
                        role: role_name(piece.role),
                    },
                );
            }
        }
        Self(squares)
    }

    pub fn get(&self, square: &str) -> Option<&PlacedPiece> {
        self.0.get(square)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PlacedPiece)> {
        self.0.iter().map(|(sq, p)| (sq.as_str(), p))
    }
}

/// One `square: color role` entry per line.
impl fmt::Display for PieceMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (square, piece) in self.iter() {
            writeln!(f, "{square}: {} {}", piece.color.name(), piece.role)?;
        }
        Ok(())
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::Pawn => "pawn",
        Role::Knight => "knight",
        Role::Bishop => "bishop",
        Role::Rook => "rook",
        Role::Queen => "queen",
        Role::King => "king",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::{Chess, Position};

    #[test]
    fn test_start_position_map() {
        let pos = Chess::default();
        let map = PieceMap::from_board(pos.board());
        assert_eq!(map.len(), 32);
        assert_eq!(
            map.get("e1"),
            Some(&PlacedPiece {
                color: Side::White,
                role: "king"
            })
        );
        assert_eq!(map.get("d8").map(|p| p.role), Some("queen"));
        assert_eq!(map.get("d8").map(|p| p.color), Some(Side::Black));
        assert!(map.get("e4").is_none());
    }

    #[test]
    fn test_display_lists_every_piece() {
        let pos = Chess::default();
        let text = PieceMap::from_board(pos.board()).to_string();
        assert_eq!(text.lines().count(), 32);
        assert!(text.contains("e1: White king"));
    }
}
