//! PGN loading: replays the mainline with shakmaty and records every ply.

use std::ops::ControlFlow;

use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

use crate::error::CoreError;
use crate::piece_map::PieceMap;

/// Side that played a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn name(self) -> &'static str {
        match self {
            Side::White => "White",
            Side::Black => "Black",
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

/// One ply of the mainline together with the position it produced.
#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    /// 1-based ply index
    pub index: usize,
    /// Full-move number printed in front of the move in PGN
    pub move_number: u32,
    pub san: String,
    pub uci: String,
    pub side: Side,
    /// FEN of the position after the move
    pub fen: String,
    #[serde(skip)]
    position: Chess,
}

impl MoveRecord {
    /// Position after the move.
    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn piece_map(&self) -> PieceMap {
        PieceMap::from_board(self.position.board())
    }
}

/// Tag pairs kept from the PGN header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameHeaders {
    pub event: Option<String>,
    pub site: Option<String>,
    pub date: Option<String>,
    pub white: Option<String>,
    pub black: Option<String>,
    pub result: Option<String>,
    pub white_elo: Option<i32>,
    pub black_elo: Option<i32>,
    pub eco: Option<String>,
    pub opening: Option<String>,
    /// Starting position when the game was set up from a FEN tag
    pub fen: Option<String>,
}

/// A decoded game: header tags plus the replayed mainline.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Game {
    pub headers: GameHeaders,
    moves: Vec<MoveRecord>,
}

impl Game {
    pub fn moves(&self) -> &[MoveRecord] {
        &self.moves
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    /// Numbered SAN movetext, e.g. `1. e4 e5 2. Nf3`.
    pub fn movetext(&self) -> String {
        let tokens: Vec<String> = self
            .moves
            .iter()
            .enumerate()
            .map(|(i, mv)| match mv.side {
                Side::White => format!("{}. {}", mv.move_number, mv.san),
                Side::Black if i == 0 => format!("{}... {}", mv.move_number, mv.san),
                Side::Black => mv.san.clone(),
            })
            .collect();
        tokens.join(" ")
    }

    /// Render the game back to PGN: tag pairs, movetext and result.
    pub fn to_pgn(&self) -> String {
        let h = &self.headers;
        let result = h.result.as_deref().unwrap_or("*");
        let white_elo = h.white_elo.map(|elo| elo.to_string());
        let black_elo = h.black_elo.map(|elo| elo.to_string());

        let mut tags = vec![
            ("Event", h.event.as_deref().unwrap_or("?")),
            ("Site", h.site.as_deref().unwrap_or("?")),
            ("Date", h.date.as_deref().unwrap_or("????.??.??")),
            ("White", h.white.as_deref().unwrap_or("?")),
            ("Black", h.black.as_deref().unwrap_or("?")),
            ("Result", result),
        ];
        let optional = [
            ("WhiteElo", white_elo.as_deref()),
            ("BlackElo", black_elo.as_deref()),
            ("ECO", h.eco.as_deref()),
            ("Opening", h.opening.as_deref()),
        ];
        tags.extend(optional.into_iter().filter_map(|(name, value)| Some((name, value?))));
        if let Some(fen) = &h.fen {
            tags.push(("SetUp", "1"));
            tags.push(("FEN", fen.as_str()));
        }

        let mut out = String::new();
        for (name, value) in tags {
            out.push_str(&format!("[{name} \"{}\"]\n", escape_tag_value(value)));
        }

        out.push('\n');
        let movetext = self.movetext();
        if !movetext.is_empty() {
            out.push_str(&movetext);
            out.push(' ');
        }
        out.push_str(result);
        out
    }
}

/// Decode the first game of `pgn` and replay its mainline.
///
/// Never fails: text without a parsable game gives an empty `Game`, and
/// replay stops at the first move that is not legal in the current position.
pub fn load(pgn: &str) -> Game {
    let mut reader = Reader::new(pgn.as_bytes());
    let mut loader = GameLoader::default();

    match reader.read_game(&mut loader) {
        Ok(Some(())) => loader.game.unwrap_or_default(),
        _ => Game::default(),
    }
}

/// Escape `\` and `"` for a PGN tag value.
fn escape_tag_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Canonical FEN of a position (en passant square only when capturable).
pub fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

fn starting_position(fen: Option<&str>) -> Result<Chess, CoreError> {
    match fen {
        None => Ok(Chess::default()),
        Some(fen) => {
            let fen: Fen = fen
                .parse()
                .map_err(|e| CoreError::InvalidFen(format!("{fen}: {e}")))?;
            fen.into_position(CastlingMode::Standard)
                .map_err(|e| CoreError::InvalidPosition(e.to_string()))
        }
    }
}

/// Movetext state while replaying.
struct Replay {
    board: Chess,
    moves: Vec<MoveRecord>,
    /// Set once a move fails to apply; later moves are ignored
    stopped: bool,
}

#[derive(Default)]
struct GameLoader {
    game: Option<Game>,
}

impl Visitor for GameLoader {
    type Tags = GameHeaders;
    type Movetext = (GameHeaders, Replay);
    type Output = ();

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        self.game = None;
        ControlFlow::Continue(GameHeaders::default())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().into_owned();
        match name {
            b"Event" => tags.event = Some(value),
            b"Site" => tags.site = Some(value),
            b"Date" => tags.date = Some(value),
            b"White" => tags.white = Some(value),
            b"Black" => tags.black = Some(value),
            b"Result" => tags.result = Some(value),
            b"WhiteElo" => tags.white_elo = value.parse().ok(),
            b"BlackElo" => tags.black_elo = value.parse().ok(),
            b"ECO" => tags.eco = Some(value),
            b"Opening" => tags.opening = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        match starting_position(tags.fen.as_deref()) {
            Ok(board) => ControlFlow::Continue((
                tags,
                Replay {
                    board,
                    moves: Vec::new(),
                    stopped: false,
                },
            )),
            Err(_) => {
                self.game = Some(Game {
                    headers: tags,
                    moves: Vec::new(),
                });
                ControlFlow::Break(())
            }
        }
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        let replay = &mut movetext.1;
        if replay.stopped {
            return ControlFlow::Continue(());
        }

        let mv = match san_plus.san.to_move(&replay.board) {
            Ok(mv) => mv,
            Err(_) => {
                replay.stopped = true;
                return ControlFlow::Continue(());
            }
        };

        let side = Side::from(replay.board.turn());
        let move_number = replay.board.fullmoves().get();
        let uci = mv.to_uci(CastlingMode::Standard).to_string();

        replay.board.play_unchecked(mv);
        replay.moves.push(MoveRecord {
            index: replay.moves.len() + 1,
            move_number,
            san: san_plus.to_string(),
            uci,
            side,
            fen: fen_of(&replay.board),
            position: replay.board.clone(),
        });

        ControlFlow::Continue(())
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        let (headers, replay) = movetext;
        self.game = Some(Game {
            headers,
            moves: replay.moves,
        });
    }
}
