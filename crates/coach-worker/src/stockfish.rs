//! Stockfish engine wrapper using UCI protocol (async I/O)

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use coach_core::{Evaluation, Score, Side};
use tracing::debug;

use crate::error::EngineError;
use crate::evaluator::PositionEvaluator;

/// Search settings applied to every evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub depth: u32,
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            depth: 15,
            threads: 1,
            hash_mb: 256,
        }
    }
}

/// Raw result of one search, scores relative to the side to move
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchResult {
    cp: Option<i32>,
    mate: Option<i32>,
    best_move: Option<String>,
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    options: EngineOptions,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str, options: EngineOptions) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Spawn(format!("{path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Spawn("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| EngineError::Spawn("engine stdout not captured".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
            options,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", options.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", options.hash_mb))
            .await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "UCI <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line).await? == 0 {
                return Err(EngineError::UnexpectedExit);
            }
            let trimmed = line.trim();
            debug!(line = trimmed, "UCI >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl PositionEvaluator for StockfishEngine {
    /// Clears the engine's game state, sets the position and searches to the
    /// configured depth.
    async fn evaluate(&mut self, fen: &str) -> Result<Evaluation, EngineError> {
        self.send("ucinewgame").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;

        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {}", self.options.depth)).await?;

        let result = read_search_result(&mut self.stdout).await?;
        to_evaluation(fen, result)
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Read `info` lines up to and including `bestmove`, keeping the last score.
async fn read_search_result<R>(reader: &mut R) -> Result<SearchResult, EngineError>
where
    R: AsyncBufRead + Unpin,
{
    let mut result = SearchResult {
        cp: None,
        mate: None,
        best_move: None,
    };

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(EngineError::UnexpectedExit);
        }
        let trimmed = line.trim();

        if trimmed.starts_with("info") && trimmed.contains(" score ") {
            if let Some(cp) = parse_cp(trimmed) {
                result.cp = Some(cp);
                result.mate = None;
            }
            if let Some(mate) = parse_mate(trimmed) {
                result.mate = Some(mate);
                result.cp = None;
            }
        } else if trimmed.starts_with("bestmove") {
            debug!(line = trimmed, "UCI >");
            result.best_move = parse_best_move(trimmed);
            break;
        }
    }

    Ok(result)
}

/// Turn a side-to-move relative search result into a White-relative evaluation.
fn to_evaluation(fen: &str, result: SearchResult) -> Result<Evaluation, EngineError> {
    let relative = match (result.mate, result.cp) {
        (Some(mate), _) => Score::Mate(mate),
        (None, Some(cp)) => Score::Centipawns(cp),
        (None, None) => {
            return Err(EngineError::NoEvaluation {
                fen: fen.to_string(),
            })
        }
    };

    Ok(Evaluation {
        score: Score::from_side_to_move(relative, side_to_move(fen)),
        best_move: result.best_move,
    })
}

/// Side to move from the second FEN field
fn side_to_move(fen: &str) -> Side {
    match fen.split_whitespace().nth(1) {
        Some("b") => Side::Black,
        _ => Side::White,
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

fn parse_after(line: &str, keyword: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == keyword && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// `bestmove e2e4 ponder e7e5` -> `e2e4`; `bestmove (none)` -> `None`
fn parse_best_move(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|mv| *mv != "(none)")
        .map(String::from)
}
