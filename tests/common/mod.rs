#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use coach_core::{Evaluation, Game, Score};
use coach_worker::{
    AnalysisOptions, EngineError, GenerationRequest, LlmError, PositionEvaluator, RetryPolicy,
    TextGenerator,
};

/// Evaluator answering from a fixed FEN -> score table. Unknown positions
/// fail the way a dead engine would.
pub struct ScriptedEvaluator {
    scores: HashMap<String, Evaluation>,
    pub calls: usize,
}

impl ScriptedEvaluator {
    /// One score per ply of `game`, in move order.
    pub fn for_game(game: &Game, scores: &[Score]) -> Self {
        let scores = game
            .moves()
            .iter()
            .zip(scores)
            .map(|(mv, score)| {
                (
                    mv.fen.clone(),
                    Evaluation {
                        score: *score,
                        best_move: Some("e2e4".to_string()),
                    },
                )
            })
            .collect();
        Self { scores, calls: 0 }
    }

    /// Override the engine's best move after ply `index` (1-based).
    pub fn with_best_move(mut self, game: &Game, index: usize, best: &str) -> Self {
        if let Some(eval) = self.scores.get_mut(&game.moves()[index - 1].fen) {
            eval.best_move = Some(best.to_string());
        }
        self
    }
}

impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&mut self, fen: &str) -> Result<Evaluation, EngineError> {
        self.calls += 1;
        self.scores
            .get(fen)
            .cloned()
            .ok_or(EngineError::UnexpectedExit)
    }
}

#[derive(Clone, Debug)]
pub enum Reply {
    Text(String),
    RateLimited,
    Status(u16),
}

impl Reply {
    pub fn text(text: &str) -> Self {
        Reply::Text(text.to_string())
    }

    fn to_result(&self) -> Result<String, LlmError> {
        match self {
            Reply::Text(text) => Ok(text.clone()),
            Reply::RateLimited => Err(LlmError::RateLimited),
            Reply::Status(status) => Err(LlmError::Status {
                status: *status,
                body: "server error".to_string(),
            }),
        }
    }
}

/// Generator with one fixed reply for commentary prompts and one for the
/// summary prompt. Every request is recorded.
pub struct ScriptedGenerator {
    commentary: Reply,
    summary: Reply,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(commentary: Reply, summary: Reply) -> Self {
        Self {
            commentary,
            summary,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn commentary_prompts(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| !is_summary(&r.prompt))
            .map(|r| r.prompt)
            .collect()
    }
}

fn is_summary(prompt: &str) -> bool {
    prompt.contains("strategic summary")
}

impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        if is_summary(&request.prompt) {
            self.summary.to_result()
        } else {
            self.commentary.to_result()
        }
    }
}

/// Default options with a short backoff so paused-clock tests stay readable.
pub fn options() -> AnalysisOptions {
    AnalysisOptions {
        retry: RetryPolicy::new(3, Duration::from_millis(100)),
        ..AnalysisOptions::default()
    }
}
