//! PGN coaching worker: engine evaluation, mistake detection and language
//! model commentary.

pub mod analyzer;
pub mod commentary;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod llm;
pub mod retry;
pub mod stockfish;
pub mod summary;

pub use analyzer::{
    analyze_game, annotate_mistakes, detect_mistakes, summarize_game, AnalysisOptions,
    AnalysisReport, AnnotatedMistake, SummaryOutcome,
};
pub use commentary::{Commentary, CommentaryRequester, CommentaryStatus, PromptSettings, UNAVAILABLE_TEXT};
pub use config::CoachConfig;
pub use error::{CoachError, EngineError, LlmError};
pub use evaluator::PositionEvaluator;
pub use llm::{GenerationRequest, OpenAiClient, TextGenerator};
pub use retry::{retry_on_rate_limit, RetryOutcome, RetryPolicy};
pub use stockfish::{EngineOptions, StockfishEngine};
pub use summary::{GameSummary, SummaryRequester};
