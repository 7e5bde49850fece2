//! Coaching commentary for flagged moves.
//!
//! The prompt is built from a single `MistakeRecord` and nothing else, so
//! every explanation is grounded in the one position it talks about.

use coach_core::{MistakeRecord, Score};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::LlmError;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::retry::{retry_on_rate_limit, RetryOutcome, RetryPolicy};

/// Returned in place of commentary when every attempt was rate limited.
pub const UNAVAILABLE_TEXT: &str =
    "Commentary unavailable: the language model kept rate-limiting requests.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentaryStatus {
    Generated,
    /// Rate-limit budget exhausted; `text` is `UNAVAILABLE_TEXT`
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commentary {
    pub move_index: usize,
    pub text: String,
    pub status: CommentaryStatus,
}

impl Commentary {
    pub fn is_available(&self) -> bool {
        self.status == CommentaryStatus::Generated
    }
}

/// Sampling settings shared by the commentary and summary requesters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PromptSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    /// Rating of the reader the text is pitched at
    pub audience_rating: u32,
}

pub struct CommentaryRequester<'a, G> {
    generator: &'a G,
    settings: PromptSettings,
    retry: RetryPolicy,
}

impl<'a, G: TextGenerator> CommentaryRequester<'a, G> {
    pub fn new(generator: &'a G, settings: PromptSettings, retry: RetryPolicy) -> Self {
        Self {
            generator,
            settings,
            retry,
        }
    }

    /// Ask for an explanation of `record`. Rate limits are retried with
    /// backoff and end in the `Unavailable` sentinel; every other failure is
    /// returned as is.
    pub async fn generate(&self, record: &MistakeRecord) -> Result<Commentary, LlmError> {
        let request = GenerationRequest {
            prompt: build_prompt(record, self.settings.audience_rating),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let generator = self.generator;
        let request = &request;

        let outcome =
            retry_on_rate_limit(&self.retry, "commentary", |_| generator.generate(request))
                .await?;

        let move_index = record.mv.index;
        Ok(match outcome {
            RetryOutcome::Done(text) => {
                info!(move_index, chars = text.len(), "Commentary generated");
                Commentary {
                    move_index,
                    text,
                    status: CommentaryStatus::Generated,
                }
            }
            RetryOutcome::Exhausted { attempts } => {
                warn!(
                    move_index,
                    attempts,
                    backoff_ms = self.retry.total_backoff().as_millis() as u64,
                    "Commentary unavailable after rate limiting"
                );
                Commentary {
                    move_index,
                    text: UNAVAILABLE_TEXT.to_string(),
                    status: CommentaryStatus::Unavailable,
                }
            }
        })
    }
}

/// Prompt for one flagged move. Deterministic in its inputs.
pub fn build_prompt(record: &MistakeRecord, audience_rating: u32) -> String {
    let mv = &record.mv;
    let mut lines = vec![
        format!("You are a chess coach explaining a mistake to a {audience_rating}-rated player."),
        "Use only the position and facts below. Do not describe moves that are not listed here."
            .to_string(),
        String::new(),
        format!(
            "Move {} ({} played {} on move {}, UCI {}).",
            mv.index,
            mv.side.name(),
            mv.san,
            mv.move_number,
            mv.uci
        ),
        format!("Position after the move (FEN): {}", mv.fen),
        format!(
            "Engine evaluation before the move: {} (White's perspective)",
            Score::Centipawns(record.previous_cp)
        ),
        format!(
            "Engine evaluation after the move: {} (White's perspective)",
            record.evaluation.score
        ),
        format!("Evaluation lost: {} centipawns", record.delta),
    ];
    lines.push(match record.best_move() {
        Some(best) => format!(
            "Engine's best continuation now ({} to move): {best}",
            mv.side.opponent().name()
        ),
        None => "The engine has no legal continuation in this position.".to_string(),
    });

    let mut prompt = lines.join("\n");
    prompt.push('\n');
    if let Some(map) = &record.piece_map {
        prompt.push_str("Pieces on the board:\n");
        prompt.push_str(&map.to_string());
    }
    prompt.push('\n');
    prompt.push_str(&format!(
        "In one short paragraph, explain why {} is a mistake and what the player should look for instead.",
        mv.san
    ));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::{load, Evaluation, MistakeDetector};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn mistake(attach_piece_map: bool) -> MistakeRecord {
        let game = load("1. e4 e5 2. Qh5 Nc6 3. Qxe5+ *");
        let mut detector = MistakeDetector::new(100).with_piece_maps(attach_piece_map);
        let moves = game.moves();
        detector.observe(&moves[3], Evaluation::centipawns(-20, Some("h5e2")));
        detector.observe(&moves[4], Evaluation::centipawns(-870, Some("c6e5")));
        detector.finish().remove(0)
    }

    fn settings() -> PromptSettings {
        PromptSettings {
            temperature: 0.7,
            max_tokens: 200,
            audience_rating: 1400,
        }
    }

    #[derive(Clone, Copy)]
    enum Reply {
        Text(&'static str),
        RateLimited,
        Empty,
    }

    /// Answers with scripted replies in order, then repeats the last one.
    struct Scripted {
        replies: Vec<Reply>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Reply>) -> Self {
            Self {
                replies,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl TextGenerator for Scripted {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, LlmError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            match self.replies[n.min(self.replies.len() - 1)] {
                Reply::Text(text) => Ok(text.to_string()),
                Reply::RateLimited => Err(LlmError::RateLimited),
                Reply::Empty => Err(LlmError::EmptyResponse),
            }
        }
    }

    #[test]
    fn test_prompt_contains_record_fields() {
        let record = mistake(false);
        let prompt = build_prompt(&record, 1400);
        assert!(prompt.contains("1400-rated"));
        assert!(prompt.contains("Move 5 (White played Qxe5+ on move 3, UCI h5e5)"));
        assert!(prompt.contains(&record.mv.fen));
        assert!(prompt.contains("before the move: -0.20"));
        assert!(prompt.contains("after the move: -8.70"));
        assert!(prompt.contains("Evaluation lost: 850 centipawns"));
        assert!(prompt.contains("(Black to move): c6e5"));
        assert!(!prompt.contains("Pieces on the board"));
    }

    #[test]
    fn test_prompt_is_deterministic_and_includes_piece_map() {
        let record = mistake(true);
        let a = build_prompt(&record, 1400);
        let b = build_prompt(&record, 1400);
        assert_eq!(a, b);
        assert!(a.contains("Pieces on the board:"));
        assert!(a.contains("e5: White queen"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated() {
        let generator = Scripted::new(vec![Reply::Text("Your queen is loose.")]);
        let requester = CommentaryRequester::new(&generator, settings(), RetryPolicy::default());
        let commentary = requester.generate(&mistake(false)).await.unwrap();
        assert_eq!(commentary.move_index, 5);
        assert_eq!(commentary.text, "Your queen is loose.");
        assert!(commentary.is_available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_every_time_gives_sentinel() {
        let generator = Scripted::new(vec![Reply::RateLimited]);
        let retry = RetryPolicy::new(3, Duration::from_secs(1));
        let requester = CommentaryRequester::new(&generator, settings(), retry);

        let start = tokio::time::Instant::now();
        let commentary = requester.generate(&mistake(false)).await.unwrap();

        assert_eq!(commentary.status, CommentaryStatus::Unavailable);
        assert_eq!(commentary.text, UNAVAILABLE_TEXT);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
        assert!(start.elapsed() >= Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limit() {
        let generator = Scripted::new(vec![Reply::RateLimited, Reply::Text("Second time lucky.")]);
        let requester = CommentaryRequester::new(&generator, settings(), RetryPolicy::default());
        let commentary = requester.generate(&mistake(false)).await.unwrap();
        assert_eq!(commentary.text, "Second time lucky.");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failure_is_not_retried() {
        let generator = Scripted::new(vec![Reply::Empty]);
        let requester = CommentaryRequester::new(&generator, settings(), RetryPolicy::default());
        let err = requester.generate(&mistake(false)).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
    }
}
