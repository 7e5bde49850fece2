//! Whole-game strategic summary, independent of which moves were flagged.

use coach_core::Game;
use serde::Serialize;
use tracing::{info, warn};

use crate::commentary::PromptSettings;
use crate::error::LlmError;
use crate::llm::{GenerationRequest, TextGenerator};
use crate::retry::{retry_on_rate_limit, RetryOutcome, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub text: String,
}

pub struct SummaryRequester<'a, G> {
    generator: &'a G,
    settings: PromptSettings,
    retry: RetryPolicy,
}

impl<'a, G: TextGenerator> SummaryRequester<'a, G> {
    pub fn new(generator: &'a G, settings: PromptSettings, retry: RetryPolicy) -> Self {
        Self {
            generator,
            settings,
            retry,
        }
    }

    /// One request for the whole transcript. Exhausting the rate-limit budget
    /// is an error here; there is no sentinel summary.
    pub async fn summarize(&self, game: &Game) -> Result<GameSummary, LlmError> {
        let request = GenerationRequest {
            prompt: build_prompt(game, self.settings.audience_rating),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let generator = self.generator;
        let request = &request;

        match retry_on_rate_limit(&self.retry, "summary", |_| generator.generate(request)).await? {
            RetryOutcome::Done(text) => {
                info!(plies = game.len(), chars = text.len(), "Summary generated");
                Ok(GameSummary { text })
            }
            RetryOutcome::Exhausted { attempts } => {
                warn!(
                    attempts,
                    backoff_ms = self.retry.total_backoff().as_millis() as u64,
                    "Summary still rate limited"
                );
                Err(LlmError::RateLimitExhausted { attempts })
            }
        }
    }
}

pub fn build_prompt(game: &Game, audience_rating: u32) -> String {
    format!(
        "You are a chess coach writing for a {audience_rating}-rated player.\n\
         Read the game below and write a short strategic summary: how the opening went, \
         the turning points, and one or two lessons for each side.\n\n\
         {}",
        game.to_pgn()
    )
}
