//! Coach configuration from environment variables

use std::env;
use std::str::FromStr;
use std::time::Duration;

use coach_core::{ScorePerspective, DEFAULT_THRESHOLD_CP};
use tracing::info;

use crate::error::CoachError;
use crate::retry::RetryPolicy;

#[derive(Clone, Debug)]
pub struct CoachConfig {
    /// Path to the UCI engine binary
    pub stockfish_path: String,

    /// Fixed search depth per position
    pub search_depth: u32,

    /// Engine `Threads` option
    pub engine_threads: u32,

    /// Engine `Hash` option in MB
    pub engine_hash_mb: u32,

    /// Centipawn regression that flags a move
    pub threshold_cp: i32,

    /// Point of view for the running centipawn difference
    pub perspective: ScorePerspective,

    /// Attach square -> piece maps to flagged moves
    pub attach_piece_map: bool,

    /// API key for the chat-completions service
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API (no trailing `/chat/completions`)
    pub llm_base_url: String,

    pub llm_model: String,

    pub llm_temperature: f32,

    pub llm_timeout: Duration,

    pub commentary_max_tokens: u32,

    pub summary_max_tokens: u32,

    /// Rate-limit retry budget and backoff base
    pub retry: RetryPolicy,

    /// Commentary requests in flight at once (1 = strictly sequential)
    pub commentary_concurrency: usize,

    /// Rating of the player the explanations are written for
    pub audience_rating: u32,
}

impl CoachConfig {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self, CoachError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unparsable numbers fall back
    /// to their defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self, CoachError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = get("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CoachError::Config("OPENAI_API_KEY not set".into()))?;

        let perspective = match get("SCORE_PERSPECTIVE") {
            Some(v) => ScorePerspective::from_str(&v).map_err(CoachError::Config)?,
            None => ScorePerspective::default(),
        };

        let max_attempts: u32 = parsed(&get, "RETRY_MAX_ATTEMPTS").unwrap_or(3);
        if max_attempts == 0 {
            return Err(CoachError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        let base_delay_ms: u64 = parsed(&get, "RETRY_BASE_DELAY_MS").unwrap_or(1000);

        let attach_piece_map = get("ATTACH_PIECE_MAP")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let config = Self {
            stockfish_path: get("STOCKFISH_PATH")
                .unwrap_or_else(|| "./stockfish/stockfish".to_string()),
            search_depth: parsed(&get, "SEARCH_DEPTH").unwrap_or(15),
            engine_threads: parsed(&get, "ENGINE_THREADS").unwrap_or(1),
            engine_hash_mb: parsed(&get, "ENGINE_HASH_MB").unwrap_or(256),
            threshold_cp: parsed(&get, "MISTAKE_THRESHOLD_CP").unwrap_or(DEFAULT_THRESHOLD_CP),
            perspective,
            attach_piece_map,
            api_key,
            llm_base_url: get("LLM_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| "gpt-4".to_string()),
            llm_temperature: parsed(&get, "LLM_TEMPERATURE").unwrap_or(0.7),
            llm_timeout: Duration::from_secs(parsed(&get, "LLM_TIMEOUT_SECS").unwrap_or(120)),
            commentary_max_tokens: parsed(&get, "COMMENTARY_MAX_TOKENS").unwrap_or(200),
            summary_max_tokens: parsed(&get, "SUMMARY_MAX_TOKENS").unwrap_or(400),
            retry: RetryPolicy::new(max_attempts, Duration::from_millis(base_delay_ms)),
            commentary_concurrency: parsed::<usize, _>(&get, "COMMENTARY_CONCURRENCY")
                .unwrap_or(1)
                .max(1),
            audience_rating: parsed(&get, "AUDIENCE_RATING").unwrap_or(1400),
        };

        info!(
            stockfish_path = %config.stockfish_path,
            depth = config.search_depth,
            threshold_cp = config.threshold_cp,
            model = %config.llm_model,
            "Coach config loaded"
        );

        Ok(config)
    }
}

fn parsed<T, F>(get: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    get(key).and_then(|v| v.trim().parse().ok())
}
