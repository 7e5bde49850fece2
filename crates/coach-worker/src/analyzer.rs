//! Core game analysis: load -> evaluate every ply -> flag mistakes ->
//! commentary per mistake, plus one summary for the whole game.

use coach_core::{load, Game, GameHeaders, MistakeDetector, MistakeRecord, ScorePerspective};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commentary::{Commentary, CommentaryRequester, PromptSettings};
use crate::config::CoachConfig;
use crate::error::{CoachError, EngineError, LlmError};
use crate::evaluator::PositionEvaluator;
use crate::llm::TextGenerator;
use crate::retry::RetryPolicy;
use crate::summary::SummaryRequester;

/// Everything the pipeline needs besides the engine and the generator.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub threshold_cp: i32,
    pub perspective: ScorePerspective,
    pub attach_piece_map: bool,
    pub commentary: PromptSettings,
    pub summary: PromptSettings,
    pub retry: RetryPolicy,
    /// Commentary requests in flight at once
    pub commentary_concurrency: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            threshold_cp: coach_core::DEFAULT_THRESHOLD_CP,
            perspective: ScorePerspective::White,
            attach_piece_map: false,
            commentary: PromptSettings {
                temperature: 0.7,
                max_tokens: 200,
                audience_rating: 1400,
            },
            summary: PromptSettings {
                temperature: 0.7,
                max_tokens: 400,
                audience_rating: 1400,
            },
            retry: RetryPolicy::default(),
            commentary_concurrency: 1,
        }
    }
}

impl From<&CoachConfig> for AnalysisOptions {
    fn from(config: &CoachConfig) -> Self {
        Self {
            threshold_cp: config.threshold_cp,
            perspective: config.perspective,
            attach_piece_map: config.attach_piece_map,
            commentary: PromptSettings {
                temperature: config.llm_temperature,
                max_tokens: config.commentary_max_tokens,
                audience_rating: config.audience_rating,
            },
            summary: PromptSettings {
                temperature: config.llm_temperature,
                max_tokens: config.summary_max_tokens,
                audience_rating: config.audience_rating,
            },
            retry: config.retry,
            commentary_concurrency: config.commentary_concurrency,
        }
    }
}

/// A flagged move with its explanation
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedMistake {
    #[serde(flatten)]
    pub mistake: MistakeRecord,
    pub commentary: Commentary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SummaryOutcome {
    /// No moves to summarize
    Skipped,
    Generated { text: String },
    Failed { reason: String },
}

/// Final output handed to presentation
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub headers: GameHeaders,
    pub move_count: usize,
    pub threshold_cp: i32,
    pub perspective: ScorePerspective,
    pub mistakes: Vec<AnnotatedMistake>,
    pub summary: SummaryOutcome,
}

/// Evaluate the position after every move in order and collect the flagged
/// ones. The first engine failure aborts the whole traversal.
pub async fn detect_mistakes<E: PositionEvaluator>(
    engine: &mut E,
    game: &Game,
    options: &AnalysisOptions,
) -> Result<Vec<MistakeRecord>, EngineError> {
    let mut detector = MistakeDetector::new(options.threshold_cp)
        .with_perspective(options.perspective)
        .with_piece_maps(options.attach_piece_map);

    for mv in game.moves() {
        let evaluation = engine.evaluate(&mv.fen).await?;
        debug!(
            move_index = mv.index,
            san = %mv.san,
            score = %evaluation.score,
            previous_cp = ?detector.previous_cp(),
            "Position evaluated"
        );

        if let Some(mistake) = detector.observe(mv, evaluation) {
            info!(
                move_index = mistake.mv.index,
                san = %mistake.mv.san,
                delta = mistake.delta,
                "Mistake flagged"
            );
        }
    }

    info!(
        plies = game.len(),
        mistake_count = detector.mistakes().len(),
        "Evaluation complete"
    );
    Ok(detector.finish())
}

/// Commentary for every mistake, in move order. Requests may overlap up to
/// `commentary_concurrency`; a non-rate-limit failure aborts the batch.
pub async fn annotate_mistakes<G: TextGenerator>(
    generator: &G,
    mistakes: Vec<MistakeRecord>,
    options: &AnalysisOptions,
) -> Result<Vec<AnnotatedMistake>, LlmError> {
    let requester = CommentaryRequester::new(generator, options.commentary, options.retry);
    let requester = &requester;

    stream::iter(mistakes.into_iter().map(|mistake| async move {
        let commentary = requester.generate(&mistake).await?;
        Ok::<_, LlmError>(AnnotatedMistake {
            mistake,
            commentary,
        })
    }))
    .buffered(options.commentary_concurrency.max(1))
    .try_collect()
    .await
}

/// Summary of the whole game. Failures are reported in the outcome, not
/// raised.
pub async fn summarize_game<G: TextGenerator>(
    generator: &G,
    game: &Game,
    options: &AnalysisOptions,
) -> SummaryOutcome {
    if game.is_empty() {
        return SummaryOutcome::Skipped;
    }

    let requester = SummaryRequester::new(generator, options.summary, options.retry);
    match requester.summarize(game).await {
        Ok(summary) => SummaryOutcome::Generated { text: summary.text },
        Err(e) => {
            warn!(error = %e, "Summary failed");
            SummaryOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

/// Analyze a PGN game end to end.
pub async fn analyze_game<E, G>(
    engine: &mut E,
    generator: &G,
    pgn: &str,
    options: &AnalysisOptions,
) -> Result<AnalysisReport, CoachError>
where
    E: PositionEvaluator,
    G: TextGenerator,
{
    let game = load(pgn);
    info!(plies = game.len(), "Loaded game");

    let mistakes = detect_mistakes(engine, &game, options).await?;

    let (annotated, summary) = tokio::join!(
        annotate_mistakes(generator, mistakes, options),
        summarize_game(generator, &game, options),
    );

    Ok(AnalysisReport {
        move_count: game.len(),
        threshold_cp: options.threshold_cp,
        perspective: options.perspective,
        mistakes: annotated?,
        summary,
        headers: game.headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GenerationRequest;
    use coach_core::{Evaluation, Score};
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Hands out scripted scores in call order.
    struct ScriptedEngine {
        scores: VecDeque<Score>,
        calls: usize,
    }

    impl ScriptedEngine {
        fn new(scores: &[Score]) -> Self {
            Self {
                scores: scores.iter().copied().collect(),
                calls: 0,
            }
        }
    }

    impl PositionEvaluator for ScriptedEngine {
        async fn evaluate(&mut self, fen: &str) -> Result<Evaluation, EngineError> {
            self.calls += 1;
            let score = self
                .scores
                .pop_front()
                .ok_or_else(|| EngineError::NoEvaluation { fen: fen.into() })?;
            Ok(Evaluation {
                score,
                best_move: Some("g1f3".into()),
            })
        }
    }

    struct Echo {
        calls: AtomicU32,
    }

    impl TextGenerator for Echo {
        async fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} tokens", request.max_tokens))
        }
    }

    const GAME: &str = "1. e4 e5 2. Nf3 Nc6 3. Bc4 Nd4 *";

    #[tokio::test]
    async fn test_detect_mistakes_evaluates_every_ply() {
        let mut engine = ScriptedEngine::new(&[
            Score::Centipawns(30),
            Score::Centipawns(25),
            Score::Centipawns(30),
            Score::Centipawns(20),
            Score::Centipawns(-120),
            Score::Centipawns(-110),
        ]);
        let game = load(GAME);
        let mistakes = detect_mistakes(&mut engine, &game, &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(engine.calls, 6);
        assert_eq!(mistakes.len(), 1);
        assert_eq!(mistakes[0].mv.index, 5);
        assert_eq!(mistakes[0].delta, 140);
    }

    #[tokio::test]
    async fn test_engine_failure_aborts() {
        let mut engine = ScriptedEngine::new(&[Score::Centipawns(30), Score::Centipawns(-300)]);
        let game = load(GAME);
        let err = detect_mistakes(&mut engine, &game, &AnalysisOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoEvaluation { .. }));
        assert_eq!(engine.calls, 3);
    }

    #[tokio::test]
    async fn test_analyze_empty_game() {
        let mut engine = ScriptedEngine::new(&[]);
        let generator = Echo {
            calls: AtomicU32::new(0),
        };
        let report = analyze_game(&mut engine, &generator, "", &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(report.move_count, 0);
        assert!(report.mistakes.is_empty());
        assert_eq!(report.summary, SummaryOutcome::Skipped);
        assert_eq!(engine.calls, 0);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_game_uses_call_site_token_limits() {
        let mut engine = ScriptedEngine::new(&[
            Score::Centipawns(30),
            Score::Centipawns(-200),
        ]);
        let generator = Echo {
            calls: AtomicU32::new(0),
        };
        let report = analyze_game(&mut engine, &generator, "1. e4 f6 *", &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(report.mistakes.len(), 1);
        assert_eq!(report.mistakes[0].commentary.text, "200 tokens");
        assert_eq!(
            report.summary,
            SummaryOutcome::Generated {
                text: "400 tokens".into()
            }
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 2);
    }
}
