//! Position evaluation seam between the pipeline and an engine.

use coach_core::Evaluation;

use crate::error::EngineError;

/// Evaluates one position per call. Implementations must not let state from a
/// previous call influence the next one; `&mut self` gives exclusive access to
/// the underlying engine for the duration of a call.
#[allow(async_fn_in_trait)]
pub trait PositionEvaluator {
    /// Evaluate `fen`, returning a White-relative score and the best move.
    async fn evaluate(&mut self, fen: &str) -> Result<Evaluation, EngineError>;
}
