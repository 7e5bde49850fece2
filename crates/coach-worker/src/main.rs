//! PGN coach
//!
//! Reads one PGN game from a file or stdin, runs it through Stockfish and a
//! chat-completions model, and prints the report as JSON on stdout.

use std::io::Read;

use anyhow::Context;
use tracing::info;

use coach_worker::{
    analyze_game, AnalysisOptions, CoachConfig, EngineOptions, OpenAiClient, StockfishEngine,
};

/// First positional argument; `-` or nothing means stdin
fn parse_input_path() -> Option<String> {
    std::env::args().nth(1).filter(|arg| arg != "-")
}

fn read_pgn(path: Option<&str>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {path}")),
        None => {
            let mut pgn = String::new();
            std::io::stdin()
                .read_to_string(&mut pgn)
                .context("reading PGN from stdin")?;
            Ok(pgn)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let input = parse_input_path();
    let pgn = read_pgn(input.as_deref())?;

    let config = CoachConfig::load()?;

    let mut engine = StockfishEngine::new(
        &config.stockfish_path,
        EngineOptions {
            depth: config.search_depth,
            threads: config.engine_threads,
            hash_mb: config.engine_hash_mb,
        },
    )
    .await?;

    let client = OpenAiClient::new(
        &config.llm_base_url,
        &config.api_key,
        &config.llm_model,
        config.llm_timeout,
    )?;
    info!(endpoint = client.endpoint(), model = %config.llm_model, "LLM client ready");

    let options = AnalysisOptions::from(&config);
    let result = analyze_game(&mut engine, &client, &pgn, &options).await;
    engine.quit().await;
    let report = result?;

    info!(
        moves = report.move_count,
        mistakes = report.mistakes.len(),
        "Analysis complete"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
