//! Leak worker
//!
//! Fetches a user's games, runs the opening-leak pipeline with a local
//! Stockfish and prints the report as JSON.

use clap::Parser;
use tracing::info;

use leak_worker::config::WorkerConfig;
use leak_worker::stockfish::StockfishEngine;
use leak_worker::{game_source, SourceKind};
use opening_leaks::{analyze_user, AnalysisConfig, Progress};

#[derive(Parser)]
#[command(name = "leak-worker", about = "Find repeated opening leaks with a local Stockfish")]
struct Cli {
    /// Account to analyze.
    username: String,

    /// Where to fetch games from.
    #[arg(long, value_enum, default_value = "lichess")]
    source: SourceKind,

    #[arg(long, default_value_t = opening_leaks::config::DEFAULT_MAX_GAMES)]
    max_games: u32,

    /// Full moves replayed per game.
    #[arg(long, default_value_t = opening_leaks::config::DEFAULT_MAX_OPENING_MOVES)]
    max_opening_moves: u32,

    /// Centipawn loss a move must exceed to be reported.
    #[arg(long, default_value_t = opening_leaks::config::DEFAULT_CP_LOSS_THRESHOLD)]
    cp_loss_threshold: i32,

    #[arg(long, default_value_t = opening_leaks::config::DEFAULT_ENGINE_DEPTH)]
    depth: u8,

    /// Leave per-game and per-position traces out of the report.
    #[arg(long)]
    no_diagnostics: bool,

    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = WorkerConfig::from_env()?;
    info!(stockfish_path = %config.engine.stockfish_path, "Worker config loaded");

    let analysis = AnalysisConfig {
        max_games: cli.max_games,
        max_opening_moves: cli.max_opening_moves,
        cp_loss_threshold: cli.cp_loss_threshold,
        engine_depth: cli.depth,
        include_diagnostics: !cli.no_diagnostics,
    };

    let source = game_source(cli.source, &config)?;
    let mut engine = StockfishEngine::new(&config.engine).await?;
    info!("Stockfish engine ready");

    let mut on_progress = |p: Progress| match p {
        Progress::Parsing { done, total } => info!(done, total, "Parsing games"),
        Progress::Evaluating { done, total } => info!(done, total, "Evaluating positions"),
    };

    let result = analyze_user(
        source.as_ref(),
        &cli.username,
        &analysis,
        &mut engine,
        Some(&mut on_progress),
    )
    .await;
    engine.quit().await;
    let report = result?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{json}");
    Ok(())
}
