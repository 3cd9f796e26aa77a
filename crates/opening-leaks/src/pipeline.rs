//! End-to-end analysis: fetch → aggregate → classify → report.

use async_trait::async_trait;

use chess_core::Game;

use crate::aggregate::aggregate_games;
use crate::classify::classify_positions;
use crate::config::AnalysisConfig;
use crate::error::{FetchError, LeakError};
use crate::evaluator::PositionEvaluator;
use crate::progress::ProgressFn;
use crate::report::{Diagnostics, LeakReport};

/// Where a user's games come from.
#[async_trait]
pub trait GameSource: Send + Sync {
    async fn fetch_games(&self, username: &str, max_games: usize) -> Result<Vec<Game>, FetchError>;
}

/// Analyze an already-fetched batch of games.
pub async fn analyze_games(
    username: &str,
    games: &[Game],
    config: &AnalysisConfig,
    evaluator: &mut dyn PositionEvaluator,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> LeakReport {
    let aggregation = aggregate_games(
        games,
        username,
        config.max_opening_moves,
        progress.as_deref_mut(),
    );
    let repeated_positions = aggregation.repeated().count();

    let classification =
        classify_positions(&aggregation.positions, config, evaluator, progress).await;

    LeakReport {
        username: username.to_string(),
        games_analyzed: aggregation.games_analyzed,
        repeated_positions,
        leaks: classification.leaks,
        diagnostics: config.include_diagnostics.then(|| Diagnostics {
            game_traces: aggregation.game_traces,
            position_traces: classification.traces,
        }),
    }
}

/// Fetch a user's games and analyze them. Only an invalid config or a failed
/// fetch aborts the run.
pub async fn analyze_user(
    source: &dyn GameSource,
    username: &str,
    config: &AnalysisConfig,
    evaluator: &mut dyn PositionEvaluator,
    progress: Option<&mut ProgressFn<'_>>,
) -> Result<LeakReport, LeakError> {
    let config = config.clone().checked()?;

    tracing::info!(username, max_games = config.max_games, "Fetching games");
    let mut games = source
        .fetch_games(username, config.max_games as usize)
        .await?;
    games.truncate(config.max_games as usize);
    tracing::info!(username, fetched = games.len(), "Games fetched");

    Ok(analyze_games(username, &games, &config, evaluator, progress).await)
}
