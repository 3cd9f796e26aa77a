use axum::{extract::Query, Extension, Json};
use serde::{Deserialize, Serialize};

use opening_leaks::{aggregate_games, AnalysisConfig, RecurringPosition};

use crate::error::AppError;
use crate::state::{AppState, Source};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsQuery {
    pub username: String,
    pub source: Source,
    pub max_games: Option<u32>,
    pub max_opening_moves: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionsResponse {
    pub username: String,
    pub games_analyzed: usize,
    pub positions: Vec<RecurringPosition>,
}

/// GET /api/openings/positions?username=..&source=lichess
/// Repeated positions and move tallies, without engine work.
pub async fn get_repeated_positions(
    Extension(state): Extension<AppState>,
    Query(q): Query<PositionsQuery>,
) -> Result<Json<PositionsResponse>, AppError> {
    let username = q.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }

    let defaults = AnalysisConfig::default();
    let config = AnalysisConfig {
        max_games: q.max_games.unwrap_or(defaults.max_games),
        max_opening_moves: q.max_opening_moves.unwrap_or(defaults.max_opening_moves),
        ..defaults
    }
    .checked()?;

    let mut games = state
        .source(q.source)
        .fetch_games(username, config.max_games as usize)
        .await?;
    games.truncate(config.max_games as usize);

    let aggregation = aggregate_games(&games, username, config.max_opening_moves, None);
    let positions: Vec<RecurringPosition> = aggregation.repeated().cloned().collect();

    Ok(Json(PositionsResponse {
        username: username.to_string(),
        games_analyzed: aggregation.games_analyzed,
        positions,
    }))
}
