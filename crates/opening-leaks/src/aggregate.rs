//! Opening aggregation: replay each game through the opening and bucket the
//! positions where the user was to move.

use std::collections::HashMap;

use serde::Serialize;
use shakmaty::{Chess, Position};

use chess_core::moves::{apply_token, fen_of, san_of, uci_of};
use chess_core::{Game, Outcome, Side};

use crate::config::MIN_POSITION_REPEATS;
use crate::progress::{self, Progress, ProgressFn, PARSE_PROGRESS_EVERY};

/// How often the user played one move at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveTally {
    pub san: String,
    pub uci: String,
    pub count: u32,
}

/// A position the user reached, aggregated over all games.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringPosition {
    pub fen: String,
    pub side_to_move: Side,
    pub reach_count: u32,
    /// Tallies in first-seen order.
    pub moves: Vec<MoveTally>,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

impl RecurringPosition {
    fn new(fen: String, side_to_move: Side) -> Self {
        Self {
            fen,
            side_to_move,
            reach_count: 0,
            moves: Vec::new(),
            wins: 0,
            draws: 0,
            losses: 0,
        }
    }

    fn record(&mut self, san: String, uci: String, outcome: Option<Outcome>) {
        self.reach_count += 1;
        match self.moves.iter_mut().find(|t| t.san == san) {
            Some(tally) => tally.count += 1,
            None => self.moves.push(MoveTally { san, uci, count: 1 }),
        }
        match outcome {
            Some(Outcome::Win) => self.wins += 1,
            Some(Outcome::Draw) => self.draws += 1,
            Some(Outcome::Loss) => self.losses += 1,
            None => {}
        }
    }

    /// Most-played move; ties go to the move seen first.
    pub fn chosen_move(&self) -> Option<&MoveTally> {
        let mut best: Option<&MoveTally> = None;
        for tally in &self.moves {
            if best.map_or(true, |b| tally.count > b.count) {
                best = Some(tally);
            }
        }
        best
    }

    pub fn is_repeated(&self) -> bool {
        self.reach_count >= MIN_POSITION_REPEATS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameSkipReason {
    UnknownPlayer,
    IllegalMove,
}

/// Per-game diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTrace {
    pub game_id: String,
    pub user_side: Option<Side>,
    pub plies_replayed: usize,
    pub positions_recorded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<GameSkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    /// Every position reached, in first-reached order.
    pub positions: Vec<RecurringPosition>,
    pub games_analyzed: usize,
    pub game_traces: Vec<GameTrace>,
}

impl Aggregation {
    /// Positions that meet the repeat floor.
    pub fn repeated(&self) -> impl Iterator<Item = &RecurringPosition> {
        self.positions.iter().filter(|p| p.is_repeated())
    }
}

/// Accumulates positions across games for one user.
pub struct OpeningAggregator {
    username: String,
    max_plies: usize,
    positions: Vec<RecurringPosition>,
    index: HashMap<String, usize>,
    games_analyzed: usize,
    traces: Vec<GameTrace>,
}

impl OpeningAggregator {
    pub fn new(username: &str, max_opening_moves: u32) -> Self {
        Self {
            username: username.to_string(),
            max_plies: max_opening_moves as usize * 2,
            positions: Vec::new(),
            index: HashMap::new(),
            games_analyzed: 0,
            traces: Vec::new(),
        }
    }

    pub fn add_game(&mut self, game: &Game) {
        let Some(user_side) = game.user_side(&self.username) else {
            tracing::debug!(game_id = %game.id, white = %game.white, black = %game.black, "User not in game, skipping");
            self.traces.push(GameTrace {
                game_id: game.id.clone(),
                user_side: None,
                plies_replayed: 0,
                positions_recorded: 0,
                skipped_reason: Some(GameSkipReason::UnknownPlayer),
                failed_token: None,
            });
            return;
        };

        let outcome = game.outcome_for(user_side);
        let mut trace = GameTrace {
            game_id: game.id.clone(),
            user_side: Some(user_side),
            plies_replayed: 0,
            positions_recorded: 0,
            skipped_reason: None,
            failed_token: None,
        };

        let mut pos = Chess::default();
        for token in game.moves.iter().take(self.max_plies) {
            let fen_before = fen_of(&pos);
            let (mv, next) = match apply_token(&pos, token) {
                Ok(applied) => applied,
                Err(e) => {
                    tracing::debug!(game_id = %game.id, ply = trace.plies_replayed, "Stopping replay: {e}");
                    trace.skipped_reason = Some(GameSkipReason::IllegalMove);
                    trace.failed_token = Some(token.clone());
                    break;
                }
            };

            if Side::from(pos.turn()) == user_side {
                let san = san_of(&pos, &mv);
                let uci = uci_of(&mv);
                self.position_mut(fen_before, user_side)
                    .record(san, uci, outcome);
                trace.positions_recorded += 1;
            }

            pos = next;
            trace.plies_replayed += 1;
        }

        if trace.plies_replayed > 0 {
            self.games_analyzed += 1;
        }
        self.traces.push(trace);
    }

    fn position_mut(&mut self, fen: String, side: Side) -> &mut RecurringPosition {
        let idx = match self.index.get(&fen) {
            Some(&idx) => idx,
            None => {
                let idx = self.positions.len();
                self.index.insert(fen.clone(), idx);
                self.positions.push(RecurringPosition::new(fen, side));
                idx
            }
        };
        &mut self.positions[idx]
    }

    pub fn finish(self) -> Aggregation {
        Aggregation {
            positions: self.positions,
            games_analyzed: self.games_analyzed,
            game_traces: self.traces,
        }
    }
}

/// Aggregate a batch of games for `username`.
pub fn aggregate_games(
    games: &[Game],
    username: &str,
    max_opening_moves: u32,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Aggregation {
    let mut aggregator = OpeningAggregator::new(username, max_opening_moves);
    let total = games.len();

    for (i, game) in games.iter().enumerate() {
        aggregator.add_game(game);
        progress::report(&mut progress, PARSE_PROGRESS_EVERY, i + 1, total, |done, total| {
            Progress::Parsing { done, total }
        });
    }

    let aggregation = aggregator.finish();
    tracing::info!(
        username,
        games = total,
        games_analyzed = aggregation.games_analyzed,
        positions = aggregation.positions.len(),
        "Opening aggregation complete"
    );
    aggregation
}
