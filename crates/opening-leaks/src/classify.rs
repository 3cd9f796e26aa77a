//! Leak classification and ranking.
//!
//! Every repeated position is scored twice: once before the user's habitual
//! move (user to move) and once after it (opponent to move). The difference,
//! seen from the user's side, is the centipawn loss of that single move.

use serde::Serialize;
use shakmaty::Chess;

use chess_core::moves::{apply_token, fen_of, parse_move_token, position_from_fen, san_of, uci_of};
use chess_core::Side;

use crate::aggregate::RecurringPosition;
use crate::config::AnalysisConfig;
use crate::evaluator::{clamp_cp, PositionEvaluator};
use crate::progress::{self, Progress, ProgressFn, EVAL_PROGRESS_EVERY};
use crate::tags::{derive_tags, LeakTag};

/// A repeated position where the user's usual move loses ground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatedOpeningLeak {
    pub fen_before: String,
    pub fen_after: String,
    /// The user's habitual move, SAN.
    pub user_move: String,
    pub user_move_uci: String,
    /// Engine's preferred move, UCI.
    pub best_move: Option<String>,
    pub best_move_san: Option<String>,
    pub eval_before: i32,
    pub eval_after: i32,
    pub cp_loss: i32,
    pub flagged: bool,
    pub reach_count: u32,
    pub move_count: u32,
    pub side_to_move: Side,
    pub tags: Vec<LeakTag>,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSkipReason {
    InvalidMove,
    MissingEval,
}

/// Diagnostic record for every eligible position, leak or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionEvalTrace {
    pub fen: String,
    pub user_move: Option<String>,
    pub best_move: Option<String>,
    pub eval_before: Option<i32>,
    pub eval_after: Option<i32>,
    pub cp_loss: Option<i32>,
    pub flagged: bool,
    pub reach_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_reason: Option<PositionSkipReason>,
}

impl PositionEvalTrace {
    fn skipped(pos: &RecurringPosition, user_move: Option<String>, reason: PositionSkipReason) -> Self {
        Self {
            fen: pos.fen.clone(),
            user_move,
            best_move: None,
            eval_before: None,
            eval_after: None,
            cp_loss: None,
            flagged: false,
            reach_count: pos.reach_count,
            skipped_reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Ranked worst first.
    pub leaks: Vec<RepeatedOpeningLeak>,
    pub traces: Vec<PositionEvalTrace>,
}

/// Re-sign an engine score (side-to-move perspective) for `user`.
pub fn user_perspective(cp: i32, side_to_move: Side, user: Side) -> i32 {
    if side_to_move == user {
        cp
    } else {
        cp.saturating_neg()
    }
}

/// Sort leaks by centipawn loss, worst first. Ties keep their order.
pub fn rank_leaks(leaks: &mut [RepeatedOpeningLeak]) {
    leaks.sort_by(|a, b| b.cp_loss.cmp(&a.cp_loss));
}

/// Evaluate and classify every position that meets the repeat floor.
///
/// Evaluator calls are strictly sequential: before, then after, for one
/// position at a time. A missing evaluation or an unplayable move only skips
/// that position.
pub async fn classify_positions(
    positions: &[RecurringPosition],
    config: &AnalysisConfig,
    evaluator: &mut dyn PositionEvaluator,
    mut progress: Option<&mut ProgressFn<'_>>,
) -> Classification {
    let eligible: Vec<&RecurringPosition> = positions.iter().filter(|p| p.is_repeated()).collect();
    let total = eligible.len();
    let mut out = Classification::default();

    for (i, pos) in eligible.into_iter().enumerate() {
        match classify_one(pos, config, evaluator).await {
            Ok((leak, trace)) => {
                if let Some(leak) = leak {
                    out.leaks.push(leak);
                }
                out.traces.push(trace);
            }
            Err(trace) => {
                tracing::warn!(
                    fen = %pos.fen,
                    reason = ?trace.skipped_reason,
                    "Skipping repeated position"
                );
                out.traces.push(trace);
            }
        }
        progress::report(&mut progress, EVAL_PROGRESS_EVERY, i + 1, total, |done, total| {
            Progress::Evaluating { done, total }
        });
    }

    rank_leaks(&mut out.leaks);
    tracing::info!(
        positions = total,
        leaks = out.leaks.len(),
        "Leak classification complete"
    );
    out
}

async fn classify_one(
    pos: &RecurringPosition,
    config: &AnalysisConfig,
    evaluator: &mut dyn PositionEvaluator,
) -> Result<(Option<RepeatedOpeningLeak>, PositionEvalTrace), PositionEvalTrace> {
    let Some(chosen) = pos.chosen_move() else {
        return Err(PositionEvalTrace::skipped(pos, None, PositionSkipReason::InvalidMove));
    };
    let user = pos.side_to_move;

    let board: Chess = position_from_fen(&pos.fen).map_err(|_| {
        PositionEvalTrace::skipped(pos, Some(chosen.san.clone()), PositionSkipReason::InvalidMove)
    })?;
    let (mv, after) = apply_token(&board, &chosen.san).map_err(|_| {
        PositionEvalTrace::skipped(pos, Some(chosen.san.clone()), PositionSkipReason::InvalidMove)
    })?;
    let fen_after = fen_of(&after);

    let before_eval = evaluator.evaluate(&pos.fen, config.engine_depth).await;
    let after_eval = evaluator.evaluate(&fen_after, config.engine_depth).await;
    let (Some(before_eval), Some(after_eval)) = (before_eval, after_eval) else {
        return Err(PositionEvalTrace::skipped(
            pos,
            Some(chosen.san.clone()),
            PositionSkipReason::MissingEval,
        ));
    };

    let eval_before = user_perspective(clamp_cp(before_eval.cp), user, user);
    let eval_after = user_perspective(clamp_cp(after_eval.cp), user.opposite(), user);
    let cp_loss = eval_before - eval_after;
    let flagged = cp_loss > config.cp_loss_threshold;
    let best_move = before_eval.best_move.clone();

    let trace = PositionEvalTrace {
        fen: pos.fen.clone(),
        user_move: Some(chosen.san.clone()),
        best_move: best_move.clone(),
        eval_before: Some(eval_before),
        eval_after: Some(eval_after),
        cp_loss: Some(cp_loss),
        flagged,
        reach_count: pos.reach_count,
        skipped_reason: None,
    };

    if !flagged {
        return Ok((None, trace));
    }

    let best_move_san = best_move
        .as_deref()
        .and_then(|uci| parse_move_token(&board, uci).ok())
        .map(|best| san_of(&board, &best));

    let tags = derive_tags(
        &pos.fen,
        &chosen.san,
        best_move.as_deref(),
        cp_loss,
        pos.reach_count,
        chosen.count,
    );

    let leak = RepeatedOpeningLeak {
        fen_before: pos.fen.clone(),
        fen_after,
        user_move: chosen.san.clone(),
        user_move_uci: uci_of(&mv),
        best_move,
        best_move_san,
        eval_before,
        eval_after,
        cp_loss,
        flagged,
        reach_count: pos.reach_count,
        move_count: chosen.count,
        side_to_move: user,
        tags,
        wins: pos.wins,
        draws: pos.draws,
        losses: pos.losses,
    };
    Ok((Some(leak), trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MoveTally;
    use crate::evaluator::{ScriptedEvaluator, MATE_SCORE};

    const AFTER_E4_E5: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
    const AFTER_NF3: &str = "rnbqkbnr/pppp1ppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2";

    fn position(fen: &str, side: Side, tallies: &[(&str, &str, u32)]) -> RecurringPosition {
        let moves: Vec<MoveTally> = tallies
            .iter()
            .map(|(san, uci, count)| MoveTally {
                san: san.to_string(),
                uci: uci.to_string(),
                count: *count,
            })
            .collect();
        RecurringPosition {
            fen: fen.to_string(),
            side_to_move: side,
            reach_count: moves.iter().map(|m| m.count).sum(),
            moves,
            wins: 1,
            draws: 1,
            losses: 1,
        }
    }

    #[test]
    fn test_user_perspective() {
        assert_eq!(user_perspective(30, Side::White, Side::White), 30);
        assert_eq!(user_perspective(90, Side::Black, Side::White), -90);
        assert_eq!(user_perspective(-40, Side::White, Side::Black), 40);
        assert_eq!(user_perspective(i32::MIN, Side::Black, Side::White), i32::MAX);
    }

    #[tokio::test]
    async fn test_flagged_leak_from_scored_pair() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 3)])];
        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, 30, Some("d2d4"))
            .with(AFTER_NF3, 90, Some("b8c6"));

        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;

        assert_eq!(out.leaks.len(), 1);
        let leak = &out.leaks[0];
        assert_eq!(leak.eval_before, 30);
        assert_eq!(leak.eval_after, -90);
        assert_eq!(leak.cp_loss, 120);
        assert!(leak.flagged);
        assert_eq!(leak.fen_after, AFTER_NF3);
        assert_eq!(leak.user_move_uci, "g1f3");
        assert_eq!(leak.best_move_san.as_deref(), Some("d4"));
        assert_eq!((leak.reach_count, leak.move_count), (3, 3));
        assert_eq!(leak.tags, vec![LeakTag::RepeatedHabit, LeakTag::CenterControl]);
        assert_eq!(
            eval.calls,
            vec![(AFTER_E4_E5.to_string(), 10), (AFTER_NF3.to_string(), 10)]
        );
    }

    #[tokio::test]
    async fn test_below_threshold_yields_trace_only() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 3)])];
        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, 30, Some("g1f3"))
            .with(AFTER_NF3, -20, None);

        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert!(out.leaks.is_empty());
        assert_eq!(out.traces.len(), 1);
        assert_eq!(out.traces[0].cp_loss, Some(10));
        assert!(!out.traces[0].flagged);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 3)])];
        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, 0, None)
            .with(AFTER_NF3, 100, None);
        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert_eq!(out.traces[0].cp_loss, Some(100));
        assert!(out.leaks.is_empty());
    }

    #[tokio::test]
    async fn test_missing_eval_skips_position_only() {
        let positions = vec![
            position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 3)]),
            position(chess_core::moves::STARTING_FEN, Side::White, &[("a3", "a2a3", 4)]),
        ];
        let after_a3 = "rnbqkbnr/pppppppp/8/8/8/P7/1PPPPPPP/RNBQKBNR b KQkq - 0 1";
        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, 30, None)
            .with(chess_core::moves::STARTING_FEN, 20, Some("e2e4"))
            .with(after_a3, 200, None);

        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;

        assert_eq!(out.traces.len(), 2);
        assert_eq!(out.traces[0].skipped_reason, Some(PositionSkipReason::MissingEval));
        assert_eq!(out.leaks.len(), 1);
        assert_eq!(out.leaks[0].cp_loss, 220);
        // Both halves are still requested for the skipped position.
        assert_eq!(eval.calls.len(), 4);
    }

    #[tokio::test]
    async fn test_unplayable_move_is_invalid_move() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf6", "g8f6", 3)])];
        let mut eval = ScriptedEvaluator::new();
        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert_eq!(out.traces[0].skipped_reason, Some(PositionSkipReason::InvalidMove));
        assert!(eval.calls.is_empty());
    }

    #[tokio::test]
    async fn test_ineligible_positions_are_not_evaluated() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 2)])];
        let mut eval = ScriptedEvaluator::new();
        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert!(out.traces.is_empty());
        assert!(eval.calls.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_scores_are_pinned_to_mate() {
        let positions = vec![position(AFTER_E4_E5, Side::White, &[("Nf3", "g1f3", 3)])];

        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, i32::MIN, None)
            .with(AFTER_NF3, i32::MIN, None);
        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert_eq!(out.traces[0].eval_before, Some(-MATE_SCORE));
        assert_eq!(out.traces[0].eval_after, Some(MATE_SCORE));
        assert_eq!(out.traces[0].cp_loss, Some(-2 * MATE_SCORE));
        assert!(out.leaks.is_empty());

        let mut eval = ScriptedEvaluator::new()
            .with(AFTER_E4_E5, i32::MAX, None)
            .with(AFTER_NF3, i32::MAX, None);
        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        assert_eq!(out.leaks[0].cp_loss, 2 * MATE_SCORE);
        assert_eq!(out.leaks[0].tags[0], LeakTag::MajorBlunder);
    }

    #[tokio::test]
    async fn test_black_user_signs() {
        // User is Black after 1.e4; plays ...f6 which the engine dislikes.
        let after_e4 = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
        let after_f6 = "rnbqkbnr/ppppp1pp/5p2/8/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2";
        let positions = vec![position(after_e4, Side::Black, &[("f6", "f7f6", 3)])];
        let mut eval = ScriptedEvaluator::new()
            .with(after_e4, -30, Some("e7e5"))
            .with(after_f6, 150, None);

        let out = classify_positions(&positions, &AnalysisConfig::default(), &mut eval, None).await;
        let leak = &out.leaks[0];
        assert_eq!(leak.eval_before, -30);
        assert_eq!(leak.eval_after, -150);
        assert_eq!(leak.cp_loss, 120);
        assert_eq!(leak.side_to_move, Side::Black);
    }

    #[test]
    fn test_rank_leaks_is_stable_descending() {
        let base = RepeatedOpeningLeak {
            fen_before: String::new(),
            fen_after: String::new(),
            user_move: String::new(),
            user_move_uci: String::new(),
            best_move: None,
            best_move_san: None,
            eval_before: 0,
            eval_after: 0,
            cp_loss: 0,
            flagged: true,
            reach_count: 3,
            move_count: 3,
            side_to_move: Side::White,
            tags: vec![],
            wins: 0,
            draws: 0,
            losses: 0,
        };
        let mut leaks: Vec<RepeatedOpeningLeak> = [(150, "a"), (300, "b"), (150, "c"), (120, "d")]
            .iter()
            .map(|(cp, id)| RepeatedOpeningLeak {
                cp_loss: *cp,
                user_move: id.to_string(),
                ..base.clone()
            })
            .collect();
        rank_leaks(&mut leaks);
        let order: Vec<&str> = leaks.iter().map(|l| l.user_move.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c", "d"]);
    }
}
