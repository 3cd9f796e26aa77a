//! Repeated opening leak detection.
//!
//! Replays the opening phase of a user's games, finds the positions they keep
//! reaching, scores their habitual move in each with an external evaluator and
//! reports the ones that lose too much.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod tags;

pub use aggregate::{aggregate_games, Aggregation, OpeningAggregator, RecurringPosition};
pub use classify::{classify_positions, RepeatedOpeningLeak};
pub use config::AnalysisConfig;
pub use error::{FetchError, LeakError};
pub use evaluator::{
    clamp_cp, mate_to_cp, score_in_range, CachedEvaluator, EvalCache, Evaluation, PositionEvaluator, MATE_SCORE,
    MAX_MATE_DISTANCE,
};
pub use pipeline::{analyze_games, analyze_user, GameSource};
pub use progress::{Progress, ProgressFn};
pub use report::{Diagnostics, LeakReport};
pub use tags::LeakTag;

#[cfg(any(test, feature = "testing"))]
pub use evaluator::ScriptedEvaluator;
