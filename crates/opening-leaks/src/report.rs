use serde::Serialize;

use crate::aggregate::GameTrace;
use crate::classify::{PositionEvalTrace, RepeatedOpeningLeak};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub game_traces: Vec<GameTrace>,
    pub position_traces: Vec<PositionEvalTrace>,
}

/// Output of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakReport {
    pub username: String,
    pub games_analyzed: usize,
    /// Positions that met the repeat floor.
    pub repeated_positions: usize,
    pub leaks: Vec<RepeatedOpeningLeak>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl LeakReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
