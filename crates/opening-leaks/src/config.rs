//! Analysis run configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::LeakError;

/// Positions must be reached at least this often before they count as a leak.
pub const MIN_POSITION_REPEATS: u32 = 3;

pub const DEFAULT_MAX_GAMES: u32 = 100;
pub const DEFAULT_MAX_OPENING_MOVES: u32 = 12;
pub const DEFAULT_CP_LOSS_THRESHOLD: i32 = 100;
pub const DEFAULT_ENGINE_DEPTH: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    #[validate(range(min = 1, max = 500))]
    pub max_games: u32,

    /// Full moves replayed per game; the ply cutoff is twice this.
    #[validate(range(min = 1, max = 30))]
    pub max_opening_moves: u32,

    #[validate(range(min = 1, max = 1000))]
    pub cp_loss_threshold: i32,

    #[validate(range(min = 6, max = 24))]
    pub engine_depth: u8,

    pub include_diagnostics: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_games: DEFAULT_MAX_GAMES,
            max_opening_moves: DEFAULT_MAX_OPENING_MOVES,
            cp_loss_threshold: DEFAULT_CP_LOSS_THRESHOLD,
            engine_depth: DEFAULT_ENGINE_DEPTH,
            include_diagnostics: true,
        }
    }
}

impl AnalysisConfig {
    pub fn checked(self) -> Result<Self, LeakError> {
        self.validate()
            .map_err(|e| LeakError::InvalidConfig(e.to_string()))?;
        Ok(self)
    }
}
