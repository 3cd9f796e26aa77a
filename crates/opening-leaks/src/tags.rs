//! Heuristic leak tags.
//!
//! Tags come from a fixed, ordered rule table. Each rule is a pure predicate
//! over [`TagInput`]; the first three that fire are kept, and `Inaccuracy` is
//! the fallback when none do.

use serde::{Deserialize, Serialize};
use shakmaty::Chess;

use chess_core::moves::{fullmove_number, move_facts, parse_move_token, position_from_fen, MoveFacts};

pub const MAJOR_BLUNDER_CP: i32 = 250;
pub const TACTICAL_MISS_CP: i32 = 150;
/// Share of visits in which the same move was played for it to be a habit.
pub const HABIT_SHARE: f64 = 0.7;
/// Queen/king moves up to this full move count as poor development.
pub const DEVELOPMENT_MOVES: u32 = 10;
pub const MAX_TAGS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LeakTag {
    #[serde(rename = "Major Blunder")]
    MajorBlunder,
    #[serde(rename = "Tactical Miss")]
    TacticalMiss,
    #[serde(rename = "Repeated Habit")]
    RepeatedHabit,
    #[serde(rename = "King Safety")]
    KingSafety,
    #[serde(rename = "Missed Check")]
    MissedCheck,
    #[serde(rename = "Missed Capture")]
    MissedCapture,
    #[serde(rename = "Center Control")]
    CenterControl,
    #[serde(rename = "Opening Development")]
    OpeningDevelopment,
    #[serde(rename = "Inaccuracy")]
    Inaccuracy,
}

impl LeakTag {
    pub fn label(self) -> &'static str {
        match self {
            LeakTag::MajorBlunder => "Major Blunder",
            LeakTag::TacticalMiss => "Tactical Miss",
            LeakTag::RepeatedHabit => "Repeated Habit",
            LeakTag::KingSafety => "King Safety",
            LeakTag::MissedCheck => "Missed Check",
            LeakTag::MissedCapture => "Missed Capture",
            LeakTag::CenterControl => "Center Control",
            LeakTag::OpeningDevelopment => "Opening Development",
            LeakTag::Inaccuracy => "Inaccuracy",
        }
    }
}

/// Everything a tag rule may look at.
#[derive(Debug, Clone)]
pub struct TagInput {
    pub cp_loss: i32,
    pub reach_count: u32,
    pub move_count: u32,
    pub fullmove: u32,
    pub user: MoveFacts,
    /// `None` when the engine gave no best move or it is not legal here.
    pub best: Option<MoveFacts>,
}

impl TagInput {
    /// Resolve the moves against `fen_before`. Returns `None` if the FEN or
    /// the user's move cannot be resolved.
    pub fn new(
        fen_before: &str,
        user_move: &str,
        best_move: Option<&str>,
        cp_loss: i32,
        reach_count: u32,
        move_count: u32,
    ) -> Option<Self> {
        let pos: Chess = position_from_fen(fen_before).ok()?;
        let user_mv = parse_move_token(&pos, user_move).ok()?;
        let best = best_move
            .and_then(|uci| parse_move_token(&pos, uci).ok())
            .map(|mv| move_facts(&pos, &mv));

        Some(Self {
            cp_loss,
            reach_count,
            move_count,
            fullmove: fullmove_number(&pos),
            user: move_facts(&pos, &user_mv),
            best,
        })
    }

    fn best_does(&self, f: impl Fn(&MoveFacts) -> bool) -> bool {
        self.best.as_ref().is_some_and(&f) && !f(&self.user)
    }
}

struct TagRule {
    tag: LeakTag,
    applies: fn(&TagInput) -> bool,
}

const RULES: &[TagRule] = &[
    TagRule {
        tag: LeakTag::MajorBlunder,
        applies: |t| t.cp_loss >= MAJOR_BLUNDER_CP,
    },
    TagRule {
        tag: LeakTag::TacticalMiss,
        applies: |t| t.cp_loss >= TACTICAL_MISS_CP && t.cp_loss < MAJOR_BLUNDER_CP,
    },
    TagRule {
        tag: LeakTag::RepeatedHabit,
        applies: |t| {
            t.reach_count > 0 && f64::from(t.move_count) / f64::from(t.reach_count) >= HABIT_SHARE
        },
    },
    TagRule {
        tag: LeakTag::KingSafety,
        applies: |t| t.best_does(|m| m.castles),
    },
    TagRule {
        tag: LeakTag::MissedCheck,
        applies: |t| t.best_does(|m| m.gives_check),
    },
    TagRule {
        tag: LeakTag::MissedCapture,
        applies: |t| t.best_does(|m| m.captures),
    },
    TagRule {
        tag: LeakTag::CenterControl,
        applies: |t| t.best_does(|m| m.lands_in_center),
    },
    TagRule {
        tag: LeakTag::OpeningDevelopment,
        applies: |t| t.fullmove <= DEVELOPMENT_MOVES && t.user.moves_queen_or_king,
    },
];

/// Apply the rule table. Always returns between one and three tags.
pub fn tags_for(input: &TagInput) -> Vec<LeakTag> {
    let mut tags: Vec<LeakTag> = RULES
        .iter()
        .filter(|rule| (rule.applies)(input))
        .map(|rule| rule.tag)
        .take(MAX_TAGS)
        .collect();
    if tags.is_empty() {
        tags.push(LeakTag::Inaccuracy);
    }
    tags
}

/// Derive tags straight from the leak fields.
///
/// If the position or user move cannot be resolved only the numeric rules
/// run.
pub fn derive_tags(
    fen_before: &str,
    user_move: &str,
    best_move: Option<&str>,
    cp_loss: i32,
    reach_count: u32,
    move_count: u32,
) -> Vec<LeakTag> {
    let input = TagInput::new(fen_before, user_move, best_move, cp_loss, reach_count, move_count)
        .unwrap_or(TagInput {
            cp_loss,
            reach_count,
            move_count,
            fullmove: u32::MAX,
            user: MoveFacts::default(),
            best: None,
        });
    tags_for(&input)
}
