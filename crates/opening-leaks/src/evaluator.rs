//! The evaluator bridge contract plus a bounded evaluation cache.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Engine output for one FEN, scored for the side to move in that FEN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub cp: i32,
    /// Best move in UCI notation, if the engine produced one.
    pub best_move: Option<String>,
}

/// Score given to mate in one. Each extra move to mate costs 10. Every
/// centipawn score is kept within `±MATE_SCORE`.
pub const MATE_SCORE: i32 = 10_000;

/// Longest mate distance with its own score; anything longer scores the same.
pub const MAX_MATE_DISTANCE: i32 = 999;

/// Centipawn equivalent of a mate score, from the side to move. `mate 0`
/// means the side to move is already mated.
pub fn mate_to_cp(mate: i32) -> i32 {
    let mate = mate.clamp(-MAX_MATE_DISTANCE, MAX_MATE_DISTANCE);
    if mate > 0 {
        MATE_SCORE - mate * 10
    } else {
        -MATE_SCORE - mate * 10
    }
}

/// Pin a centipawn score into `±MATE_SCORE`.
pub fn clamp_cp(cp: i32) -> i32 {
    cp.clamp(-MATE_SCORE, MATE_SCORE)
}

/// Whether a raw engine score is one a real engine could report.
pub fn score_in_range(cp: Option<i32>, mate: Option<i32>) -> bool {
    cp.map_or(true, |cp| (-MATE_SCORE..=MATE_SCORE).contains(&cp))
        && mate.map_or(true, |m| (-MAX_MATE_DISTANCE..=MAX_MATE_DISTANCE).contains(&m))
}

impl Evaluation {
    pub fn new(cp: i32, best_move: Option<&str>) -> Self {
        Self {
            cp,
            best_move: best_move.map(str::to_string),
        }
    }

    /// Build from a raw engine score. A mate score wins over a centipawn one;
    /// with neither there is no evaluation.
    pub fn from_score(cp: Option<i32>, mate: Option<i32>, best_move: Option<&str>) -> Option<Self> {
        let cp = mate.map(mate_to_cp).or(cp.map(clamp_cp))?;
        let best_move = best_move.filter(|m| !m.is_empty() && *m != "(none)");
        Some(Self::new(cp, best_move))
    }
}

/// Anything that can score a position at a given search depth.
///
/// `None` means the evaluation is unavailable; callers treat that as terminal
/// for the position being evaluated, never for the run.
#[async_trait]
pub trait PositionEvaluator: Send {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation>;
}

#[async_trait]
impl<E: PositionEvaluator + ?Sized> PositionEvaluator for &mut E {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        (**self).evaluate(fen, depth).await
    }
}

#[async_trait]
impl<E: PositionEvaluator + ?Sized> PositionEvaluator for Box<E> {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        (**self).evaluate(fen, depth).await
    }
}

/// Default number of evaluations an `EvalCache` holds.
pub const DEFAULT_EVAL_CACHE_CAPACITY: usize = 10_000;

#[derive(Default)]
struct EvalEntries {
    map: HashMap<(String, u8), Evaluation>,
    order: VecDeque<(String, u8)>,
}

/// Evaluations keyed by `(fen, depth)`, oldest evicted first once full.
/// Clones share the same storage.
#[derive(Clone)]
pub struct EvalCache {
    capacity: usize,
    entries: Arc<Mutex<EvalEntries>>,
}

impl Default for EvalCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVAL_CACHE_CAPACITY)
    }
}

impl EvalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Arc::new(Mutex::new(EvalEntries::default())),
        }
    }

    pub fn get(&self, fen: &str, depth: u8) -> Option<Evaluation> {
        let entries = self.entries.lock().ok()?;
        entries.map.get(&(fen.to_string(), depth)).cloned()
    }

    pub fn insert(&self, fen: &str, depth: u8, eval: Evaluation) {
        if self.capacity == 0 {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let key = (fen.to_string(), depth);
        if entries.map.insert(key.clone(), eval).is_none() {
            entries.order.push_back(key);
        }
        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps an evaluator with an `EvalCache`. Unavailable results are not cached.
pub struct CachedEvaluator<E> {
    inner: E,
    cache: EvalCache,
}

impl<E: PositionEvaluator> CachedEvaluator<E> {
    pub fn new(inner: E, cache: EvalCache) -> Self {
        Self { inner, cache }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

#[async_trait]
impl<E: PositionEvaluator> PositionEvaluator for CachedEvaluator<E> {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        if let Some(hit) = self.cache.get(fen, depth) {
            tracing::trace!(fen, depth, "Eval cache hit");
            return Some(hit);
        }
        let eval = self.inner.evaluate(fen, depth).await?;
        self.cache.insert(fen, depth, eval.clone());
        Some(eval)
    }
}

/// Evaluator that answers from a fixed FEN → evaluation table and records
/// every request. Unknown FENs are unavailable.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    responses: HashMap<String, Evaluation>,
    pub calls: Vec<(String, u8)>,
}

#[cfg(any(test, feature = "testing"))]
impl ScriptedEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, fen: &str, cp: i32, best_move: Option<&str>) -> Self {
        self.responses
            .insert(fen.to_string(), Evaluation::new(cp, best_move));
        self
    }
}

#[cfg(any(test, feature = "testing"))]
#[async_trait]
impl PositionEvaluator for ScriptedEvaluator {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        self.calls.push((fen.to_string(), depth));
        self.responses.get(fen).cloned()
    }
}
