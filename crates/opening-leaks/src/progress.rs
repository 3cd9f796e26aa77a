use serde::Serialize;

/// Games between parsing checkpoints.
pub const PARSE_PROGRESS_EVERY: usize = 10;
/// Positions between evaluation checkpoints.
pub const EVAL_PROGRESS_EVERY: usize = 5;

/// Coarse progress checkpoint. Observational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum Progress {
    Parsing { done: usize, total: usize },
    Evaluating { done: usize, total: usize },
}

pub type ProgressFn<'a> = dyn FnMut(Progress) + Send + 'a;

/// Invoke the callback when `done` hits a checkpoint or the end of the phase.
pub(crate) fn report(
    progress: &mut Option<&mut ProgressFn<'_>>,
    every: usize,
    done: usize,
    total: usize,
    make: fn(usize, usize) -> Progress,
) {
    if let Some(cb) = progress.as_mut() {
        if done % every == 0 || done == total {
            cb(make(done, total));
        }
    }
}
