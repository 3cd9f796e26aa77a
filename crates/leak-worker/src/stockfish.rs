//! Stockfish engine wrapper using UCI protocol (async I/O)

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use tracing::debug;

use opening_leaks::{Evaluation, PositionEvaluator};

use crate::config::EngineConfig;
use crate::error::WorkerError;

/// Raw result of one search, side-to-move perspective.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResult {
    pub cp: Option<i32>,
    /// Mate in N (positive = side to move mates)
    pub mate: Option<i32>,
    /// `None` for `bestmove (none)`
    pub best_move: Option<String>,
}

impl SearchResult {
    pub fn into_evaluation(self) -> Option<Evaluation> {
        Evaluation::from_score(self.cp, self.mate, self.best_move.as_deref())
    }
}

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(config: &EngineConfig) -> Result<Self, WorkerError> {
        let mut process = Command::new(&config.stockfish_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WorkerError::Stockfish(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| WorkerError::Stockfish("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        // Initialize UCI
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;

        engine
            .send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        engine
            .send(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        engine.send("setoption name UCI_AnalyseMode value true").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self, line: &mut String) -> Result<(), WorkerError> {
        line.clear();
        let read = self
            .stdout
            .read_line(line)
            .await
            .map_err(|e| WorkerError::Stockfish(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(WorkerError::Stockfish("Stockfish closed its output".into()));
        }
        Ok(())
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), WorkerError> {
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            let trimmed = line.trim();
            debug!(line = trimmed, "SF >");
            if trimmed == expected {
                return Ok(());
            }
        }
    }

    /// Search a position to a fixed depth.
    pub async fn search(&mut self, fen: &str, depth: u8) -> Result<SearchResult, WorkerError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut result = SearchResult::default();
        let mut line = String::new();
        loop {
            self.read_line(&mut line).await?;
            if let Some(best) = apply_line(&mut result, line.trim()) {
                result.best_move = best;
                return Ok(result);
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

#[async_trait]
impl PositionEvaluator for StockfishEngine {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        match self.search(fen, depth).await {
            Ok(result) => result.into_evaluation(),
            Err(e) => {
                tracing::warn!(fen, depth, "Stockfish evaluation failed: {e}");
                None
            }
        }
    }
}

/// Fold one engine output line into `result`; the last score seen wins.
/// Returns `Some(best_move)` on the terminating `bestmove` line.
fn apply_line(result: &mut SearchResult, line: &str) -> Option<Option<String>> {
    if line.starts_with("info") && line.contains(" score ") {
        if let Some(cp) = parse_cp(line) {
            result.cp = Some(cp);
            result.mate = None;
        }
        if let Some(mate) = parse_mate(line) {
            result.mate = Some(mate);
            result.cp = None;
        }
        None
    } else if line.starts_with("bestmove") {
        let best = line
            .split_whitespace()
            .nth(1)
            .filter(|m| *m != "(none)")
            .map(str::to_string);
        Some(best)
    } else {
        None
    }
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_after(line, "mate")
}

fn parse_after(line: &str, key: &str) -> Option<i32> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(lines: &[&str]) -> SearchResult {
        let mut result = SearchResult::default();
        for line in lines {
            if let Some(best) = apply_line(&mut result, line) {
                result.best_move = best;
                break;
            }
        }
        result
    }

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
    }

    #[test]
    fn test_last_pv_score_wins() {
        let result = run(&[
            "info depth 1 score cp 12 pv d2d4",
            "info depth 2 score mate 4 pv d1h5",
            "info depth 3 score cp -40 pv g1f3",
            "info string NNUE enabled",
            "bestmove g1f3 ponder d7d5",
        ]);
        assert_eq!(result.cp, Some(-40));
        assert_eq!(result.mate, None);
        assert_eq!(result.best_move.as_deref(), Some("g1f3"));
        assert_eq!(result.into_evaluation(), Some(Evaluation::new(-40, Some("g1f3"))));
    }

    #[test]
    fn test_mate_maps_to_large_score() {
        let result = run(&["info depth 5 score mate -2 pv e1e2", "bestmove e1e2"]);
        assert_eq!(result.into_evaluation().map(|e| e.cp), Some(-9980));
    }

    #[test]
    fn test_bestmove_none() {
        // Side to move is already mated.
        let result = run(&["info depth 0 score mate 0", "bestmove (none)"]);
        assert_eq!(result.best_move, None);
        assert_eq!(result.into_evaluation(), Some(Evaluation::new(-10_000, None)));
    }

    #[test]
    fn test_no_score_is_unavailable() {
        let result = run(&["info string NNUE enabled", "bestmove e2e4"]);
        assert_eq!(result.into_evaluation(), None);
    }
}
