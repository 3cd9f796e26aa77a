//! WebSocket leak analysis.
//!
//! The server runs fetching, aggregation and classification. Every engine
//! evaluation is delegated to the connected browser (Stockfish WASM): the
//! server sends `eval_request` and waits for the matching `eval_result` or
//! `eval_unavailable`. Browser answers are cached per connection only.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use opening_leaks::{
    analyze_user, score_in_range, AnalysisConfig, CachedEvaluator, EvalCache, Evaluation, LeakReport,
    PositionEvaluator, Progress,
};

use crate::state::{AppState, Source};

// ---- Message types ----

/// Server → Client messages
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    EvalRequest { id: u32, fen: String, depth: u8 },
    Progress { progress: Progress },
    Report { report: LeakReport },
    Error { message: String },
}

/// Client → Server messages
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Analyze {
        username: String,
        source: Source,
        #[serde(default)]
        config: Option<AnalysisConfig>,
    },
    EvalResult {
        id: u32,
        cp: Option<i32>,
        mate: Option<i32>,
        best_move: Option<String>,
    },
    EvalUnavailable {
        id: u32,
    },
}

// ---- WebSocket handler ----

pub async fn ws_handler(ws: WebSocketUpgrade, Extension(state): Extension<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sender, mut receiver) = socket.split();
    let (out, out_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_loop(sender, out_rx));
    let eval_cache = EvalCache::new();

    while let Some(msg) = recv_msg(&mut receiver).await {
        match msg {
            Ok(ClientMessage::Analyze {
                username,
                source,
                config,
            }) => {
                let config = config.unwrap_or_default();
                run_analysis(&state, &eval_cache, &out, &mut receiver, &username, source, &config).await;
            }
            Ok(_) => send(&out, error("Expected analyze message")),
            Err(e) => send(&out, error(format!("Invalid message: {e}"))),
        }
    }

    drop(out);
    let _ = writer.await;
}

async fn run_analysis(
    state: &AppState,
    eval_cache: &EvalCache,
    out: &mpsc::UnboundedSender<ServerMessage>,
    receiver: &mut SplitStream<WebSocket>,
    username: &str,
    source: Source,
    config: &AnalysisConfig,
) {
    tracing::info!(username, ?source, "Starting leak analysis");

    let bridge = WsEvaluator::new(receiver, out.clone(), state.eval_timeout);
    let mut evaluator = CachedEvaluator::new(bridge, eval_cache.clone());

    let progress_out = out.clone();
    let mut on_progress = move |progress: Progress| send(&progress_out, ServerMessage::Progress { progress });

    let result = analyze_user(
        state.source(source),
        username,
        config,
        &mut evaluator,
        Some(&mut on_progress),
    )
    .await;

    match result {
        Ok(report) => {
            tracing::info!(username, leaks = report.leaks.len(), "Leak analysis complete");
            send(out, ServerMessage::Report { report });
        }
        Err(e) => {
            tracing::warn!(username, "Leak analysis failed: {e}");
            send(out, error(e.to_string()));
        }
    }
}

// ---- Evaluator bridge ----

/// Forwards evaluations to the browser over the socket.
pub struct WsEvaluator<'a> {
    inbound: &'a mut SplitStream<WebSocket>,
    out: mpsc::UnboundedSender<ServerMessage>,
    timeout: Duration,
    next_id: u32,
    closed: bool,
}

impl<'a> WsEvaluator<'a> {
    pub fn new(
        inbound: &'a mut SplitStream<WebSocket>,
        out: mpsc::UnboundedSender<ServerMessage>,
        timeout: Duration,
    ) -> Self {
        Self {
            inbound,
            out,
            timeout,
            next_id: 0,
            closed: false,
        }
    }

    /// Wait for the answer to request `id`. Answers to earlier, timed-out
    /// requests are discarded. Scores no engine could produce count as
    /// unavailable.
    async fn await_answer(&mut self, id: u32) -> Option<Evaluation> {
        loop {
            match recv_msg(self.inbound).await {
                None => {
                    self.closed = true;
                    return None;
                }
                Some(Ok(ClientMessage::EvalResult {
                    id: got,
                    cp,
                    mate,
                    best_move,
                })) if got == id => {
                    if !score_in_range(cp, mate) {
                        tracing::warn!(id, ?cp, ?mate, "Rejecting out-of-range eval answer");
                        return None;
                    }
                    return Evaluation::from_score(cp, mate, best_move.as_deref());
                }
                Some(Ok(ClientMessage::EvalUnavailable { id: got })) if got == id => return None,
                Some(Ok(ClientMessage::EvalResult { id: got, .. }))
                | Some(Ok(ClientMessage::EvalUnavailable { id: got })) => {
                    tracing::debug!(expected = id, got, "Discarding stale eval answer");
                }
                Some(Ok(ClientMessage::Analyze { .. })) => {
                    send(&self.out, error("Analysis already running"));
                }
                Some(Err(e)) => {
                    send(&self.out, error(format!("Invalid message: {e}")));
                }
            }
        }
    }
}

#[async_trait]
impl PositionEvaluator for WsEvaluator<'_> {
    async fn evaluate(&mut self, fen: &str, depth: u8) -> Option<Evaluation> {
        if self.closed {
            return None;
        }
        self.next_id += 1;
        let id = self.next_id;
        send(
            &self.out,
            ServerMessage::EvalRequest {
                id,
                fen: fen.to_string(),
                depth,
            },
        );

        match tokio::time::timeout(self.timeout, self.await_answer(id)).await {
            Ok(eval) => eval,
            Err(_) => {
                tracing::warn!(id, fen, "Eval request timed out");
                None
            }
        }
    }
}

// ---- Helpers ----

fn error(message: impl Into<String>) -> ServerMessage {
    ServerMessage::Error {
        message: message.into(),
    }
}

fn send(out: &mpsc::UnboundedSender<ServerMessage>, msg: ServerMessage) {
    if out.send(msg).is_err() {
        tracing::debug!("Socket writer gone, dropping message");
    }
}

async fn write_loop(mut sender: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<ServerMessage>) {
    while let Some(msg) = rx.recv().await {
        let json = match serde_json::to_string(&msg) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to encode server message: {e}");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            break;
        }
    }
}

/// Next decoded client message, or `None` once the socket closes.
async fn recv_msg(receiver: &mut SplitStream<WebSocket>) -> Option<Result<ClientMessage, serde_json::Error>> {
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(t))) => return Some(serde_json::from_str(t.as_str())),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
            _ => continue,
        }
    }
}
