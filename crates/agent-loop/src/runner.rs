use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{
    assign_missing_ids, invoke_tool_call, unidentified_call_turn, ToolCall, ToolRegistry,
};
use agent_core::{AgentError, Message, StreamEvent};
use agent_llm::LLMProvider;

use crate::config::AgentLoopConfig;
use crate::stream::handler::consume_llm_stream;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Drive the tool-calling loop with blocking completions until the model
/// answers without tool calls, and return that final assistant turn.
///
/// `history` only ever grows by whole rounds: an assistant turn is appended
/// together with all of its tool turns, so a failed or cancelled run leaves
/// no half-finished batch behind.
pub async fn run_blocking(
    history: &mut Vec<Message>,
    conversation_id: &str,
    llm: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    config: &AgentLoopConfig,
    cancel_token: CancellationToken,
) -> Result<Message> {
    let debug_logger = DebugLogger::new(log::log_enabled!(log::Level::Debug));
    let tools = registry.request_tools();

    debug_logger.log_event(
        conversation_id,
        "blocking_loop_start",
        serde_json::json!({
            "max_rounds": config.max_rounds,
            "message_count": history.len(),
            "tool_count": registry.len(),
        }),
    );

    for round in 0..config.max_rounds {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        log::debug!(
            "[{}] Round {}/{} with {} messages",
            conversation_id,
            round + 1,
            config.max_rounds,
            history.len()
        );

        let timer = Timer::new("llm_request");
        let mut reply = guarded(
            llm.chat(history, tools),
            config.completion_timeout,
            &cancel_token,
            "completion request",
        )
        .await?
        .map_err(|error| AgentError::LLM(error.to_string()))?;
        timer.debug(conversation_id);

        let Some(tool_calls) = reply.tool_calls.as_mut().filter(|calls| !calls.is_empty()) else {
            history.push(reply.clone());
            log::info!(
                "[{}] Final answer after {} round(s)",
                conversation_id,
                round + 1
            );
            return Ok(reply);
        };
        let unidentified = assign_missing_ids(tool_calls);
        let tool_calls = tool_calls.clone();

        let tool_turns = invoke_batch(
            &tool_calls,
            &unidentified,
            &registry,
            config.tool_timeout,
            &cancel_token,
            conversation_id,
        )
        .await?;

        history.push(reply);
        history.extend(tool_turns);
    }

    log::warn!(
        "[{}] Gave up after {} rounds without a final answer",
        conversation_id,
        config.max_rounds
    );
    Err(AgentError::MaxRoundsExceeded(config.max_rounds))
}

/// Streaming flavor of [`run_blocking`].
///
/// Emits `ConversationId`, then every content delta of every round as it
/// arrives, then `Finish` and `Done`. On failure a single `Error` event is
/// emitted instead of `Finish`/`Done` and the error is returned.
pub async fn run_streaming(
    history: &mut Vec<Message>,
    conversation_id: &str,
    llm: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    config: &AgentLoopConfig,
    event_tx: mpsc::Sender<StreamEvent>,
    cancel_token: CancellationToken,
) -> Result<()> {
    // A closed channel means the caller left; treat it as cancellation.
    let outcome = tokio::select! {
        biased;
        outcome = stream_rounds(
            history,
            conversation_id,
            llm,
            registry,
            config,
            &event_tx,
            &cancel_token,
        ) => outcome,
        _ = event_tx.closed() => {
            log::info!("[{}] Stream listener went away, cancelling run", conversation_id);
            Err(AgentError::Cancelled)
        }
    };

    if let Err(error) = &outcome {
        log::error!("[{}] Streaming run failed: {}", conversation_id, error);
        let _ = event_tx
            .send(StreamEvent::Error {
                message: error.to_string(),
            })
            .await;
    }

    outcome
}

async fn stream_rounds(
    history: &mut Vec<Message>,
    conversation_id: &str,
    llm: Arc<dyn LLMProvider>,
    registry: Arc<ToolRegistry>,
    config: &AgentLoopConfig,
    event_tx: &mpsc::Sender<StreamEvent>,
    cancel_token: &CancellationToken,
) -> Result<()> {
    let debug_logger = DebugLogger::new(log::log_enabled!(log::Level::Debug));
    let tools = registry.request_tools();

    event_tx
        .send(StreamEvent::ConversationId {
            conversation_id: conversation_id.to_string(),
        })
        .await
        .map_err(|_| AgentError::Cancelled)?;

    for round in 0..config.max_rounds {
        if cancel_token.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        debug_logger.log_event(
            conversation_id,
            "round_start",
            serde_json::json!({
                "round": round + 1,
                "total_rounds": config.max_rounds,
                "message_count": history.len(),
            }),
        );

        let timer = Timer::new("llm_stream");
        let stream = guarded(
            llm.chat_stream(history, tools),
            config.completion_timeout,
            cancel_token,
            "completion request",
        )
        .await?
        .map_err(|error| AgentError::LLM(error.to_string()))?;

        let output = consume_llm_stream(
            stream,
            event_tx,
            cancel_token,
            config.completion_timeout,
            conversation_id,
        )
        .await?;
        timer.debug(conversation_id);

        if output.tool_calls.is_empty() {
            history.push(Message::assistant(output.content, None));
            let _ = event_tx.send(StreamEvent::stop()).await;
            let _ = event_tx.send(StreamEvent::Done).await;

            log::info!(
                "[{}] Stream finished after {} round(s), {} deltas in last round",
                conversation_id,
                round + 1,
                output.token_count
            );
            return Ok(());
        }

        let mut tool_calls = output.tool_calls;
        let unidentified = assign_missing_ids(&mut tool_calls);
        let reply = Message::assistant(output.content, Some(tool_calls.clone()));
        let tool_turns = invoke_batch(
            &tool_calls,
            &unidentified,
            &registry,
            config.tool_timeout,
            cancel_token,
            conversation_id,
        )
        .await?;

        history.push(reply);
        history.extend(tool_turns);
    }

    Err(AgentError::MaxRoundsExceeded(config.max_rounds))
}

/// Run a batch sequentially in issue order, one tool turn per call.
///
/// Calls whose id was generated in `unidentified` are answered with an error
/// turn instead of being executed.
async fn invoke_batch(
    tool_calls: &[ToolCall],
    unidentified: &HashSet<String>,
    registry: &ToolRegistry,
    tool_timeout: Option<Duration>,
    cancel_token: &CancellationToken,
    conversation_id: &str,
) -> Result<Vec<Message>> {
    let mut turns = Vec::with_capacity(tool_calls.len());

    for tool_call in tool_calls {
        if let Some(id) = tool_call.id.as_deref().filter(|id| unidentified.contains(*id)) {
            turns.push(unidentified_call_turn(id, &tool_call.function.name));
            continue;
        }

        let tool_timer = Timer::new(format!("tool_{}", tool_call.function.name));

        let turn = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
            turn = invoke_tool_call(tool_call, registry, tool_timeout) => turn,
        };

        tool_timer.debug(conversation_id);
        turns.push(turn);
    }

    Ok(turns)
}

/// Await `future` unless cancelled first or `limit` elapses.
async fn guarded<F, T>(
    future: F,
    limit: Option<Duration>,
    cancel_token: &CancellationToken,
    what: &str,
) -> Result<T>
where
    F: Future<Output = T>,
{
    let bounded = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, future).await.map_err(|_| {
                AgentError::Timeout(format!(
                    "{} did not finish within {}ms",
                    what,
                    limit.as_millis()
                ))
            }),
            None => Ok(future.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => Err(AgentError::Cancelled),
        result = bounded => result,
    }
}

struct DebugLogger {
    enabled: bool,
}

impl DebugLogger {
    fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn log_event(&self, conversation_id: &str, event_type: &str, details: serde_json::Value) {
        if !self.enabled {
            return;
        }

        log::debug!("[{}] {}: {}", conversation_id, event_type, details);
    }
}

struct Timer {
    name: String,
    start: std::time::Instant,
}

impl Timer {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: std::time::Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }

    fn debug(&self, conversation_id: &str) {
        log::debug!(
            "[{}] {} completed in {}ms",
            conversation_id,
            self.name,
            self.elapsed_ms()
        );
    }
}
