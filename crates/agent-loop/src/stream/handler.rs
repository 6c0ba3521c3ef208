use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use agent_core::tools::{ToolCall, ToolCallAccumulator};
use agent_core::{AgentError, StreamEvent};
use agent_llm::{LLMChunk, LLMStream};

pub struct StreamHandlingOutput {
    pub content: String,
    pub token_count: usize,
    /// Assembled calls, one per fragment index, ascending.
    pub tool_calls: Vec<ToolCall>,
}

/// Drain one completion stream.
///
/// Content is forwarded as it arrives and also buffered; tool-call fragments
/// are only buffered. `chunk_timeout` bounds the wait for each chunk.
pub async fn consume_llm_stream(
    mut stream: LLMStream,
    event_tx: &mpsc::Sender<StreamEvent>,
    cancel_token: &CancellationToken,
    chunk_timeout: Option<Duration>,
    conversation_id: &str,
) -> Result<StreamHandlingOutput, AgentError> {
    let mut content = String::new();
    let mut token_count = 0usize;
    let mut tool_calls = ToolCallAccumulator::new();

    loop {
        let next = async {
            match chunk_timeout {
                Some(limit) => tokio::time::timeout(limit, stream.next())
                    .await
                    .map_err(|_| {
                        AgentError::Timeout(format!(
                            "no completion chunk within {}ms",
                            limit.as_millis()
                        ))
                    }),
                None => Ok(stream.next().await),
            }
        };

        let chunk_result = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
            next = next => next?,
        };

        let Some(chunk_result) = chunk_result else {
            break;
        };

        match chunk_result {
            Ok(LLMChunk::Token(token)) => {
                if token.is_empty() {
                    continue;
                }
                token_count += 1;
                content.push_str(&token);

                if event_tx.send(StreamEvent::delta(token)).await.is_err() {
                    log::info!("[{}] Stream listener went away", conversation_id);
                    return Err(AgentError::Cancelled);
                }
            }
            Ok(LLMChunk::ToolCalls(fragments)) => {
                log::debug!(
                    "[{}] Received {} tool call fragments",
                    conversation_id,
                    fragments.len()
                );
                tool_calls.extend(fragments);
            }
            Ok(LLMChunk::Done) => {
                log::debug!("[{}] LLM stream completed", conversation_id);
                break;
            }
            Err(error) => return Err(AgentError::LLM(error.to_string())),
        }
    }

    Ok(StreamHandlingOutput {
        content,
        token_count,
        tool_calls: tool_calls.finish(),
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use agent_core::tools::ToolCallFragment;
    use agent_core::StreamEvent;
    use agent_llm::{LLMError, LLMStream};

    use super::*;

    fn build_stream(items: Vec<agent_llm::provider::Result<LLMChunk>>) -> LLMStream {
        Box::pin(stream::iter(items))
    }

    fn fragment(index: u32, id: Option<&str>, name: Option<&str>, args: &str) -> ToolCallFragment {
        ToolCallFragment {
            index,
            id: id.map(str::to_string),
            name: name.map(str::to_string),
            arguments: Some(args.to_string()),
        }
    }

    #[tokio::test]
    async fn forwards_content_and_buffers_fragments() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("hi".to_string())),
            Ok(LLMChunk::Token(String::new())),
            Ok(LLMChunk::ToolCalls(vec![fragment(0, Some("call_1"), Some("test_tool"), "{")])),
            Ok(LLMChunk::ToolCalls(vec![fragment(0, None, None, "}")])),
            Ok(LLMChunk::Done),
        ]);

        let (event_tx, mut event_rx) = mpsc::channel::<StreamEvent>(8);
        let output = consume_llm_stream(
            stream,
            &event_tx,
            &CancellationToken::new(),
            None,
            "conversation-1",
        )
        .await
        .expect("stream should succeed");
        drop(event_tx);

        assert_eq!(output.content, "hi");
        assert_eq!(output.token_count, 1);
        assert_eq!(output.tool_calls.len(), 1);
        assert_eq!(output.tool_calls[0].function.name, "test_tool");
        assert_eq!(output.tool_calls[0].function.arguments, "{}");

        assert_eq!(event_rx.recv().await, Some(StreamEvent::delta("hi")));
        assert_eq!(event_rx.recv().await, None);
    }

    #[tokio::test]
    async fn stops_reading_at_done() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("a".to_string())),
            Ok(LLMChunk::Done),
            Ok(LLMChunk::Token("late".to_string())),
        ]);

        let (event_tx, _event_rx) = mpsc::channel::<StreamEvent>(8);
        let output = consume_llm_stream(stream, &event_tx, &CancellationToken::new(), None, "c")
            .await
            .unwrap();

        assert_eq!(output.content, "a");
    }

    #[tokio::test]
    async fn stream_error_becomes_llm_error() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("partial".to_string())),
            Err(LLMError::Stream("connection reset".to_string())),
        ]);

        let (event_tx, _event_rx) = mpsc::channel::<StreamEvent>(8);
        let result =
            consume_llm_stream(stream, &event_tx, &CancellationToken::new(), None, "c").await;

        match result {
            Err(AgentError::LLM(message)) => assert!(message.contains("connection reset")),
            Err(other) => panic!("expected LLM error, got {other:?}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_stalled_stream() {
        let stream: LLMStream = Box::pin(stream::pending());
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let (event_tx, _event_rx) = mpsc::channel::<StreamEvent>(8);
        let result = consume_llm_stream(stream, &event_tx, &cancel_token, None, "c").await;

        assert!(matches!(result, Err(AgentError::Cancelled)));
    }

    #[tokio::test]
    async fn closed_listener_cancels_consumption() {
        let stream = build_stream(vec![
            Ok(LLMChunk::Token("nobody hears this".to_string())),
            Ok(LLMChunk::Done),
        ]);

        let (event_tx, event_rx) = mpsc::channel::<StreamEvent>(8);
        drop(event_rx);
        let result =
            consume_llm_stream(stream, &event_tx, &CancellationToken::new(), None, "c").await;

        assert!(matches!(result, Err(AgentError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_stream_times_out() {
        let stream: LLMStream = Box::pin(stream::pending());

        let (event_tx, _event_rx) = mpsc::channel::<StreamEvent>(8);
        let result = consume_llm_stream(
            stream,
            &event_tx,
            &CancellationToken::new(),
            Some(Duration::from_secs(30)),
            "c",
        )
        .await;

        assert!(matches!(result, Err(AgentError::Timeout(_))));
    }
}
