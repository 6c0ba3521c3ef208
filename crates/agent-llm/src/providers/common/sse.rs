//! Shared SSE -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

fn to_stream_error(err: LLMError) -> LLMError {
    match err {
        LLMError::Stream(msg) => LLMError::Stream(msg),
        other => LLMError::Stream(other.to_string()),
    }
}

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// Events with a blank `data:` payload are dropped before reaching `handler`.
/// `handler` receives the data payload of every other event and can either:
/// - return `Ok(chunks)` to emit zero or more chunks, in order
/// - return `Err(_)` to emit a stream error (mapped to `LLMError::Stream`)
///
/// The stream ends right after the first [`LLMChunk::Done`], even if the
/// server keeps the connection open.
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str) -> Result<Vec<LLMChunk>> + Send + 'static,
{
    let mut finished = false;

    let stream = response
        .bytes_stream()
        .eventsource()
        .flat_map(move |event| {
            let items: Vec<Result<LLMChunk>> = match event {
                Err(e) => vec![Err(LLMError::Stream(e.to_string()))],
                Ok(event) if event.data.trim().is_empty() => Vec::new(),
                Ok(event) => match handler(event.data.as_str()) {
                    Ok(chunks) => chunks.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(to_stream_error(e))],
                },
            };
            futures_util::stream::iter(items)
        })
        .take_while(move |item| {
            let keep = !finished;
            if matches!(item, Ok(LLMChunk::Done)) {
                finished = true;
            }
            async move { keep }
        });

    Box::pin(stream)
}
