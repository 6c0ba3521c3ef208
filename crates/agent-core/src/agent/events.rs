use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sentinel payload closing every successful stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events produced by a streaming orchestration pass, in emission order:
/// one `ConversationId`, any number of `ContentDelta`, then `Finish` and `Done`
/// (or a single `Error` when the pass fails).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ConversationId { conversation_id: String },

    ContentDelta { content: String },

    Finish { reason: String },

    Error { message: String },

    Done,
}

impl StreamEvent {
    pub fn delta(content: impl Into<String>) -> Self {
        StreamEvent::ContentDelta {
            content: content.into(),
        }
    }

    pub fn stop() -> Self {
        StreamEvent::Finish {
            reason: "stop".to_string(),
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::ConversationId { .. } => "conversation",
            StreamEvent::ContentDelta { .. } => "delta",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Done => "done",
        }
    }

    /// `data:` payload. Deltas and the finish marker use the chat-completions
    /// chunk shape so existing SSE clients can consume the stream unchanged.
    pub fn data(&self) -> String {
        let payload = match self {
            StreamEvent::ConversationId { conversation_id } => {
                json!({ "conversation_id": conversation_id })
            }
            StreamEvent::ContentDelta { content } => json!({
                "choices": [{
                    "delta": { "content": content },
                    "index": 0,
                    "finish_reason": Value::Null,
                }]
            }),
            StreamEvent::Finish { reason } => json!({
                "choices": [{
                    "delta": {},
                    "index": 0,
                    "finish_reason": reason,
                }]
            }),
            StreamEvent::Error { message } => json!({ "error": message }),
            StreamEvent::Done => return DONE_SENTINEL.to_string(),
        };

        payload.to_string()
    }

    /// Complete SSE frame, terminated by the blank line that delimits it.
    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_name(), self.data())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}
