use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use agent_core::{AgentError, Message, Role};
use agent_loop::run_blocking;

use super::{error_response, stream};
use crate::logging::Timer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: ChatMessage,
    #[serde(default = "default_stream")]
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role")]
    pub role: String,
    pub content: String,
}

fn default_stream() -> bool {
    true
}

fn default_role() -> String {
    Role::User.as_str().to_string()
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub content: String,
}

pub async fn handler(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ChatRequest>,
) -> impl Responder {
    let conversation_id = path.into_inner();
    let req = req.into_inner();

    if req.message.role != Role::User.as_str() {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Unsupported message role '{}'", req.message.role),
        );
    }
    if req.message.content.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Message content must not be empty");
    }

    let conversation = match state.storage.load_conversation(&conversation_id).await {
        Ok(Some(conversation)) => conversation,
        Ok(None) => {
            log::warn!("[{}] Conversation not found", conversation_id);
            return error_response(StatusCode::NOT_FOUND, "Conversation not found");
        }
        Err(e) => {
            log::error!("[{}] Failed to load conversation: {}", conversation_id, e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load conversation: {}", e),
            );
        }
    };

    let Some(run) = state.begin_run(&conversation_id) else {
        log::warn!("[{}] Rejecting chat, a run is already active", conversation_id);
        return error_response(
            StatusCode::CONFLICT,
            "A chat is already running for this conversation",
        );
    };

    let history = prepare_history(
        conversation.messages,
        state.system_prompt.as_deref(),
        req.message.content,
    );

    if req.stream {
        return stream::respond(state, conversation_id, history, run);
    }

    let mut history = history;
    let timer = Timer::new("blocking_chat");
    let result = run_blocking(
        &mut history,
        &conversation_id,
        state.llm.clone(),
        state.registry.clone(),
        &state.loop_config,
        run.token(),
    )
    .await;
    timer.debug(&conversation_id);

    let saved = state
        .storage
        .save_messages(&conversation_id, &history)
        .await;
    drop(run);

    let reply = match result {
        Ok(reply) => reply,
        Err(e) => {
            log::error!("[{}] Chat failed: {}", conversation_id, e);
            return error_response(status_for(&e), e.to_string());
        }
    };

    if let Err(e) = saved {
        log::error!("[{}] Failed to save conversation: {}", conversation_id, e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to save conversation: {}", e),
        );
    }

    HttpResponse::Ok().json(ChatResponse {
        conversation_id,
        content: reply.text().to_string(),
    })
}

/// Stored history, seeded with the system prompt when empty, plus the new user turn.
pub(crate) fn prepare_history(
    mut history: Vec<Message>,
    system_prompt: Option<&str>,
    content: String,
) -> Vec<Message> {
    if history.is_empty() {
        if let Some(prompt) = system_prompt {
            history.push(Message::system(prompt));
        }
    }
    history.push(Message::user(content));
    history
}

fn status_for(error: &AgentError) -> StatusCode {
    match error {
        AgentError::LLM(_) | AgentError::MaxRoundsExceeded(_) => StatusCode::BAD_GATEWAY,
        AgentError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AgentError::Cancelled => StatusCode::CONFLICT,
        AgentError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
