use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder};
use serde::Deserialize;

use super::error_response;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create(
    state: web::Data<AppState>,
    req: Option<web::Json<CreateConversationRequest>>,
) -> impl Responder {
    let title = req.and_then(|req| req.into_inner().title);

    match state.storage.create_conversation(title).await {
        Ok(conversation) => {
            log::info!("[{}] Conversation created", conversation.id);
            HttpResponse::Created().json(conversation)
        }
        Err(e) => {
            log::error!("Failed to create conversation: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to create conversation: {}", e),
            )
        }
    }
}

pub async fn list(state: web::Data<AppState>) -> impl Responder {
    match state.storage.list_conversations().await {
        Ok(summaries) => HttpResponse::Ok().json(summaries),
        Err(e) => {
            log::error!("Failed to list conversations: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list conversations: {}", e),
            )
        }
    }
}

pub async fn get(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let conversation_id = path.into_inner();

    match state.storage.load_conversation(&conversation_id).await {
        Ok(Some(conversation)) => HttpResponse::Ok().json(conversation),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Conversation not found"),
        Err(e) => {
            log::error!("[{}] Failed to load conversation: {}", conversation_id, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to load conversation: {}", e),
            )
        }
    }
}
