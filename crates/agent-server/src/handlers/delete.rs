use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Result};

use super::error_response;
use crate::state::AppState;

pub async fn handler(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    let conversation_id = path.into_inner();

    let cancelled_in_flight = state.cancel_run(&conversation_id);

    let deleted = match state.storage.delete_conversation(&conversation_id).await {
        Ok(deleted) => deleted,
        Err(error) => {
            log::error!(
                "[{}] Failed to delete conversation from storage: {}",
                conversation_id,
                error
            );
            return Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete conversation",
            ));
        }
    };

    if deleted {
        log::info!(
            "[{}] Conversation deleted (cancelled in-flight run: {})",
            conversation_id,
            cancelled_in_flight
        );
        return Ok(HttpResponse::Ok().json(serde_json::json!({
            "deleted": true,
            "conversation_id": conversation_id,
        })));
    }

    Ok(error_response(StatusCode::NOT_FOUND, "Conversation not found"))
}
