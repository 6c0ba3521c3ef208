pub mod chat;
pub mod conversations;
pub mod delete;
pub mod health;
pub mod stop;
pub mod stream;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({ "error": message.into() }))
}
