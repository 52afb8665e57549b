use actix_web::{http::header::ContentType, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::services::CommandService;
use crate::store::UserId;

/// One chat message forwarded by the session transport
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    pub text: String,
}

/// Runs the command and answers with the reply text. Command failures are
/// part of the reply, so anything but a malformed request is a 200.
pub async fn handle_command(
    command_service: web::Data<Arc<CommandService>>,
    request: web::Json<CommandRequest>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner();
    if request.text.trim().is_empty() {
        return Err(AppError::ValidationError("text is required".to_string()));
    }

    let reply = command_service
        .handle(request.user_id, request.username.as_deref(), &request.text)
        .await;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::plaintext())
        .body(reply))
}
