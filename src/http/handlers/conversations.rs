//! Conversation and message handlers

use crate::http::auth::AuthContext;
use crate::http::errors::{HttpError, HttpResult};
use crate::http::form::BodyInput;
use crate::http::handlers::{parse_path_id, AppState};
use crate::http::models::{
    ApiResponse, ConversationStartData, ConversationsData, MessageData, MessagesData,
    SendMessageRequest, StartConversationRequest,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

/// POST /api/v1/conversations
pub async fn start_conversation(
    State(state): State<AppState>,
    auth: AuthContext,
    body: BodyInput,
) -> HttpResult<(StatusCode, Json<ApiResponse<ConversationStartData>>)> {
    body.ensure_only_files(&[])?;
    let (receiver, listing, content) = body.parse::<StartConversationRequest>()?.into_parts()?;

    let (conversation, message) = state
        .service
        .messaging()
        .start_conversation(&auth.user, receiver, listing, &content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ConversationStartData {
            conversation,
            message,
        })),
    ))
}

/// GET /api/v1/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthContext,
) -> HttpResult<Json<ApiResponse<ConversationsData>>> {
    let conversations = state.service.messaging().conversations_for(&auth.user).await?;
    let results = conversations.len();
    Ok(Json(
        ApiResponse::success(ConversationsData { conversations }).with_results(results),
    ))
}

/// GET /api/v1/conversations/:conversationId/messages
pub async fn get_messages(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(conversation_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> HttpResult<Json<ApiResponse<MessagesData>>> {
    let id = parse_path_id("conversationId", &conversation_id)?;
    let messages = state
        .service
        .messaging()
        .messages(&auth.user, id, &params)
        .await?;
    let results = messages.len();
    Ok(Json(
        ApiResponse::success(MessagesData { messages }).with_results(results),
    ))
}

/// POST /api/v1/conversations/:conversationId/messages
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(conversation_id): Path<String>,
    body: BodyInput,
) -> HttpResult<(StatusCode, Json<ApiResponse<MessageData>>)> {
    let id = parse_path_id("conversationId", &conversation_id)?;
    body.ensure_only_files(&[])?;
    let content = body
        .parse::<SendMessageRequest>()?
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| HttpError::BadRequest("Message content cannot be empty.".to_string()))?;

    let message = state
        .service
        .messaging()
        .send_message(&auth.user, id, &content)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageData { message })),
    ))
}
