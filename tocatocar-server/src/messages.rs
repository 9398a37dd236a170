use axum::{
    extract::{Path, Query},
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    schemas::{DirectMessageSchema, MessageSchema, ValidatedJson},
    serialized::{DirectMessage, Message, ToSerialized},
    Router,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct MessageQuery {
    /// Only return messages about this theme
    theme_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/v1/messages/jams/{code}",
    tag = "messages",
    params(MessageQuery),
    responses(
        (status = 200, description = "Messages of the jam, oldest first", body = Vec<Message>)
    )
)]
async fn jam_messages(
    context: ServerContext,
    Path(code): Path<String>,
    Query(query): Query<MessageQuery>,
) -> ServerResult<Success<Vec<Message>>> {
    let messages = context.collab.chat.messages(&code, query.theme_id).await?;

    Ok(Success(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/messages/jams/{code}",
    tag = "messages",
    request_body = MessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Message)
    )
)]
async fn post_message(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<MessageSchema>,
) -> ServerResult<Success<Message>> {
    let message = context
        .collab
        .chat
        .post_message(&session.actor(), &code, body.theme_id, &body.content)
        .await?;

    Ok(Success(message.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/messages/direct/{user_id}",
    tag = "messages",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The conversation with the user, oldest first", body = Vec<DirectMessage>)
    )
)]
async fn conversation(
    session: Session,
    context: ServerContext,
    Path(user_id): Path<i32>,
) -> ServerResult<Success<Vec<DirectMessage>>> {
    let messages = context
        .collab
        .chat
        .conversation(&session.actor(), user_id)
        .await?;

    Ok(Success(messages.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/messages/direct/{user_id}",
    tag = "messages",
    request_body = DirectMessageSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = DirectMessage)
    )
)]
async fn send_direct(
    session: Session,
    context: ServerContext,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<DirectMessageSchema>,
) -> ServerResult<Success<DirectMessage>> {
    let message = context
        .collab
        .chat
        .send_direct(&session.actor(), user_id, &body.content)
        .await?;

    Ok(Success(message.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/jams/:code", get(jam_messages).post(post_message))
        .route("/direct/:user_id", get(conversation).post(send_direct))
}
