use axum::{
    extract::Path,
    routing::{get, put},
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    serialized::{Notification, ToSerialized, UnreadCount},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/notifications",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Notifications of the caller, newest first", body = Vec<Notification>)
    )
)]
async fn list_notifications(
    session: Session,
    context: ServerContext,
) -> ServerResult<Success<Vec<Notification>>> {
    let notifications = context.collab.notifications.list(&session.actor()).await?;

    Ok(Success(notifications.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/notifications/unread",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = UnreadCount)
    )
)]
async fn unread_count(session: Session, context: ServerContext) -> ServerResult<Success<UnreadCount>> {
    let count = context
        .collab
        .notifications
        .unread_count(&session.actor())
        .await?;

    Ok(Success(UnreadCount { count }))
}

#[utoipa::path(
    put,
    path = "/v1/notifications/read",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Every notification of the caller is read")
    )
)]
async fn mark_all_read(session: Session, context: ServerContext) -> ServerResult<Success<()>> {
    context
        .collab
        .notifications
        .mark_all_read(&session.actor())
        .await?;

    Ok(Success(()))
}

#[utoipa::path(
    put,
    path = "/v1/notifications/read/{id}",
    tag = "notifications",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Notification),
        (status = 403, description = "The notification belongs to someone else")
    )
)]
async fn mark_read(
    session: Session,
    context: ServerContext,
    Path(notification_id): Path<i32>,
) -> ServerResult<Success<Notification>> {
    let notification = context
        .collab
        .notifications
        .mark_read(&session.actor(), notification_id)
        .await?;

    Ok(Success(notification.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread", get(unread_count))
        .route("/read", put(mark_all_read))
        .route("/read/:id", put(mark_read))
}
