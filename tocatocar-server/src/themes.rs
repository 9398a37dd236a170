use axum::{
    extract::Path,
    routing::{delete, get, post, put},
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    schemas::{JoinSchema, ThemeStatusSchema, ValidatedJson},
    serialized::{Participation, Theme, ToSerialized},
    Router,
};

#[utoipa::path(
    put,
    path = "/v1/themes/{id}/status",
    tag = "themes",
    request_body = ThemeStatusSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Theme),
        (status = 403, description = "Only the host, the proposer or an admin can move a theme"),
        (status = 409, description = "The theme can't go to that status from its current one")
    )
)]
async fn update_status(
    session: Session,
    context: ServerContext,
    Path(theme_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<ThemeStatusSchema>,
) -> ServerResult<Success<Theme>> {
    let theme = context
        .collab
        .themes
        .update_status(&session.actor(), theme_id, body.status)
        .await?;

    Ok(Success(theme.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/themes/{id}",
    tag = "themes",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The theme was deleted")
    )
)]
async fn delete_theme(
    session: Session,
    context: ServerContext,
    Path(theme_id): Path<i32>,
) -> ServerResult<Success<()>> {
    context
        .collab
        .themes
        .delete(&session.actor(), theme_id)
        .await?;

    Ok(Success(()))
}

#[utoipa::path(
    get,
    path = "/v1/themes/{id}/participants",
    tag = "themes",
    responses(
        (status = 200, body = Vec<Participation>)
    )
)]
async fn participants(
    context: ServerContext,
    Path(theme_id): Path<i32>,
) -> ServerResult<Success<Vec<Participation>>> {
    let participations = context.collab.participation.list(theme_id).await?;

    Ok(Success(participations.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/themes/{id}/participants",
    tag = "themes",
    request_body = JoinSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The caller plays the instrument on the theme", body = Participation)
    )
)]
async fn join(
    session: Session,
    context: ServerContext,
    Path(theme_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<JoinSchema>,
) -> ServerResult<Success<Participation>> {
    let participation = context
        .collab
        .participation
        .join(&session.actor(), theme_id, &body.instrument)
        .await?;

    Ok(Success(participation.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/themes/{id}/participants",
    tag = "themes",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "How many participations were removed", body = u64)
    )
)]
async fn leave(
    session: Session,
    context: ServerContext,
    Path(theme_id): Path<i32>,
) -> ServerResult<Success<u64>> {
    let removed = context
        .collab
        .participation
        .leave(&session.actor(), theme_id)
        .await?;

    Ok(Success(removed))
}

#[utoipa::path(
    post,
    path = "/v1/participations/{id}/select",
    tag = "themes",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Participation)
    )
)]
async fn select(
    session: Session,
    context: ServerContext,
    Path(participation_id): Path<i32>,
) -> ServerResult<Success<Participation>> {
    let participation = context
        .collab
        .participation
        .select(&session.actor(), participation_id)
        .await?;

    Ok(Success(participation.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id", delete(delete_theme))
        .route("/:id/status", put(update_status))
        .route("/:id/participants", get(participants).post(join).delete(leave))
}

pub fn participations_router() -> Router {
    Router::new().route("/:id/select", post(select))
}
