use axum::{
    extract::Path,
    routing::{delete, get},
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    schemas::{NewMediaSchema, ValidatedJson},
    serialized::{Media, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/jams/{code}/media",
    tag = "media",
    responses(
        (status = 200, description = "Media of the jam, newest first", body = Vec<Media>)
    )
)]
async fn list_media(
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Success<Vec<Media>>> {
    let media = context.collab.media.list(&code).await?;

    Ok(Success(media.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams/{code}/media",
    tag = "media",
    request_body = NewMediaSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Media),
        (status = 400, description = "The URL is not a valid http(s) link")
    )
)]
async fn attach_media(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<NewMediaSchema>,
) -> ServerResult<Success<Media>> {
    let media = context
        .collab
        .media
        .attach(&session.actor(), &code, &body.url, body.kind, body.caption)
        .await?;

    Ok(Success(media.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/jams/{code}/media/{id}",
    tag = "media",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The media was removed"),
        (status = 403, description = "Only the uploader, the host or an admin can remove media")
    )
)]
async fn remove_media(
    session: Session,
    context: ServerContext,
    Path((_code, media_id)): Path<(String, i32)>,
) -> ServerResult<Success<()>> {
    context
        .collab
        .media
        .remove(&session.actor(), media_id)
        .await?;

    Ok(Success(()))
}

/// Nested under the jams router
pub fn router() -> Router {
    Router::new()
        .route("/:code/media", get(list_media).post(attach_media))
        .route("/:code/media/:id", delete(remove_media))
}
