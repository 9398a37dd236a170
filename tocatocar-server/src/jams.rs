use axum::{
    extract::Path,
    routing::{get, put},
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    schemas::{JamStatusSchema, NewJamSchema, NewThemeSchema, ReorderSchema, ValidatedJson},
    serialized::{Attendance, Jam, Theme, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/jams",
    tag = "jams",
    security(
        (),
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Public jams, plus private ones hosted by the caller", body = Vec<Jam>)
    )
)]
async fn list_jams(
    session: Option<Session>,
    context: ServerContext,
) -> ServerResult<Success<Vec<Jam>>> {
    let actor = session.map(|s| s.actor());
    let jams = context.collab.jams.list(actor.as_ref()).await?;

    Ok(Success(jams.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams",
    tag = "jams",
    request_body = NewJamSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Jam)
    )
)]
async fn create_jam(
    session: Session,
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<NewJamSchema>,
) -> ServerResult<Success<Jam>> {
    let jam = context
        .collab
        .jams
        .create(&session.actor(), body.into())
        .await?;

    Ok(Success(jam.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{code}",
    tag = "jams",
    responses(
        (status = 200, body = Jam),
        (status = 404, description = "No jam has that code")
    )
)]
async fn jam(context: ServerContext, Path(code): Path<String>) -> ServerResult<Success<Jam>> {
    let jam = context.collab.jams.by_code(&code).await?;

    Ok(Success(jam.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/jams/{code}",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The jam and everything in it was deleted"),
        (status = 403, description = "Only the host or an admin can delete a jam")
    )
)]
async fn delete_jam(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Success<()>> {
    context.collab.jams.delete(&session.actor(), &code).await?;

    Ok(Success(()))
}

#[utoipa::path(
    put,
    path = "/v1/jams/{code}/status",
    tag = "jams",
    request_body = JamStatusSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Jam)
    )
)]
async fn update_jam_status(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<JamStatusSchema>,
) -> ServerResult<Success<Jam>> {
    let jams = &context.collab.jams;
    let jam = jams.by_code(&code).await?;
    let jam = jams
        .update_status(&session.actor(), jam.id, body.status)
        .await?;

    Ok(Success(jam.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{code}/themes",
    tag = "themes",
    responses(
        (status = 200, description = "Every theme of the jam, in the order they were proposed", body = Vec<Theme>)
    )
)]
async fn themes(context: ServerContext, Path(code): Path<String>) -> ServerResult<Success<Vec<Theme>>> {
    let jam = context.collab.jams.by_code(&code).await?;
    let themes = context.collab.themes.list(jam.id).await?;

    Ok(Success(themes.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams/{code}/themes",
    tag = "themes",
    request_body = NewThemeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Theme)
    )
)]
async fn propose_theme(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<NewThemeSchema>,
) -> ServerResult<Success<Theme>> {
    let jam = context.collab.jams.by_code(&code).await?;
    let theme = context
        .collab
        .themes
        .propose(&session.actor(), jam.id, body.into())
        .await?;

    Ok(Success(theme.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{code}/queue",
    tag = "themes",
    responses(
        (status = 200, description = "Queued themes in playing order", body = Vec<Theme>)
    )
)]
async fn queue(context: ServerContext, Path(code): Path<String>) -> ServerResult<Success<Vec<Theme>>> {
    let jam = context.collab.jams.by_code(&code).await?;
    let queue = context.collab.themes.queue(jam.id).await?;

    Ok(Success(queue.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/jams/{code}/queue",
    tag = "themes",
    request_body = ReorderSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The new queue", body = Vec<Theme>),
        (status = 400, description = "A theme is repeated, not queued, or not in this jam")
    )
)]
async fn reorder_queue(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
    ValidatedJson(body): ValidatedJson<ReorderSchema>,
) -> ServerResult<Success<Vec<Theme>>> {
    let themes = &context.collab.themes;
    let jam = context.collab.jams.by_code(&code).await?;

    themes
        .reorder(&session.actor(), jam.id, &body.entries())
        .await?;

    let queue = themes.queue(jam.id).await?;
    Ok(Success(queue.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/v1/jams/{code}/attendance",
    tag = "jams",
    responses(
        (status = 200, body = Vec<Attendance>)
    )
)]
async fn attendees(
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Success<Vec<Attendance>>> {
    let attendance = context.collab.jams.attendees(&code).await?;

    Ok(Success(attendance.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/jams/{code}/attendance",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The caller is checked in", body = Attendance)
    )
)]
async fn check_in(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Success<Attendance>> {
    let attendance = context
        .collab
        .jams
        .check_in(&session.actor(), &code)
        .await?;

    Ok(Success(attendance.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/jams/{code}/attendance",
    tag = "jams",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The caller is checked out")
    )
)]
async fn check_out(
    session: Session,
    context: ServerContext,
    Path(code): Path<String>,
) -> ServerResult<Success<()>> {
    context
        .collab
        .jams
        .check_out(&session.actor(), &code)
        .await?;

    Ok(Success(()))
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jams).post(create_jam))
        .route("/:code", get(jam).delete(delete_jam))
        .route("/:code/status", put(update_jam_status))
        .route("/:code/themes", get(themes).post(propose_theme))
        .route("/:code/queue", get(queue).put(reorder_queue))
        .route(
            "/:code/attendance",
            get(attendees).post(check_in).delete(check_out),
        )
}

