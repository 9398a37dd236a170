use axum::{
    extract::Path,
    routing::{get, put},
};
use tocatocar_collab::CollabError;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerResult, Success},
    schemas::{ProfileSchema, RoleSchema, ValidatedJson},
    serialized::{ToSerialized, User},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/users/{id}",
    tag = "users",
    responses(
        (status = 200, body = User)
    )
)]
async fn profile(context: ServerContext, Path(user_id): Path<i32>) -> ServerResult<Success<User>> {
    let user = context.collab.profiles.profile(user_id).await?;

    Ok(Success(user.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/profile",
    tag = "users",
    request_body = ProfileSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 403, description = "Users can only change their own profile")
    )
)]
async fn update_profile(
    session: Session,
    context: ServerContext,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<ProfileSchema>,
) -> ServerResult<Success<User>> {
    let actor = session.actor();

    if actor.id != user_id {
        return Err(CollabError::Unauthorized.into());
    }

    let user = context.collab.profiles.update(&actor, body.into()).await?;

    Ok(Success(user.to_serialized()))
}

#[utoipa::path(
    put,
    path = "/v1/users/{id}/role",
    tag = "users",
    request_body = RoleSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 403, description = "Only admins can change roles")
    )
)]
async fn set_role(
    session: Session,
    context: ServerContext,
    Path(user_id): Path<i32>,
    ValidatedJson(body): ValidatedJson<RoleSchema>,
) -> ServerResult<Success<User>> {
    let user = context
        .collab
        .profiles
        .set_role(&session.actor(), user_id, body.role)
        .await?;

    Ok(Success(user.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(profile))
        .route("/:id/profile", put(update_profile))
        .route("/:id/role", put(set_role))
}
