use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
    routing::{get, post},
};
use tocatocar_collab::{Actor, AuthError, Credentials, NewAccount, SessionData};

use crate::{
    context::ServerContext,
    errors::{ServerError, ServerResult, Success},
    schemas::{LoginSchema, RegisterSchema, ValidatedJson},
    serialized::{LoginResult, ToSerialized, User},
    Router,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

impl Session {
    /// The identity every collab operation is performed as
    pub fn actor(&self) -> Actor {
        Actor::from(&self.0.user)
    }

    pub fn token(&self) -> &str {
        &self.0.token
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = ServerError;

    async fn from_request_parts(
        parts: &mut Parts,
        context: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let session = context.collab.auth.session(token).await?;

        Ok(Self(session))
    }
}

/// Pulls the token out of an `Authorization: Bearer <token>` header
fn bearer_token(headers: &HeaderMap) -> Result<&str, ServerError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())
        .ok_or(ServerError::Auth(AuthError::Unauthenticated))?;

    let parts: Vec<_> = value.split_ascii_whitespace().collect();

    match parts.as_slice() {
        ["Bearer", token] => Ok(*token),
        _ => Err(ServerError::BadRequest("Authorization must be Bearer")),
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    tag = "auth",
    request_body = RegisterSchema,
    responses(
        (status = 200, body = User),
        (status = 409, description = "The email is taken")
    )
)]
async fn register(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<RegisterSchema>,
) -> ServerResult<Success<User>> {
    let user = context
        .collab
        .auth
        .register(NewAccount {
            name: body.name,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Success(user.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "auth",
    request_body = LoginSchema,
    responses(
        (status = 200, body = LoginResult),
        (status = 400, description = "Email or password is incorrect")
    )
)]
async fn login(
    context: ServerContext,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<Success<LoginResult>> {
    let session = context
        .collab
        .auth
        .login(Credentials {
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok(Success(session.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The session was deleted")
    )
)]
async fn logout(session: Session, context: ServerContext) -> ServerResult<Success<()>> {
    context.collab.auth.logout(session.token()).await?;
    Ok(Success(()))
}

#[utoipa::path(
    get,
    path = "/v1/auth/user",
    tag = "auth",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = User),
        (status = 401, description = "Missing or expired session")
    )
)]
async fn user(session: Session) -> Success<User> {
    Success(session.0.user.to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/user", get(user))
}

#[cfg(test)]
mod test {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc123")).unwrap(), "abc123");

        assert!(matches!(
            bearer_token(&headers("Basic abc123")),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer")),
            Err(ServerError::BadRequest(_))
        ));
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(ServerError::Auth(AuthError::Unauthenticated))
        ));
    }
}
