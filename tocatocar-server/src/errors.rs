use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use serde::Serialize;
use thiserror::Error;
use tocatocar_collab::{ActionResult, AuthError, CollabError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Collab(#[from] CollabError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("Bad request: {0}")]
    BadRequest(&'static str),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Collab(e) => match e {
                CollabError::Unauthenticated => StatusCode::UNAUTHORIZED,
                CollabError::Unauthorized => StatusCode::FORBIDDEN,
                CollabError::NotFound { .. } => StatusCode::NOT_FOUND,
                CollabError::Conflict { .. } => StatusCode::CONFLICT,
                CollabError::Invalid(_) => StatusCode::BAD_REQUEST,
                CollabError::InvalidTransition { .. } => StatusCode::CONFLICT,
                CollabError::CodeExhausted => StatusCode::SERVICE_UNAVAILABLE,
                CollabError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials | AuthError::Missing(_) => StatusCode::BAD_REQUEST,
                AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
                AuthError::EmailTaken => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// The message shown to clients, which never includes internals
    fn user_message(&self) -> String {
        match self {
            Self::Collab(e) => e.user_message(),
            Self::Auth(e) => match e {
                AuthError::InvalidCredentials => "Email o contraseña incorrectos".to_string(),
                AuthError::Unauthenticated => "No autenticado".to_string(),
                AuthError::Missing(field) => format!("Falta el campo {}", field),
                AuthError::EmailTaken => "Ya existe una cuenta con ese email".to_string(),
                _ => "Error interno, inténtalo de nuevo".to_string(),
            },
            Self::BadRequest(reason) => reason.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.as_status_code();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body: ActionResult<()> = ActionResult::failure(self.user_message());
        (status, Json(body)).into_response()
    }
}

/// A successful response, wrapped in the same envelope as failures
pub struct Success<T>(pub T);

impl<T> IntoResponse for Success<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        Json(ActionResult::ok(self.0)).into_response()
    }
}
