use log::error;
use serde::Serialize;
use thiserror::Error;

use crate::{DatabaseError, ThemeStatus};

pub type CollabResult<T> = Result<T, CollabError>;

/// Why an operation of the collab system failed
#[derive(Debug, Error)]
pub enum CollabError {
    /// No valid actor was supplied
    #[error("Not authenticated")]
    Unauthenticated,
    /// The actor lacks the role or ownership the operation needs
    #[error("Not authorized")]
    Unauthorized,
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    /// Input was missing or malformed
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("A theme can't go from {from} to {to}")]
    InvalidTransition { from: ThemeStatus, to: ThemeStatus },
    /// Every generated jam code collided with an existing one
    #[error("Could not allocate a unique jam code")]
    CodeExhausted,
    #[error("Persistence failure: {0}")]
    Persistence(DatabaseError),
}

impl CollabError {
    /// A short message that can be shown to end users
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthenticated => "No autenticado".to_string(),
            Self::Unauthorized => "No autorizado".to_string(),
            Self::NotFound {
                resource,
                identifier: _,
            } => format!("No encontrado: {}", resource),
            Self::Conflict { .. } => "Ya existe".to_string(),
            Self::Invalid(reason) => reason.clone(),
            Self::InvalidTransition { from, to } => {
                format!("No se puede pasar de {} a {}", from, to)
            }
            Self::CodeExhausted => "No se pudo generar un código para la jam".to_string(),
            Self::Persistence(_) => "Error interno, inténtalo de nuevo".to_string(),
        }
    }
}

impl From<DatabaseError> for CollabError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Persistence(e),
        }
    }
}

/// Converts storage errors at the manager boundary, logging the ones that aren't expected
pub(crate) trait PersistenceContext<T> {
    fn context(self, action: &str) -> CollabResult<T>;
}

impl<T> PersistenceContext<T> for Result<T, DatabaseError> {
    fn context(self, action: &str) -> CollabResult<T> {
        self.map_err(|e| {
            if let DatabaseError::Internal(inner) = &e {
                error!("Failed {}: {}", action, inner);
            }

            e.into()
        })
    }
}

/// The uniform result shape returned to clients
#[derive(Debug, Serialize)]
pub struct ActionResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<CollabResult<T>> for ActionResult<T> {
    fn from(value: CollabResult<T>) -> Self {
        match value {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.user_message()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_action_result_shape() {
        let ok: ActionResult<u32> = Ok(3).into();
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "success": true, "data": 3 })
        );

        let failed: ActionResult<u32> = Err(CollabError::Unauthenticated).into();
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "success": false, "error": "No autenticado" })
        );
    }

    #[test]
    fn test_database_errors_keep_their_meaning() {
        let not_found: CollabError = DatabaseError::NotFound {
            resource: "jam",
            identifier: "code",
        }
        .into();
        assert!(matches!(not_found, CollabError::NotFound { resource: "jam", .. }));

        let internal: CollabResult<()> =
            Err(DatabaseError::Internal("connection reset".into())).context("testing");
        assert!(matches!(internal, Err(CollabError::Persistence(_))));
        assert_eq!(
            internal.unwrap_err().user_message(),
            "Error interno, inténtalo de nuevo"
        );
    }
}
