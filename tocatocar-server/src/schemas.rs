//! Request bodies accepted by the endpoints, validated before they reach the collab system

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tocatocar_collab::{
    JamFields, JamStatus, MediaKind, ProfileFields, QueueEntry, Role, ThemeFields, ThemeKind,
    ThemeStatus,
};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServerError;

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginSchema {
    #[validate(length(max = 254))]
    pub email: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegisterSchema {
    #[validate(length(min = 2, max = 128))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewJamSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(max = 256))]
    pub location: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub is_private: bool,
    #[validate(length(max = 128))]
    pub opening_act: Option<String>,
    pub opening_act_time: Option<DateTime<Utc>>,
}

impl From<NewJamSchema> for JamFields {
    fn from(value: NewJamSchema) -> Self {
        Self {
            name: value.name,
            description: value.description,
            location: value.location,
            city: value.city,
            start_time: value.start_time,
            is_private: value.is_private,
            opening_act: value.opening_act,
            opening_act_time: value.opening_act_time,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JamStatusSchema {
    #[schema(value_type = String, example = "ACTIVE")]
    pub status: JamStatus,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewThemeSchema {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[validate(length(max = 32))]
    pub tonality: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[schema(value_type = String, example = "SONG")]
    pub kind: ThemeKind,
}

impl From<NewThemeSchema> for ThemeFields {
    fn from(value: NewThemeSchema) -> Self {
        Self {
            name: value.name,
            tonality: value.tonality,
            description: value.description,
            kind: value.kind,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ThemeStatusSchema {
    #[schema(value_type = String, example = "QUEUED")]
    pub status: ThemeStatus,
}

#[derive(Debug, ToSchema, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueEntrySchema {
    pub id: i32,
    pub order: i32,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReorderSchema {
    #[validate(length(max = 500))]
    pub entries: Vec<QueueEntrySchema>,
}

impl ReorderSchema {
    pub fn entries(&self) -> Vec<QueueEntry> {
        self.entries
            .iter()
            .map(|e| QueueEntry {
                theme_id: e.id,
                order: e.order,
            })
            .collect()
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinSchema {
    #[validate(length(min = 1, max = 64))]
    pub instrument: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageSchema {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    pub theme_id: Option<i32>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DirectMessageSchema {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewMediaSchema {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[schema(value_type = String, example = "IMAGE")]
    pub kind: MediaKind,
    #[validate(length(max = 280))]
    pub caption: Option<String>,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfileSchema {
    #[validate(length(min = 2, max = 128))]
    pub name: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    #[validate(length(max = 64))]
    pub instrument: Option<String>,
    #[validate(length(max = 256))]
    pub instagram: Option<String>,
    #[validate(length(max = 256))]
    pub youtube: Option<String>,
    #[validate(length(max = 256))]
    pub website: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    #[validate(length(max = 2048))]
    pub image: Option<String>,
}

impl From<ProfileSchema> for ProfileFields {
    fn from(value: ProfileSchema) -> Self {
        Self {
            name: value.name,
            city: value.city,
            instrument: value.instrument,
            instagram: value.instagram,
            youtube: value.youtube,
            website: value.website,
            bio: value.bio,
            image: value.image,
        }
    }
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleSchema {
    #[schema(value_type = String, example = "ADMIN")]
    pub role: Role,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| ServerError::BadRequest("JSON inválido"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| ServerError::BadRequest("Los datos enviados no son válidos"))?;

        Ok(Self(extracted_json.0))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_validation() {
        let valid: RegisterSchema = serde_json::from_value(serde_json::json!({
            "name": "Ana",
            "email": "ana@example.com",
            "password": "supersecret"
        }))
        .unwrap();
        assert!(valid.validate().is_ok());

        let short_password = RegisterSchema {
            password: "short".to_string(),
            ..valid
        };
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_enums_use_wire_names() {
        let schema: ThemeStatusSchema =
            serde_json::from_value(serde_json::json!({ "status": "PLAYING" })).unwrap();
        assert_eq!(schema.status, ThemeStatus::Playing);

        let reorder: ReorderSchema = serde_json::from_value(serde_json::json!({
            "entries": [{ "id": 3, "order": 0 }, { "id": 1, "order": 1 }]
        }))
        .unwrap();
        assert_eq!(
            reorder.entries(),
            [
                QueueEntry { theme_id: 3, order: 0 },
                QueueEntry { theme_id: 1, order: 1 }
            ]
        );
    }
}
